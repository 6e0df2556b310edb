//! Read-only host metrics (temperature, CPU, memory, disk, uptime) without
//! going through a shell.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use nanoclaw_core::error::ToolError;
use nanoclaw_core::tool::{Tool, ToolResult};
use serde::Serialize;
use sysinfo::{Components, Disks, System};

const MB: f64 = 1024.0 * 1024.0;
const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// One snapshot of the host. Fields are `None` when the platform does not
/// expose them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HostStats {
    pub temperature_c: Option<f64>,
    pub cpu_usage_pct: Option<f64>,
    pub loadavg_1m: Option<f64>,
    pub memory_total_mb: Option<f64>,
    pub memory_available_mb: Option<f64>,
    pub memory_used_mb: Option<f64>,
    pub disk_root_total_gb: Option<f64>,
    pub disk_root_used_gb: Option<f64>,
    pub disk_root_free_gb: Option<f64>,
    pub uptime_seconds: Option<u64>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl HostStats {
    /// Sample the host. CPU usage needs two readings a short interval apart.
    pub async fn collect() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu_usage();
        let settle = sysinfo::MINIMUM_CPU_UPDATE_INTERVAL.max(Duration::from_millis(200));
        tokio::time::sleep(settle).await;
        sys.refresh_cpu_usage();

        let cpu_count = sys.cpus().len();
        let cpu_usage_pct = (cpu_count > 0).then(|| round2(f64::from(sys.global_cpu_usage())));

        let (memory_total_mb, memory_available_mb, memory_used_mb) = match sys.total_memory() {
            0 => (None, None, None),
            total => {
                let available = sys.available_memory();
                (
                    Some(round2(total as f64 / MB)),
                    Some(round2(available as f64 / MB)),
                    Some(round2(total.saturating_sub(available) as f64 / MB)),
                )
            }
        };

        // Windows has no load average; sysinfo reports zeros there.
        let loadavg_1m = cfg!(unix).then(|| round2(System::load_average().one));

        let uptime = System::uptime();
        let uptime_seconds = (uptime > 0).then_some(uptime);

        let (disk_root_total_gb, disk_root_used_gb, disk_root_free_gb) = root_disk();

        Self {
            temperature_c: cpu_temperature(),
            cpu_usage_pct,
            loadavg_1m,
            memory_total_mb,
            memory_available_mb,
            memory_used_mb,
            disk_root_total_gb,
            disk_root_used_gb,
            disk_root_free_gb,
            uptime_seconds,
        }
    }

    pub fn to_text(&self) -> String {
        fn show<T: std::fmt::Display>(value: &Option<T>) -> String {
            value
                .as_ref()
                .map_or_else(|| "n/a".to_string(), |v| v.to_string())
        }

        [
            "Host Stats".to_string(),
            format!("- temperature_c: {}", show(&self.temperature_c)),
            format!("- cpu_usage_pct: {}", show(&self.cpu_usage_pct)),
            format!("- loadavg_1m: {}", show(&self.loadavg_1m)),
            format!("- memory_total_mb: {}", show(&self.memory_total_mb)),
            format!("- memory_used_mb: {}", show(&self.memory_used_mb)),
            format!("- memory_available_mb: {}", show(&self.memory_available_mb)),
            format!("- disk_root_total_gb: {}", show(&self.disk_root_total_gb)),
            format!("- disk_root_used_gb: {}", show(&self.disk_root_used_gb)),
            format!("- disk_root_free_gb: {}", show(&self.disk_root_free_gb)),
            format!("- uptime_seconds: {}", show(&self.uptime_seconds)),
        ]
        .join("\n")
    }
}

/// The hottest CPU-ish sensor, falling back to any sensor.
fn cpu_temperature() -> Option<f64> {
    let components = Components::new_with_refreshed_list();
    let readings: Vec<(String, f32)> = components
        .iter()
        .filter_map(|c| c.temperature().map(|t| (c.label().to_lowercase(), t)))
        .filter(|(_, t)| t.is_finite() && *t > 0.0)
        .collect();

    let cpu = readings
        .iter()
        .filter(|(label, _)| {
            ["cpu", "core", "package", "soc", "thermal"]
                .iter()
                .any(|k| label.contains(k))
        })
        .map(|(_, t)| *t)
        .reduce(f32::max);

    cpu.or_else(|| readings.iter().map(|(_, t)| *t).reduce(f32::max))
        .map(|t| round2(f64::from(t)))
}

fn root_disk() -> (Option<f64>, Option<f64>, Option<f64>) {
    let disks = Disks::new_with_refreshed_list();
    let Some(root) = disks
        .list()
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
    else {
        return (None, None, None);
    };

    let total = root.total_space();
    let free = root.available_space();
    (
        Some(round2(total as f64 / GB)),
        Some(round2(total.saturating_sub(free) as f64 / GB)),
        Some(round2(free as f64 / GB)),
    )
}

pub struct HostStatsTool;

#[async_trait]
impl Tool for HostStatsTool {
    fn name(&self) -> &str {
        "host_stats"
    }

    fn description(&self) -> &str {
        "Read host system stats (temperature, CPU, memory, disk, uptime) without shell commands."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "format": {
                    "type": "string",
                    "enum": ["text", "json"],
                    "description": "Output format. Defaults to text."
                }
            },
            "required": []
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let format = arguments["format"].as_str().unwrap_or("text");
        if !matches!(format, "text" | "json") {
            return Err(ToolError::InvalidArguments(format!(
                "Unknown format '{format}', expected 'text' or 'json'"
            )));
        }

        let stats = HostStats::collect().await;
        if format == "text" {
            return Ok(ToolResult::ok(stats.to_text()));
        }
        serde_json::to_string_pretty(&stats)
            .map(ToolResult::ok)
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "host_stats".into(),
                reason: e.to_string(),
            })
    }
}
