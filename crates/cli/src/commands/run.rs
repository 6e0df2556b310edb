//! `nanoclaw run`: Agent loop plus channels until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use nanoclaw_channels::{ChannelManager, CliChannel};
use tracing::{info, warn};

use crate::runtime;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime::build()?;
    let poll_interval = Duration::from_millis(rt.config.agent.poll_interval_ms);

    let mut manager = ChannelManager::new();
    manager.register(Arc::new(CliChannel::new()));
    let manager = Arc::new(manager);
    manager.start_all(rt.bus.clone()).await?;

    info!(channels = ?manager.names(), model = %rt.agent.model(), "NanoClaw running");

    let agent_task = {
        let agent = rt.agent.clone();
        tokio::spawn(async move { agent.run().await })
    };
    let dispatcher = {
        let manager = manager.clone();
        let bus = rt.bus.clone();
        tokio::spawn(async move { manager.run_dispatcher(bus, poll_interval).await })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    rt.agent.stop();
    manager.stop_all().await;
    rt.bus.close().await;

    let grace = poll_interval + Duration::from_secs(5);
    for (name, task) in [("agent", agent_task), ("dispatcher", dispatcher)] {
        if tokio::time::timeout(grace, task).await.is_err() {
            warn!(task = name, "Task did not stop in time");
        }
    }

    let counters = rt.agent.policy_counters();
    info!(
        dropped_by_access = counters.dropped_by_access,
        dropped_by_reply = counters.dropped_by_reply,
        blocked_tool_call = counters.blocked_tool_call,
        "Policy counters"
    );
    Ok(())
}
