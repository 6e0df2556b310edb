//! NanoClaw CLI: the main entry point.
//!
//! Commands:
//! - `onboard` Initialize config, policy & workspace
//! - `agent`   Interactive chat or single-message mode
//! - `run`     Start the agent loop and channels until Ctrl-C
//! - `status`  Show configuration and policy status
//! - `policy`  Show, create, or check the policy file

use clap::{Parser, Subcommand};

mod commands;
mod runtime;

#[derive(Parser)]
#[command(
    name = "nanoclaw",
    about = "NanoClaw — policy-gated chat agent",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration, policy file and workspace
    Onboard,

    /// Chat with the agent
    Agent {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Run the agent loop with all channels until Ctrl-C
    Run,

    /// Show system status
    Status,

    /// Inspect or manage the policy file
    Policy {
        #[command(subcommand)]
        action: PolicyAction,
    },
}

#[derive(Subcommand)]
enum PolicyAction {
    /// Print the effective policy
    Show,
    /// Create the default policy file if missing
    Init,
    /// Validate the policy against the registered tools
    Check,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Agent { message } => commands::agent::run(message).await?,
        Commands::Run => commands::run::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Policy { action } => match action {
            PolicyAction::Show => commands::policy::show().await?,
            PolicyAction::Init => commands::policy::init().await?,
            PolicyAction::Check => commands::policy::check().await?,
        },
    }

    Ok(())
}
