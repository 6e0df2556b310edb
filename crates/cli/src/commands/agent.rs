//! `nanoclaw agent`: Interactive or single-message chat mode.

use std::io::Write;

use nanoclaw_channels::cli::{CLI_CHANNEL, CLI_CHAT_ID, is_exit_command};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::runtime;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let rt = runtime::build()?;
    let agent = rt.agent;

    if let Some(msg) = message {
        let response = agent.process_direct(&msg, CLI_CHANNEL, CLI_CHAT_ID).await?;
        if response.is_empty() {
            eprintln!("  (no reply: the policy dropped this message)");
        } else {
            println!("{response}");
        }
        return Ok(());
    }

    println!();
    println!("  NanoClaw Agent — Interactive Mode");
    println!();
    println!("  Provider:  {}", rt.config.default_provider);
    println!("  Model:     {}", agent.model());
    println!("  Policy:    {}", if rt.config.policy.enabled { "enabled" } else { "disabled" });
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit_command(line) {
            break;
        }

        match agent.process_direct(line, CLI_CHANNEL, CLI_CHAT_ID).await {
            Ok(response) if response.is_empty() => {
                eprintln!("  (no reply)");
            }
            Ok(response) => {
                println!();
                for line in response.lines() {
                    println!("  NanoClaw > {line}");
                }
                println!();
            }
            Err(e) => eprintln!("  [Error] {e}"),
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}
