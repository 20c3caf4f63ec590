use super::commands::OutputFormat;
use sysm_agent::{Agent, AgentConfig};
use sysm_types::{StatusRecord, SysmResult};

/// Checks every enabled backend once. Returns whether all of them are online.
pub async fn run_checks(config: &AgentConfig, format: OutputFormat) -> SysmResult<bool> {
    let mut agent = Agent::from_config(config)?;
    let records = agent.check().await;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Text => print_records(&records),
    }

    Ok(records.iter().all(StatusRecord::is_online))
}

fn print_records(records: &[StatusRecord]) {
    println!("\x1b[38;5;46msysm Backend Check\x1b[0m");
    println!("\x1b[38;5;245m{}\x1b[0m", "═".repeat(50));

    if records.is_empty() {
        println!("\x1b[38;5;226mWARN\x1b[0m - No backends enabled");
        return;
    }

    for record in records {
        let marker = if record.is_online() {
            "\x1b[38;5;46m[+]\x1b[0m"
        } else {
            "\x1b[38;5;196m[-]\x1b[0m"
        };
        println!("{} {:<10} {}", marker, record.backend_id().as_str(), record.status_text());
        if let Some(error) = record.error() {
            println!("    \x1b[38;5;245m{}\x1b[0m", error.message);
        }
    }

    let online = records.iter().filter(|r| r.is_online()).count();
    println!();
    println!("{}/{} backends online", online, records.len());
}
