use super::utils::print_banner;
use std::time::Duration;
use sysm_agent::{Agent, AgentConfig};
use sysm_types::{SysmError, SysmResult};
use tracing::{debug, info};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run_agent(config: AgentConfig) -> SysmResult<()> {
    print_banner();
    info!("Starting sysm agent v{}", env!("CARGO_PKG_VERSION"));
    for line in config.redacted().to_string().lines() {
        debug!("{}", line);
    }

    let mut agent = Agent::from_config(&config)?;
    agent.start();

    if agent.service_ids().is_empty() {
        info!("No backends enabled, only the relay is running");
    } else {
        info!("Watching: {}", agent.service_ids().join(", "));
    }
    if config.relay.enabled {
        info!("Relaying to {}", config.relay.url());
    }

    wait_for_shutdown().await?;

    info!("Shutting down...");
    agent.shutdown(SHUTDOWN_TIMEOUT).await;
    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() -> SysmResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| SysmError::Internal(format!("Failed to install SIGTERM handler: {}", e)))?;
        let mut sigint = signal(SignalKind::interrupt())
            .map_err(|e| SysmError::Internal(format!("Failed to install SIGINT handler: {}", e)))?;

        tokio::select! {
            _ = sigterm.recv() => { info!("Received SIGTERM"); }
            _ = sigint.recv() => { info!("Received SIGINT"); }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| SysmError::Internal(format!("Failed to install Ctrl+C handler: {}", e)))?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
