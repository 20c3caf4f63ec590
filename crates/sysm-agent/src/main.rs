mod cli;

use clap::Parser;
use cli::{handle_config, load_config, run_agent, run_checks, show_version, Cli, Commands};
use sysm_types::SysmResult;

#[tokio::main(flavor = "current_thread")]
async fn main() -> SysmResult<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Run => {
            let config = load_config(&cli, &config_path)?;
            run_agent(config).await?;
        }
        Commands::Check => {
            let config = load_config(&cli, &config_path)?;
            if !run_checks(&config, cli.format).await? {
                std::process::exit(1);
            }
        }
        Commands::Config { ref action } => {
            handle_config(&cli, &config_path, action.clone())?;
        }
        Commands::Version => {
            show_version();
        }
    }

    Ok(())
}
