use super::commands::{Cli, ConfigAction};
use super::utils::{init_logging, load_config};
use std::path::Path;
use sysm_agent::config::{AgentConfig, LoggingConfig};
use sysm_types::{SysmError, SysmResult};

pub fn handle_config(cli: &Cli, config_path: &Path, action: Option<ConfigAction>) -> SysmResult<()> {
    match action {
        Some(ConfigAction::Show) | None => {
            let config = load_config(cli, config_path)?;
            if !config_path.exists() {
                println!("\x1b[38;5;245mNo configuration file found at {:?}, showing defaults\x1b[0m", config_path);
            }
            print!("{}", config.redacted());
        }
        Some(ConfigAction::Init { force }) => {
            init_logging(cli, &LoggingConfig::default())?;
            init_config(config_path, force)?;
            println!("\x1b[38;5;46m[+]\x1b[0m Configuration written to {:?}", config_path);
        }
    }
    Ok(())
}

fn init_config(config_path: &Path, force: bool) -> SysmResult<()> {
    if config_path.exists() && !force {
        return Err(SysmError::Config(format!(
            "{:?} already exists, use --force to overwrite",
            config_path
        )));
    }
    AgentConfig::default().save(config_path)
}
