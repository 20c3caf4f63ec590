use super::commands::Cli;
use std::path::Path;
use sysm_agent::config::{AgentConfig, LogLevel, LoggingConfig};
use sysm_types::{SysmError, SysmResult};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// `RUST_LOG` wins; otherwise `-q`/`-v` and then the configured level.
fn filter_directive(cli: &Cli, level: LogLevel) -> String {
    if cli.quiet {
        return "warn".to_string();
    }
    match cli.verbose {
        0 => level.to_string(),
        1 => "info,sysm_agent=debug".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

pub fn init_logging(cli: &Cli, logging: &LoggingConfig) -> SysmResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(cli, logging.level)));

    let mut layers: Vec<BoxedLayer> = Vec::new();

    let stdout_layer = fmt::layer().with_target(cli.verbose >= 2);
    layers.push(if logging.json {
        stdout_layer.json().boxed()
    } else {
        stdout_layer.boxed()
    });

    if let Some(log_file) = cli.log_file.as_ref().or(logging.file.as_ref()) {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| SysmError::Config(format!("Failed to open log file {:?}: {}", log_file, e)))?;
        let file_layer = fmt::layer()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false);
        layers.push(if logging.json {
            file_layer.json().boxed()
        } else {
            file_layer.boxed()
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| SysmError::Internal(format!("Failed to initialize logging: {}", e)))
}

/// Loads the configuration and brings up logging from it. Logging still
/// comes up, with defaults, when the configuration is rejected.
pub fn load_config(cli: &Cli, path: &Path) -> SysmResult<AgentConfig> {
    match AgentConfig::load(path) {
        Ok(config) => {
            init_logging(cli, &config.logging)?;
            Ok(config)
        }
        Err(e) => {
            init_logging(cli, &LoggingConfig::default())?;
            Err(e)
        }
    }
}

pub fn print_banner() {
    println!("\x1b[38;5;46msysm\x1b[0m \x1b[38;5;245mHealth relay agent - v{}\x1b[0m", BUILD_VERSION);
    println!();
}

pub fn show_version() {
    println!("sysm {}", BUILD_VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_filter_directive_precedence() {
        let quiet = Cli::try_parse_from(["sysm", "-q", "-v", "run"]).unwrap();
        assert_eq!(filter_directive(&quiet, LogLevel::Trace), "warn");

        let plain = Cli::try_parse_from(["sysm", "run"]).unwrap();
        assert_eq!(filter_directive(&plain, LogLevel::Debug), "debug");

        let verbose = Cli::try_parse_from(["sysm", "-v", "run"]).unwrap();
        assert_eq!(filter_directive(&verbose, LogLevel::Error), "info,sysm_agent=debug");
    }
}
