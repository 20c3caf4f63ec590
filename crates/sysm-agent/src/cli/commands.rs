use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use sysm_agent::config::DEFAULT_CONFIG_PATH;

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "sysm")]
#[command(version = BUILD_VERSION)]
#[command(about = "sysm - Health relay agent for broker, hub and container backends")]
#[command(long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "SYSM_CONFIG_PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to config file"
    )]
    pub config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity (-v, -vv, -vvv)")]
    pub verbose: u8,

    #[arg(short, long, global = true, help = "Suppress non-error output")]
    pub quiet: bool,

    #[arg(long, global = true, value_name = "FILE", help = "Write logs to file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, default_value = "text", help = "Output format")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Start the agent")]
    #[command(long_about = "Start the sysm agent.\n\nSupervises every enabled backend and relays the merged status upstream until SIGINT or SIGTERM.")]
    Run,

    #[command(about = "Check every enabled backend once")]
    Check,

    #[command(about = "Manage configuration")]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    #[command(about = "Show version information")]
    Version,
}

#[derive(Clone, Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show the effective configuration, secrets masked")]
    Show,
    #[command(about = "Write a default configuration file")]
    Init {
        #[arg(short, long, help = "Overwrite existing configuration")]
        force: bool,
    },
}
