mod checks;
mod commands;
mod config_cmd;
mod run;
mod utils;

pub use checks::run_checks;
pub use commands::{Cli, Commands, ConfigAction, OutputFormat};
pub use config_cmd::handle_config;
pub use run::run_agent;
pub use utils::{init_logging, load_config, show_version};
