use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::types::LogLevel;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    pub json: bool,
}
