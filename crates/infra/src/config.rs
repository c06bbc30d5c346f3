//! Process configuration from the environment.

use std::env;
use std::path::PathBuf;

use tracing::warn;

const DATA_DIR_VAR: &str = "STOCKBOOK_DATA_DIR";
const ALLOW_NEGATIVE_STOCK_VAR: &str = "STOCKBOOK_ALLOW_NEGATIVE_STOCK";

/// Settings a [`Pos`](crate::Pos) is opened with.
#[derive(Debug, Clone, Default)]
pub struct PosConfig {
    /// Directory holding the durable database file. `None` keeps everything
    /// in memory.
    pub data_dir: Option<PathBuf>,
    /// Backorder mode: let sales drive stock below zero.
    pub allow_negative_stock: bool,
}

impl PosConfig {
    /// Volatile configuration for tests and tooling.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Read configuration from the `STOCKBOOK_*` environment variables.
    ///
    /// Unset variables fall back to the defaults; an unparseable value is
    /// logged and treated as unset.
    pub fn from_env() -> Self {
        let data_dir = env::var_os(DATA_DIR_VAR).map(PathBuf::from);
        let allow_negative_stock = env::var(ALLOW_NEGATIVE_STOCK_VAR)
            .ok()
            .map(|raw| match parse_flag(&raw) {
                Some(flag) => flag,
                None => {
                    warn!(
                        variable = ALLOW_NEGATIVE_STOCK_VAR,
                        value = raw.as_str(),
                        "unrecognized flag value, defaulting to off"
                    );
                    false
                }
            })
            .unwrap_or(false);

        Self {
            data_dir,
            allow_negative_stock,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
