//! Runtime configuration
//!
//! Defaults, overridden by `OPP_*` environment variables. Tables come from
//! the JSON file named by `OPP_TABLES_FILE`, or the built-in demo set.

use anyhow::{bail, Context, Result};
use opp_core::OppConfig;
use serde::{Deserialize, Serialize};
use shared_types::{DeviceId, Hertz, Voltages};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

pub const ENV_TABLES_FILE: &str = "OPP_TABLES_FILE";
pub const ENV_AVS_ROUNDS: &str = "OPP_AVS_ROUNDS";
pub const ENV_AVS_INTERVAL_MS: &str = "OPP_AVS_INTERVAL_MS";
pub const ENV_AVS_MAX_STEP_UV: &str = "OPP_AVS_MAX_STEP_UV";

/// One OPP in a table description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OppDefinition {
    pub frequency: Hertz,
    pub voltages: Voltages,
}

/// The table of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub device: DeviceId,
    pub opps: Vec<OppDefinition>,
}

/// Top level of the tables file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TablesFile {
    pub tables: Vec<TableDefinition>,
}

impl TablesFile {
    /// Parse a tables description.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(raw).context("Malformed OPP tables file")?;
        if file.tables.is_empty() {
            bail!("OPP tables file declares no tables");
        }
        Ok(file)
    }

    /// Read and parse a tables file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read OPP tables from {}", path.display()))?;
        Self::from_json(&raw)
    }

    /// A small CPU table and a GPU table.
    pub fn demo() -> Self {
        let opp = |mhz, target, min, max| OppDefinition {
            frequency: Hertz::from_mhz(mhz),
            voltages: Voltages::new(target, min, max),
        };

        Self {
            tables: vec![
                TableDefinition {
                    device: DeviceId::from("cpu0"),
                    opps: vec![
                        opp(500, 800_000, 750_000, 850_000),
                        opp(1_000, 900_000, 850_000, 950_000),
                        opp(1_500, 1_000_000, 950_000, 1_050_000),
                    ],
                },
                TableDefinition {
                    device: DeviceId::from("gpu"),
                    opps: vec![
                        opp(300, 750_000, 700_000, 800_000),
                        opp(600, 850_000, 800_000, 900_000),
                    ],
                },
            ],
        }
    }
}

/// Agent behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvsConfig {
    /// Adjustments per agent; 0 runs until shutdown.
    pub rounds: u64,
    pub interval_ms: u64,
    /// Largest voltage step in either direction.
    pub max_step_uv: u64,
}

impl Default for AvsConfig {
    fn default() -> Self {
        Self {
            rounds: 20,
            interval_ms: 100,
            max_step_uv: 10_000,
        }
    }
}

impl AvsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Everything the runtime needs to start.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub core: OppConfig,
    pub avs: AvsConfig,
    pub tables_file: Option<PathBuf>,
}

impl RuntimeConfig {
    /// Load configuration from environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            core: OppConfig::from_env().context("Invalid OPP core configuration")?,
            ..Self::default()
        };

        if let Ok(path) = std::env::var(ENV_TABLES_FILE) {
            config.tables_file = Some(PathBuf::from(path));
        }
        if let Some(rounds) = env_parse(ENV_AVS_ROUNDS) {
            config.avs.rounds = rounds;
        }
        if let Some(ms) = env_parse(ENV_AVS_INTERVAL_MS) {
            config.avs.interval_ms = ms;
        }
        if let Some(step) = env_parse(ENV_AVS_MAX_STEP_UV) {
            config.avs.max_step_uv = step;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.core.validate()?;
        if self.avs.interval_ms == 0 {
            bail!("{ENV_AVS_INTERVAL_MS} must be greater than zero");
        }
        if self.avs.max_step_uv > i64::MAX as u64 {
            bail!("{ENV_AVS_MAX_STEP_UV} is out of range");
        }
        Ok(())
    }

    /// Tables to register: the configured file, or the demo set.
    pub fn load_tables(&self) -> Result<TablesFile> {
        match &self.tables_file {
            Some(path) => {
                let tables = TablesFile::load(path)?;
                info!(path = %path.display(), tables = tables.tables.len(), "Loaded OPP tables");
                Ok(tables)
            }
            None => {
                info!("No {ENV_TABLES_FILE} set, using demo tables");
                Ok(TablesFile::demo())
            }
        }
    }
}

fn env_parse(key: &'static str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
