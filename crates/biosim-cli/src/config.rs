//! CLI configuration
//!
//! Read from `biosim.toml`; a missing file means defaults. Command-line
//! flags win over file values.

use biosim_kernel::{FixedAdministrator, Principal, SettlementPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "biosim.toml";
pub const DEFAULT_STATE_PATH: &str = ".biosim/state.jsonl";
pub const DEFAULT_ADMINISTRATOR: &str = "CONTRACT_OWNER";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("administrator principal must not be empty")]
    EmptyAdministrator,
}

/// Contents of `biosim.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BiosimConfig {
    /// The single fixed administrator principal.
    pub administrator: Option<String>,

    /// Snapshot path.
    pub state: Option<String>,

    #[serde(default)]
    pub settlement: SettlementPolicy,
}

/// Configuration after applying overrides and defaults.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub administrator: Principal,
    pub state_path: PathBuf,
    pub settlement: SettlementPolicy,
}

impl ResolvedConfig {
    pub fn authority(&self) -> FixedAdministrator {
        FixedAdministrator::new(self.administrator.clone())
    }
}

impl BiosimConfig {
    /// Load configuration from file.
    ///
    /// An explicit path that does not exist is an error; the default path
    /// may be absent.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let (config_path, explicit) = match path {
            Some(p) => (PathBuf::from(p), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };

        if !config_path.exists() {
            if explicit {
                return Err(ConfigError::Io {
                    path: config_path.display().to_string(),
                    message: "no such file".to_string(),
                });
            }
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub fn resolve(
        self,
        state_override: Option<String>,
        administrator_override: Option<String>,
    ) -> Result<ResolvedConfig, ConfigError> {
        let administrator = administrator_override
            .or(self.administrator)
            .unwrap_or_else(|| DEFAULT_ADMINISTRATOR.to_string());
        let administrator = administrator.trim();
        if administrator.is_empty() {
            return Err(ConfigError::EmptyAdministrator);
        }
        let state_path = state_override
            .or(self.state)
            .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string());
        Ok(ResolvedConfig {
            administrator: Principal::from(administrator),
            state_path: PathBuf::from(state_path),
            settlement: self.settlement,
        })
    }
}
