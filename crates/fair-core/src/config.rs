//! Sorter configuration parser.
//!
//! ```toml
//! kind = "hierarchical"
//! fairness_exclude_resource_names = ["gpus"]
//!
//! [weights]
//! "eng" = 2.0
//! "eng/ml" = 3.0
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::role::{self, RoleError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid role path in weights: {0}")]
    Role(#[from] RoleError),

    #[error("weight for '{path}' must be finite and positive, got {weight}")]
    InvalidWeight { path: String, weight: f64 },

    #[error("empty resource name in fairness_exclude_resource_names")]
    EmptyResourceName,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Which ordering policy a sorter applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SorterKind {
    /// DRF over the role tree; ties fall back to subtree shares.
    #[default]
    Hierarchical,
    /// DRF over clients only; ties fall back to client id.
    Flat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    pub kind: SorterKind,
    /// Scalar resource names ignored by dominant share computation.
    pub fairness_exclude_resource_names: Option<BTreeSet<String>>,
    /// Role path → weight overrides applied at construction.
    pub weights: BTreeMap<String, f64>,
}

impl SorterConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: SorterConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (path, &weight) in &self.weights {
            role::validate(path)?;
            if !weight.is_finite() || weight <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    path: path.clone(),
                    weight,
                });
            }
        }
        if let Some(names) = &self.fairness_exclude_resource_names {
            if names.iter().any(|n| n.trim().is_empty()) {
                return Err(ConfigError::EmptyResourceName);
            }
        }
        Ok(())
    }
}
