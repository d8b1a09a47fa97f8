//! Engine configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Model identifier of the RBAC permission collection
pub const PERMISSION_MODEL_UID: &str = "strapi::permission";

/// Name of the locale migration staging relation
pub const STAGING_RELATION: &str = "__tmp__i18n_field_migration";

/// How the permission migration rewrites captured records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebuildStrategy {
    /// Patch each surviving primary key; identity is always preserved
    #[default]
    PatchInPlace,
    /// Delete every record, then insert the rewritten ones with their
    /// original ids; identity holds only if the backend honours supplied ids
    Replace,
}

/// Migration engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Model the permission migration targets
    pub permission_model_uid: String,
    /// Staging relation used by the locale migration
    pub staging_relation: String,
    /// Rows fetched per locale page
    pub batch_size: usize,
    /// Rows per staging insert statement
    pub insert_chunk_size: usize,
    /// Permission rebuild strategy
    pub rebuild: RebuildStrategy,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// With permission model uid
    #[inline]
    #[must_use]
    pub fn with_permission_model_uid(mut self, uid: impl Into<String>) -> Self {
        self.permission_model_uid = uid.into();
        self
    }

    /// With staging relation name
    #[inline]
    #[must_use]
    pub fn with_staging_relation(mut self, name: impl Into<String>) -> Self {
        self.staging_relation = name.into();
        self
    }

    /// With locale page size
    #[inline]
    #[must_use]
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// With staging insert chunk size
    #[inline]
    #[must_use]
    pub fn with_insert_chunk_size(mut self, size: usize) -> Self {
        self.insert_chunk_size = size;
        self
    }

    /// With permission rebuild strategy
    #[inline]
    #[must_use]
    pub fn with_rebuild(mut self, rebuild: RebuildStrategy) -> Self {
        self.rebuild = rebuild;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".into()));
        }
        if self.insert_chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "insert_chunk_size must be positive".into(),
            ));
        }
        if self.staging_relation.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "staging_relation must not be empty".into(),
            ));
        }
        if self.permission_model_uid.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "permission_model_uid must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            permission_model_uid: PERMISSION_MODEL_UID.to_string(),
            staging_relation: STAGING_RELATION.to_string(),
            batch_size: 1000,
            insert_chunk_size: 100,
            rebuild: RebuildStrategy::PatchInPlace,
        }
    }
}
