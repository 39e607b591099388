//! Kit configuration.
//!
//! Configuration can be loaded from a `gqlkit.toml` file or any TOML table
//! with the sections below. Every field has a default, so an empty document
//! is a valid configuration.
//!
//! # Example Configuration
//!
//! ```toml
//! [schema]
//! directories = ["schema"]
//! extension = "graphqls"
//!
//! [limits]
//! max_depth = 15
//! max_complexity = 500
//! introspection = true
//!
//! [cache]
//! documents = 10000
//! persisted_queries = 10000
//!
//! [cost]
//! credit_limit = 1000
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{GqlKitError, Result};

/// Top-level kit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GqlKitConfig {
    /// Where schema documents come from.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Engine-level query limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Capacities of the request caches.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Cost instrumentation budget.
    #[serde(default)]
    pub cost: CostConfig,
}

/// Schema source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Directories scanned recursively for schema documents.
    /// Default: empty (schemas supplied programmatically)
    #[serde(default)]
    pub directories: Vec<PathBuf>,

    /// File extension of schema documents, without the leading dot.
    /// Default: "graphqls"
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Query limits applied to the assembled engine schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum query depth allowed.
    /// Default: 15
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum query complexity allowed.
    /// Default: 500
    #[serde(default = "default_max_complexity")]
    pub max_complexity: usize,

    /// Enable GraphQL introspection queries.
    /// Default: true
    #[serde(default = "default_introspection")]
    pub introspection: bool,
}

/// Cache capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of parsed documents kept.
    /// Default: 10000
    #[serde(default = "default_cache_capacity")]
    pub documents: u64,

    /// Maximum number of persisted queries kept.
    /// Default: 10000
    #[serde(default = "default_cache_capacity")]
    pub persisted_queries: u64,
}

/// Cost instrumentation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostConfig {
    /// Credit budget per request. `None` disables cost instrumentation.
    #[serde(default)]
    pub credit_limit: Option<u64>,
}

fn default_extension() -> String {
    "graphqls".to_string()
}

fn default_max_depth() -> usize {
    15
}

fn default_max_complexity() -> usize {
    500
}

fn default_introspection() -> bool {
    true
}

fn default_cache_capacity() -> u64 {
    10_000
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            extension: default_extension(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_complexity: default_max_complexity(),
            introspection: default_introspection(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            documents: default_cache_capacity(),
            persisted_queries: default_cache_capacity(),
        }
    }
}

impl GqlKitConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`GqlKitError::Config`] if the text is not valid TOML or a
    /// value fails validation.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| GqlKitError::Config(e.to_string()))?;
        config.validate().map_err(GqlKitError::Config)?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration values are invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.schema.extension.is_empty() {
            return Err("schema.extension must not be empty".into());
        }
        if self.schema.extension.starts_with('.') {
            return Err("schema.extension must not start with '.'".into());
        }
        if self.limits.max_depth == 0 {
            return Err("limits.max_depth must be > 0".into());
        }
        if self.limits.max_complexity == 0 {
            return Err("limits.max_complexity must be > 0".into());
        }
        if self.cache.documents == 0 {
            return Err("cache.documents must be > 0".into());
        }
        if self.cache.persisted_queries == 0 {
            return Err("cache.persisted_queries must be > 0".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GqlKitConfig::default();
        assert!(config.schema.directories.is_empty());
        assert_eq!(config.schema.extension, "graphqls");
        assert_eq!(config.limits.max_depth, 15);
        assert_eq!(config.limits.max_complexity, 500);
        assert!(config.limits.introspection);
        assert_eq!(config.cache.documents, 10_000);
        assert_eq!(config.cache.persisted_queries, 10_000);
        assert_eq!(config.cost.credit_limit, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = GqlKitConfig::from_toml_str("").unwrap();
        assert_eq!(config.cache.documents, 10_000);
    }

    #[test]
    fn test_deserialize_from_toml() {
        let toml = r#"
            [schema]
            directories = ["schema", "extra"]

            [limits]
            max_depth = 20
            introspection = false

            [cache]
            documents = 50

            [cost]
            credit_limit = 3
        "#;

        let config = GqlKitConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.schema.directories.len(), 2);
        assert_eq!(config.schema.extension, "graphqls");
        assert_eq!(config.limits.max_depth, 20);
        assert_eq!(config.limits.max_complexity, 500);
        assert!(!config.limits.introspection);
        assert_eq!(config.cache.documents, 50);
        assert_eq!(config.cache.persisted_queries, 10_000);
        assert_eq!(config.cost.credit_limit, Some(3));
    }

    #[test]
    fn test_invalid_max_depth() {
        let mut config = GqlKitConfig::default();
        config.limits.max_depth = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_extension() {
        let mut config = GqlKitConfig::default();
        config.schema.extension = ".graphqls".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_cache_capacity() {
        let err = GqlKitConfig::from_toml_str("[cache]\ndocuments = 0\n").unwrap_err();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_malformed_toml() {
        assert!(GqlKitConfig::from_toml_str("[limits\nmax_depth = 1").is_err());
    }
}
