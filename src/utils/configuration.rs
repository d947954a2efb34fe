use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Configuration of the repeat resolution core.
///
/// The resolver takes the record explicitly and holds no process-wide
/// state; the defaults reproduce the stock parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Confidence floor for accepting a matched anchor pair.
    pub min_repeat_res_support: f32,
    /// Divisor of the strongest extension count in the read-extension
    /// multiplicity test.
    pub out_paths_ratio: u32,
    /// Paths longer than this are trusted as unique during finalization.
    pub unique_edge_length: usize,
    /// Metagenome-style assembly without a uniform coverage level.
    pub uneven_coverage: bool,
    /// Minimum read overlap of the assembly, carried as a global parameter.
    pub minimum_overlap: usize,
    /// Placeholder span of read sequence inserted when two consecutive
    /// anchors leave no room for a bridging substring.
    pub bridge_span: i32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_repeat_res_support: 0.5,
            out_paths_ratio: 5,
            unique_edge_length: 50_000,
            uneven_coverage: false,
            minimum_overlap: 5_000,
            bridge_span: 100,
        }
    }
}

impl ResolverConfig {
    /// Load configuration from a TOML file, with `REPEAT_FORGE__*`
    /// environment variables taking precedence.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ResolverError> {
        let settings = Config::builder()
            .add_source(File::from(path.as_ref().to_path_buf()))
            .add_source(Environment::with_prefix("REPEAT_FORGE").separator("__"))
            .build()?;
        let config: ResolverConfig = settings.try_deserialize()?;
        config.validate()?;
        info!(
            "loaded resolver configuration from {}",
            path.as_ref().display()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ResolverError> {
        if self.out_paths_ratio == 0 {
            return Err(ResolverError::InvalidValue {
                field: "out_paths_ratio",
                reason: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.min_repeat_res_support) {
            return Err(ResolverError::InvalidValue {
                field: "min_repeat_res_support",
                reason: format!("{} is outside [0, 1]", self.min_repeat_res_support),
            });
        }
        if self.bridge_span <= 0 {
            return Err(ResolverError::InvalidValue {
                field: "bridge_span",
                reason: "must be positive".to_string(),
            });
        }
        if self.unique_edge_length == 0 {
            return Err(ResolverError::InvalidValue {
                field: "unique_edge_length",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration and validation errors of the resolver.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ResolverConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.out_paths_ratio, 5);
        assert_eq!(config.bridge_span, 100);
        assert!(!config.uneven_coverage);
    }

    #[test]
    fn loads_partial_file_over_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(file, "min_repeat_res_support = 0.25").unwrap();
        writeln!(file, "uneven_coverage = true").unwrap();
        let config = ResolverConfig::from_file(file.path()).unwrap();
        assert_eq!(config.min_repeat_res_support, 0.25);
        assert!(config.uneven_coverage);
        // untouched fields keep their defaults
        assert_eq!(config.unique_edge_length, 50_000);
    }

    #[test]
    fn rejects_zero_ratio() {
        let config = ResolverConfig {
            out_paths_ratio: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("out_paths_ratio"));
    }
}
