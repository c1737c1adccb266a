//! Конфигурация обучения и сервера

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};
use crate::models::ForestParams;
use crate::preprocessing::outliers::DEFAULT_IQR_MULTIPLIER;
use crate::types::ScalingPolicy;

pub const BIND_ADDR_ENV: &str = "TRAFFIC_ML_BIND_ADDR";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default)]
    pub scaling: ScalingPolicy,
    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,
    /// Сколько строк показывать в логах при предпросмотре
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
    #[serde(default)]
    pub forest: ForestParams,
}

fn default_data_path() -> PathBuf { PathBuf::from("Metro_Interstate_Traffic_Volume.csv") }
fn default_artifacts_dir() -> PathBuf { PathBuf::from(".") }
fn default_test_size() -> f64 { 0.2 }
fn default_seed() -> u64 { 42 }
fn default_iqr_multiplier() -> f64 { DEFAULT_IQR_MULTIPLIER }
fn default_preview_rows() -> usize { 10 }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            artifacts_dir: default_artifacts_dir(),
            test_size: default_test_size(),
            seed: default_seed(),
            scaling: ScalingPolicy::default(),
            iqr_multiplier: default_iqr_multiplier(),
            preview_rows: default_preview_rows(),
            forest: ForestParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|e| {
            TrafficError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: PipelineConfig = serde_json::from_str(&data).map_err(|e| {
            TrafficError::ConfigError(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(TrafficError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                self.test_size
            )));
        }
        if !(self.iqr_multiplier >= 0.0) {
            return Err(TrafficError::ConfigError(format!(
                "iqr_multiplier must be non-negative, got {}",
                self.iqr_multiplier
            )));
        }
        self.forest.validate()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8501)),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        match std::env::var(BIND_ADDR_ENV) {
            Ok(value) => Self::parse(&value),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn parse(addr: &str) -> Result<Self> {
        let bind_addr = addr.trim().parse::<SocketAddr>().map_err(|e| {
            TrafficError::ConfigError(format!("invalid bind address '{}': {}", addr, e))
        })?;
        Ok(Self { bind_addr })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.seed, 42);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.scaling, ScalingPolicy::Raw);
        assert_eq!(config.forest.n_estimators, 100);
        assert_eq!(config.forest.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "scaling": "standardize", "forest": { "n_estimators": 10, "max_depth": 12 } }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.scaling, ScalingPolicy::Standardize);
        assert_eq!(config.forest.n_estimators, 10);
        assert_eq!(config.forest.max_depth, Some(12));
        assert_eq!(config.forest.min_samples_leaf, 1);
        assert_eq!(config.test_size, 0.2);
    }

    #[test]
    fn test_validation() {
        let mut config = PipelineConfig::default();
        config.test_size = 1.0;
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.forest.n_estimators = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir().join(format!("traffic-ml-config-{}.json", std::process::id()));
        fs::write(&path, r#"{ "test_size": 0.25, "seed": 7 }"#).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.test_size, 0.25);
        assert_eq!(config.seed, 7);
        let _ = fs::remove_file(&path);

        assert!(PipelineConfig::load("/nonexistent/traffic-ml.json").is_err());
    }

    #[test]
    fn test_server_addr() {
        let config = ServerConfig::parse("127.0.0.1:9000").unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert!(ServerConfig::parse("not an address").is_err());
        assert_eq!(ServerConfig::default().bind_addr.port(), 8501);
    }
}
