//! Traffic ML - прогноз интенсивности трафика (Rust библиотека)

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod predictor;
pub mod preprocessing;
pub mod server;
pub mod types;

pub use types::*;
pub use models::*;
pub use preprocessing::*;

// Re-export для удобства
pub use config::{PipelineConfig, ServerConfig};
pub use error::{Result, TrafficError};
pub use pipeline::{TrainedModels, TrainingPipeline, TrainingReport};
pub use predictor::Predictor;
