//! Ошибки пайплайна и инференса

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrafficError>;

#[derive(Error, Debug)]
pub enum TrafficError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid date_time '{value}' at row {row}: {source}")]
    DateTime {
        row: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Unknown weather condition: {0}")]
    UnknownWeather(String),

    #[error("Unknown day of week: {0}")]
    UnknownWeekday(String),

    #[error("Invalid input: {field} = {value}, expected {expected}")]
    InvalidInput {
        field: &'static str,
        value: String,
        expected: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Artifact {}: {reason}", .path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl TrafficError {
    pub(crate) fn artifact(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TrafficError::Artifact {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Ошибка на стороне пользовательского ввода (а не модели/данных)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            TrafficError::InvalidInput { .. }
                | TrafficError::UnknownWeather(_)
                | TrafficError::UnknownWeekday(_)
        )
    }
}
