/// Модуль предобработки данных

pub mod feature_engineering;
pub mod loader;
pub mod normalization;
pub mod outliers;

pub use feature_engineering::{EngineeredRecord, FeatureEngineer};
pub use loader::{load_records, read_records};
pub use normalization::StandardScaler;
pub use outliers::{remove_outliers, BoxSummary, IqrBounds};
