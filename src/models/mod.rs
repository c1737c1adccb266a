/// ML модели

pub mod artifacts;
pub mod forest;
pub mod linear;
pub mod metrics;

pub use artifacts::{Artifact, ArtifactKind, ArtifactPaths};
pub use forest::{ForestParams, MaxFeatures, RandomForestRegressor};
pub use linear::LinearModel;
pub use metrics::RegressionMetrics;
