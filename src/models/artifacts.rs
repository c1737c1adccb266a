//! Сохранение и загрузка обученных артефактов (JSON)

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};
use crate::types::{feature_names, ScalingPolicy, FEATURE_NAMES};

pub const LINEAR_MODEL_FILE: &str = "traffic_lr_model.json";
pub const RANDOM_FOREST_FILE: &str = "traffic_rf_model.json";
pub const SCALER_FILE: &str = "traffic_scaler.json";

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    LinearRegression,
    RandomForest,
    StandardScaler,
}

/// Обертка над любым артефактом: схема признаков и политика масштабирования
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub kind: ArtifactKind,
    pub format_version: u32,
    pub features: Vec<String>,
    pub scaling: ScalingPolicy,
    pub created_at: DateTime<Utc>,
    pub payload: T,
}

impl<T> Artifact<T> {
    pub fn new(kind: ArtifactKind, scaling: ScalingPolicy, payload: T) -> Self {
        Self {
            kind,
            format_version: FORMAT_VERSION,
            features: feature_names(),
            scaling,
            created_at: Utc::now(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub linear_model: PathBuf,
    pub random_forest: PathBuf,
    pub scaler: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            linear_model: dir.join(LINEAR_MODEL_FILE),
            random_forest: dir.join(RANDOM_FOREST_FILE),
            scaler: dir.join(SCALER_FILE),
        }
    }

    pub fn all(&self) -> [&Path; 3] {
        [&self.linear_model, &self.random_forest, &self.scaler]
    }
}

pub fn save<T: Serialize>(path: &Path, artifact: &Artifact<T>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, artifact)?;
    writer.flush()?;

    tracing::info!("Saved {:?} artifact to {}", artifact.kind, path.display());
    Ok(())
}

/// Загрузка с проверкой типа, версии и порядка признаков
pub fn load<T: DeserializeOwned>(path: &Path, expected: ArtifactKind) -> Result<Artifact<T>> {
    let file = File::open(path).map_err(|e| TrafficError::artifact(path, e))?;
    let artifact: Artifact<T> = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| TrafficError::artifact(path, format!("cannot parse: {}", e)))?;

    if artifact.kind != expected {
        return Err(TrafficError::artifact(
            path,
            format!("expected {:?}, found {:?}", expected, artifact.kind),
        ));
    }
    if artifact.format_version != FORMAT_VERSION {
        return Err(TrafficError::artifact(
            path,
            format!(
                "unsupported format version {} (expected {})",
                artifact.format_version, FORMAT_VERSION
            ),
        ));
    }
    if artifact.features.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
        return Err(TrafficError::artifact(
            path,
            format!("feature order {:?} does not match {:?}", artifact.features, FEATURE_NAMES),
        ));
    }

    tracing::debug!("Loaded {:?} artifact from {}", expected, path.display());
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LinearModel;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("traffic-ml-artifacts-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = temp_dir("round-trip");
        let paths = ArtifactPaths::in_dir(&dir);
        let model = LinearModel::from_parts(
            1234.5,
            vec![1.0 / 3.0, -2.0, 0.0, 4.25, -600.0, 900.125, 55.0, -12.0],
        );

        save(&paths.linear_model, &Artifact::new(ArtifactKind::LinearRegression, ScalingPolicy::Raw, model.clone())).unwrap();
        let loaded: Artifact<LinearModel> = load(&paths.linear_model, ArtifactKind::LinearRegression).unwrap();

        assert_eq!(loaded.payload, model);
        assert_eq!(loaded.scaling, ScalingPolicy::Raw);
        assert_eq!(loaded.features, feature_names());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let dir = temp_dir("wrong-kind");
        let path = dir.join(SCALER_FILE);
        let model = LinearModel::from_parts(0.0, vec![0.0; 8]);
        save(&path, &Artifact::new(ArtifactKind::LinearRegression, ScalingPolicy::Raw, model)).unwrap();

        let err = load::<LinearModel>(&path, ArtifactKind::StandardScaler).unwrap_err();
        assert!(matches!(err, TrafficError::Artifact { .. }));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_feature_order_is_checked() {
        let dir = temp_dir("feature-order");
        let path = dir.join(LINEAR_MODEL_FILE);
        let mut artifact = Artifact::new(
            ArtifactKind::LinearRegression,
            ScalingPolicy::Raw,
            LinearModel::from_parts(0.0, vec![0.0; 8]),
        );
        artifact.features.swap(6, 7);
        save(&path, &artifact).unwrap();

        assert!(load::<LinearModel>(&path, ArtifactKind::LinearRegression).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_and_corrupt_files() {
        let dir = temp_dir("missing");
        let paths = ArtifactPaths::in_dir(&dir);
        let err = load::<LinearModel>(&paths.linear_model, ArtifactKind::LinearRegression).unwrap_err();
        assert!(err.to_string().contains(LINEAR_MODEL_FILE));

        fs::create_dir_all(&dir).unwrap();
        fs::write(&paths.random_forest, b"{ not json").unwrap();
        assert!(matches!(
            load::<LinearModel>(&paths.random_forest, ArtifactKind::RandomForest),
            Err(TrafficError::Artifact { .. })
        ));

        let _ = fs::remove_dir_all(&dir);
    }
}
