//! Пайплайн обучения: признаки -> выбросы -> split -> две модели -> метрики -> артефакты

#![allow(non_snake_case)]

use std::fs::File;
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{Result, TrafficError};
use crate::models::artifacts::{self, Artifact, ArtifactKind, ArtifactPaths};
use crate::models::{LinearModel, RandomForestRegressor, RegressionMetrics};
use crate::predictor::Predictor;
use crate::preprocessing::{
    load_records, remove_outliers, BoxSummary, EngineeredRecord, FeatureEngineer, IqrBounds,
    StandardScaler,
};
use crate::types::{ScalingPolicy, TrafficRecord, FEATURE_NAMES, TARGET_NAME};

/// Очищенные данные, готовые к обучению
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub records: Vec<EngineeredRecord>,
    pub features: Array2<f64>,
    pub target: Array1<f64>,
    pub n_loaded: usize,
    pub n_outliers: usize,
    pub iqr_bounds: IqrBounds,
}

/// Перемешанные индексы train/test. Размер теста округляется вверх.
pub fn train_test_split(n_samples: usize, test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(TrafficError::ConfigError(format!(
            "test_size must be in (0, 1), got {}",
            test_size
        )));
    }

    let n_test = (n_samples as f64 * test_size).ceil() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(TrafficError::DataError(format!(
            "Not enough samples to split: {} rows with test_size {}",
            n_samples, test_size
        )));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let train = indices.split_off(n_test);
    Ok((train, indices))
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub value: f64,
}

fn named(values: &[f64]) -> Vec<FeatureWeight> {
    FEATURE_NAMES
        .iter()
        .zip(values.iter())
        .map(|(name, value)| FeatureWeight {
            feature: name.to_string(),
            value: *value,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub n_loaded: usize,
    pub n_outliers_removed: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub iqr_bounds: IqrBounds,
    pub scaling: ScalingPolicy,
    pub linear_regression: RegressionMetrics,
    pub random_forest: RegressionMetrics,
    pub linear_intercept: f64,
    pub linear_coefficients: Vec<FeatureWeight>,
    pub feature_importances: Vec<FeatureWeight>,
}

impl TrainingReport {
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
struct PredictionRow {
    actual: f64,
    predicted_lr: f64,
    predicted_rf: f64,
}

/// Предсказания обеих моделей на тестовой выборке
#[derive(Debug, Clone)]
pub struct TestPredictions {
    pub actual: Array1<f64>,
    pub linear_regression: Array1<f64>,
    pub random_forest: Array1<f64>,
}

impl TestPredictions {
    fn rows(&self) -> impl Iterator<Item = PredictionRow> + '_ {
        self.actual
            .iter()
            .zip(self.linear_regression.iter())
            .zip(self.random_forest.iter())
            .map(|((&actual, &predicted_lr), &predicted_rf)| PredictionRow {
                actual,
                predicted_lr,
                predicted_rf,
            })
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path.as_ref())?;
        for row in self.rows() {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn log_head(&self, n: usize) {
        for (i, row) in self.rows().take(n).enumerate() {
            tracing::info!(
                "#{:<3} actual {:>7.0} | linear {:>9.2} | forest {:>9.2}",
                i,
                row.actual,
                row.predicted_lr,
                row.predicted_rf
            );
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub scaler: StandardScaler,
    pub linear: LinearModel,
    pub forest: RandomForestRegressor,
    pub scaling: ScalingPolicy,
    pub report: TrainingReport,
    pub test_predictions: TestPredictions,
}

impl TrainedModels {
    pub fn save(&self, paths: &ArtifactPaths) -> Result<()> {
        artifacts::save(
            &paths.linear_model,
            &Artifact::new(ArtifactKind::LinearRegression, self.scaling, &self.linear),
        )?;
        artifacts::save(
            &paths.random_forest,
            &Artifact::new(ArtifactKind::RandomForest, self.scaling, &self.forest),
        )?;
        artifacts::save(
            &paths.scaler,
            &Artifact::new(ArtifactKind::StandardScaler, self.scaling, &self.scaler),
        )?;
        Ok(())
    }

    pub fn predictor(&self) -> Result<Predictor> {
        Predictor::new(
            self.scaler.clone(),
            self.linear.clone(),
            self.forest.clone(),
            self.scaling,
        )
    }
}

fn model_matrix(scaling: ScalingPolicy, scaler: &StandardScaler, X: &Array2<f64>) -> Result<Array2<f64>> {
    match scaling {
        ScalingPolicy::Raw => Ok(X.clone()),
        ScalingPolicy::Standardize => scaler.transform(X),
    }
}

fn format_row(values: impl Iterator<Item = f64>) -> String {
    values
        .map(|v| format!("{:>9.2}", v))
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Этап признаков: заполнение, даты, кодирование, IQR-фильтр, матрица
    pub fn prepare(&self, records: &[TrafficRecord]) -> Result<PreparedData> {
        let n_loaded = records.len();
        let engineered = FeatureEngineer::engineer(records)?;

        let (kept, iqr_bounds, n_outliers) =
            remove_outliers(engineered, |r| r.traffic_volume, self.config.iqr_multiplier)?;
        tracing::info!(
            "Outlier filter on {}: Q1 {:.1}, Q3 {:.1}, IQR {:.1}, bounds [{:.1}, {:.1}], dropped {} of {}",
            TARGET_NAME,
            iqr_bounds.q1,
            iqr_bounds.q3,
            iqr_bounds.iqr,
            iqr_bounds.lower,
            iqr_bounds.upper,
            n_outliers,
            n_loaded
        );

        let (features, target) = FeatureEngineer::to_matrix(&kept)?;
        self.log_feature_summaries(&features);
        self.log_preview(&features, &target);

        Ok(PreparedData {
            records: kept,
            features,
            target,
            n_loaded,
            n_outliers,
            iqr_bounds,
        })
    }

    fn log_feature_summaries(&self, features: &Array2<f64>) {
        for (name, column) in FEATURE_NAMES.iter().zip(features.columns()) {
            match BoxSummary::of(&column.to_vec(), self.config.iqr_multiplier) {
                Ok(s) => tracing::info!(
                    "{:<12} min {:>8.2} q1 {:>8.2} median {:>8.2} q3 {:>8.2} max {:>8.2} outliers {}",
                    name,
                    s.min,
                    s.q1,
                    s.median,
                    s.q3,
                    s.max,
                    s.n_outliers
                ),
                Err(e) => tracing::warn!("Cannot summarize {}: {}", name, e),
            }
        }
    }

    fn log_preview(&self, features: &Array2<f64>, target: &Array1<f64>) {
        let n = self.config.preview_rows.min(features.nrows());
        if n == 0 {
            return;
        }
        tracing::debug!("Input features (X): {}", FEATURE_NAMES.join(" "));
        for i in 0..n {
            tracing::debug!("{}", format_row(features.row(i).iter().copied()));
        }
        tracing::debug!(
            "Target (y): {}",
            format_row(target.iter().take(n).copied())
        );
    }

    /// Этап моделей: scaler, split, обе модели, метрики
    pub fn train(&self, data: &PreparedData) -> Result<TrainedModels> {
        let scaling = self.config.scaling;

        let mut scaler = StandardScaler::new();
        scaler.fit(&data.features)?;
        let X = model_matrix(scaling, &scaler, &data.features)?;

        let (train_idx, test_idx) =
            train_test_split(X.nrows(), self.config.test_size, self.config.seed)?;
        let X_train = X.select(Axis(0), &train_idx);
        let X_test = X.select(Axis(0), &test_idx);
        let y_train = data.target.select(Axis(0), &train_idx);
        let y_test = data.target.select(Axis(0), &test_idx);
        tracing::info!(
            "Train/test split: {} / {} rows (seed {}, scaling {})",
            train_idx.len(),
            test_idx.len(),
            self.config.seed,
            scaling
        );

        let linear = LinearModel::fit(&X_train, &y_train)?;
        let y_pred_lr = linear.predict(&X_test)?;
        tracing::info!("Linear regression fitted, intercept {:.3}", linear.intercept());

        tracing::info!(
            "Fitting random forest: {} trees, seed {}",
            self.config.forest.n_estimators,
            self.config.forest.seed
        );
        let forest = RandomForestRegressor::fit(self.config.forest.clone(), &X_train, &y_train)?;
        let y_pred_rf = forest.predict(&X_test)?;

        let lr_metrics = RegressionMetrics::evaluate(&y_test, &y_pred_lr)?;
        let rf_metrics = RegressionMetrics::evaluate(&y_test, &y_pred_rf)?;

        let test_predictions = TestPredictions {
            actual: y_test,
            linear_regression: y_pred_lr,
            random_forest: y_pred_rf,
        };
        test_predictions.log_head(self.config.preview_rows);

        tracing::info!("Linear Regression performance: {}", lr_metrics);
        tracing::info!("Random Forest Regressor performance: {}", rf_metrics);

        let report = TrainingReport {
            n_loaded: data.n_loaded,
            n_outliers_removed: data.n_outliers,
            n_train: train_idx.len(),
            n_test: test_idx.len(),
            iqr_bounds: data.iqr_bounds,
            scaling,
            linear_regression: lr_metrics,
            random_forest: rf_metrics,
            linear_intercept: linear.intercept(),
            linear_coefficients: named(linear.coefficients()),
            feature_importances: named(forest.feature_importances()),
        };
        for weight in &report.feature_importances {
            tracing::info!("Importance {:<12} {:.4}", weight.feature, weight.value);
        }

        Ok(TrainedModels {
            scaler,
            linear,
            forest,
            scaling,
            report,
            test_predictions,
        })
    }

    /// Полный прогон: CSV из конфига -> артефакты в `artifacts_dir`
    pub fn run(&self) -> Result<TrainedModels> {
        let records = load_records(&self.config.data_path)?;
        let data = self.prepare(&records)?;
        let trained = self.train(&data)?;
        trained.save(&ArtifactPaths::in_dir(&self.config.artifacts_dir))?;
        Ok(trained)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_and_disjointness() {
        let (train, test) = train_test_split(101, 0.2, 42).unwrap();
        assert_eq!(test.len(), 21);
        assert_eq!(train.len(), 80);

        let mut all: Vec<usize> = train.iter().chain(test.iter()).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..101).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_is_seeded() {
        assert_eq!(train_test_split(50, 0.2, 42).unwrap(), train_test_split(50, 0.2, 42).unwrap());
        assert_ne!(train_test_split(50, 0.2, 42).unwrap(), train_test_split(50, 0.2, 1).unwrap());
    }

    #[test]
    fn test_split_rejects_degenerate() {
        assert!(train_test_split(1, 0.2, 42).is_err());
        assert!(train_test_split(10, 0.0, 42).is_err());
        assert!(train_test_split(10, 1.0, 42).is_err());
    }
}
