//! Сервис предсказаний поверх трех артефактов

use serde::Serialize;

use crate::error::{Result, TrafficError};
use crate::models::artifacts::{self, Artifact, ArtifactKind, ArtifactPaths};
use crate::models::{LinearModel, RandomForestRegressor};
use crate::preprocessing::StandardScaler;
use crate::types::{
    FeatureVector, Observation, PredictionInput, PredictionOutput, ScalingPolicy, N_FEATURES,
};

/// Предсказания до округления
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RawPrediction {
    pub linear_regression: f64,
    pub random_forest: f64,
}

impl RawPrediction {
    pub fn rounded(&self) -> PredictionOutput {
        PredictionOutput {
            linear_regression: to_vehicle_count(self.linear_regression),
            random_forest: to_vehicle_count(self.random_forest),
        }
    }
}

/// Ближайшее целое, не меньше нуля
pub fn to_vehicle_count(value: f64) -> i64 {
    if value.is_finite() {
        value.round().max(0.0) as i64
    } else {
        0
    }
}

fn check_width(name: &str, n: usize) -> Result<()> {
    if n != N_FEATURES {
        return Err(TrafficError::ShapeError {
            expected: format!("{} features in {}", N_FEATURES, name),
            actual: format!("{}", n),
        });
    }
    Ok(())
}

/// Среднее конечно, масштаб конечен и строго положителен
fn check_scaler(scaler: &StandardScaler) -> Result<()> {
    let (mean, scale) = match (scaler.mean(), scaler.scale()) {
        (Some(mean), Some(scale)) => (mean, scale),
        _ => return Err(TrafficError::ModelNotFitted),
    };
    check_width("scaler mean", mean.len())?;
    check_width("scaler scale", scale.len())?;

    if let Some(j) = mean.iter().position(|m| !m.is_finite()) {
        return Err(TrafficError::DataError(format!("scaler mean[{}] is not finite", j)));
    }
    if let Some(j) = scale.iter().position(|s| !(s.is_finite() && *s > 0.0)) {
        return Err(TrafficError::DataError(format!(
            "scaler scale[{}] = {} must be finite and positive",
            j, scale[j]
        )));
    }
    Ok(())
}

fn check_linear(linear: &LinearModel) -> Result<()> {
    check_width("linear model", linear.n_features())?;
    if !linear.intercept().is_finite() || linear.coefficients().iter().any(|c| !c.is_finite()) {
        return Err(TrafficError::DataError(
            "linear model has non-finite parameters".to_string(),
        ));
    }
    Ok(())
}

fn check_forest(forest: &RandomForestRegressor) -> Result<()> {
    check_width("random forest", forest.n_features())?;
    forest.validate()
}

/// Неизменяемый набор обученных моделей, создается один раз на процесс
#[derive(Debug, Clone)]
pub struct Predictor {
    scaler: StandardScaler,
    linear: LinearModel,
    forest: RandomForestRegressor,
    scaling: ScalingPolicy,
}

impl Predictor {
    pub fn new(
        scaler: StandardScaler,
        linear: LinearModel,
        forest: RandomForestRegressor,
        scaling: ScalingPolicy,
    ) -> Result<Self> {
        check_scaler(&scaler)?;
        check_linear(&linear)?;
        check_forest(&forest)?;

        Ok(Self {
            scaler,
            linear,
            forest,
            scaling,
        })
    }

    /// Загрузка всех трех артефактов. Любая ошибка фатальна для вызывающего.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let linear: Artifact<LinearModel> =
            artifacts::load(&paths.linear_model, ArtifactKind::LinearRegression)?;
        let forest: Artifact<RandomForestRegressor> =
            artifacts::load(&paths.random_forest, ArtifactKind::RandomForest)?;
        let scaler: Artifact<StandardScaler> =
            artifacts::load(&paths.scaler, ArtifactKind::StandardScaler)?;

        let scaling = linear.scaling;
        for (path, other) in [
            (&paths.random_forest, forest.scaling),
            (&paths.scaler, scaler.scaling),
        ] {
            if other != scaling {
                return Err(TrafficError::artifact(
                    path.as_path(),
                    format!(
                        "scaling policy '{}' differs from the linear model's '{}'",
                        other, scaling
                    ),
                ));
            }
        }

        check_scaler(&scaler.payload).map_err(|e| TrafficError::artifact(paths.scaler.as_path(), e))?;
        check_linear(&linear.payload)
            .map_err(|e| TrafficError::artifact(paths.linear_model.as_path(), e))?;
        check_forest(&forest.payload)
            .map_err(|e| TrafficError::artifact(paths.random_forest.as_path(), e))?;

        let predictor = Self::new(scaler.payload, linear.payload, forest.payload, scaling)?;
        tracing::info!(
            "Loaded models: {} trees, scaling {}",
            predictor.forest.n_trees(),
            scaling
        );
        Ok(predictor)
    }

    pub fn scaling(&self) -> ScalingPolicy {
        self.scaling
    }

    pub fn linear(&self) -> &LinearModel {
        &self.linear
    }

    pub fn forest(&self) -> &RandomForestRegressor {
        &self.forest
    }

    /// Вектор, который реально уходит в модели
    pub fn model_input(&self, observation: &Observation) -> Result<FeatureVector> {
        let features = observation.feature_vector();
        match self.scaling {
            ScalingPolicy::Raw => Ok(features),
            ScalingPolicy::Standardize => self.scaler.transform_row(&features),
        }
    }

    pub fn predict_observation(&self, observation: &Observation) -> Result<RawPrediction> {
        let input = self.model_input(observation)?;
        Ok(RawPrediction {
            linear_regression: self.linear.predict_one(&input)?,
            random_forest: self.forest.predict_one(&input)?,
        })
    }

    pub fn predict(&self, input: &PredictionInput) -> Result<PredictionOutput> {
        let observation = input.to_observation()?;
        let prediction = self.predict_observation(&observation)?;
        tracing::debug!(
            "Prediction for {:?}: linear {:.2}, forest {:.2}",
            observation.feature_vector(),
            prediction.linear_regression,
            prediction.random_forest
        );
        Ok(prediction.rounded())
    }
}
