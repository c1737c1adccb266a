//! Метрики регрессии

use std::fmt;

use linfa::prelude::SingleTargetRegression;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

fn check_lengths(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<()> {
    if y_true.is_empty() {
        return Err(TrafficError::DataError("No samples to evaluate".to_string()));
    }
    if y_true.len() != y_pred.len() {
        return Err(TrafficError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    Ok(())
}

fn metric_error(e: linfa::Error) -> TrafficError {
    TrafficError::DataError(format!("metric failed: {}", e))
}

pub fn mean_absolute_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    y_pred.mean_absolute_error(y_true).map_err(metric_error)
}

pub fn root_mean_squared_error(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let mse = y_pred.mean_squared_error(y_true).map_err(metric_error)?;
    Ok(mse.sqrt())
}

/// R^2 из linfa. Для константной целевой: 1.0 при точном совпадении, иначе 0.0
pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<f64> {
    check_lengths(y_true, y_pred)?;
    let first = y_true[0];
    if y_true.iter().all(|&v| v == first) {
        return Ok(if y_true == y_pred { 1.0 } else { 0.0 });
    }
    y_pred.r2(y_true).map_err(metric_error)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    pub fn evaluate(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        Ok(Self {
            mae: mean_absolute_error(y_true, y_pred)?,
            rmse: root_mean_squared_error(y_true, y_pred)?,
            r2: r2_score(y_true, y_pred)?,
        })
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MAE: {:.2}, RMSE: {:.2}, R^2: {:.2}", self.mae, self.rmse, self.r2)
    }
}
