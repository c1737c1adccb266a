//! Линейная регрессия (OLS)

#![allow(non_snake_case)]

use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

/// Дисперсия, ниже которой колонка считается константой
const CONSTANT_COLUMN_VARIANCE: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    intercept: f64,
    coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn from_parts(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            intercept,
            coefficients,
        }
    }

    /// Наименьшие квадраты со свободным членом.
    /// Константные колонки не входят в систему и получают коэффициент 0.
    pub fn fit(X: &Array2<f64>, y: &Array1<f64>) -> Result<Self> {
        let n_samples = X.nrows();
        let n_features = X.ncols();

        if n_samples == 0 || n_features == 0 {
            return Err(TrafficError::DataError("Empty dataset".to_string()));
        }
        if n_samples != y.len() {
            return Err(TrafficError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }

        let informative: Vec<usize> = (0..n_features)
            .filter(|&j| X.column(j).var(0.0) > CONSTANT_COLUMN_VARIANCE)
            .collect();

        let mut coefficients = vec![0.0; n_features];
        let y_mean = y.mean().unwrap_or(0.0);

        if informative.is_empty() {
            tracing::warn!("All feature columns are constant, linear model predicts the mean");
            return Ok(Self {
                intercept: y_mean,
                coefficients,
            });
        }
        if informative.len() < n_features {
            tracing::debug!(
                "Excluding {} constant columns from least squares",
                n_features - informative.len()
            );
        }

        let records = X.select(Axis(1), &informative);
        let dataset = DatasetBase::new(records, y.clone());
        let fitted = LinearRegression::new()
            .fit(&dataset)
            .map_err(|e| TrafficError::TrainingError(format!("least squares failed: {}", e)))?;

        for (k, &j) in informative.iter().enumerate() {
            coefficients[j] = fitted.params()[k];
        }

        Ok(Self {
            intercept: fitted.intercept(),
            coefficients,
        })
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict(&self, X: &Array2<f64>) -> Result<Array1<f64>> {
        if X.ncols() != self.coefficients.len() {
            return Err(TrafficError::ShapeError {
                expected: format!("{} columns", self.coefficients.len()),
                actual: format!("{} columns", X.ncols()),
            });
        }

        let weights = ArrayView1::from(&self.coefficients[..]);
        Ok(X.dot(&weights) + self.intercept)
    }

    pub fn predict_one(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.coefficients.len() {
            return Err(TrafficError::ShapeError {
                expected: format!("{} columns", self.coefficients.len()),
                actual: format!("{} columns", row.len()),
            });
        }

        let pred = self.intercept
            + row
                .iter()
                .zip(self.coefficients.iter())
                .map(|(x, w)| x * w)
                .sum::<f64>();
        Ok(pred)
    }
}
