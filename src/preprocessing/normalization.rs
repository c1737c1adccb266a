//! Стандартизация признаков

#![allow(non_snake_case)]

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};
use crate::types::FeatureVector;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Vec<f64>>,
    scale: Option<Vec<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            mean: None,
            scale: None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some() && self.scale.is_some()
    }

    pub fn fit(&mut self, X: &Array2<f64>) -> Result<()> {
        if X.nrows() == 0 {
            return Err(TrafficError::DataError("Empty dataset".to_string()));
        }

        // Среднее и стандартное отклонение (ddof = 0) по каждому признаку
        let mean = X
            .mean_axis(Axis(0))
            .ok_or_else(|| TrafficError::DataError("Failed to compute mean".to_string()))?;
        let mut std = X.std_axis(Axis(0), 0.0);

        // Избегаем деления на ноль
        for val in std.iter_mut() {
            if *val < 1e-10 {
                *val = 1.0;
            }
        }

        self.mean = Some(mean.to_vec());
        self.scale = Some(std.to_vec());
        Ok(())
    }

    fn params(&self) -> Result<(&[f64], &[f64])> {
        match (&self.mean, &self.scale) {
            (Some(mean), Some(scale)) => Ok((mean, scale)),
            _ => Err(TrafficError::ModelNotFitted),
        }
    }

    pub fn transform(&self, X: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self.params()?;
        if X.ncols() != mean.len() {
            return Err(TrafficError::ShapeError {
                expected: format!("{} columns", mean.len()),
                actual: format!("{} columns", X.ncols()),
            });
        }

        // (X - mean) / std
        let mut normalized = X.clone();
        for mut row in normalized.rows_mut() {
            for (i, val) in row.iter_mut().enumerate() {
                *val = (*val - mean[i]) / scale[i];
            }
        }

        Ok(normalized)
    }

    pub fn fit_transform(&mut self, X: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(X)?;
        self.transform(X)
    }

    pub fn transform_row(&self, row: &FeatureVector) -> Result<FeatureVector> {
        let (mean, scale) = self.params()?;
        if mean.len() != row.len() {
            return Err(TrafficError::ShapeError {
                expected: format!("{} columns", mean.len()),
                actual: format!("{} columns", row.len()),
            });
        }

        let mut out = *row;
        for (i, val) in out.iter_mut().enumerate() {
            *val = (*val - mean[i]) / scale[i];
        }
        Ok(out)
    }

    pub fn mean(&self) -> Option<&[f64]> {
        self.mean.as_deref()
    }

    pub fn scale(&self) -> Option<&[f64]> {
        self.scale.as_deref()
    }
}
