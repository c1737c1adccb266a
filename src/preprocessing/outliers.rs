//! Удаление выбросов по IQR

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

pub const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;

/// Квантиль по отсортированному срезу, линейная интерполяция между порядковыми статистиками
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = (sorted.len() - 1) as f64 * q;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn sorted_finite(values: &[f64]) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(TrafficError::DataError("Empty column".to_string()));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(TrafficError::DataError("Column contains NaN or infinite values".to_string()));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Ok(sorted)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn compute(values: &[f64], multiplier: f64) -> Result<Self> {
        if !(multiplier >= 0.0) {
            return Err(TrafficError::ConfigError(format!(
                "IQR multiplier must be non-negative, got {}",
                multiplier
            )));
        }
        let sorted = sorted_finite(values)?;
        let q1 = quantile(&sorted, 0.25);
        let q3 = quantile(&sorted, 0.75);
        let iqr = q3 - q1;
        Ok(Self {
            q1,
            q3,
            iqr,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    /// Границы включительные
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Один проход: границы считаются один раз по всей выборке, потом фильтр
pub fn remove_outliers<T, F>(items: Vec<T>, key: F, multiplier: f64) -> Result<(Vec<T>, IqrBounds, usize)>
where
    F: Fn(&T) -> f64,
{
    let values: Vec<f64> = items.iter().map(&key).collect();
    let bounds = IqrBounds::compute(&values, multiplier)?;

    let before = items.len();
    let kept: Vec<T> = items
        .into_iter()
        .filter(|item| bounds.contains(key(item)))
        .collect();
    let dropped = before - kept.len();

    Ok((kept, bounds, dropped))
}

/// Сводка "ящика с усами" по одной колонке
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub n_outliers: usize,
}

impl BoxSummary {
    pub fn of(values: &[f64], multiplier: f64) -> Result<Self> {
        let sorted = sorted_finite(values)?;
        let bounds = IqrBounds::compute(&sorted, multiplier)?;
        Ok(Self {
            min: sorted[0],
            q1: bounds.q1,
            median: quantile(&sorted, 0.5),
            q3: bounds.q3,
            max: sorted[sorted.len() - 1],
            n_outliers: sorted.iter().filter(|&&v| !bounds.contains(v)).count(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_interpolation() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&sorted, 0.75) - 3.25).abs() < 1e-12);
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 1.0), 4.0);
        assert_eq!(quantile(&[7.0], 0.25), 7.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_iqr_bounds() {
        let values: Vec<f64> = (1..=9).map(|v| v as f64).collect();
        let bounds = IqrBounds::compute(&values, 1.5).unwrap();
        assert_eq!(bounds.q1, 3.0);
        assert_eq!(bounds.q3, 7.0);
        assert_eq!(bounds.iqr, 4.0);
        assert_eq!(bounds.lower, -3.0);
        assert_eq!(bounds.upper, 13.0);
        assert!(bounds.contains(13.0));
        assert!(!bounds.contains(13.01));
    }

    #[test]
    fn test_remove_outliers_partitions_by_bounds() {
        let mut values: Vec<f64> = (0..100).map(|i| 1000.0 + (i * 37 % 100) as f64 * 40.0).collect();
        values.extend([-20000.0, 25000.0, 30000.0]);

        let (kept, bounds, dropped) = remove_outliers(values.clone(), |v| *v, 1.5).unwrap();

        assert_eq!(dropped, 3);
        assert_eq!(kept.len(), values.len() - 3);
        for &v in &kept {
            assert!(v >= bounds.lower && v <= bounds.upper);
        }
        for v in values.iter().copied().filter(|v| !kept.contains(v)) {
            assert!(v < bounds.lower || v > bounds.upper);
        }
    }

    #[test]
    fn test_remove_outliers_keeps_order() {
        let items = vec![("a", 10.0), ("b", 11.0), ("c", 500.0), ("d", 12.0), ("e", 13.0)];
        let (kept, _, dropped) = remove_outliers(items, |item| item.1, 1.5).unwrap();
        assert_eq!(dropped, 1);
        let names: Vec<&str> = kept.iter().map(|item| item.0).collect();
        assert_eq!(names, vec!["a", "b", "d", "e"]);
    }

    #[test]
    fn test_invalid_input() {
        assert!(IqrBounds::compute(&[], 1.5).is_err());
        assert!(IqrBounds::compute(&[1.0, f64::NAN], 1.5).is_err());
        assert!(IqrBounds::compute(&[1.0, 2.0], -1.0).is_err());
    }

    #[test]
    fn test_box_summary() {
        let values = [5.0, 1.0, 3.0, 2.0, 4.0, 100.0];
        let summary = BoxSummary::of(&values, 1.5).unwrap();
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 100.0);
        assert_eq!(summary.median, 3.5);
        assert_eq!(summary.n_outliers, 1);
    }
}
