//! Feature engineering для моделей трафика

use chrono::NaiveDateTime;
use ndarray::{Array1, Array2};

use crate::error::{Result, TrafficError};
use crate::types::{
    CalendarFeatures, FeatureVector, Observation, TrafficRecord, WeatherCondition,
    HOLIDAY_PLACEHOLDER, N_FEATURES,
};

/// Форматы `date_time`, которые встречаются в выгрузках датасета
const DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d-%m-%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
];

/// Исходная запись плюс производные колонки
#[derive(Debug, Clone)]
pub struct EngineeredRecord {
    pub holiday: String,
    pub date_time: NaiveDateTime,
    pub observation: Observation,
    pub traffic_volume: f64,
}

impl EngineeredRecord {
    pub fn feature_vector(&self) -> FeatureVector {
        self.observation.feature_vector()
    }
}

pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn parse_date_time(value: &str, row: usize) -> Result<NaiveDateTime> {
        let value = value.trim();
        let mut last_error = None;
        for format in DATE_TIME_FORMATS {
            match NaiveDateTime::parse_from_str(value, format) {
                Ok(dt) => return Ok(dt),
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(source) => Err(TrafficError::DateTime {
                row,
                value: value.to_string(),
                source,
            }),
            None => Err(TrafficError::DataError(format!(
                "No date_time formats configured (row {})",
                row
            ))),
        }
    }

    pub fn fill_holiday(holiday: Option<&str>) -> String {
        match holiday.map(str::trim) {
            Some(value) if !value.is_empty() => value.to_string(),
            _ => HOLIDAY_PLACEHOLDER.to_string(),
        }
    }

    /// Производные признаки для одной записи. `row` нужен только для сообщений об ошибках.
    pub fn engineer_one(record: &TrafficRecord, row: usize) -> Result<(EngineeredRecord, bool)> {
        let date_time = Self::parse_date_time(&record.date_time, row)?;
        let (weather, known) = WeatherCondition::from_label_lossy(&record.weather_main);

        let engineered = EngineeredRecord {
            holiday: Self::fill_holiday(record.holiday.as_deref()),
            date_time,
            observation: Observation {
                temp: record.temp,
                rain_1h: record.rain_1h,
                snow_1h: record.snow_1h,
                clouds_all: record.clouds_all,
                weather,
                calendar: CalendarFeatures::from_datetime(&date_time),
            },
            traffic_volume: record.traffic_volume,
        };

        Ok((engineered, known))
    }

    pub fn engineer(records: &[TrafficRecord]) -> Result<Vec<EngineeredRecord>> {
        let mut engineered = Vec::with_capacity(records.len());
        let mut holidays_filled = 0usize;
        let mut unknown_weather = 0usize;

        for (i, record) in records.iter().enumerate() {
            // Строка 1 - заголовок CSV
            let (item, known) = Self::engineer_one(record, i + 2)?;
            if record.holiday.as_deref().map_or(true, |h| h.trim().is_empty()) {
                holidays_filled += 1;
            }
            if !known {
                unknown_weather += 1;
            }
            engineered.push(item);
        }

        if holidays_filled > 0 {
            tracing::debug!("Filled {} missing holiday values with '{}'", holidays_filled, HOLIDAY_PLACEHOLDER);
        }
        if unknown_weather > 0 {
            tracing::warn!("{} records had an unknown weather_main, encoded as Other", unknown_weather);
        }

        Ok(engineered)
    }

    /// Матрица признаков (n x 8) и целевая переменная
    pub fn to_matrix(records: &[EngineeredRecord]) -> Result<(Array2<f64>, Array1<f64>)> {
        if records.is_empty() {
            return Err(TrafficError::DataError("No records provided".to_string()));
        }

        let mut features = Array2::zeros((records.len(), N_FEATURES));
        let mut targets = Array1::zeros(records.len());

        for (i, record) in records.iter().enumerate() {
            for (j, value) in record.feature_vector().iter().enumerate() {
                features[[i, j]] = *value;
            }
            targets[i] = record.traffic_volume;
        }

        Ok((features, targets))
    }
}
