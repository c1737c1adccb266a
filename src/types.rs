/// Типы данных для модуля прогнозирования трафика

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrafficError};

/// Порядок колонок матрицы признаков. Общий для обучения и инференса.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "temp",
    "rain_1h",
    "snow_1h",
    "clouds_all",
    "is_weekend",
    "is_rush_hour",
    "hour",
    "dayofweek",
];

pub const N_FEATURES: usize = 8;

pub const TARGET_NAME: &str = "traffic_volume";

/// Часы пик: 7-9 утра и 16-18 вечера
pub const RUSH_HOURS: [u32; 6] = [7, 8, 9, 16, 17, 18];

pub const HOLIDAY_PLACEHOLDER: &str = "None";

/// Одна строка признаков в порядке `FEATURE_NAMES`
pub type FeatureVector = [f64; N_FEATURES];

pub fn feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|name| name.to_string()).collect()
}

/// Сырая строка CSV (одно наблюдение за час)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficRecord {
    #[serde(default)]
    pub holiday: Option<String>,
    pub temp: f64,
    pub rain_1h: f64,
    pub snow_1h: f64,
    pub clouds_all: f64,
    pub weather_main: String,
    #[serde(default)]
    pub weather_description: Option<String>,
    pub date_time: String,
    pub traffic_volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WeatherCondition {
    Clear,
    Clouds,
    Drizzle,
    Fog,
    Haze,
    Mist,
    Rain,
    Smoke,
    Snow,
    Squall,
    Thunderstorm,
    Other,
}

impl WeatherCondition {
    /// Все значения в порядке кодов 0..=11
    pub const ALL: [WeatherCondition; 12] = [
        WeatherCondition::Clear,
        WeatherCondition::Clouds,
        WeatherCondition::Drizzle,
        WeatherCondition::Fog,
        WeatherCondition::Haze,
        WeatherCondition::Mist,
        WeatherCondition::Rain,
        WeatherCondition::Smoke,
        WeatherCondition::Snow,
        WeatherCondition::Squall,
        WeatherCondition::Thunderstorm,
        WeatherCondition::Other,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WeatherCondition::Clear => "Clear",
            WeatherCondition::Clouds => "Clouds",
            WeatherCondition::Drizzle => "Drizzle",
            WeatherCondition::Fog => "Fog",
            WeatherCondition::Haze => "Haze",
            WeatherCondition::Mist => "Mist",
            WeatherCondition::Rain => "Rain",
            WeatherCondition::Smoke => "Smoke",
            WeatherCondition::Snow => "Snow",
            WeatherCondition::Squall => "Squall",
            WeatherCondition::Thunderstorm => "Thunderstorm",
            WeatherCondition::Other => "Other",
        }
    }

    /// Разбор метки из датасета: неизвестные значения становятся `Other`
    pub fn from_label_lossy(label: &str) -> (Self, bool) {
        match label.parse::<WeatherCondition>() {
            Ok(condition) => (condition, true),
            Err(_) => (WeatherCondition::Other, false),
        }
    }
}

impl FromStr for WeatherCondition {
    type Err = TrafficError;

    fn from_str(s: &str) -> Result<Self> {
        let label = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(label))
            .ok_or_else(|| TrafficError::UnknownWeather(label.to_string()))
    }
}

impl fmt::Display for WeatherCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Код дня недели: Monday = 0 ... Sunday = 6
pub fn weekday_code(day: Weekday) -> u32 {
    day.num_days_from_monday()
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

pub fn parse_weekday(s: &str) -> Result<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| TrafficError::UnknownWeekday(s.trim().to_string()))
}

pub fn is_weekend(dayofweek: u32) -> bool {
    matches!(dayofweek, 5 | 6)
}

pub fn is_rush_hour(hour: u32) -> bool {
    RUSH_HOURS.contains(&hour)
}

/// Временные признаки, выводимые из даты и часа
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CalendarFeatures {
    pub hour: u32,
    pub dayofweek: u32,
    pub is_weekend: bool,
    pub is_rush_hour: bool,
}

impl CalendarFeatures {
    pub fn new(hour: u32, day: Weekday) -> Self {
        let dayofweek = weekday_code(day);
        Self {
            hour,
            dayofweek,
            is_weekend: is_weekend(dayofweek),
            is_rush_hour: is_rush_hour(hour),
        }
    }

    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        Self::new(dt.hour(), dt.weekday())
    }
}

/// Логическое наблюдение, общее для обучения и инференса
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    pub temp: f64,
    pub rain_1h: f64,
    pub snow_1h: f64,
    pub clouds_all: f64,
    pub weather: WeatherCondition,
    pub calendar: CalendarFeatures,
}

impl Observation {
    /// Единственное место, где собирается вектор признаков
    pub fn feature_vector(&self) -> FeatureVector {
        [
            self.temp,
            self.rain_1h,
            self.snow_1h,
            self.clouds_all,
            flag(self.calendar.is_weekend),
            flag(self.calendar.is_rush_hour),
            self.calendar.hour as f64,
            self.calendar.dayofweek as f64,
        ]
    }

    pub fn weather_code(&self) -> u8 {
        self.weather.code()
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Подают ли модели масштабированные признаки
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingPolicy {
    #[default]
    Raw,
    Standardize,
}

impl FromStr for ScalingPolicy {
    type Err = TrafficError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" | "none" => Ok(ScalingPolicy::Raw),
            "standardize" | "standard" | "scaled" => Ok(ScalingPolicy::Standardize),
            other => Err(TrafficError::ConfigError(format!(
                "unknown scaling policy '{}' (expected raw or standardize)",
                other
            ))),
        }
    }
}

impl fmt::Display for ScalingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingPolicy::Raw => f.write_str("raw"),
            ScalingPolicy::Standardize => f.write_str("standardize"),
        }
    }
}

pub const TEMP_RANGE: (f64, f64) = (250.0, 330.0); // Кельвины
pub const PRECIPITATION_RANGE: (f64, f64) = (0.0, 50.0); // мм за час
pub const CLOUDS_RANGE: (f64, f64) = (0.0, 100.0); // %
pub const MAX_HOUR: u32 = 23;

/// Ввод формы: одна строка для предсказания
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    #[serde(default = "default_temp")]
    pub temp: f64,
    #[serde(default)]
    pub rain_1h: f64,
    #[serde(default)]
    pub snow_1h: f64,
    #[serde(default = "default_clouds")]
    pub clouds_all: f64,
    #[serde(default = "default_weather")]
    pub weather_main: String,
    #[serde(default = "default_hour")]
    pub hour: u32,
    #[serde(default = "default_dayofweek")]
    pub dayofweek: String,
}

fn default_temp() -> f64 { 293.0 }
fn default_clouds() -> f64 { 40.0 }
fn default_weather() -> String { "Clear".to_string() }
fn default_hour() -> u32 { 14 }
fn default_dayofweek() -> String { "Monday".to_string() }

impl Default for PredictionInput {
    fn default() -> Self {
        Self {
            temp: default_temp(),
            rain_1h: 0.0,
            snow_1h: 0.0,
            clouds_all: default_clouds(),
            weather_main: default_weather(),
            hour: default_hour(),
            dayofweek: default_dayofweek(),
        }
    }
}

impl PredictionInput {
    /// Проверка диапазонов формы и сборка наблюдения
    pub fn to_observation(&self) -> Result<Observation> {
        check_range("temp", self.temp, TEMP_RANGE)?;
        check_range("rain_1h", self.rain_1h, PRECIPITATION_RANGE)?;
        check_range("snow_1h", self.snow_1h, PRECIPITATION_RANGE)?;
        check_range("clouds_all", self.clouds_all, CLOUDS_RANGE)?;
        if self.hour > MAX_HOUR {
            return Err(TrafficError::InvalidInput {
                field: "hour",
                value: self.hour.to_string(),
                expected: format!("0..={}", MAX_HOUR),
            });
        }

        let weather = self.weather_main.parse::<WeatherCondition>()?;
        let day = parse_weekday(&self.dayofweek)?;

        Ok(Observation {
            temp: self.temp,
            rain_1h: self.rain_1h,
            snow_1h: self.snow_1h,
            clouds_all: self.clouds_all,
            weather,
            calendar: CalendarFeatures::new(self.hour, day),
        })
    }
}

fn check_range(field: &'static str, value: f64, (min, max): (f64, f64)) -> Result<()> {
    // NaN не проходит ни одно сравнение
    if value >= min && value <= max {
        Ok(())
    } else {
        Err(TrafficError::InvalidInput {
            field,
            value: value.to_string(),
            expected: format!("{}..={}", min, max),
        })
    }
}

/// Ответ формы: два округленных предсказания
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionOutput {
    pub linear_regression: i64,
    pub random_forest: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekend_flag() {
        for day in 0..7 {
            assert_eq!(is_weekend(day), day == 5 || day == 6, "day {}", day);
        }
        let friday = CalendarFeatures::new(12, Weekday::Fri);
        let saturday = CalendarFeatures::new(12, Weekday::Sat);
        assert!(!friday.is_weekend);
        assert!(saturday.is_weekend);
    }

    #[test]
    fn test_rush_hour_flag() {
        for hour in 0..24 {
            let expected = matches!(hour, 7 | 8 | 9 | 16 | 17 | 18);
            assert_eq!(is_rush_hour(hour), expected, "hour {}", hour);
        }
        assert!(is_rush_hour(9));
        assert!(!is_rush_hour(10));
    }

    #[test]
    fn test_weather_codes() {
        let labels = [
            "Clear", "Clouds", "Drizzle", "Fog", "Haze", "Mist", "Rain",
            "Smoke", "Snow", "Squall", "Thunderstorm", "Other",
        ];
        for (code, label) in labels.iter().enumerate() {
            let condition: WeatherCondition = label.parse().unwrap();
            assert_eq!(condition.code() as usize, code);
            assert_eq!(WeatherCondition::from_code(code as u8), Some(condition));
            assert_eq!(condition.as_str(), *label);
        }
        assert_eq!(WeatherCondition::from_code(12), None);
        assert!("Tornado".parse::<WeatherCondition>().is_err());
        assert_eq!(
            WeatherCondition::from_label_lossy("Tornado"),
            (WeatherCondition::Other, false)
        );
        assert_eq!("clouds".parse::<WeatherCondition>().unwrap(), WeatherCondition::Clouds);
    }

    #[test]
    fn test_weekday_codes() {
        let names = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];
        for (code, name) in names.iter().enumerate() {
            let day = parse_weekday(name).unwrap();
            assert_eq!(weekday_code(day) as usize, code);
            assert_eq!(weekday_name(day), *name);
            assert_eq!(WEEKDAYS[code], day);
        }
        assert!(parse_weekday("Caturday").is_err());
    }

    #[test]
    fn test_form_example_vector() {
        let input = PredictionInput {
            temp: 293.0,
            rain_1h: 0.0,
            snow_1h: 0.0,
            clouds_all: 40.0,
            weather_main: "Clear".to_string(),
            hour: 14,
            dayofweek: "Wednesday".to_string(),
        };
        let observation = input.to_observation().unwrap();

        assert!(!observation.calendar.is_weekend);
        assert!(!observation.calendar.is_rush_hour);
        assert_eq!(observation.weather_code(), 0);
        assert_eq!(observation.calendar.dayofweek, 2);
        assert_eq!(
            observation.feature_vector(),
            [293.0, 0.0, 0.0, 40.0, 0.0, 0.0, 14.0, 2.0]
        );
    }

    #[test]
    fn test_input_bounds() {
        let mut input = PredictionInput::default();
        assert!(input.to_observation().is_ok());

        input.temp = 249.9;
        assert!(matches!(
            input.to_observation(),
            Err(TrafficError::InvalidInput { field: "temp", .. })
        ));

        let mut input = PredictionInput::default();
        input.hour = 24;
        assert!(input.to_observation().is_err());

        let mut input = PredictionInput::default();
        input.rain_1h = f64::NAN;
        assert!(input.to_observation().is_err());

        let mut input = PredictionInput::default();
        input.clouds_all = 100.0;
        input.snow_1h = 50.0;
        assert!(input.to_observation().is_ok());
    }

    #[test]
    fn test_scaling_policy_parse() {
        assert_eq!("raw".parse::<ScalingPolicy>().unwrap(), ScalingPolicy::Raw);
        assert_eq!(
            "Standardize".parse::<ScalingPolicy>().unwrap(),
            ScalingPolicy::Standardize
        );
        assert!("minmax".parse::<ScalingPolicy>().is_err());
        assert_eq!(ScalingPolicy::default(), ScalingPolicy::Raw);
    }
}
