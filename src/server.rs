//! HTTP форма и JSON API для предсказаний

use std::fmt::Write as _;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{Method, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ServerConfig;
use crate::error::{Result, TrafficError};
use crate::predictor::Predictor;
use crate::types::{
    weekday_name, PredictionInput, PredictionOutput, WeatherCondition, CLOUDS_RANGE, MAX_HOUR,
    PRECIPITATION_RANGE, TEMP_RANGE, WEEKDAYS,
};

pub type AppState = Arc<Predictor>;

#[derive(Debug)]
pub enum ApiError {
    InvalidInput(String),
    Internal(String),
}

impl From<TrafficError> for ApiError {
    fn from(e: TrafficError) -> Self {
        if e.is_input_error() {
            ApiError::InvalidInput(e.to_string())
        } else {
            ApiError::Internal(e.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::InvalidInput(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => {
                tracing::error!(detail = %msg, "Prediction failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Prediction failed. Check server logs for details.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": true,
            "message": message,
        }));
        (status, body).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/predict", post(predict_form))
        .route("/api/predict", post(predict_api))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

pub async fn serve(predictor: Predictor, config: &ServerConfig) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Traffic volume form listening on http://{}", config.bind_addr);
    axum::serve(listener, router(Arc::new(predictor))).await?;
    Ok(())
}

async fn index() -> Html<String> {
    Html(render_page(&PredictionInput::default(), None))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "scaling": state.scaling().to_string(),
        "trees": state.forest().n_trees(),
    }))
}

async fn predict_api(
    State(state): State<AppState>,
    Json(input): Json<PredictionInput>,
) -> std::result::Result<Json<PredictionOutput>, ApiError> {
    tracing::info!("Predict request: hour {}, day {}, weather {}", input.hour, input.dayofweek, input.weather_main);
    let output = state.predict(&input)?;
    Ok(Json(output))
}

async fn predict_form(State(state): State<AppState>, Form(input): Form<PredictionInput>) -> Response {
    match state.predict(&input) {
        Ok(output) => Html(render_page(&input, Some(Ok(output)))).into_response(),
        Err(e) if e.is_input_error() => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Html(render_page(&input, Some(Err(e.to_string())))),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(detail = %e, "Prediction failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(render_page(&input, Some(Err("Prediction failed".to_string())))),
            )
                .into_response()
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn options<'a>(values: impl Iterator<Item = &'a str>, selected: &str) -> String {
    let mut html = String::new();
    for value in values {
        let mark = if value.eq_ignore_ascii_case(selected.trim()) { " selected" } else { "" };
        let _ = write!(html, r#"<option value="{0}"{1}>{0}</option>"#, value, mark);
    }
    html
}

fn render_page(input: &PredictionInput, result: Option<std::result::Result<PredictionOutput, String>>) -> String {
    let weather_options = options(WeatherCondition::ALL.iter().map(|c| c.as_str()), &input.weather_main);
    let day_options = options(WEEKDAYS.iter().map(|d| weekday_name(*d)), &input.dayofweek);

    let result_html = match result {
        None => String::new(),
        Some(Ok(output)) => format!(
            r#"<section class="results">
<h2>Prediction Results</h2>
<p class="success"><strong>Linear Regression Prediction:</strong> <span id="lr">{}</span> vehicles</p>
<p class="success"><strong>Random Forest Prediction:</strong> <span id="rf">{}</span> vehicles</p>
<p>These results are based on your input conditions using two trained models.</p>
</section>"#,
            output.linear_regression, output.random_forest
        ),
        Some(Err(message)) => format!(r#"<p class="error">{}</p>"#, escape_html(&message)),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Traffic Volume Predictor</title>
<style>
body {{ font-family: sans-serif; max-width: 640px; margin: 2rem auto; }}
label {{ display: block; margin-top: 0.8rem; }}
.success {{ background: #e6f4ea; padding: 0.5rem; }}
.error {{ background: #fdecea; padding: 0.5rem; }}
</style>
</head>
<body>
<h1>🚦 Traffic Volume Prediction</h1>
<p>Enter the conditions to predict estimated traffic volume.</p>
<form method="post" action="/predict">
<label>Temperature (in Kelvin)
<input type="number" name="temp" min="{t_min}" max="{t_max}" step="0.1" value="{temp}"></label>
<label>Rainfall in last 1 hour (mm)
<input type="number" name="rain_1h" min="{p_min}" max="{p_max}" step="0.1" value="{rain}"></label>
<label>Snowfall in last 1 hour (mm)
<input type="number" name="snow_1h" min="{p_min}" max="{p_max}" step="0.1" value="{snow}"></label>
<label>Cloud Cover (%)
<input type="range" name="clouds_all" min="{c_min}" max="{c_max}" step="1" value="{clouds}"></label>
<label>Weather Condition
<select name="weather_main">{weather_options}</select></label>
<label>Hour of the Day
<input type="range" name="hour" min="0" max="{max_hour}" step="1" value="{hour}"></label>
<label>Day of the Week
<select name="dayofweek">{day_options}</select></label>
<p><button type="submit">Predict traffic volume</button></p>
</form>
{result_html}
</body>
</html>"#,
        t_min = TEMP_RANGE.0,
        t_max = TEMP_RANGE.1,
        p_min = PRECIPITATION_RANGE.0,
        p_max = PRECIPITATION_RANGE.1,
        c_min = CLOUDS_RANGE.0,
        c_max = CLOUDS_RANGE.1,
        max_hour = MAX_HOUR,
        temp = input.temp,
        rain = input.rain_1h,
        snow = input.snow_1h,
        clouds = input.clouds_all,
        hour = input.hour,
        weather_options = weather_options,
        day_options = day_options,
        result_html = result_html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<b>"x" & 'y'</b>"#), "&lt;b&gt;&quot;x&quot; &amp; &#39;y&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_form_lists_every_option() {
        let page = render_page(&PredictionInput::default(), None);
        for condition in WeatherCondition::ALL {
            assert!(page.contains(&format!(r#"value="{}""#, condition.as_str())));
        }
        for day in WEEKDAYS {
            assert!(page.contains(weekday_name(day)));
        }
        assert!(page.contains(r#"<option value="Clear" selected>"#));
        assert!(page.contains(r#"<option value="Monday" selected>"#));
        assert!(!page.contains("Prediction Results"));
    }

    #[test]
    fn test_result_section() {
        let output = PredictionOutput {
            linear_regression: 3012,
            random_forest: 2870,
        };
        let page = render_page(&PredictionInput::default(), Some(Ok(output)));
        assert!(page.contains(r#"<span id="lr">3012</span>"#));
        assert!(page.contains(r#"<span id="rf">2870</span>"#));

        let page = render_page(&PredictionInput::default(), Some(Err("<bad>".to_string())));
        assert!(page.contains("&lt;bad&gt;"));
    }
}
