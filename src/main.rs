//! Traffic ML - обучение, предсказание из консоли и веб-форма

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};

use traffic_ml::{
    config::{PipelineConfig, ServerConfig},
    models::ArtifactPaths,
    pipeline::TrainingPipeline,
    predictor::Predictor,
    server,
    types::{PredictionInput, ScalingPolicy},
};

#[derive(Parser)]
#[command(name = "traffic-ml")]
#[command(about = "Traffic volume prediction: linear regression and random forest", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both models and write the artifacts
    Train {
        /// JSON config file, flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Input CSV
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Directory for the three artifact files
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// raw or standardize
        #[arg(long)]
        scaling: Option<ScalingPolicy>,

        /// Number of trees in the forest
        #[arg(long)]
        trees: Option<usize>,

        /// Seed for the split and the forest
        #[arg(long)]
        seed: Option<u64>,

        /// Write test-set predictions as CSV
        #[arg(long)]
        predictions_out: Option<PathBuf>,

        /// Write metrics and coefficients as JSON
        #[arg(long)]
        report_out: Option<PathBuf>,
    },

    /// Predict one row from the command line
    Predict {
        #[arg(short, long, default_value = ".")]
        artifacts: PathBuf,

        /// Temperature in Kelvin
        #[arg(long, default_value_t = 293.0)]
        temp: f64,

        #[arg(long, default_value_t = 0.0)]
        rain: f64,

        #[arg(long, default_value_t = 0.0)]
        snow: f64,

        /// Cloud cover, %
        #[arg(long, default_value_t = 40.0)]
        clouds: f64,

        #[arg(long, default_value = "Clear")]
        weather: String,

        #[arg(long, default_value_t = 14)]
        hour: u32,

        #[arg(long, default_value = "Monday")]
        day: String,
    },

    /// Serve the HTML form and JSON API
    Serve {
        #[arg(short, long, default_value = ".")]
        artifacts: PathBuf,

        /// Bind address, e.g. 127.0.0.1:8501 (default: env or 0.0.0.0:8501)
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Инициализация логирования
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traffic_ml=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            data,
            artifacts,
            scaling,
            trees,
            seed,
            predictions_out,
            report_out,
        } => {
            let mut config = match config {
                Some(path) => PipelineConfig::load(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            if let Some(data) = data {
                config.data_path = data;
            }
            if let Some(dir) = artifacts {
                config.artifacts_dir = dir;
            }
            if let Some(scaling) = scaling {
                config.scaling = scaling;
            }
            if let Some(trees) = trees {
                config.forest.n_estimators = trees;
            }
            if let Some(seed) = seed {
                config.seed = seed;
                config.forest.seed = seed;
            }

            cmd_train(config, predictions_out, report_out)?;
        }
        Commands::Predict {
            artifacts,
            temp,
            rain,
            snow,
            clouds,
            weather,
            hour,
            day,
        } => {
            let input = PredictionInput {
                temp,
                rain_1h: rain,
                snow_1h: snow,
                clouds_all: clouds,
                weather_main: weather,
                hour,
                dayofweek: day,
            };
            cmd_predict(&artifacts, &input)?;
        }
        Commands::Serve { artifacts, addr } => {
            let config = match addr {
                Some(addr) => ServerConfig::parse(&addr)?,
                None => ServerConfig::from_env()?,
            };
            let predictor = load_predictor(&artifacts)?;
            server::serve(predictor, &config)
                .await
                .context("Server stopped with an error")?;
        }
    }

    Ok(())
}

fn cmd_train(
    config: PipelineConfig,
    predictions_out: Option<PathBuf>,
    report_out: Option<PathBuf>,
) -> anyhow::Result<()> {
    tracing::info!(
        "Training on {} (scaling {}, {} trees)",
        config.data_path.display(),
        config.scaling,
        config.forest.n_estimators
    );
    let pipeline = TrainingPipeline::new(config)?;
    let trained = pipeline.run().context("Training pipeline failed")?;

    if let Some(path) = predictions_out {
        trained
            .test_predictions
            .write_csv(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Test predictions written to {}", path.display());
    }
    if let Some(path) = report_out {
        trained
            .report
            .write_json(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Training report written to {}", path.display());
    }

    println!("Linear Regression: {}", trained.report.linear_regression);
    println!("Random Forest:     {}", trained.report.random_forest);
    Ok(())
}

fn cmd_predict(artifacts: &Path, input: &PredictionInput) -> anyhow::Result<()> {
    let predictor = load_predictor(artifacts)?;
    let output = predictor.predict(input).context("Invalid prediction input")?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_predictor(dir: &Path) -> anyhow::Result<Predictor> {
    let paths = ArtifactPaths::in_dir(dir);
    Predictor::load(&paths).with_context(|| {
        format!(
            "Failed to load model artifacts from {}. Run `traffic-ml train` first.",
            dir.display()
        )
    })
}
