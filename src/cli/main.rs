use anyhow::{bail, Context};
use churn_service::{
    config::Config,
    logging::init_tracing,
    ml::training::{load_dataset, Trainer},
};
use clap::{Parser, Subcommand};
use reqwest::{multipart, Client};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "churn-cli")]
#[command(about = "Churn service CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CHURN_ENDPOINT", default_value = "http://localhost:5000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit the pipeline on the labeled dataset and write the artifacts
    Train {
        /// Labeled CSV (defaults to artifacts.dataset_path)
        #[arg(short, long)]
        data: Option<PathBuf>,

        #[arg(long)]
        model_out: Option<PathBuf>,

        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },

    /// Check server health
    Health,

    /// Predict churn for a customer given as a JSON file
    Predict {
        #[arg(value_name = "RECORD_JSON")]
        file: PathBuf,
    },

    /// Explain a prediction for a customer given as a JSON file
    Explain {
        #[arg(value_name = "RECORD_JSON")]
        file: PathBuf,
    },

    /// Upload a CSV for batch prediction
    Batch {
        #[arg(value_name = "CSV")]
        file: PathBuf,
    },

    /// Show model metrics and churn rates
    Dashboard,

    /// Show the stored feature importance of the active model
    FeatureImportance,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    let body: serde_json::Value = match cli.command {
        Commands::Train {
            data,
            model_out,
            metrics_out,
        } => {
            let config = Config::load_or_default();
            init_tracing(&config.observability);

            let data = data.unwrap_or(config.artifacts.dataset_path);
            let model_out = model_out.unwrap_or(config.artifacts.model_path);
            let metrics_out = metrics_out.unwrap_or(config.artifacts.metrics_path);

            let dataset = load_dataset(&data)
                .with_context(|| format!("failed to read dataset {}", data.display()))?;
            let report = Trainer::new(config.training).train(&dataset)?;
            report.save(&model_out, &metrics_out)?;

            serde_json::to_value(&report.metrics)?
        }

        Commands::Health => {
            let response = client
                .get(format!("{}/api/health", cli.endpoint))
                .send()
                .await?;
            response.json().await?
        }

        Commands::Predict { file } => {
            let record = read_json(&file)?;
            let response = client
                .post(format!("{}/api/predict", cli.endpoint))
                .json(&record)
                .send()
                .await?;
            response.json().await?
        }

        Commands::Explain { file } => {
            let record = read_json(&file)?;
            let response = client
                .post(format!("{}/api/explain", cli.endpoint))
                .json(&record)
                .send()
                .await?;
            response.json().await?
        }

        Commands::Batch { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.csv".to_string());
            let part = multipart::Part::bytes(bytes)
                .file_name(name)
                .mime_str("text/csv")?;
            let form = multipart::Form::new().part("file", part);

            let response = client
                .post(format!("{}/api/batch-predict", cli.endpoint))
                .multipart(form)
                .send()
                .await?;
            response.json().await?
        }

        Commands::Dashboard => {
            let response = client
                .get(format!("{}/api/dashboard", cli.endpoint))
                .send()
                .await?;
            response.json().await?
        }

        Commands::FeatureImportance => {
            let response = client
                .get(format!("{}/api/feature-importance", cli.endpoint))
                .send()
                .await?;
            response.json().await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    if !value.is_object() {
        bail!("{} must contain a JSON object of customer fields", path.display());
    }
    Ok(value)
}
