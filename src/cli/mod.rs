//! cardspend CLI
//!
//! Command-line interface for training, prediction, dataset inspection,
//! and serving.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::artifact::ArtifactStore;
use crate::data::DatasetLoader;
use crate::predictor::Predictor;
use crate::record::Record;
use crate::server::{run_server, ServerConfig};
use crate::training::{Trainer, TrainerConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}

fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}

fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}

fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "cardspend")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Credit-card expenditure prediction: training, inference, serving")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train the three model families and persist the best one
    Train {
        /// Training CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Target column name
        #[arg(short, long, default_value = "expenditure")]
        target: String,

        /// Output artifact file
        #[arg(short, long, default_value = "models/expenditure_model.json")]
        output: PathBuf,

        /// Directory for comparison plots (omit to disable)
        #[arg(long)]
        plots: Option<PathBuf>,

        /// Number of cross-validation folds
        #[arg(long, default_value = "5")]
        cv_folds: usize,

        /// Random seed for the split and model fits
        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Predict expenditures using a trained artifact
    Predict {
        /// Trained artifact file
        #[arg(short, long)]
        model: PathBuf,

        /// Input records: CSV file or JSON array of objects
        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV file (prints a summary when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show dataset information
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Start the prediction API server
    Serve {
        /// Trained artifact file
        #[arg(short, long, default_value = "models/expenditure_model.json")]
        model: PathBuf,

        /// Labeled dataset for the metrics fallback
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Server port
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Server host
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &PathBuf,
    target: &str,
    output: &PathBuf,
    plots: Option<PathBuf>,
    cv_folds: usize,
    seed: u64,
) -> anyhow::Result<()> {
    section("Train");

    step_run("Loading data");
    let start = Instant::now();
    let df = DatasetLoader::new().load_csv(data_path)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        df.height(),
        df.width(),
        start.elapsed()
    ));

    let config = TrainerConfig::default()
        .with_target(target)
        .with_cv_folds(cv_folds)
        .with_random_seed(seed)
        .with_artifact_path(output.clone())
        .with_plots_dir(plots);

    step_run("Grid searching model families");
    let start = Instant::now();
    let (_, report) = Trainer::new(config).train(&df)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<20} {:>10} {:>10} {:>10} {:>9}",
        muted("Family"),
        muted("R²"),
        muted("RMSE"),
        muted("MAE"),
        muted("Time")
    );
    println!("  {}", dim(&"─".repeat(62)));
    for eval in &report.evaluations {
        println!(
            "  {:<20} {:>10.4} {:>10.2} {:>10.2} {:>8.1}s",
            eval.family.as_str(),
            eval.metrics.r2,
            eval.metrics.rmse,
            eval.metrics.mae,
            eval.training_time_secs
        );
    }
    println!("  {}", dim(&"─".repeat(62)));
    println!();
    println!(
        "  {} {} {}",
        ok("best"),
        report.best_family.as_str().white().bold(),
        dim(&format!("→ {}", report.artifact_path.display()))
    );
    println!();

    Ok(())
}

pub fn cmd_predict(
    model_path: &PathBuf,
    data_path: &PathBuf,
    output: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading artifact");
    let artifact = ArtifactStore::load(model_path)?;
    let family = artifact.model.family();
    let predictor = Predictor::new(Arc::new(artifact));
    step_done(family.as_str());

    let ext = data_path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let (df, predictions) = match ext {
        "json" => {
            let raw = std::fs::read_to_string(data_path)?;
            let values: Vec<serde_json::Value> = serde_json::from_str(&raw)?;
            let records: Vec<Record> = values
                .iter()
                .map(Record::from_json_value)
                .collect::<crate::error::Result<Vec<_>>>()?;

            step_run(&format!("Predicting {} records", records.len()));
            let predictions = predictor.predict_batch(&records)?;
            step_done("");
            (crate::record::records_to_df(&records)?, predictions)
        }
        _ => {
            let df = DatasetLoader::new().load_csv(data_path)?;
            step_run(&format!("Predicting {} records", df.height()));
            let predictions = predictor.predict_df(&df)?;
            step_done("");
            (df, predictions)
        }
    };

    // Labeled input also gets evaluated metrics
    if df.column("expenditure").is_ok() {
        let metrics = predictor.evaluate(&df, "expenditure")?;
        println!();
        println!(
            "  {:<12} {:.4}   {:<12} {:.2}",
            muted("R²"),
            metrics.r2,
            muted("RMSE"),
            metrics.rmse
        );
    }

    let mut result = df.clone();
    result.with_column(Series::new(
        "predicted_expenditure".into(),
        predictions.clone(),
    ))?;

    match output {
        Some(path) => {
            step_run(&format!("Saving → {}", path.display()));
            let mut file = std::fs::File::create(path)?;
            CsvWriter::new(&mut file).finish(&mut result)?;
            step_done(&format!("{} rows", result.height()));
        }
        None => {
            println!();
            for (i, value) in predictions.iter().take(10).enumerate() {
                println!("  {:<6} {:>12.2}", muted(&format!("#{}", i + 1)), value);
            }
            if predictions.len() > 10 {
                println!("  {}", dim(&format!("… {} more", predictions.len() - 10)));
            }
        }
    }

    println!();
    Ok(())
}

pub fn cmd_info(data_path: &PathBuf) -> anyhow::Result<()> {
    section("Data Info");

    let df = DatasetLoader::new().load_csv(data_path)?;

    println!("  {:<12} {}", muted("File"), data_path.display());
    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!();

    println!(
        "  {:<16} {:<12} {:>6} {:>8}",
        muted("Column"),
        muted("Type"),
        muted("Nulls"),
        muted("Unique")
    );
    println!("  {}", dim(&"─".repeat(48)));

    for col in df.get_columns() {
        println!(
            "  {:<16} {:<12} {:>6} {:>8}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count(),
            col.n_unique().unwrap_or(0)
        );
    }

    println!();
    Ok(())
}

pub async fn cmd_serve(
    model: &PathBuf,
    dataset: Option<PathBuf>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    section("Serve");
    println!("  {:<10} http://{}:{}/api/health", muted("Health"), host, port);
    println!("  {:<10} http://{}:{}/api/predict", muted("Predict"), host, port);
    println!("  {:<10} http://{}:{}/api/metrics", muted("Metrics"), host, port);
    println!();
    println!("  {}", dim("ctrl+c to stop"));
    println!();

    let config = ServerConfig {
        host: host.to_string(),
        port,
        artifact_path: model.clone(),
        dataset_path: dataset,
    };

    run_server(config).await?;
    Ok(())
}
