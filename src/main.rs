//! cardspend — Main entry point

use cardspend::cli::{cmd_info, cmd_predict, cmd_serve, cmd_train, Cli, Commands};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cardspend=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            data,
            target,
            output,
            plots,
            cv_folds,
            seed,
        } => {
            cmd_train(&data, &target, &output, plots, cv_folds, seed)?;
        }
        Commands::Predict {
            model,
            data,
            output,
        } => {
            cmd_predict(&model, &data, output.as_deref())?;
        }
        Commands::Info { data } => {
            cmd_info(&data)?;
        }
        Commands::Serve {
            model,
            dataset,
            port,
            host,
        } => {
            cmd_serve(&model, dataset, &host, port).await?;
        }
    }

    Ok(())
}
