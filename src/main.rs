use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use abode::{
    cli::{
        commands::{run_collect, run_curate, run_quiz, run_serve, QuizOptions},
        Cli, Command,
    },
    config::Config,
    error::AppError,
};

const DEFAULT_FILTER: &str = "abode=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins; otherwise -v raises the level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new(DEFAULT_FILTER),
        1 => EnvFilter::new("abode=debug,tower_http=debug"),
        _ => EnvFilter::new("abode=trace,tower_http=trace"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Keys are checked before any client exists
    let config = Config::from_env().map_err(exit_message)?;

    let result = match cli.command {
        Command::Collect {
            count,
            style,
            generate_styles,
        } => run_collect(&config, count, style, generate_styles).await,
        Command::Quiz {
            sample_size,
            seed,
            room,
            room_type,
            dimensions,
        } => {
            let options = QuizOptions {
                sample_size,
                seed,
                room,
                room_type,
                dimensions,
            };
            run_quiz(&config, options).await
        }
        Command::Serve { host, port } => run_serve(&config, host, port).await,
        Command::Curate { apply, limit } => run_curate(&config, apply, limit).await,
    };

    result.map_err(exit_message)
}

fn exit_message(error: AppError) -> anyhow::Error {
    tracing::error!(kind = error.kind(), error = %error, "Command failed");
    match error {
        AppError::Auth(_) => anyhow::anyhow!(
            "{}. Check OPENAI_API_KEY and PEXELS_API_KEY in your environment or .env file.",
            error
        ),
        other => other.into(),
    }
}
