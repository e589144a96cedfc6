//! Wiring of config, providers and services behind each subcommand

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncWriteExt, BufReader};

use crate::{
    api::{create_router, AppState, SessionSettings},
    config::Config,
    error::{AppError, AppResult},
    models::{RoomDetails, RoomImage, RoomType},
    services::{
        catalog::{generate_catalog, StyleCatalog},
        collector::ImageCollector,
        curation::{curate_images, results_dir, write_report, CurationOptions},
        image_store::ImageStore,
        preferences::select_sample,
        providers::{OpenAiProvider, PexelsProvider},
        recommendation::{generate_recommendation, validate_room_image},
        session::QuizSession,
    },
};

use super::quiz::{format_recommendation, run_terminal_quiz};

/// Catalog size requested when `collect` finds no catalog file
pub const DEFAULT_GENERATED_STYLES: usize = 15;

/// Fills the image store, optionally generating a fresh catalog first
pub async fn run_collect(
    config: &Config,
    count: Option<usize>,
    style: Option<String>,
    generate_styles: Option<usize>,
) -> AppResult<()> {
    let count = count.unwrap_or(config.images_per_style);
    let catalog_path = config.catalog_path();

    let generate_styles = match generate_styles {
        None if !catalog_path.exists() => {
            tracing::info!(
                path = %catalog_path.display(),
                count = DEFAULT_GENERATED_STYLES,
                "No style catalog yet, generating one"
            );
            Some(DEFAULT_GENERATED_STYLES)
        }
        other => other,
    };

    let catalog = match generate_styles {
        Some(0) => {
            return Err(AppError::InvalidInput(
                "--generate-styles needs at least 1 style".to_string(),
            ))
        }
        Some(n) => {
            let model = OpenAiProvider::new(config)?;
            let catalog = generate_catalog(&model, n).await?;
            catalog.save(&catalog_path)?;
            println!("Saved {} styles to {}", catalog.len(), catalog_path.display());
            catalog
        }
        None => StyleCatalog::load(&catalog_path)?,
    };

    let provider = Arc::new(PexelsProvider::new(config)?);
    let store = ImageStore::new(&config.styles_dir);
    let collector = ImageCollector::new(provider, store, config.max_retries)
        .with_style_delay(config.style_delay());

    match style {
        Some(name) => {
            let style = catalog.get(&name).ok_or_else(|| {
                let known: Vec<&str> = catalog.list_styles().iter().map(|s| s.name.as_str()).collect();
                AppError::InvalidInput(format!(
                    "Unknown style '{}'. Known styles: {}",
                    name,
                    known.join(", ")
                ))
            })?;
            let images = collector.collect_images(style, count).await?;
            println!("{}: {} images", style.name, images.len());
        }
        None => {
            let report = collector.collect_all(&catalog, count).await?;
            for entry in &report.styles {
                match &entry.error {
                    Some(error) => println!("{}: failed ({})", entry.style, error),
                    None => println!(
                        "{}: {} images ({} new)",
                        entry.style, entry.images, entry.downloaded
                    ),
                }
            }
            println!(
                "Done: {} images across {} styles, {} downloaded",
                report.total_images(),
                report.styles.len(),
                report.total_downloaded()
            );
        }
    }

    Ok(())
}

/// Options for `abode quiz`
#[derive(Debug, Clone, Default)]
pub struct QuizOptions {
    pub sample_size: Option<usize>,
    pub seed: Option<u64>,
    pub room: Option<PathBuf>,
    pub room_type: RoomType,
    pub dimensions: Option<String>,
}

/// Runs the quiz on stdin/stdout, then optionally asks for recommendations
pub async fn run_quiz(config: &Config, options: QuizOptions) -> AppResult<()> {
    let catalog = StyleCatalog::load(&config.catalog_path())?;
    let store = ImageStore::new(&config.styles_dir);
    let images = store.scan(&catalog).await?;

    let sample_size = options.sample_size.unwrap_or(config.sample_size);
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let samples = select_sample(&catalog, &images, sample_size, &mut rng);
    let mut session = QuizSession::new(samples)?;

    // Read the room photo up front so a bad path fails before the quiz
    let room_image = match &options.room {
        Some(path) => Some(read_room_photo(path, config.max_upload_bytes).await?),
        None => None,
    };

    let mut stdout = tokio::io::stdout();
    let stdin = BufReader::new(tokio::io::stdin());
    let Some(_summary) = run_terminal_quiz(&mut session, store.root(), stdin, &mut stdout).await?
    else {
        return Ok(());
    };

    let Some(room_image) = room_image else {
        return Ok(());
    };

    let room = RoomDetails {
        room_type: options.room_type,
        dimensions: options.dimensions,
    };
    let request = session.begin_recommendation(room_image, room)?;
    let model = OpenAiProvider::new(config)?;

    stdout
        .write_all(b"\nAsking the designer about your room...\n")
        .await?;
    stdout.flush().await?;

    let recommendation = generate_recommendation(&model, &store, &request).await?;
    stdout
        .write_all(format_recommendation(&recommendation).as_bytes())
        .await?;
    stdout.flush().await?;
    Ok(())
}

async fn read_room_photo(path: &Path, max_bytes: usize) -> AppResult<RoomImage> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        AppError::InvalidInput(format!("Cannot read room photo {}: {}", path.display(), e))
    })?;
    validate_room_image(bytes, max_bytes)
}

/// Serves the web UI until interrupted
pub async fn run_serve(config: &Config, host: Option<String>, port: Option<u16>) -> AppResult<()> {
    let catalog = StyleCatalog::load(&config.catalog_path())?;
    let store = ImageStore::new(&config.styles_dir);

    let images = store.scan(&catalog).await?;
    if images.is_empty() {
        tracing::warn!("No style images cached yet; run `abode collect` before taking the quiz");
    }

    let model = Arc::new(OpenAiProvider::new(config)?);
    let state = AppState::new(catalog, store, model, SessionSettings::from(config));
    let app = create_router(state);

    let addr = format!(
        "{}:{}",
        host.unwrap_or_else(|| config.host.clone()),
        port.unwrap_or(config.port)
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Config(format!("Cannot listen on {}: {}", addr, e)))?;

    tracing::info!(addr = %addr, "Server running");
    println!("Abode is running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}

/// Reviews cached images and writes a JSON report
pub async fn run_curate(config: &Config, apply: bool, limit: Option<usize>) -> AppResult<()> {
    let catalog = StyleCatalog::load(&config.catalog_path())?;
    let store = ImageStore::new(&config.styles_dir);
    let model = OpenAiProvider::new(config)?;

    let options = CurationOptions {
        apply,
        limit,
        ..Default::default()
    };
    if !apply {
        println!("Dry run: rejected images are reported but kept. Pass --apply to delete them.");
    }

    let report = curate_images(&model, &store, &catalog, &options).await?;
    let path = write_report(&report, &results_dir(&config.styles_dir)).await?;

    println!(
        "Processed {} images: {} kept, {} {}, {} errors",
        report.total_processed,
        report.kept,
        report.removed,
        if apply { "removed" } else { "would be removed" },
        report.errors
    );
    println!("Report: {}", path.display());
    Ok(())
}
