use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::{
    error::{AppError, AppResult},
    models::ImageRef,
    services::{
        catalog::StyleCatalog,
        image_store::{sniff_image, ImageStore},
        providers::{ChatMessage, ChatRequest, ContentPart, VisionModel},
    },
};

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_secs(3);
pub const RESULTS_DIR: &str = "image_evaluation_results";

const EVALUATION_TEMPERATURE: f32 = 0.1;
const VERDICT_MAX_TOKENS: u32 = 50;
const REASON_MAX_TOKENS: u32 = 100;

const EVALUATION_SYSTEM_PROMPT: &str = r#"You are an expert interior designer evaluating images for an interior design AI assistant.
Your task is to determine if an image is a high-quality, relevant interior design reference image.

Evaluate the image on these criteria:
1. Does it clearly show a room interior?
2. Is it relevant to interior design (shows furniture, decor, layout)?
3. Is it high quality enough to be useful as a reference?
4. Does it appear to be a professionally designed space?

Reply with ONLY ONE of these values:
- "YES" - If the image is a good, relevant interior design reference
- "NO" - If the image is not relevant, unclear, or too low quality"#;

const EVALUATION_PROMPT: &str =
    "Evaluate if this image is a good, relevant interior design reference picture. Answer with ONLY 'YES' or 'NO'.";
const REASON_PROMPT: &str = "Why is this image not suitable? Give a brief reason in one sentence.";

#[derive(Debug, Clone)]
pub struct CurationOptions {
    /// Delete rejected images; otherwise only report them
    pub apply: bool,
    pub limit: Option<usize>,
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Default for CurationOptions {
    fn default() -> Self {
        Self {
            apply: false,
            limit: None,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }
}

/// The model's judgement of one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub keep: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StyleTally {
    pub total: usize,
    pub kept: usize,
    pub removed: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RejectedImage {
    pub style: String,
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CurationReport {
    pub total_processed: usize,
    pub kept: usize,
    pub removed: usize,
    pub errors: usize,
    pub dry_run: bool,
    pub by_style: BTreeMap<String, StyleTally>,
    pub rejected: Vec<RejectedImage>,
}

impl CurationReport {
    fn tally(&mut self, style: &str) -> &mut StyleTally {
        self.by_style.entry(style.to_string()).or_default()
    }

    fn record_error(&mut self, style: &str) {
        self.errors += 1;
        self.tally(style).errors += 1;
    }
}

/// Asks the model whether an image is a usable interior reference
///
/// A `NO` triggers a follow-up for a one-sentence reason. An answer that is
/// neither counts as a rejection.
pub async fn evaluate_image(
    model: &dyn VisionModel,
    bytes: &[u8],
    mime_type: &str,
) -> AppResult<Verdict> {
    let mut messages = vec![
        ChatMessage::system(EVALUATION_SYSTEM_PROMPT),
        ChatMessage::user(vec![
            ContentPart::Text(EVALUATION_PROMPT.to_string()),
            ContentPart::Image {
                mime_type: mime_type.to_string(),
                data: bytes.to_vec(),
            },
        ]),
    ];

    let answer = model
        .complete(
            ChatRequest::new(messages.clone(), VERDICT_MAX_TOKENS)
                .with_temperature(EVALUATION_TEMPERATURE),
        )
        .await?
        .trim()
        .to_uppercase();

    if answer.contains("YES") {
        return Ok(Verdict {
            keep: true,
            reason: "Good quality interior design image".to_string(),
        });
    }

    if !answer.contains("NO") {
        return Ok(Verdict {
            keep: false,
            reason: format!("Unclear evaluation: {}", answer),
        });
    }

    messages.push(ChatMessage::assistant(answer));
    messages.push(ChatMessage::user_text(REASON_PROMPT));
    let reason = model
        .complete(ChatRequest::new(messages, REASON_MAX_TOKENS))
        .await?
        .trim()
        .to_string();

    Ok(Verdict {
        keep: false,
        reason,
    })
}

/// Reviews every cached image, removing rejects when `options.apply` is set
///
/// Per-image failures are counted and the run continues; an auth failure
/// aborts since every following call would fail the same way.
pub async fn curate_images(
    model: &dyn VisionModel,
    store: &ImageStore,
    catalog: &StyleCatalog,
    options: &CurationOptions,
) -> AppResult<CurationReport> {
    let mut report = CurationReport {
        dry_run: !options.apply,
        ..Default::default()
    };
    let batch_size = options.batch_size.max(1);

    'styles: for style in catalog.list_styles() {
        let images = store.list_images(&style.name).await?;
        tracing::info!(style = %style.name, images = images.len(), "Curating style");
        report.tally(&style.name);

        for image in images {
            if options.limit.is_some_and(|limit| report.total_processed >= limit) {
                tracing::info!(limit = ?options.limit, "Image limit reached");
                break 'styles;
            }

            if report.total_processed > 0 && report.total_processed % batch_size == 0 {
                tracing::debug!(delay = ?options.batch_delay, "Pausing between batches");
                tokio::time::sleep(options.batch_delay).await;
            }

            report.total_processed += 1;
            report.tally(&style.name).total += 1;

            match review_image(model, store, &image).await {
                Ok(verdict) if verdict.keep => {
                    tracing::info!(file = %image.file_name, reason = %verdict.reason, "Keeping image");
                    report.kept += 1;
                    report.tally(&style.name).kept += 1;
                }
                Ok(verdict) => {
                    tracing::info!(file = %image.file_name, reason = %verdict.reason, "Rejecting image");
                    if options.apply {
                        if let Err(e) = store.remove_image(&image).await {
                            tracing::error!(error = %e, file = %image.file_name, "Could not delete image");
                            report.record_error(&style.name);
                            continue;
                        }
                    }
                    report.removed += 1;
                    report.tally(&style.name).removed += 1;
                    report.rejected.push(RejectedImage {
                        style: style.name.clone(),
                        file_name: image.file_name.clone(),
                        reason: verdict.reason,
                    });
                }
                Err(e @ AppError::Auth(_)) => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, file = %image.file_name, "Image evaluation failed");
                    report.record_error(&style.name);
                }
            }
        }

        let tally = report.tally(&style.name).clone();
        tracing::info!(
            style = %style.name,
            kept = tally.kept,
            removed = tally.removed,
            errors = tally.errors,
            "Style curated"
        );
    }

    tracing::info!(
        total = report.total_processed,
        kept = report.kept,
        removed = report.removed,
        errors = report.errors,
        dry_run = report.dry_run,
        "Curation complete"
    );

    Ok(report)
}

async fn review_image(
    model: &dyn VisionModel,
    store: &ImageStore,
    image: &ImageRef,
) -> AppResult<Verdict> {
    let bytes = store.read_image(image).await?;
    let kind = sniff_image(&bytes).ok_or_else(|| {
        AppError::InvalidInput(format!("{} is not a supported image", image.file_name))
    })?;
    evaluate_image(model, &bytes, kind.mime_type).await
}

/// Results directory next to the styles directory
pub fn results_dir(styles_dir: &Path) -> PathBuf {
    styles_dir
        .parent()
        .map(|parent| parent.join(RESULTS_DIR))
        .unwrap_or_else(|| PathBuf::from(RESULTS_DIR))
}

/// Writes the report as timestamped JSON and returns its path
pub async fn write_report(report: &CurationReport, dir: &Path) -> AppResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!(
        "evaluation_results_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let json =
        serde_json::to_string_pretty(report).map_err(|e| AppError::Internal(e.to_string()))?;
    tokio::fs::write(&path, json).await?;

    tracing::info!(path = %path.display(), "Curation report written");
    Ok(path)
}
