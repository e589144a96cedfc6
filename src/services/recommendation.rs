use std::time::Instant;

use crate::{
    error::{AppError, AppResult},
    models::{
        ImageRef, PreferenceSummary, Recommendation, RecommendationRequest, RoomImage,
        SectionKind, SummaryBasis,
    },
    services::{
        image_store::{sniff_image, ImageStore},
        providers::{ChatMessage, ChatRequest, ContentPart, VisionModel},
    },
};

/// Quiz images attached as visual references, liked ones first
const MAX_REFERENCE_IMAGES: usize = 6;
const LIKED_IMAGES_LABEL: &str = "ROOM IMAGES I LIKED:";
const DISLIKED_IMAGES_LABEL: &str = "ROOM IMAGES I DISLIKED:";
const RECOMMENDATION_MAX_TOKENS: u32 = 3000;

const SYSTEM_PROMPT: &str = "You are an expert interior designer with extensive knowledge of \
furniture styles, color theory, and spatial arrangement. You analyze a photo of a user's room \
together with their style preferences and give concrete, practical furnishing advice.";

/// Describes the user's taste for the prompt
pub fn describe_preferences(summary: &PreferenceSummary) -> String {
    match summary.basis {
        SummaryBasis::Liked => {
            let liked: Vec<String> = summary
                .ranked
                .iter()
                .map(|s| format!("{} ({} of {} liked)", s.style_name, s.likes, s.total()))
                .collect();
            let mut text = format!(
                "Styles I liked, strongest first: {}.",
                liked.join(", ")
            );
            if !summary.disliked.is_empty() {
                text.push_str(&format!(
                    " Styles I disliked: {}.",
                    summary.disliked.join(", ")
                ));
            }
            text
        }
        SummaryBasis::NoLikes => {
            let seen: Vec<&str> = summary.ranked.iter().map(|s| s.style_name.as_str()).collect();
            format!(
                "I did not like any of the example styles I was shown ({}). Avoid leaning on \
                 them and suggest a direction that suits the room itself.",
                seen.join(", ")
            )
        }
        SummaryBasis::NoVotes => {
            "I have not expressed any style preference; suggest a direction that suits the room."
                .to_string()
        }
    }
}

/// Text part of the user message
pub fn build_prompt(request: &RecommendationRequest, liked: usize, disliked: usize) -> String {
    let mut prompt = format!("Here is a photo of my {}", request.room.room_type.label().to_lowercase());
    if let Some(dimensions) = request
        .room
        .dimensions
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
    {
        prompt.push_str(&format!(" (dimensions: {})", dimensions));
    }
    prompt.push_str(".\n\n");
    prompt.push_str(&describe_preferences(&request.summary));

    let groups: Vec<String> = [
        (liked, "liked", LIKED_IMAGES_LABEL),
        (disliked, "disliked", DISLIKED_IMAGES_LABEL),
    ]
    .into_iter()
    .filter(|(count, _, _)| *count > 0)
    .map(|(count, verb, label)| {
        format!("{} example room image(s) I {} (after \"{}\")", count, verb, label)
    })
    .collect();
    if !groups.is_empty() {
        prompt.push_str(&format!(
            "\n\nAfter the room photo you will find {}.",
            groups.join(" and ")
        ));
    }

    prompt.push_str(&format!(
        "\n\nAnswer in exactly three sections, each starting with its heading on its own line:\n\
         {}: how my preferences translate into colors, materials and mood.\n\
         {}: what you see in my room (layout, light, existing features, constraints).\n\
         {}: specific furniture and decor items to add, with placement suggestions.",
        SectionKind::StyleAnalysis.marker(),
        SectionKind::RoomAnalysis.marker(),
        SectionKind::Recommendations.marker(),
    ));

    prompt
}

/// Checks an uploaded room photo and detects its type
pub fn validate_room_image(bytes: Vec<u8>, max_bytes: usize) -> AppResult<RoomImage> {
    if bytes.is_empty() {
        return Err(AppError::InvalidInput("Room image is empty".to_string()));
    }
    if bytes.len() > max_bytes {
        return Err(AppError::InvalidInput(format!(
            "Room image is {} bytes; the limit is {} bytes",
            bytes.len(),
            max_bytes
        )));
    }
    let kind = sniff_image(&bytes).ok_or_else(|| {
        AppError::InvalidInput("Room image must be a JPEG, PNG or WebP file".to_string())
    })?;

    Ok(RoomImage {
        bytes,
        mime_type: kind.mime_type.to_string(),
    })
}

/// Reads up to `limit` stored quiz images, skipping any that cannot be attached
async fn load_references(store: &ImageStore, images: &[ImageRef], limit: usize) -> Vec<ContentPart> {
    let mut references = Vec::new();
    for image in images {
        if references.len() >= limit {
            break;
        }
        match store.read_image(image).await {
            Ok(data) => match sniff_image(&data) {
                Some(kind) => references.push(ContentPart::Image {
                    mime_type: kind.mime_type.to_string(),
                    data,
                }),
                None => tracing::warn!(file = %image.file_name, "Skipping unrecognized style image"),
            },
            Err(e) => {
                tracing::warn!(error = %e, file = %image.file_name, "Skipping unreadable style image")
            }
        }
    }
    references
}

async fn build_chat_request(store: &ImageStore, request: &RecommendationRequest) -> ChatRequest {
    let liked = load_references(store, &request.liked_images, MAX_REFERENCE_IMAGES).await;
    let disliked = load_references(
        store,
        &request.disliked_images,
        MAX_REFERENCE_IMAGES - liked.len(),
    )
    .await;

    let mut content = vec![
        ContentPart::Text(build_prompt(request, liked.len(), disliked.len())),
        ContentPart::Image {
            mime_type: request.room_image.mime_type.clone(),
            data: request.room_image.bytes.clone(),
        },
    ];
    for (label, group) in [(LIKED_IMAGES_LABEL, liked), (DISLIKED_IMAGES_LABEL, disliked)] {
        if !group.is_empty() {
            content.push(ContentPart::Text(label.to_string()));
            content.extend(group);
        }
    }

    ChatRequest::new(
        vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(content)],
        RECOMMENDATION_MAX_TOKENS,
    )
}

/// Sends one room + preferences request and sections the answer
///
/// Service failures are returned as-is; a response without the expected
/// headings still produces a `Recommendation::Raw`.
pub async fn generate_recommendation(
    model: &dyn VisionModel,
    store: &ImageStore,
    request: &RecommendationRequest,
) -> AppResult<Recommendation> {
    let start = Instant::now();
    let chat = build_chat_request(store, request).await;

    tracing::info!(
        model = %model.name(),
        room_type = %request.room.room_type,
        top_style = request.summary.top_style().unwrap_or("none"),
        references = chat.messages.iter().map(ChatMessage::image_count).sum::<usize>() - 1,
        "Requesting recommendation"
    );

    let text = model.complete(chat).await?;
    let recommendation = parse_recommendation(&text);

    tracing::info!(
        structured = recommendation.is_structured(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Recommendation generated"
    );

    Ok(recommendation)
}

/// Recognizes a section heading, ignoring markdown decoration and numbering
fn match_marker(line: &str) -> Option<SectionKind> {
    let mut text = line.trim();
    text = text.trim_start_matches('#').trim();
    text = text.trim_matches(|c: char| c == '*' || c == '_').trim();

    // "1. STYLE ANALYSIS" / "1) Style Analysis"
    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &text[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            text = stripped.trim();
        }
    }

    text = text.trim_end_matches(':').trim();
    text = text.trim_matches(|c: char| c == '*' || c == '_').trim();
    text = text.trim_end_matches(':').trim();

    SectionKind::ALL
        .into_iter()
        .find(|kind| text.eq_ignore_ascii_case(kind.marker()))
}

fn split_sections(text: &str) -> AppResult<[String; 3]> {
    let mut sections: [Option<String>; 3] = [None, None, None];
    let mut current: Option<usize> = None;

    for line in text.lines() {
        if let Some(kind) = match_marker(line) {
            let index = SectionKind::ALL
                .iter()
                .position(|k| *k == kind)
                .unwrap_or_default();
            sections[index].get_or_insert_with(String::new);
            current = Some(index);
            continue;
        }
        if let Some(index) = current {
            if let Some(body) = sections[index].as_mut() {
                body.push_str(line);
                body.push('\n');
            }
        }
    }

    let mut found = Vec::with_capacity(3);
    for (kind, section) in SectionKind::ALL.iter().zip(sections) {
        match section.map(|body| body.trim().to_string()) {
            Some(body) if !body.is_empty() => found.push(body),
            _ => {
                return Err(AppError::Parse(format!(
                    "Response has no '{}' section",
                    kind.marker()
                )))
            }
        }
    }

    found
        .try_into()
        .map_err(|_| AppError::Internal("Section count mismatch".to_string()))
}

/// Splits a response into its three sections, or keeps it raw
pub fn parse_recommendation(text: &str) -> Recommendation {
    match split_sections(text) {
        Ok([style_analysis, room_analysis, recommendations]) => Recommendation::Structured {
            style_analysis,
            room_analysis,
            recommendations,
            raw: text.to_string(),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Showing unsectioned recommendation");
            Recommendation::Raw {
                text: text.to_string(),
            }
        }
    }
}
