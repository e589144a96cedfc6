//! Terminal rendition of the swipe quiz

use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    error::AppResult,
    models::{PreferenceSummary, Recommendation, SectionKind, SummaryBasis},
    services::session::QuizSession,
};

enum Answer {
    Like,
    Dislike,
    Quit,
}

fn parse_answer(line: &str) -> Option<Answer> {
    match line.trim().to_lowercase().as_str() {
        "y" | "yes" | "l" | "like" => Some(Answer::Like),
        "n" | "no" | "d" | "dislike" => Some(Answer::Dislike),
        "q" | "quit" => Some(Answer::Quit),
        _ => None,
    }
}

/// Walks the user through every sample, reading one answer per line
///
/// Returns the summary once all samples have votes, or `None` when the user
/// quits or input ends early.
pub async fn run_terminal_quiz<R, W>(
    session: &mut QuizSession,
    images_root: &Path,
    mut input: R,
    output: &mut W,
) -> AppResult<Option<PreferenceSummary>>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let total = session.samples().len();
    output
        .write_all(
            format!(
                "Let's find your style. {} rooms follow; answer y (like), n (dislike) or q (quit).\n",
                total
            )
            .as_bytes(),
        )
        .await?;

    while let Some(index) = session.next_unvoted() {
        let sample = &session.samples()[index];
        let mut card = format!(
            "\n[{}/{}] {}\n",
            index + 1,
            total,
            sample.style.name
        );
        if !sample.style.description.is_empty() {
            card.push_str(&format!("  {}\n", sample.style.description));
        }
        card.push_str(&format!(
            "  {}\n",
            sample.image.path(images_root).display()
        ));
        output.write_all(card.as_bytes()).await?;

        let answer = loop {
            output.write_all(b"Like it? [y/n/q] ").await?;
            output.flush().await?;

            let mut line = String::new();
            if input.read_line(&mut line).await? == 0 {
                tracing::info!(session_id = %session.id, "Input closed before the quiz finished");
                return Ok(None);
            }
            match parse_answer(&line) {
                Some(answer) => break answer,
                None => output.write_all(b"Please answer y, n or q.\n").await?,
            }
        };

        let liked = match answer {
            Answer::Like => true,
            Answer::Dislike => false,
            Answer::Quit => {
                output.write_all(b"Quiz abandoned.\n").await?;
                return Ok(None);
            }
        };
        session.record_vote(index, liked)?;
    }

    let summary = session.summary().cloned();
    if let Some(summary) = &summary {
        output.write_all(format_summary(summary).as_bytes()).await?;
    }
    output.flush().await?;
    Ok(summary)
}

/// Human-readable quiz result
pub fn format_summary(summary: &PreferenceSummary) -> String {
    let mut text = String::from("\nYour style profile\n");
    match summary.basis {
        SummaryBasis::Liked => {
            for (rank, score) in summary.ranked.iter().enumerate() {
                text.push_str(&format!(
                    "  {}. {} ({}/{} liked)\n",
                    rank + 1,
                    score.style_name,
                    score.likes,
                    score.total()
                ));
            }
        }
        SummaryBasis::NoLikes => {
            text.push_str("  You didn't like any of these styles. Recommendations will follow your room instead.\n");
        }
        SummaryBasis::NoVotes => text.push_str("  No votes recorded.\n"),
    }
    if !summary.disliked.is_empty() {
        text.push_str(&format!("  Not for you: {}\n", summary.disliked.join(", ")));
    }
    text
}

/// Recommendation laid out under its section headings
pub fn format_recommendation(recommendation: &Recommendation) -> String {
    match recommendation {
        Recommendation::Structured { .. } => SectionKind::ALL
            .iter()
            .filter_map(|kind| {
                recommendation
                    .section(*kind)
                    .map(|body| format!("\n== {} ==\n{}\n", kind.marker(), body))
            })
            .collect(),
        Recommendation::Raw { text } => format!("\n{}\n", text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ImageRef, SampleItem, StyleDefinition};

    fn session() -> QuizSession {
        let samples = ["Japanese Zen", "Industrial Loft", "Coastal"]
            .into_iter()
            .map(|name| SampleItem {
                style: StyleDefinition::new(name, format!("{} description", name), &["k"]),
                image: ImageRef::new(name, "k_1.jpg"),
            })
            .collect();
        QuizSession::new(samples).unwrap()
    }

    #[tokio::test]
    async fn test_full_quiz() {
        let mut session = session();
        let mut output = Vec::new();

        let summary = run_terminal_quiz(
            &mut session,
            Path::new("room_styles"),
            &b"y\nmaybe\nn\nNO\n"[..],
            &mut output,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(summary.top_style(), Some("Japanese Zen"));
        let printed = String::from_utf8(output).unwrap();
        assert!(printed.contains("[1/3] Japanese Zen"));
        assert!(printed.contains("room_styles/japanese_zen/k_1.jpg"));
        assert!(printed.contains("Please answer y, n or q."));
        assert!(printed.contains("1. Japanese Zen (1/1 liked)"));
        assert!(printed.contains("Not for you: Industrial Loft, Coastal"));
    }

    #[tokio::test]
    async fn test_quit_abandons() {
        let mut session = session();
        let mut output = Vec::new();

        let summary = run_terminal_quiz(&mut session, Path::new("."), &b"y\nq\n"[..], &mut output)
            .await
            .unwrap();
        assert!(summary.is_none());
        assert_eq!(session.votes().len(), 1);
    }

    #[test]
    fn test_input_closed_early() {
        let mut session = session();
        let mut output = Vec::new();

        let summary = tokio_test::block_on(run_terminal_quiz(
            &mut session,
            Path::new("."),
            &b"n\n"[..],
            &mut output,
        ))
        .unwrap();
        assert!(summary.is_none());
    }

    #[test]
    fn test_all_dislikes_summary_text() {
        let summary = PreferenceSummary {
            ranked: Vec::new(),
            disliked: vec!["Coastal".into()],
            basis: SummaryBasis::NoLikes,
        };
        let text = format_summary(&summary);
        assert!(text.contains("didn't like any"));
        assert!(text.contains("Coastal"));
    }

    #[test]
    fn test_format_recommendation() {
        let structured = Recommendation::Structured {
            style_analysis: "Warm minimalism".into(),
            room_analysis: "Bright, narrow".into(),
            recommendations: "Add a rug".into(),
            raw: String::new(),
        };
        let text = format_recommendation(&structured);
        assert!(text.contains("== STYLE ANALYSIS ==\nWarm minimalism"));
        assert!(text.contains("== RECOMMENDATIONS ==\nAdd a rug"));

        let raw = Recommendation::Raw {
            text: "Just paint it".into(),
        };
        assert_eq!(format_recommendation(&raw), "\nJust paint it\n");
    }
}
