use std::cmp::Ordering;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::{
    models::{
        PreferenceSummary, SampleItem, StyleDefinition, StyleImageSet, StyleScore, SummaryBasis,
        VoteHistory,
    },
    services::catalog::StyleCatalog,
};

/// Picks up to `sample_size` distinct styles at random, one random image each
///
/// Styles without cached images are skipped. Fewer than `sample_size` items
/// are returned when not enough styles are eligible.
pub fn select_sample<R: Rng + ?Sized>(
    catalog: &StyleCatalog,
    images: &StyleImageSet,
    sample_size: usize,
    rng: &mut R,
) -> Vec<SampleItem> {
    let eligible: Vec<&StyleDefinition> = catalog
        .list_styles()
        .iter()
        .filter(|style| images.has_images(&style.name))
        .collect();

    let skipped = catalog.len() - eligible.len();
    if skipped > 0 {
        tracing::debug!(skipped, "Styles without images left out of the sample");
    }

    let chosen: Vec<&StyleDefinition> = eligible
        .choose_multiple(rng, sample_size)
        .copied()
        .collect();

    chosen
        .into_iter()
        .filter_map(|style| {
            images
                .images_for(&style.name)
                .choose(rng)
                .map(|image| SampleItem {
                    style: style.clone(),
                    image: image.clone(),
                })
        })
        .collect()
}

/// Compares like ratios exactly: a.likes / a.total vs b.likes / b.total
fn compare_ratio(a: &StyleScore, b: &StyleScore) -> Ordering {
    let left = a.likes as u64 * b.total() as u64;
    let right = b.likes as u64 * a.total() as u64;
    left.cmp(&right)
}

/// Aggregates a vote history into a ranked preference summary
///
/// Liked styles are ranked by like ratio, then by like count; remaining ties
/// keep the order in which the styles were first voted on. When nothing was
/// liked, every voted style is returned in first-seen order with
/// `SummaryBasis::NoLikes`.
pub fn summarize(history: &VoteHistory) -> PreferenceSummary {
    let mut scores: Vec<StyleScore> = Vec::new();
    for vote in history.votes() {
        let index = match scores.iter().position(|s| s.style_name == vote.style_name) {
            Some(index) => index,
            None => {
                scores.push(StyleScore {
                    style_name: vote.style_name.clone(),
                    likes: 0,
                    dislikes: 0,
                });
                scores.len() - 1
            }
        };
        if vote.liked {
            scores[index].likes += 1;
        } else {
            scores[index].dislikes += 1;
        }
    }

    if scores.is_empty() {
        return PreferenceSummary {
            ranked: Vec::new(),
            disliked: Vec::new(),
            basis: SummaryBasis::NoVotes,
        };
    }

    let disliked: Vec<String> = scores
        .iter()
        .filter(|s| s.likes == 0 && s.dislikes > 0)
        .map(|s| s.style_name.clone())
        .collect();

    let mut liked: Vec<StyleScore> = scores.iter().filter(|s| s.likes > 0).cloned().collect();
    if liked.is_empty() {
        return PreferenceSummary {
            ranked: scores,
            disliked,
            basis: SummaryBasis::NoLikes,
        };
    }

    // sort_by is stable, so equal scores stay in first-seen order
    liked.sort_by(|a, b| compare_ratio(b, a).then(b.likes.cmp(&a.likes)));

    PreferenceSummary {
        ranked: liked,
        disliked,
        basis: SummaryBasis::Liked,
    }
}
