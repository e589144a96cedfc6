use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ImageRef, StyleDefinition};

/// One style image offered to the user during the quiz
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleItem {
    pub style: StyleDefinition,
    pub image: ImageRef,
}

/// A single like/dislike answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferenceVote {
    pub style_name: String,
    pub image: ImageRef,
    pub liked: bool,
    pub voted_at: DateTime<Utc>,
}

impl PreferenceVote {
    pub fn new(style_name: impl Into<String>, image: ImageRef, liked: bool) -> Self {
        Self {
            style_name: style_name.into(),
            image,
            liked,
            voted_at: Utc::now(),
        }
    }

    /// Vote on a quiz sample
    pub fn for_sample(sample: &SampleItem, liked: bool) -> Self {
        Self::new(sample.style.name.clone(), sample.image.clone(), liked)
    }
}

/// Append-only record of the votes cast in one quiz
///
/// Recording a vote yields a new history; existing histories never change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VoteHistory {
    votes: Vec<PreferenceVote>,
}

impl VoteHistory {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn record(&self, vote: PreferenceVote) -> Self {
        let mut votes = self.votes.clone();
        votes.push(vote);
        Self { votes }
    }

    pub fn votes(&self) -> &[PreferenceVote] {
        &self.votes
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Images the user liked, in voting order
    pub fn liked_images(&self) -> Vec<ImageRef> {
        self.votes
            .iter()
            .filter(|v| v.liked)
            .map(|v| v.image.clone())
            .collect()
    }

    /// Images the user disliked, in voting order
    pub fn disliked_images(&self) -> Vec<ImageRef> {
        self.votes
            .iter()
            .filter(|v| !v.liked)
            .map(|v| v.image.clone())
            .collect()
    }
}

impl FromIterator<PreferenceVote> for VoteHistory {
    fn from_iter<I: IntoIterator<Item = PreferenceVote>>(iter: I) -> Self {
        Self {
            votes: iter.into_iter().collect(),
        }
    }
}

/// Like/dislike tally for one style
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StyleScore {
    pub style_name: String,
    pub likes: u32,
    pub dislikes: u32,
}

impl StyleScore {
    pub fn total(&self) -> u32 {
        self.likes + self.dislikes
    }
}

/// What the ranking in a summary is based on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SummaryBasis {
    /// At least one style was liked; `ranked` holds liked styles only
    Liked,
    /// Every vote was a dislike; `ranked` holds all voted styles in first-seen order
    NoLikes,
    /// Nothing was voted on
    NoVotes,
}

/// Aggregated preferences passed to the recommendation generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferenceSummary {
    pub ranked: Vec<StyleScore>,
    pub disliked: Vec<String>,
    pub basis: SummaryBasis,
}

impl PreferenceSummary {
    /// Best liked style, if the user liked anything
    pub fn top_style(&self) -> Option<&str> {
        match self.basis {
            SummaryBasis::Liked => self.ranked.first().map(|s| s.style_name.as_str()),
            SummaryBasis::NoLikes | SummaryBasis::NoVotes => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(style: &str, liked: bool) -> PreferenceVote {
        PreferenceVote::new(style, ImageRef::new(style, "1.jpg"), liked)
    }

    #[test]
    fn test_record_leaves_original_untouched() {
        let empty = VoteHistory::new();
        let one = empty.record(vote("Boho", true));
        let two = one.record(vote("Industrial", false));

        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert_eq!(two.len(), 2);
        assert_eq!(two.liked_images(), vec![ImageRef::new("Boho", "1.jpg")]);
        assert_eq!(two.disliked_images(), vec![ImageRef::new("Industrial", "1.jpg")]);
    }

    #[test]
    fn test_top_style_requires_likes() {
        let summary = PreferenceSummary {
            ranked: vec![StyleScore {
                style_name: "Boho".into(),
                likes: 0,
                dislikes: 1,
            }],
            disliked: vec!["Boho".into()],
            basis: SummaryBasis::NoLikes,
        };
        assert_eq!(summary.top_style(), None);
    }

    #[test]
    fn test_summary_basis_serialization() {
        let json = serde_json::to_string(&SummaryBasis::NoLikes).unwrap();
        assert_eq!(json, "\"no_likes\"");
    }
}
