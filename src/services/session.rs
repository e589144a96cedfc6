use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        PreferenceSummary, PreferenceVote, Recommendation, RecommendationRequest, RoomDetails,
        RoomImage, SampleItem, VoteHistory,
    },
    services::preferences::summarize,
};

/// Result shown on the final screen, success or not
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecommendationOutcome {
    Completed { recommendation: Recommendation },
    Failed { kind: String, message: String },
}

impl From<AppResult<Recommendation>> for RecommendationOutcome {
    fn from(result: AppResult<Recommendation>) -> Self {
        match result {
            Ok(recommendation) => RecommendationOutcome::Completed { recommendation },
            Err(e) => RecommendationOutcome::Failed {
                kind: e.kind().to_string(),
                message: e.to_string(),
            },
        }
    }
}

/// Where a quiz session is in its linear flow
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStage {
    ShowingStyleSamples,
    CollectingUploadedRoom {
        summary: PreferenceSummary,
    },
    /// A room was accepted and the model call is in flight
    GeneratingRecommendation {
        summary: PreferenceSummary,
    },
    DisplayingResults {
        summary: PreferenceSummary,
        room: RoomDetails,
        outcome: RecommendationOutcome,
    },
}

impl SessionStage {
    pub fn name(&self) -> &'static str {
        match self {
            SessionStage::ShowingStyleSamples => "showing_style_samples",
            SessionStage::CollectingUploadedRoom { .. } => "collecting_uploaded_room",
            SessionStage::GeneratingRecommendation { .. } => "generating_recommendation",
            SessionStage::DisplayingResults { .. } => "displaying_results",
        }
    }
}

/// One run of swipe quiz → room upload → generation → results
///
/// Stages only move forward; a new session starts over.
#[derive(Debug, Clone)]
pub struct QuizSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    samples: Vec<SampleItem>,
    votes: VoteHistory,
    stage: SessionStage,
}

impl QuizSession {
    pub fn new(samples: Vec<SampleItem>) -> AppResult<Self> {
        if samples.is_empty() {
            return Err(AppError::Config(
                "No style images are available. Run `abode collect` to download them first."
                    .to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            samples,
            votes: VoteHistory::new(),
            stage: SessionStage::ShowingStyleSamples,
        })
    }

    pub fn samples(&self) -> &[SampleItem] {
        &self.samples
    }

    pub fn votes(&self) -> &VoteHistory {
        &self.votes
    }

    pub fn stage(&self) -> &SessionStage {
        &self.stage
    }

    pub fn summary(&self) -> Option<&PreferenceSummary> {
        match &self.stage {
            SessionStage::ShowingStyleSamples => None,
            SessionStage::CollectingUploadedRoom { summary }
            | SessionStage::GeneratingRecommendation { summary }
            | SessionStage::DisplayingResults { summary, .. } => Some(summary),
        }
    }

    /// Whether the sample at `index` already has a vote
    pub fn is_voted(&self, index: usize) -> bool {
        self.samples
            .get(index)
            .map(|sample| self.votes.votes().iter().any(|v| v.image == sample.image))
            .unwrap_or(false)
    }

    /// First sample still waiting for a vote
    pub fn next_unvoted(&self) -> Option<usize> {
        (0..self.samples.len()).find(|&index| !self.is_voted(index))
    }

    /// Records a like/dislike; the last vote moves the session to room upload
    pub fn record_vote(&mut self, index: usize, liked: bool) -> AppResult<&SessionStage> {
        if self.stage != SessionStage::ShowingStyleSamples {
            return Err(AppError::InvalidState(format!(
                "Votes are closed; session is in stage '{}'",
                self.stage.name()
            )));
        }

        let sample = self.samples.get(index).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Sample index {} is out of range (0..{})",
                index,
                self.samples.len()
            ))
        })?;

        if self.is_voted(index) {
            return Err(AppError::InvalidState(format!(
                "Sample {} already has a vote",
                index
            )));
        }

        self.votes = self.votes.record(PreferenceVote::for_sample(sample, liked));

        tracing::debug!(
            session_id = %self.id,
            style = %sample.style.name,
            liked,
            votes = self.votes.len(),
            "Vote recorded"
        );

        if self.votes.len() == self.samples.len() {
            let summary = summarize(&self.votes);
            tracing::info!(
                session_id = %self.id,
                top_style = summary.top_style().unwrap_or("none"),
                basis = ?summary.basis,
                "Quiz complete"
            );
            self.stage = SessionStage::CollectingUploadedRoom { summary };
        }

        Ok(&self.stage)
    }

    /// Accepts a room upload and builds the generator input
    ///
    /// Moves the session to `GeneratingRecommendation`, so only one upload per
    /// session ever reaches the model.
    pub fn begin_recommendation(
        &mut self,
        room_image: RoomImage,
        room: RoomDetails,
    ) -> AppResult<RecommendationRequest> {
        let summary = match &self.stage {
            SessionStage::CollectingUploadedRoom { summary } => summary.clone(),
            SessionStage::GeneratingRecommendation { .. } => {
                return Err(AppError::InvalidState(
                    "Recommendations for this session are already being generated".to_string(),
                ))
            }
            other => {
                return Err(AppError::InvalidState(format!(
                    "A room can only be uploaded after the quiz; session is in stage '{}'",
                    other.name()
                )))
            }
        };

        let request = RecommendationRequest {
            room_image,
            summary: summary.clone(),
            room,
            liked_images: self.votes.liked_images(),
            disliked_images: self.votes.disliked_images(),
        };
        self.stage = SessionStage::GeneratingRecommendation { summary };
        Ok(request)
    }

    /// Stores the generator result; this is the terminal stage
    pub fn complete(&mut self, room: RoomDetails, outcome: RecommendationOutcome) -> AppResult<()> {
        let summary = match &self.stage {
            SessionStage::GeneratingRecommendation { summary } => summary.clone(),
            other => {
                return Err(AppError::InvalidState(format!(
                    "No recommendation is in progress; session is in stage '{}'",
                    other.name()
                )))
            }
        };

        self.stage = SessionStage::DisplayingResults {
            summary,
            room,
            outcome,
        };
        Ok(())
    }
}
