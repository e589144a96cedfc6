use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

use super::{ImageRef, PreferenceSummary};

/// Kind of room being furnished
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    #[default]
    LivingRoom,
    Bedroom,
    DiningRoom,
    Kitchen,
    Bathroom,
    HomeOffice,
    Other,
}

impl RoomType {
    pub const ALL: [RoomType; 7] = [
        RoomType::LivingRoom,
        RoomType::Bedroom,
        RoomType::DiningRoom,
        RoomType::Kitchen,
        RoomType::Bathroom,
        RoomType::HomeOffice,
        RoomType::Other,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RoomType::LivingRoom => "Living Room",
            RoomType::Bedroom => "Bedroom",
            RoomType::DiningRoom => "Dining Room",
            RoomType::Kitchen => "Kitchen",
            RoomType::Bathroom => "Bathroom",
            RoomType::HomeOffice => "Home Office",
            RoomType::Other => "Other",
        }
    }
}

impl Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for RoomType {
    type Err = String;

    /// Accepts both labels ("Home Office") and snake_case ("home_office")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['_', '-'], " ");
        RoomType::ALL
            .into_iter()
            .find(|room| room.label().to_lowercase() == normalized)
            .ok_or_else(|| format!("Unknown room type: {}", s))
    }
}

/// Details the user gives about the room besides the photo
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoomDetails {
    pub room_type: RoomType,
    /// Free-form size/dimensions, e.g. "4m x 5m"
    pub dimensions: Option<String>,
}

/// Uploaded room photograph
#[derive(Clone, PartialEq)]
pub struct RoomImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for RoomImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomImage")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Everything the generator needs for one room upload
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    pub room_image: RoomImage,
    pub summary: PreferenceSummary,
    pub room: RoomDetails,
    /// Style images the user liked, attached as visual references
    pub liked_images: Vec<ImageRef>,
    /// Style images the user disliked, attached as counter-examples
    pub disliked_images: Vec<ImageRef>,
}

/// Named sections the model is asked to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    StyleAnalysis,
    RoomAnalysis,
    Recommendations,
}

impl SectionKind {
    pub const ALL: [SectionKind; 3] = [
        SectionKind::StyleAnalysis,
        SectionKind::RoomAnalysis,
        SectionKind::Recommendations,
    ];

    /// Heading that starts the section in a response
    pub fn marker(&self) -> &'static str {
        match self {
            SectionKind::StyleAnalysis => "STYLE ANALYSIS",
            SectionKind::RoomAnalysis => "ROOM ANALYSIS",
            SectionKind::Recommendations => "RECOMMENDATIONS",
        }
    }
}

/// Response of the multimodal model for one room
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Recommendation {
    /// All three sections were found
    Structured {
        style_analysis: String,
        room_analysis: String,
        recommendations: String,
        raw: String,
    },
    /// Section markers were missing; the response is kept as-is
    Raw { text: String },
}

impl Recommendation {
    /// Full response text, whatever the shape
    pub fn raw_text(&self) -> &str {
        match self {
            Recommendation::Structured { raw, .. } => raw,
            Recommendation::Raw { text } => text,
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Recommendation::Structured { .. })
    }

    pub fn section(&self, kind: SectionKind) -> Option<&str> {
        match self {
            Recommendation::Structured {
                style_analysis,
                room_analysis,
                recommendations,
                ..
            } => Some(match kind {
                SectionKind::StyleAnalysis => style_analysis,
                SectionKind::RoomAnalysis => room_analysis,
                SectionKind::Recommendations => recommendations,
            }),
            Recommendation::Raw { .. } => None,
        }
    }
}
