mod preference;
mod recommendation;
mod style;

pub use preference::{
    PreferenceSummary, PreferenceVote, SampleItem, StyleScore, SummaryBasis, VoteHistory,
};
pub use recommendation::{
    Recommendation, RecommendationRequest, RoomDetails, RoomImage, RoomType, SectionKind,
};
pub use style::{style_dir_name, ImageRef, StyleDefinition, StyleImageSet};
