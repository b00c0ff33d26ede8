//! The generator tool catalog.
//!
//! Each variant's discriminant matches the seed data order (1-based) in
//! the `generation_tools` database table. Poll cadence and deadlines
//! are defined here so the coordinator stays generic over the tool: one
//! dispatcher/poller code path serves all six generators.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Tool ID type matching SMALLINT/SMALLSERIAL in the database.
pub type ToolId = i16;

/// One of the six media generators offered by the platform.
///
/// Distinct tools maintain independent single-flight locks: a user may
/// run one baby-image job and one text-to-video job concurrently, but
/// never two jobs of the same tool.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    BabyImage = 1,
    BabyPodcast = 2,
    TextToVideo = 3,
    ImageToVideo = 4,
    LipSync = 5,
    EarthZoom = 6,
}

/// All tools, in seed order.
pub const ALL_TOOLS: [ToolKind; 6] = [
    ToolKind::BabyImage,
    ToolKind::BabyPodcast,
    ToolKind::TextToVideo,
    ToolKind::ImageToVideo,
    ToolKind::LipSync,
    ToolKind::EarthZoom,
];

impl ToolKind {
    /// Return the database tool ID.
    pub fn id(self) -> ToolId {
        self as ToolId
    }

    /// Look a tool up by its database ID.
    pub fn from_id(id: ToolId) -> Result<Self, CoreError> {
        ALL_TOOLS
            .into_iter()
            .find(|t| t.id() == id)
            .ok_or_else(|| CoreError::Internal(format!("Unknown tool id: {id}")))
    }

    /// URL/wire identifier (e.g. `text_to_video`).
    pub fn slug(self) -> &'static str {
        match self {
            Self::BabyImage => "baby_image",
            Self::BabyPodcast => "baby_podcast",
            Self::TextToVideo => "text_to_video",
            Self::ImageToVideo => "image_to_video",
            Self::LipSync => "lip_sync",
            Self::EarthZoom => "earth_zoom",
        }
    }

    /// Parse a wire slug (query parameters, provider requests).
    pub fn from_slug(slug: &str) -> Result<Self, CoreError> {
        ALL_TOOLS
            .into_iter()
            .find(|t| t.slug() == slug)
            .ok_or_else(|| CoreError::Validation(format!("Unknown tool: {slug}")))
    }

    /// Interval between provider status queries while a job is in flight.
    ///
    /// Image synthesis resolves in seconds; video synthesis in minutes.
    /// The cadence follows the expected turnaround so slow tools are not
    /// hammered and fast ones are not left waiting.
    pub fn poll_interval(self) -> Duration {
        match self {
            Self::BabyImage => Duration::from_secs(3),
            Self::BabyPodcast => Duration::from_secs(8),
            Self::TextToVideo => Duration::from_secs(15),
            Self::ImageToVideo => Duration::from_secs(15),
            Self::LipSync => Duration::from_secs(10),
            Self::EarthZoom => Duration::from_secs(8),
        }
    }

    /// Wall-clock budget from job creation to forced `timed_out`.
    pub fn deadline(self) -> chrono::Duration {
        match self {
            Self::BabyImage => chrono::Duration::minutes(5),
            Self::BabyPodcast => chrono::Duration::minutes(8),
            Self::TextToVideo => chrono::Duration::minutes(10),
            Self::ImageToVideo => chrono::Duration::minutes(10),
            Self::LipSync => chrono::Duration::minutes(8),
            Self::EarthZoom => chrono::Duration::minutes(6),
        }
    }
}
