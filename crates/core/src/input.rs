//! Typed generation inputs and their local validation.
//!
//! One tagged enum, [`GenerationInput`], covers all six generators so
//! the dispatcher, poller, and pending resolver stay generic over the
//! tool. Validation is purely local: required fields, URL and text
//! length bounds, declared media size/type bounds. No I/O: media
//! bytes live in external storage and are referenced by URL.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::tool::ToolKind;

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Maximum length of a video prompt.
pub const MAX_PROMPT_CHARS: u64 = 1500;
/// Maximum length of a podcast script.
pub const MAX_SCRIPT_CHARS: u64 = 600;
/// Maximum declared size for an image upload.
pub const MAX_IMAGE_BYTES: i64 = 10 * 1024 * 1024;
/// Maximum declared size for an audio upload.
pub const MAX_AUDIO_BYTES: i64 = 20 * 1024 * 1024;
/// Maximum declared size for a video upload.
pub const MAX_VIDEO_BYTES: i64 = 100 * 1024 * 1024;

/// Accepted video clip lengths in seconds.
pub const VIDEO_DURATIONS_SECS: [u8; 2] = [5, 10];

const IMAGE_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];
const AUDIO_CONTENT_TYPES: &[&str] = &["audio/mpeg", "audio/wav"];
const VIDEO_CONTENT_TYPES: &[&str] = &["video/mp4"];

// ---------------------------------------------------------------------------
// Media references
// ---------------------------------------------------------------------------

/// What a [`MediaRef`] is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
}

impl MediaKind {
    fn content_types(self) -> &'static [&'static str] {
        match self {
            Self::Image => IMAGE_CONTENT_TYPES,
            Self::Audio => AUDIO_CONTENT_TYPES,
            Self::Video => VIDEO_CONTENT_TYPES,
        }
    }

    fn max_bytes(self) -> i64 {
        match self {
            Self::Image => MAX_IMAGE_BYTES,
            Self::Audio => MAX_AUDIO_BYTES,
            Self::Video => MAX_VIDEO_BYTES,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

/// Reference to a media object already placed in external storage.
///
/// The client uploads first, then submits the URL plus the declared
/// content type and byte size. Bounds are checked against the declared
/// metadata; the storage layer is trusted to have enforced them at
/// upload time as well.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MediaRef {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,
    #[validate(length(min = 1, max = 255))]
    pub content_type: String,
    pub size_bytes: i64,
}

impl MediaRef {
    /// Check this reference against the bounds for `kind`.
    fn validate_as(&self, field: &str, kind: MediaKind) -> Result<(), CoreError> {
        self.validate()
            .map_err(|e| CoreError::Validation(format!("{field}: {e}")))?;

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(CoreError::Validation(format!(
                "{field}: URL must be http(s), got '{}'",
                self.url
            )));
        }

        if !kind.content_types().contains(&self.content_type.as_str()) {
            return Err(CoreError::Validation(format!(
                "{field}: unsupported {} type '{}'",
                kind.label(),
                self.content_type
            )));
        }

        if self.size_bytes <= 0 {
            return Err(CoreError::Validation(format!(
                "{field}: size_bytes must be positive"
            )));
        }

        if self.size_bytes > kind.max_bytes() {
            return Err(CoreError::Validation(format!(
                "{field}: {} exceeds the {} byte limit for {} uploads",
                self.size_bytes,
                kind.max_bytes(),
                kind.label()
            )));
        }

        Ok(())
    }

    /// Check this reference against several acceptable kinds (e.g. the
    /// lip-sync face track accepts a still image or a video).
    fn validate_as_any(&self, field: &str, kinds: &[MediaKind]) -> Result<(), CoreError> {
        let mut last = None;
        for kind in kinds {
            match self.validate_as(field, *kind) {
                Ok(()) => return Ok(()),
                Err(e) => last = Some(e),
            }
        }
        Err(last.unwrap_or_else(|| {
            CoreError::Internal("validate_as_any called with no kinds".into())
        }))
    }
}

// ---------------------------------------------------------------------------
// Option enums
// ---------------------------------------------------------------------------

/// Output resolution for video generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

/// Presented baby gender for the baby-image generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BabyGender {
    Girl,
    Boy,
    Surprise,
}

/// Narration voice preset for the baby-podcast generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoicePreset {
    Warm,
    Bright,
    Calm,
}

// ---------------------------------------------------------------------------
// Per-tool inputs
// ---------------------------------------------------------------------------

/// Blend two parent photos into a baby portrait.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BabyImageInput {
    pub mother_photo: MediaRef,
    pub father_photo: MediaRef,
    pub gender: BabyGender,
}

/// Animate a baby photo reading a short script aloud.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BabyPodcastInput {
    #[validate(nested)]
    pub baby_photo: MediaRef,
    #[validate(length(min = 1, max = 600))]
    pub script: String,
    pub voice: VoicePreset,
}

/// Synthesize a clip from a text prompt.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TextToVideoInput {
    #[validate(length(min = 1, max = 1500))]
    pub prompt: String,
    pub resolution: Resolution,
    pub duration_secs: u8,
}

/// Animate a still image, optionally steered by a prompt.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImageToVideoInput {
    #[validate(nested)]
    pub source_image: MediaRef,
    #[validate(length(max = 1500))]
    pub prompt: Option<String>,
    pub resolution: Resolution,
    pub duration_secs: u8,
}

/// Re-voice a face track with the supplied audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncInput {
    /// A still portrait or a talking-head video.
    pub face: MediaRef,
    pub audio: MediaRef,
}

/// Zoom out from a user photo to an orbital view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarthZoomInput {
    pub source_image: MediaRef,
    pub resolution: Resolution,
}

// ---------------------------------------------------------------------------
// The tagged union
// ---------------------------------------------------------------------------

/// A complete, tool-tagged generation request payload.
///
/// The serialized form is `{ "tool": "<slug>", "input": { ... } }`,
/// which is also what gets stored on the job row and forwarded to the
/// synthesis provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", content = "input", rename_all = "snake_case")]
pub enum GenerationInput {
    BabyImage(BabyImageInput),
    BabyPodcast(BabyPodcastInput),
    TextToVideo(TextToVideoInput),
    ImageToVideo(ImageToVideoInput),
    LipSync(LipSyncInput),
    EarthZoom(EarthZoomInput),
}

impl GenerationInput {
    /// The tool this payload belongs to.
    pub fn tool(&self) -> ToolKind {
        match self {
            Self::BabyImage(_) => ToolKind::BabyImage,
            Self::BabyPodcast(_) => ToolKind::BabyPodcast,
            Self::TextToVideo(_) => ToolKind::TextToVideo,
            Self::ImageToVideo(_) => ToolKind::ImageToVideo,
            Self::LipSync(_) => ToolKind::LipSync,
            Self::EarthZoom(_) => ToolKind::EarthZoom,
        }
    }

    /// Run all structural checks. Purely local; no I/O.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self {
            Self::BabyImage(input) => {
                input.mother_photo.validate_as("mother_photo", MediaKind::Image)?;
                input.father_photo.validate_as("father_photo", MediaKind::Image)?;
                Ok(())
            }
            Self::BabyPodcast(input) => {
                input
                    .validate()
                    .map_err(|e| CoreError::Validation(e.to_string()))?;
                input.baby_photo.validate_as("baby_photo", MediaKind::Image)
            }
            Self::TextToVideo(input) => {
                input
                    .validate()
                    .map_err(|e| CoreError::Validation(e.to_string()))?;
                validate_duration(input.duration_secs)
            }
            Self::ImageToVideo(input) => {
                input
                    .validate()
                    .map_err(|e| CoreError::Validation(e.to_string()))?;
                input.source_image.validate_as("source_image", MediaKind::Image)?;
                validate_duration(input.duration_secs)
            }
            Self::LipSync(input) => {
                input
                    .face
                    .validate_as_any("face", &[MediaKind::Image, MediaKind::Video])?;
                input.audio.validate_as("audio", MediaKind::Audio)
            }
            Self::EarthZoom(input) => {
                input.source_image.validate_as("source_image", MediaKind::Image)
            }
        }
    }
}

/// Clip length must be one of the offered durations.
fn validate_duration(duration_secs: u8) -> Result<(), CoreError> {
    if VIDEO_DURATIONS_SECS.contains(&duration_secs) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "duration_secs must be one of {VIDEO_DURATIONS_SECS:?}, got {duration_secs}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
