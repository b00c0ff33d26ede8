//! Credit pricing for generation requests.
//!
//! Costs are fixed per tool and user-selected options (resolution,
//! duration); they are computed before the credit gate is consulted and
//! recorded on the job row as a historical value. The credit ledger
//! itself (balances, top-ups, real-money pricing) is external.

use crate::input::{GenerationInput, Resolution};

// ---------------------------------------------------------------------------
// Flat costs
// ---------------------------------------------------------------------------

/// Baby portrait generation.
pub const BABY_IMAGE_COST: i32 = 2;
/// Baby podcast clip (photo animation + narration).
pub const BABY_PODCAST_COST: i32 = 4;
/// Lip-sync rendering.
pub const LIP_SYNC_COST: i32 = 8;

// ---------------------------------------------------------------------------
// Option-scaled costs
// ---------------------------------------------------------------------------

/// Video synthesis, per 5 seconds of output at 720p.
pub const VIDEO_COST_PER_5S: i32 = 10;
/// Earth-zoom effect at 720p.
pub const EARTH_ZOOM_BASE_COST: i32 = 6;

/// 1080p output costs 1.5x the 720p price.
fn scale_resolution(base: i32, resolution: Resolution) -> i32 {
    match resolution {
        Resolution::P720 => base,
        Resolution::P1080 => base * 3 / 2,
    }
}

/// Cost of a synthesized clip from its selected options.
pub fn video_cost(resolution: Resolution, duration_secs: u8) -> i32 {
    let five_sec_units = i32::from(duration_secs) / 5;
    scale_resolution(VIDEO_COST_PER_5S * five_sec_units, resolution)
}

impl GenerationInput {
    /// Credits charged for this request.
    ///
    /// Always positive: every offered option combination prices above
    /// zero, and validation has already bounded the options.
    pub fn cost(&self) -> i32 {
        match self {
            Self::BabyImage(_) => BABY_IMAGE_COST,
            Self::BabyPodcast(_) => BABY_PODCAST_COST,
            Self::TextToVideo(input) => video_cost(input.resolution, input.duration_secs),
            Self::ImageToVideo(input) => video_cost(input.resolution, input.duration_secs),
            Self::LipSync(_) => LIP_SYNC_COST,
            Self::EarthZoom(input) => scale_resolution(EARTH_ZOOM_BASE_COST, input.resolution),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{
        BabyGender, BabyImageInput, EarthZoomInput, MediaRef, TextToVideoInput,
    };

    fn image_ref() -> MediaRef {
        MediaRef {
            url: "https://cdn.example.com/uploads/photo.jpg".into(),
            content_type: "image/jpeg".into(),
            size_bytes: 1024,
        }
    }

    #[test]
    fn video_cost_table() {
        assert_eq!(video_cost(Resolution::P720, 5), 10);
        assert_eq!(video_cost(Resolution::P720, 10), 20);
        assert_eq!(video_cost(Resolution::P1080, 5), 15);
        assert_eq!(video_cost(Resolution::P1080, 10), 30);
    }

    #[test]
    fn earth_zoom_scales_with_resolution() {
        let p720 = GenerationInput::EarthZoom(EarthZoomInput {
            source_image: image_ref(),
            resolution: Resolution::P720,
        });
        let p1080 = GenerationInput::EarthZoom(EarthZoomInput {
            source_image: image_ref(),
            resolution: Resolution::P1080,
        });
        assert_eq!(p720.cost(), 6);
        assert_eq!(p1080.cost(), 9);
    }

    #[test]
    fn flat_costs() {
        let baby = GenerationInput::BabyImage(BabyImageInput {
            mother_photo: image_ref(),
            father_photo: image_ref(),
            gender: BabyGender::Surprise,
        });
        assert_eq!(baby.cost(), BABY_IMAGE_COST);
    }

    #[test]
    fn all_valid_option_combinations_price_positive() {
        for resolution in [Resolution::P720, Resolution::P1080] {
            for duration in crate::input::VIDEO_DURATIONS_SECS {
                let input = GenerationInput::TextToVideo(TextToVideoInput {
                    prompt: "x".into(),
                    resolution,
                    duration_secs: duration,
                });
                assert!(input.cost() > 0);
            }
        }
    }
}
