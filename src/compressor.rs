//! Image compression engine.
//!
//! Decodes a raster image, resizes it onto a surface at the planned
//! dimensions, then walks JPEG quality downward until the preset's size
//! budget is met. Convergence is best-effort by design: when the attempt
//! cap or the quality floor is reached, the last encoding is returned even
//! if it misses the budget.

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};
use tracing::debug;

use crate::{
    config::{CompressionPreset, ConnectionSpeed},
    error::{PipelineError, Result},
    pipeline::MediaInput,
    planner,
};

/// Inputs below this size are not worth re-encoding.
pub const SKIP_BELOW_BYTES: u64 = 100 * 1024;

/// The convergence loop never encodes below this quality.
pub const QUALITY_FLOOR: f32 = 0.3;

const QUALITY_CEILING: f32 = 0.95;
const QUALITY_DECAY: f32 = 0.75;
const MAX_ATTEMPTS: u32 = 8;

/// Output of a compression engine run, before storage routing.
#[derive(Debug, Clone)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    /// True when the output is the input unchanged, whether the engine
    /// skipped up front or attempted a re-encode that did not shrink.
    pub passthrough: bool,
}

impl Compressed {
    /// Returns the input unchanged, for the skip and fallback paths.
    pub(crate) fn passthrough(input: &MediaInput) -> Self {
        Self {
            bytes: input.bytes.clone(),
            mime_type: input.mime_type.clone(),
            passthrough: true,
        }
    }
}

/// Compresses an image toward the preset's size budget.
///
/// Fails only on undecodable input; the orchestrator recovers from that by
/// uploading the original bytes unmodified.
pub fn compress(
    input: &MediaInput,
    preset: &CompressionPreset,
    connection: ConnectionSpeed,
) -> Result<Compressed> {
    if input.size() < SKIP_BELOW_BYTES {
        debug!(file = %input.file_name, size = input.size(), "image below skip threshold");
        return Ok(Compressed::passthrough(input));
    }

    let decoded = image::load_from_memory(&input.bytes)
        .map_err(|e| PipelineError::Encoding(format!("image decode failed: {e}")))?;

    let dims = planner::plan(
        decoded.width(),
        decoded.height(),
        preset.max_width,
        preset.max_height,
    );
    if dims.width == 0 || dims.height == 0 {
        // Degenerate strip shapes plan to a zero dimension; not encodable.
        return Ok(Compressed::passthrough(input));
    }
    let surface = decoded.resize_exact(dims.width, dims.height, FilterType::Lanczos3);

    let mut quality = starting_quality(preset.initial_quality, connection, input.size());
    let mut attempt = 0;
    loop {
        let encoded = encode_jpeg(&surface, quality)?;
        attempt += 1;

        let budget_met = encoded.len() as u64 <= preset.target_size_bytes;
        if budget_met || attempt >= MAX_ATTEMPTS || quality <= QUALITY_FLOOR {
            debug!(
                file = %input.file_name,
                attempt,
                quality,
                size = encoded.len(),
                budget_met,
                "image convergence finished"
            );
            // A pathological input can re-encode larger than it started;
            // the original bytes win in that case.
            if encoded.len() as u64 >= input.size() {
                return Ok(Compressed::passthrough(input));
            }
            return Ok(Compressed {
                bytes: encoded,
                mime_type: "image/jpeg".to_string(),
                passthrough: false,
            });
        }

        quality = (quality * QUALITY_DECAY).max(QUALITY_FLOOR);
    }
}

/// Starting quality adjusted for connection speed and input size, clamped
/// to `[QUALITY_FLOOR, 0.95]`. Large inputs start lower because they have
/// further to shrink.
fn starting_quality(base: f32, connection: ConnectionSpeed, size_bytes: u64) -> f32 {
    let mut quality = base * connection.quality_multiplier();

    let size_mb = size_bytes as f32 / (1024.0 * 1024.0);
    if size_mb > 5.0 {
        quality *= 0.9;
    }
    if size_mb > 10.0 {
        quality *= 0.8;
    }

    quality.clamp(QUALITY_FLOOR, QUALITY_CEILING)
}

/// Encodes a surface as JPEG at the given quality in `[0.0, 1.0]`.
pub(crate) fn encode_jpeg(surface: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
    let q = (quality * 100.0).round().clamp(1.0, 100.0) as u8;
    let mut out = Vec::new();
    surface
        .to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, q))
        .map_err(|e| PipelineError::Encoding(format!("jpeg encode failed: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_starting_quality_speed_bias() {
        let fast = starting_quality(0.85, ConnectionSpeed::Fast, 1024);
        let medium = starting_quality(0.85, ConnectionSpeed::Medium, 1024);
        let slow = starting_quality(0.85, ConnectionSpeed::Slow, 1024);
        assert!(fast > medium && medium > slow);
        assert!(fast <= QUALITY_CEILING);
    }

    #[test]
    fn test_starting_quality_size_penalty_compounds() {
        let small = starting_quality(0.85, ConnectionSpeed::Medium, 1024 * 1024);
        let large = starting_quality(0.85, ConnectionSpeed::Medium, 6 * 1024 * 1024);
        let huge = starting_quality(0.85, ConnectionSpeed::Medium, 11 * 1024 * 1024);
        assert!(large < small);
        assert!(huge < large);
    }

    #[test]
    fn test_starting_quality_clamped() {
        assert_eq!(
            starting_quality(0.95, ConnectionSpeed::Fast, 1024),
            QUALITY_CEILING
        );
        assert_eq!(
            starting_quality(0.2, ConnectionSpeed::Slow, 20 * 1024 * 1024),
            QUALITY_FLOOR
        );
    }
}
