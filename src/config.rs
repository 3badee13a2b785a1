//! Compression presets and batch options.
//!
//! Presets bundle the target dimensions, starting quality, and size budget
//! for a content intent. The built-in values match the gallery's feed,
//! story, and reel surfaces; a deployment can also load a preset table from
//! JSON at startup.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::error::{PipelineError, Result};

/// Content intent a piece of media is uploaded for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Feed,
    Story,
    Reel,
}

/// Caller-supplied connection hint. Only biases the image engine's
/// starting quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionSpeed {
    Fast,
    Medium,
    Slow,
}

impl ConnectionSpeed {
    /// Multiplier applied to a preset's starting quality.
    pub fn quality_multiplier(self) -> f32 {
        match self {
            ConnectionSpeed::Fast => 1.1,
            ConnectionSpeed::Medium => 1.0,
            ConnectionSpeed::Slow => 0.8,
        }
    }
}

/// Named compression configuration. Immutable, loaded once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionPreset {
    pub max_width: u32,
    pub max_height: u32,
    /// Starting quality in `[0.0, 1.0]` before adaptive adjustment.
    pub initial_quality: f32,
    /// Size budget the convergence loop aims for.
    pub target_size_bytes: u64,
}

impl CompressionPreset {
    pub const fn feed() -> Self {
        Self {
            max_width: 1080,
            max_height: 1080,
            initial_quality: 0.85,
            target_size_bytes: 200 * 1024,
        }
    }

    pub const fn story() -> Self {
        Self {
            max_width: 1080,
            max_height: 1920,
            initial_quality: 0.80,
            target_size_bytes: 250 * 1024,
        }
    }

    pub const fn reel() -> Self {
        Self {
            max_width: 1080,
            max_height: 1920,
            initial_quality: 0.82,
            target_size_bytes: 300 * 1024,
        }
    }

    pub fn for_content(kind: ContentKind) -> Self {
        match kind {
            ContentKind::Feed => Self::feed(),
            ContentKind::Story => Self::story(),
            ContentKind::Reel => Self::reel(),
        }
    }
}

/// Full preset table, one entry per content intent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PresetTable {
    pub feed: CompressionPreset,
    pub story: CompressionPreset,
    pub reel: CompressionPreset,
}

impl Default for PresetTable {
    fn default() -> Self {
        Self {
            feed: CompressionPreset::feed(),
            story: CompressionPreset::story(),
            reel: CompressionPreset::reel(),
        }
    }
}

impl PresetTable {
    /// Loads a preset table from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn get(&self, kind: ContentKind) -> CompressionPreset {
        match kind {
            ContentKind::Feed => self.feed,
            ContentKind::Story => self.story,
            ContentKind::Reel => self.reel,
        }
    }
}

/// Size ceilings and encoder targets for the video engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoLimits {
    /// Clips below this size are uploaded unchanged.
    pub skip_below_bytes: u64,
    /// Absolute hard ceiling; larger inputs are rejected outright.
    pub max_upload_bytes: u64,
    /// Target bitrate for the re-encode path, bits per second.
    pub target_bitrate: usize,
    /// Fixed output frame rate for the re-encode path, frames per second.
    pub frame_rate: u32,
}

impl Default for VideoLimits {
    fn default() -> Self {
        Self {
            skip_below_bytes: 10 * 1024 * 1024,
            max_upload_bytes: 100 * 1024 * 1024,
            target_bitrate: 2_500_000,
            frame_rate: 30,
        }
    }
}

impl VideoLimits {
    /// Limits for clips recorded in-app, which get a tighter ceiling than
    /// uploads from the camera roll.
    pub fn for_recorded() -> Self {
        Self {
            max_upload_bytes: 50 * 1024 * 1024,
            ..Self::default()
        }
    }
}

/// Options for one batch invocation.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub content: ContentKind,
    pub connection: ConnectionSpeed,
    /// Items processed concurrently; chunks run sequentially.
    pub chunk_size: usize,
    pub video_limits: VideoLimits,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            content: ContentKind::Feed,
            connection: ConnectionSpeed::Medium,
            chunk_size: 3,
            video_limits: VideoLimits::default(),
        }
    }
}
