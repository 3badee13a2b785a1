//! Media format classification.
//!
//! Classification looks only at the declared MIME type and file extension;
//! no payload byte is read here. QuickTime containers are rejected up front
//! because browser playback for them is unreliable. Everything else that
//! claims to be an image or video is accepted provisionally, and actual
//! decodability is discovered later inside the engines.

use serde::Serialize;

use crate::error::{PipelineError, Result};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "avi", "mkv", "webm"];

// Containers with unreliable browser playback, rejected regardless of the
// declared MIME type.
const REJECTED_EXTENSIONS: &[&str] = &["mov", "qt"];

/// Broad kind of an accepted media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Classifies a media item from its declared type and extension.
///
/// Returns `UnsupportedFormat` for QuickTime-style containers and for
/// anything that is neither an image nor a video.
pub fn classify(mime_type: &str, extension: &str) -> Result<MediaKind> {
    let mime = mime_type.to_lowercase();
    let ext = extension.trim_start_matches('.').to_lowercase();

    if mime == "video/quicktime" || REJECTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(PipelineError::UnsupportedFormat {
            reason: "QuickTime (.mov) clips play back unreliably in browsers; \
                     re-export the clip as a web-standard container such as MP4"
                .to_string(),
        });
    }

    if mime.starts_with("image/") || IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(MediaKind::Image);
    }
    if mime.starts_with("video/") || VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Ok(MediaKind::Video);
    }

    Err(PipelineError::UnsupportedFormat {
        reason: format!("unrecognized media type \"{mime}\" (.{ext})"),
    })
}
