//! Storage routing and the persistence seam.
//!
//! A compressed payload is either embedded inline in the media record as a
//! base64 data URL or pushed to blob storage and referenced by URL. Videos
//! always go external; images go inline only while the text-safe encoding
//! stays comfortably under the document store's per-field ceiling. The
//! routing decision is made once per item and never retried.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::{
    classify::MediaKind,
    compressor::Compressed,
    error::Result,
    pipeline::{CompressionResult, MediaInput, UploaderInfo},
};

/// Inline ceiling with headroom under the store's ~1MB field limit.
const MAX_INLINE_BYTES: u64 = 750 * 1024;

/// Where a compressed payload ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadRef {
    /// Media bytes embedded in the record as a base64 data URL.
    Inline(String),
    /// URL of an object in blob storage.
    External(String),
}

impl PayloadRef {
    pub fn is_inline(&self) -> bool {
        matches!(self, PayloadRef::Inline(_))
    }
}

/// Client for the external blob store.
#[allow(async_fn_in_trait)]
pub trait BlobStore {
    /// Uploads `bytes` under `path` and returns a reference URL.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<String>;
}

/// Sink for finished media records; the document store in production.
#[allow(async_fn_in_trait)]
pub trait MediaSink {
    async fn persist(&self, record: &MediaRecord) -> Result<()>;
}

/// Base64 inflates payloads by a third; the inline ceiling is checked
/// against the encoded form.
fn inline_encoded_size(raw: u64) -> u64 {
    raw.div_ceil(3) * 4
}

/// Routes a compressed payload to inline or external storage.
pub async fn route<S: BlobStore>(
    store: &S,
    path: &str,
    payload: &Compressed,
    kind: MediaKind,
) -> Result<PayloadRef> {
    if kind == MediaKind::Image && inline_encoded_size(payload.bytes.len() as u64) <= MAX_INLINE_BYTES
    {
        let encoded = STANDARD.encode(&payload.bytes);
        return Ok(PayloadRef::Inline(format!(
            "data:{};base64,{encoded}",
            payload.mime_type
        )));
    }

    let url = store.put(path, &payload.bytes).await?;
    Ok(PayloadRef::External(url))
}

/// A finished media record, ready for the persistence call.
#[derive(Debug, Clone, Serialize)]
pub struct MediaRecord {
    pub payload: PayloadRef,
    pub kind: MediaKind,
    pub file_name: String,
    pub uploaded_by: String,
    pub device_id: String,
    pub uploaded_at_ms: u64,
    pub tags: Vec<String>,
    pub original_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: f64,
    pub processing_time_ms: u64,
}

impl MediaRecord {
    pub fn new(input: &MediaInput, result: &CompressionResult, uploader: &UploaderInfo) -> Self {
        Self {
            payload: result.payload.clone(),
            kind: result.kind,
            file_name: input.file_name.clone(),
            uploaded_by: uploader.user_name.clone(),
            device_id: uploader.device_id.clone(),
            uploaded_at_ms: unix_millis(),
            tags: uploader.tags.clone(),
            original_size: result.original_size,
            compressed_size: result.compressed_size,
            compression_ratio: result.compression_ratio,
            processing_time_ms: result.processing_time_ms,
        }
    }
}

pub(crate) fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_inline_encoded_size_inflation() {
        assert_eq!(inline_encoded_size(3), 4);
        assert_eq!(inline_encoded_size(4), 8);
        assert_eq!(inline_encoded_size(600 * 1024), 800 * 1024);
    }

    #[test]
    fn test_inline_ceiling_has_headroom_under_field_limit() {
        assert!(inline_encoded_size(MAX_INLINE_BYTES) > MAX_INLINE_BYTES);
        assert!(inline_encoded_size(MAX_INLINE_BYTES * 3 / 4) <= 1024 * 1024);
    }
}
