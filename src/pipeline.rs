//! Batch orchestration for media ingestion.
//!
//! `MediaPipeline` drives a user-selected set of files through
//! classification, compression, and storage routing. Files are processed in
//! fixed-size chunks: chunks run sequentially, items within a chunk
//! concurrently on one task, which bounds how many decoders and encoders
//! are open at once. Results land at their original index regardless of
//! completion order, and a progress callback fires once per completed item
//! with its terminal result.

use futures::future::join_all;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

use crate::{
    classify::{self, MediaKind},
    compressor::{self, Compressed},
    config::{BatchOptions, CompressionPreset},
    error::{PipelineError, Result},
    storage::{self, BlobStore, MediaRecord, MediaSink, PayloadRef},
    video,
};

/// A callback invoked once per completed batch item, with the item's
/// original index and terminal result.
pub type ProgressCallback = Box<dyn Fn(usize, &CompressionResult) + Send + Sync>;

/// Per-item outcome slot in a batch. Rejected items keep their slot so the
/// output array stays index-stable.
pub type BatchItem = std::result::Result<CompressionResult, PipelineError>;

/// One raw user-selected file. Owned by a single pipeline run and only read.
#[derive(Debug, Clone)]
pub struct MediaInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl MediaInput {
    pub fn new(
        bytes: Vec<u8>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Declared extension, without the leading dot.
    pub fn extension(&self) -> &str {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
    }
}

/// Terminal outcome of one pipeline run over one input.
#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub payload: PayloadRef,
    pub kind: MediaKind,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Percent of the original saved; 0 on the skip and fallback paths.
    pub compression_ratio: f64,
    pub processing_time_ms: u64,
}

/// Identity attached to persisted records.
#[derive(Debug, Clone)]
pub struct UploaderInfo {
    pub user_name: String,
    pub device_id: String,
    pub tags: Vec<String>,
}

/// Aggregate state for one batch invocation. Each slot is written at most
/// once, at the item's original index.
#[derive(Debug)]
struct BatchProgress {
    completed: usize,
    slots: Vec<Option<BatchItem>>,
}

impl BatchProgress {
    fn new(total: usize) -> Self {
        Self {
            completed: 0,
            slots: (0..total).map(|_| None).collect(),
        }
    }

    fn record(&mut self, index: usize, item: BatchItem) {
        debug_assert!(self.slots[index].is_none(), "slot {index} written twice");
        self.slots[index] = Some(item);
        self.completed += 1;
    }

    fn into_items(self) -> Vec<BatchItem> {
        debug_assert_eq!(self.completed, self.slots.len());
        self.slots.into_iter().flatten().collect()
    }
}

/// The pipeline's sole public entry point.
#[derive(Debug)]
pub struct MediaPipeline<S: BlobStore> {
    store: S,
    gallery_id: String,
}

impl<S: BlobStore> MediaPipeline<S> {
    pub fn new(store: S, gallery_id: impl Into<String>) -> Self {
        Self {
            store,
            gallery_id: gallery_id.into(),
        }
    }

    /// Runs a batch of files through the pipeline.
    ///
    /// The returned vector has one slot per input, in input order.
    /// Classifier rejections and size-ceiling violations occupy their slot
    /// as errors without aborting the batch; storage failures abort the
    /// whole batch.
    pub async fn run_batch(
        &self,
        files: &[MediaInput],
        options: &BatchOptions,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Vec<BatchItem>> {
        let preset = CompressionPreset::for_content(options.content);
        let chunk_size = options.chunk_size.max(1);
        let mut progress = BatchProgress::new(files.len());
        let on_progress = on_progress.as_ref();

        info!(files = files.len(), chunk_size, "starting batch compression");

        for (chunk_index, chunk) in files.chunks(chunk_size).enumerate() {
            let base = chunk_index * chunk_size;
            let tasks = chunk.iter().enumerate().map(|(offset, input)| {
                let index = base + offset;
                async move {
                    let outcome = self.process_item(input, options, &preset).await;
                    if let (Some(cb), Ok(result)) = (on_progress, outcome.as_ref()) {
                        cb(index, result);
                    }
                    (index, outcome)
                }
            });

            for (index, outcome) in join_all(tasks).await {
                match outcome {
                    Err(err @ PipelineError::StorageUpload(_)) => return Err(err),
                    other => progress.record(index, other),
                }
            }
        }

        let items = progress.into_items();
        log_batch_stats(&items);
        Ok(items)
    }

    /// Runs a batch and persists one record per successful item.
    pub async fn run_and_persist<M: MediaSink>(
        &self,
        files: &[MediaInput],
        options: &BatchOptions,
        uploader: &UploaderInfo,
        sink: &M,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Vec<BatchItem>> {
        let items = self.run_batch(files, options, on_progress).await?;

        for (input, item) in files.iter().zip(&items) {
            if let Ok(result) = item {
                let record = MediaRecord::new(input, result, uploader);
                sink.persist(&record).await?;
            }
        }

        Ok(items)
    }

    /// Drives one input through classify → compress → route.
    async fn process_item(
        &self,
        input: &MediaInput,
        options: &BatchOptions,
        preset: &CompressionPreset,
    ) -> Result<CompressionResult> {
        let started = Instant::now();
        let kind = classify::classify(&input.mime_type, input.extension())?;

        let compressed = match kind {
            MediaKind::Image => match compressor::compress(input, preset, options.connection) {
                Ok(compressed) => compressed,
                Err(PipelineError::Encoding(reason)) => {
                    warn!(file = %input.file_name, %reason, "image undecodable, uploading original bytes");
                    Compressed::passthrough(input)
                }
                Err(err) => return Err(err),
            },
            MediaKind::Video => match video::compress(input, preset, &options.video_limits) {
                Ok(compressed) => compressed,
                Err(PipelineError::Encoding(reason)) => {
                    warn!(file = %input.file_name, %reason, "video undecodable, uploading original bytes");
                    Compressed::passthrough(input)
                }
                Err(PipelineError::Io(err)) => {
                    warn!(file = %input.file_name, %err, "video scratch file failed, uploading original bytes");
                    Compressed::passthrough(input)
                }
                Err(err) => return Err(err),
            },
        };

        let path = self.storage_path(&input.file_name);
        let payload = storage::route(&self.store, &path, &compressed, kind).await?;

        let original_size = input.size();
        let compressed_size = compressed.bytes.len() as u64;
        let compression_ratio = if compressed.passthrough || compressed_size >= original_size {
            0.0
        } else {
            (original_size - compressed_size) as f64 / original_size as f64 * 100.0
        };

        Ok(CompressionResult {
            payload,
            kind,
            original_size,
            compressed_size,
            compression_ratio,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    fn storage_path(&self, file_name: &str) -> String {
        let sanitized: String = file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!(
            "galleries/{}/media/{}-{}",
            self.gallery_id,
            storage::unix_millis(),
            sanitized
        )
    }
}

fn log_batch_stats(items: &[BatchItem]) {
    let succeeded: Vec<&CompressionResult> = items.iter().filter_map(|i| i.as_ref().ok()).collect();
    let original: u64 = succeeded.iter().map(|r| r.original_size).sum();
    let compressed: u64 = succeeded.iter().map(|r| r.compressed_size).sum();
    let saved = original.saturating_sub(compressed);
    let ratio = if original > 0 {
        saved as f64 / original as f64 * 100.0
    } else {
        0.0
    };

    info!(
        files = items.len(),
        succeeded = succeeded.len(),
        bytes_saved = saved,
        ratio_percent = ratio,
        "batch compression complete"
    );
}
