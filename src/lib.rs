//! # Lumapipe
//!
//! Lumapipe is the media ingestion and adaptive compression pipeline of an
//! event-media gallery. It takes raw user-selected images and videos,
//! decides how aggressively to re-encode them, converges on a size budget,
//! picks a storage representation, and uploads the result, all while
//! preserving input ordering and reporting per-file progress across a
//! batch.
//!
//! ## Features
//!
//! - **Format classification**: unreliable containers are rejected before
//!   any payload byte is read.
//! - **Adaptive image compression**: a progressive quality search driven by
//!   connection speed and input size, bounded by a quality floor.
//! - **Video re-encoding**: a fixed-bitrate H.264 re-encode via FFmpeg,
//!   with a single-frame snapshot as the degraded fallback tier.
//! - **Storage routing**: small images are inlined into the record, videos
//!   and large images go to blob storage.
//! - **Batch orchestration**: bounded concurrency in fixed-size chunks with
//!   index-stable results.
//!
//! ## Modules
//!
//! - `pipeline`: the batch orchestrator and sole public entry point.
//! - `classify`: format classification.
//! - `planner`: target dimension planning.
//! - `compressor`: the image compression engine.
//! - `video`: the video compression engine.
//! - `storage`: payload routing and the blob-store/persistence seams.
//! - `config`: compression presets and batch options.
//! - `cache`: a bounded TTL cache for secondary gallery data.
//! - `error`: the error types for the library.
//! - `prelude`: a collection of the most commonly used types.

pub mod cache;
pub mod classify;
pub mod compressor;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod planner;
pub mod prelude;
pub mod storage;
pub mod video;
