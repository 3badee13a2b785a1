pub use crate::classify::{classify, MediaKind};
pub use crate::config::{
    BatchOptions, CompressionPreset, ConnectionSpeed, ContentKind, PresetTable, VideoLimits,
};
pub use crate::error::{PipelineError, Result};
pub use crate::pipeline::{
    BatchItem, CompressionResult, MediaInput, MediaPipeline, ProgressCallback, UploaderInfo,
};
pub use crate::planner::{plan, PlannedDimensions};
pub use crate::storage::{BlobStore, MediaRecord, MediaSink, PayloadRef};
