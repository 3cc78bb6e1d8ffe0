// SPDX-License-Identifier: MPL-2.0

//! Capture Ring - live frame rotation, preview and round-robin persistence
//!
//! Raw semi-planar YUV 4:2:0 frames from a capture source are rotated 90°,
//! compressed to JPEG, shown as an RGB565 preview and persisted in the
//! background into a fixed ring of 500 files.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Capture source abstraction and frame types
//! - [`media`]: Rotation and JPEG encoding
//! - [`pipelines`]: Per-frame orchestration and the save worker
//! - [`storage`]: Output directory and media indexing
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! use capture_ring::{FramePipeline, PipelineOptions, NullObserver};
//! use capture_ring::backends::camera::{PixelFormat, TestPatternSource};
//! use capture_ring::storage::{DirectoryStore, LogIndexer};
//!
//! let pipeline = FramePipeline::start(
//!     PipelineOptions::default(),
//!     Box::new(TestPatternSource::new(640, 480, PixelFormat::Nv21)),
//!     Box::new(DirectoryStore::new("/tmp/frames")?),
//!     Box::new(LogIndexer),
//!     Box::new(NullObserver),
//! )?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;

// Re-export commonly used types
pub use config::Config;
pub use errors::{PipelineError, PipelineResult};
pub use pipelines::{
    FrameOutcome, FramePipeline, NullObserver, PipelineObserver, PipelineOptions, SaveEvent,
    SessionSummary,
};
