// SPDX-License-Identifier: MPL-2.0

//! Frame processing pipeline
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  FramePipeline    │ ──▶ │   Preview    │
//! │ (NV21/NV12)  │     │  - rotate 90°     │     │   (RGB565)   │
//! │              │     │  - JPEG encode    │     │              │
//! └──────────────┘     └─────────┬─────────┘     └──────────────┘
//!                                │
//!                                ▼
//!                      ┌───────────────────┐     ┌──────────────┐
//!                      │    SaveQueue      │ ──▶ │ pic_<n>.jpg  │
//!                      │  (save-worker)    │     │  n < 500     │
//!                      └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`frame_pipeline`]: per-frame orchestration and session lifecycle
//! - [`save_queue`]: single-writer round-robin persistence
//! - [`events`]: observer trait and save progress events

pub mod events;
pub mod frame_pipeline;
pub mod save_queue;

pub use events::{NullObserver, PipelineObserver, SaveEvent};
pub use frame_pipeline::{FrameOutcome, FramePipeline, PipelineOptions, SessionSummary};
pub use save_queue::{EnqueueError, PersistenceState, SaveDecision, SaveJob, SaveQueue};
