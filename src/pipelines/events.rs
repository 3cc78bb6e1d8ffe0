// SPDX-License-Identifier: GPL-3.0-only

//! Notifications from the frame pipeline to its user-facing collaborator

use crate::errors::PipelineError;
use crate::media::Raster;

/// Progress event posted by the save worker
///
/// Events are queued on a channel and delivered to the
/// [`PipelineObserver`] on the producer thread, never on the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEvent {
    /// `pic_<slot_id>.jpg` was written
    FrameSaved { slot_id: u32 },
    /// The capacity bound was hit and the counter restarted
    RoundCompleted { round_count: u32 },
}

/// Receiver of preview frames and persistence progress
///
/// All methods run on the thread driving the pipeline.
pub trait PipelineObserver: Send {
    /// A frame was rotated and encoded; `preview` is the decoded JPEG
    fn on_preview_frame(&mut self, preview: &Raster, sequence_id: u32);

    /// A frame was persisted to its slot
    fn on_frame_saved(&mut self, slot_id: u32);

    /// A round of persistence finished
    fn on_round_completed(&mut self, round_count: u32);

    /// The session ended because of a session-level error
    ///
    /// Called at most once per pipeline.
    fn on_session_ended(&mut self, _reason: &PipelineError) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {
    fn on_preview_frame(&mut self, _preview: &Raster, _sequence_id: u32) {}
    fn on_frame_saved(&mut self, _slot_id: u32) {}
    fn on_round_completed(&mut self, _round_count: u32) {}
}
