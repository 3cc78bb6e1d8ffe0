// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame orchestration
//!
//! ```text
//! FrameSource ─▶ rotate ─▶ encode ─┬─▶ observer.on_preview_frame
//!                                  └─▶ SaveQueue ─▶ SaveEvent ─▶ observer
//! ```
//!
//! Rotation, encoding and preview delivery run on the thread that feeds
//! frames in. Only persistence runs in the background, so a slow disk never
//! holds up the preview.

use crate::backends::camera::{FrameSource, PixelFormat, RawFrame};
use crate::config::Config;
use crate::constants::frames::{FRAME_LOG_INTERVAL, MAX_FRAME_COUNT};
use crate::constants::persistence::{DEFAULT_SAVE_BACKLOG, MIN_FREE_BYTES};
use crate::errors::{PipelineError, PipelineResult};
use crate::media::{EncodedOutput, FrameEncoder, rotate};
use crate::pipelines::events::{PipelineObserver, SaveEvent};
use crate::pipelines::save_queue::{EnqueueError, PersistenceState, SaveJob, SaveQueue};
use crate::storage::{FrameStore, MediaIndexer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use tracing::{debug, error, info, warn};

/// Session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub pixel_format: PixelFormat,
    pub min_free_bytes: u64,
    pub save_backlog: Option<usize>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            pixel_format: PixelFormat::default(),
            min_free_bytes: MIN_FREE_BYTES,
            save_backlog: Some(DEFAULT_SAVE_BACKLOG),
        }
    }
}

impl From<&Config> for PipelineOptions {
    fn from(config: &Config) -> Self {
        Self {
            pixel_format: config.pixel_format,
            min_free_bytes: config.min_free_bytes,
            save_backlog: config.save_backlog,
        }
    }
}

/// What happened to one raw frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Encoded, previewed and handed to the save worker
    Enqueued { sequence_id: u32, slot_id: u32 },
    /// Encoded and previewed, but the save backlog was full
    Backlogged { sequence_id: u32, slot_id: u32 },
    /// Dropped before encoding finished; the frame counter did not move
    Failed(PipelineError),
}

/// Totals reported when a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Frames that were rotated and encoded
    pub frames_processed: u64,
    /// Frames dropped because of a per-frame error
    pub frames_failed: u64,
    /// Encoded frames not persisted because the backlog was full
    pub frames_backlogged: u64,
    /// Value the frame counter would hand out next
    pub next_sequence_id: u32,
    /// Final persistence counters
    pub persistence: PersistenceState,
}

/// A running capture session
pub struct FramePipeline {
    source: Box<dyn FrameSource>,
    dimensions: Option<(u32, u32)>,
    encoder: FrameEncoder,
    sequence_counter: u32,
    save_queue: SaveQueue,
    events: Receiver<SaveEvent>,
    observer: Box<dyn PipelineObserver>,
    frame_buffer: Vec<u8>,
    frames_processed: u64,
    frames_failed: u64,
    frames_backlogged: u64,
    terminated: Option<PipelineError>,
    finished: bool,
}

impl FramePipeline {
    /// Check free space, open the capture source and start the save worker
    ///
    /// # Errors
    /// * `InsufficientStorage` - the store reports less than
    ///   `options.min_free_bytes`; the source is never opened
    /// * `CaptureUnavailable` - the source could not be opened
    /// * `WorkerUnavailable` - the save worker could not be spawned
    ///
    /// Each of these is also reported once through
    /// [`PipelineObserver::on_session_ended`].
    pub fn start(
        options: PipelineOptions,
        mut source: Box<dyn FrameSource>,
        store: Box<dyn FrameStore>,
        indexer: Box<dyn MediaIndexer>,
        mut observer: Box<dyn PipelineObserver>,
    ) -> PipelineResult<Self> {
        let available = match store.available_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Could not query free space, treating as empty");
                0
            }
        };
        if available < options.min_free_bytes {
            let err = PipelineError::InsufficientStorage {
                available,
                required: options.min_free_bytes,
            };
            return Err(end_session(observer.as_mut(), err));
        }
        debug!(available, "Storage check passed");

        if let Err(err) = source.open() {
            return Err(end_session(observer.as_mut(), err));
        }

        let (save_queue, events) = match SaveQueue::start(store, indexer, options.save_backlog) {
            Ok(started) => started,
            Err(err) => {
                source.release();
                return Err(end_session(observer.as_mut(), err));
            }
        };

        info!(
            source = source.name(),
            format = %options.pixel_format,
            backlog = ?options.save_backlog,
            "Frame pipeline started"
        );

        Ok(Self {
            source,
            dimensions: None,
            encoder: FrameEncoder::new(options.pixel_format),
            sequence_counter: 0,
            save_queue,
            events,
            observer,
            frame_buffer: Vec::new(),
            frames_processed: 0,
            frames_failed: 0,
            frames_backlogged: 0,
            terminated: None,
            finished: false,
        })
    }

    /// Next sequence id to be handed out
    pub fn sequence_counter(&self) -> u32 {
        self.sequence_counter
    }

    /// Source dimensions, once the first frame has been handled
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    /// Process one raw frame from the capture source
    ///
    /// Per-frame failures come back as [`FrameOutcome::Failed`]; only
    /// session-level errors are returned as `Err`.
    pub fn on_raw_frame(&mut self, plane_data: &[u8]) -> PipelineResult<FrameOutcome> {
        if let Some(err) = &self.terminated {
            return Err(err.clone());
        }

        let outcome = match self.handle_frame(plane_data) {
            Ok(outcome) => outcome,
            Err(err) if err.is_session_fatal() => return Err(self.terminate(err)),
            Err(err) => {
                self.frames_failed += 1;
                warn!(error = %err, "Dropping frame");
                FrameOutcome::Failed(err)
            }
        };

        self.dispatch_events();
        Ok(outcome)
    }

    /// Pull the next frame from the source and process it
    ///
    /// # Returns
    /// * `Ok(Some(outcome))` - A frame was handled
    /// * `Ok(None)` - The source is exhausted
    pub fn process_next(&mut self) -> PipelineResult<Option<FrameOutcome>> {
        if let Some(err) = &self.terminated {
            return Err(err.clone());
        }

        let mut buffer = std::mem::take(&mut self.frame_buffer);
        let result = match self.source.next_frame(&mut buffer) {
            Ok(true) => self.on_raw_frame(&buffer).map(Some),
            Ok(false) => Ok(None),
            Err(err) => Err(self.terminate(err)),
        };
        self.frame_buffer = buffer;
        result
    }

    /// Pull frames until `stop` is set, the source runs dry or `max_frames`
    /// frames have been pulled
    ///
    /// Returns the number of frames pulled.
    pub fn run(&mut self, stop: &AtomicBool, max_frames: Option<u64>) -> PipelineResult<u64> {
        let mut pulled = 0u64;
        while !stop.load(Ordering::SeqCst) {
            if max_frames.is_some_and(|max| pulled >= max) {
                debug!(pulled, "Frame limit reached");
                break;
            }
            match self.process_next()? {
                Some(_) => pulled += 1,
                None => {
                    info!(pulled, "Capture source exhausted");
                    break;
                }
            }
        }
        Ok(pulled)
    }

    /// End the session
    ///
    /// Stops accepting frames, waits for the save worker to drain its
    /// backlog, delivers the remaining save events and releases the capture
    /// source last.
    pub fn shutdown(mut self) -> PipelineResult<SessionSummary> {
        self.finish()
    }

    fn finish(&mut self) -> PipelineResult<SessionSummary> {
        self.finished = true;

        let persistence = self.save_queue.shutdown();
        self.dispatch_events();
        self.source.release();

        let persistence = persistence?;
        let summary = SessionSummary {
            frames_processed: self.frames_processed,
            frames_failed: self.frames_failed,
            frames_backlogged: self.frames_backlogged,
            next_sequence_id: self.sequence_counter,
            persistence,
        };
        info!(?summary, "Frame pipeline stopped");
        Ok(summary)
    }

    fn handle_frame(&mut self, plane_data: &[u8]) -> PipelineResult<FrameOutcome> {
        let (width, height) = self.session_dimensions()?;
        let frame = RawFrame::new(width, height, plane_data);
        let encoded = self.transform(frame)?;
        self.deliver(encoded)
    }

    fn session_dimensions(&mut self) -> PipelineResult<(u32, u32)> {
        if let Some(dimensions) = self.dimensions {
            return Ok(dimensions);
        }
        let dimensions = self.source.dimensions()?;
        info!(
            width = dimensions.0,
            height = dimensions.1,
            "Capture dimensions"
        );
        self.dimensions = Some(dimensions);
        Ok(dimensions)
    }

    fn transform(&self, frame: RawFrame<'_>) -> PipelineResult<EncodedOutput> {
        let rotated = rotate(frame.plane_data, frame.width, frame.height)?;
        self.encoder.encode(&rotated, rotated.width, rotated.height)
    }

    fn deliver(&mut self, encoded: EncodedOutput) -> PipelineResult<FrameOutcome> {
        let sequence_id = self.advance_sequence();
        self.frames_processed += 1;
        if sequence_id % FRAME_LOG_INTERVAL == 0 {
            debug!(sequence_id, "Frame processed");
        }

        self.observer.on_preview_frame(&encoded.preview, sequence_id);

        let job = SaveJob::from_sequence(sequence_id, encoded.compressed);
        let slot_id = job.slot_id();
        match self.save_queue.enqueue(job) {
            Ok(()) => Ok(FrameOutcome::Enqueued {
                sequence_id,
                slot_id,
            }),
            Err(EnqueueError::Full) => {
                self.frames_backlogged += 1;
                warn!(sequence_id, slot_id, "Save backlog full, frame not persisted");
                Ok(FrameOutcome::Backlogged {
                    sequence_id,
                    slot_id,
                })
            }
            Err(EnqueueError::Closed) => Err(PipelineError::WorkerUnavailable(
                EnqueueError::Closed.to_string(),
            )),
        }
    }

    /// Hand out the current sequence id and advance the counter, wrapping to
    /// 0 after `MAX_FRAME_COUNT`
    fn advance_sequence(&mut self) -> u32 {
        let sequence_id = self.sequence_counter;
        self.sequence_counter = if sequence_id >= MAX_FRAME_COUNT {
            0
        } else {
            sequence_id + 1
        };
        sequence_id
    }

    /// Forward save worker events to the observer on the producer thread
    ///
    /// Runs after each handled frame and at shutdown, so a write that lands
    /// between frames is reported one frame interval late.
    fn dispatch_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                SaveEvent::FrameSaved { slot_id } => self.observer.on_frame_saved(slot_id),
                SaveEvent::RoundCompleted { round_count } => {
                    self.observer.on_round_completed(round_count)
                }
            }
        }
    }

    fn terminate(&mut self, err: PipelineError) -> PipelineError {
        self.terminated = Some(err.clone());
        end_session(self.observer.as_mut(), err)
    }

    #[cfg(test)]
    fn set_sequence_counter(&mut self, value: u32) {
        self.sequence_counter = value;
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        if !self.finished {
            debug!("FramePipeline dropped, shutting down");
            if let Err(e) = self.finish() {
                warn!(error = %e, "Frame pipeline did not stop cleanly");
            }
        }
    }
}

fn end_session(observer: &mut dyn PipelineObserver, err: PipelineError) -> PipelineError {
    error!(error = %err, "Capture session ended");
    observer.on_session_ended(&err);
    err
}
