// SPDX-License-Identifier: GPL-3.0-only

//! Round-robin persistence of encoded frames
//!
//! A single background worker owns the [`PersistenceState`] and the
//! [`FrameStore`]. Jobs arrive in submission order over a channel and are
//! handled strictly one at a time:
//!
//! ```text
//! producer ──SaveJob──▶ [ backlog ] ──▶ save-worker ──▶ pic_<slot>.jpg
//!                                           │
//!                                           └──SaveEvent──▶ producer
//! ```
//!
//! Per job the worker does exactly one of:
//!
//! 1. **Roll over** when `current_count` has reached [`CAPACITY`]: the counter
//!    restarts, `round_count` grows, and the job itself is not written.
//! 2. **Write** when the slot is in range and differs from the last written
//!    slot. A failed write leaves the state untouched.
//! 3. **Skip** anything else.

use crate::constants::persistence::{CAPACITY, slot_file_name};
use crate::errors::{PipelineError, PipelineResult};
use crate::pipelines::events::SaveEvent;
use crate::storage::{FrameStore, MediaIndexer};
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// One encoded frame waiting to be persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveJob {
    slot_id: u32,
    bytes: Vec<u8>,
}

impl SaveJob {
    /// Job for the frame with the given sequence id (`slot = id % CAPACITY`)
    pub fn from_sequence(sequence_id: u32, bytes: Vec<u8>) -> Self {
        Self {
            slot_id: sequence_id % CAPACITY,
            bytes,
        }
    }

    /// Job for an explicit slot, `None` if the slot is out of range
    pub fn for_slot(slot_id: u32, bytes: Vec<u8>) -> Option<Self> {
        (slot_id < CAPACITY).then_some(Self { slot_id, bytes })
    }

    pub fn slot_id(&self) -> u32 {
        self.slot_id
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// What the worker does with the next job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveDecision {
    Write,
    RollOver,
    Skip,
}

/// Counters owned by the save worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceState {
    /// Writes in the current round, `0..=CAPACITY`
    pub current_count: u32,
    /// Completed rounds
    pub round_count: u32,
    /// Slot of the most recent successful write
    pub last_written_slot: Option<u32>,
}

impl PersistenceState {
    /// Decide how to handle a job for `slot_id` without changing state
    pub fn decide(&self, slot_id: u32) -> SaveDecision {
        if self.current_count >= CAPACITY {
            SaveDecision::RollOver
        } else if slot_id < CAPACITY && self.last_written_slot != Some(slot_id) {
            SaveDecision::Write
        } else {
            SaveDecision::Skip
        }
    }

    /// Account for a successful write to `slot_id`
    pub fn record_write(&mut self, slot_id: u32) {
        self.last_written_slot = Some(slot_id);
        self.current_count += 1;
    }

    /// Start a new round and return the new round count
    pub fn roll_over(&mut self) -> u32 {
        self.current_count = 0;
        self.round_count += 1;
        self.round_count
    }
}

/// Why a job could not be queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The backlog is at its bound; the job was dropped
    Full,
    /// The worker has stopped
    Closed,
}

impl fmt::Display for EnqueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnqueueError::Full => write!(f, "save backlog is full"),
            EnqueueError::Closed => write!(f, "save worker has stopped"),
        }
    }
}

impl std::error::Error for EnqueueError {}

enum JobSender {
    Bounded(SyncSender<SaveJob>),
    Unbounded(Sender<SaveJob>),
}

impl JobSender {
    fn try_send(&self, job: SaveJob) -> Result<(), EnqueueError> {
        match self {
            JobSender::Bounded(tx) => tx.try_send(job).map_err(|e| match e {
                TrySendError::Full(_) => EnqueueError::Full,
                TrySendError::Disconnected(_) => EnqueueError::Closed,
            }),
            JobSender::Unbounded(tx) => tx.send(job).map_err(|_| EnqueueError::Closed),
        }
    }
}

struct SaveWorker {
    state: PersistenceState,
    store: Box<dyn FrameStore>,
    indexer: Box<dyn MediaIndexer>,
    events: Sender<SaveEvent>,
}

impl SaveWorker {
    fn run(mut self, jobs: Receiver<SaveJob>) -> PersistenceState {
        info!("Save worker started");

        // Ends once every sender is gone and the backlog is drained
        for job in jobs {
            self.process(job);
        }

        info!(
            current_count = self.state.current_count,
            round_count = self.state.round_count,
            "Save worker finished"
        );
        self.state
    }

    fn process(&mut self, job: SaveJob) {
        match self.state.decide(job.slot_id) {
            SaveDecision::RollOver => {
                let round_count = self.state.roll_over();
                info!(round_count, slot_id = job.slot_id, "Save round completed");
                self.emit(SaveEvent::RoundCompleted { round_count });
            }
            SaveDecision::Write => self.write(job),
            SaveDecision::Skip => {
                debug!(slot_id = job.slot_id, "Skipping save job for last written slot");
            }
        }
    }

    fn write(&mut self, job: SaveJob) {
        let name = slot_file_name(job.slot_id);
        match self.store.write(&name, &job.bytes) {
            Ok(path) => {
                self.state.record_write(job.slot_id);
                self.emit(SaveEvent::FrameSaved {
                    slot_id: job.slot_id,
                });

                if let Err(e) = self.indexer.index(&path) {
                    warn!(path = %path.display(), error = %e, "Media indexing failed");
                }
            }
            Err(e) => {
                let err = PipelineError::from(e);
                warn!(slot_id = job.slot_id, error = %err, "Failed to save frame");
            }
        }
    }

    fn emit(&self, event: SaveEvent) {
        if self.events.send(event).is_err() {
            debug!(?event, "No receiver for save event");
        }
    }
}

/// Handle to the background save worker
pub struct SaveQueue {
    sender: Option<JobSender>,
    worker: Option<JoinHandle<PersistenceState>>,
}

impl SaveQueue {
    /// Spawn the save worker
    ///
    /// `backlog` bounds the number of jobs waiting behind the worker; `None`
    /// lets the backlog grow without limit.
    ///
    /// # Returns
    /// The queue and the receiving end for [`SaveEvent`]s.
    pub fn start(
        store: Box<dyn FrameStore>,
        indexer: Box<dyn MediaIndexer>,
        backlog: Option<usize>,
    ) -> PipelineResult<(Self, Receiver<SaveEvent>)> {
        let (event_tx, event_rx) = mpsc::channel();
        let (sender, job_rx) = match backlog {
            Some(bound) => {
                let (tx, rx) = mpsc::sync_channel(bound.max(1));
                (JobSender::Bounded(tx), rx)
            }
            None => {
                let (tx, rx) = mpsc::channel();
                (JobSender::Unbounded(tx), rx)
            }
        };

        let worker = SaveWorker {
            state: PersistenceState::default(),
            store,
            indexer,
            events: event_tx,
        };

        let handle = thread::Builder::new()
            .name("save-worker".to_string())
            .spawn(move || worker.run(job_rx))
            .map_err(|e| {
                PipelineError::WorkerUnavailable(format!("Spawn save worker: {}", e))
            })?;

        debug!(?backlog, "Save queue started");

        Ok((
            Self {
                sender: Some(sender),
                worker: Some(handle),
            },
            event_rx,
        ))
    }

    /// Hand a job to the worker without blocking
    pub fn enqueue(&self, job: SaveJob) -> Result<(), EnqueueError> {
        match &self.sender {
            Some(sender) => sender.try_send(job),
            None => Err(EnqueueError::Closed),
        }
    }

    /// Stop accepting jobs, let the worker drain the backlog and return its
    /// final state
    pub fn shutdown(&mut self) -> PipelineResult<PersistenceState> {
        self.sender.take();

        let handle = self.worker.take().ok_or_else(|| {
            PipelineError::WorkerUnavailable("save worker already stopped".to_string())
        })?;

        debug!("Waiting for save worker to drain");
        handle
            .join()
            .map_err(|_| PipelineError::WorkerUnavailable("save worker panicked".to_string()))
    }
}

impl Drop for SaveQueue {
    fn drop(&mut self) {
        if self.worker.is_some() {
            debug!("SaveQueue dropped, stopping worker");
            if let Err(e) = self.shutdown() {
                warn!(error = %e, "Save worker did not stop cleanly");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LogIndexer, MemoryStore};
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    fn job(slot_id: u32) -> SaveJob {
        SaveJob::for_slot(slot_id, vec![slot_id as u8]).unwrap()
    }

    fn run_jobs(
        store: MemoryStore,
        slots: impl IntoIterator<Item = u32>,
    ) -> (PersistenceState, Vec<SaveEvent>) {
        let (mut queue, events) =
            SaveQueue::start(Box::new(store), Box::new(LogIndexer), None).unwrap();
        for slot in slots {
            queue.enqueue(job(slot)).unwrap();
        }
        let state = queue.shutdown().unwrap();
        (state, events.try_iter().collect())
    }

    #[test]
    fn test_slot_from_sequence() {
        assert_eq!(SaveJob::from_sequence(0, vec![]).slot_id(), 0);
        assert_eq!(SaveJob::from_sequence(499, vec![]).slot_id(), 499);
        assert_eq!(SaveJob::from_sequence(500, vec![]).slot_id(), 0);
        assert_eq!(SaveJob::from_sequence(1234, vec![]).slot_id(), 234);
        assert!(SaveJob::for_slot(500, vec![]).is_none());
    }

    #[test]
    fn test_decisions() {
        let mut state = PersistenceState::default();
        assert_eq!(state.decide(7), SaveDecision::Write);

        state.record_write(7);
        assert_eq!(state.decide(7), SaveDecision::Skip);
        assert_eq!(state.decide(8), SaveDecision::Write);
        assert_eq!(state.decide(CAPACITY), SaveDecision::Skip);

        state.current_count = CAPACITY;
        assert_eq!(state.decide(8), SaveDecision::RollOver);
        assert_eq!(state.roll_over(), 1);
        assert_eq!(state.current_count, 0);
        assert_eq!(state.decide(8), SaveDecision::Write);
    }

    #[test]
    fn test_consecutive_duplicates_written_once() {
        let store = MemoryStore::new(u64::MAX);
        let (state, events) = run_jobs(store.clone(), [5, 5]);

        assert_eq!(store.write_log(), vec!["pic_5.jpg"]);
        assert_eq!(state.current_count, 1);
        assert_eq!(events, vec![SaveEvent::FrameSaved { slot_id: 5 }]);
    }

    #[test]
    fn test_only_last_slot_is_suppressed() {
        let store = MemoryStore::new(u64::MAX);
        let (state, events) = run_jobs(store.clone(), [3, 3, 4, 3]);

        // The second 3 is dropped; the final 3 follows a write to 4
        assert_eq!(store.write_log(), vec!["pic_3.jpg", "pic_4.jpg", "pic_3.jpg"]);
        assert_eq!(state.last_written_slot, Some(3));
        assert_eq!(state.current_count, 3);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn test_capacity_bound_rolls_over() {
        let store = MemoryStore::new(u64::MAX);
        let (state, events) = run_jobs(store.clone(), (0..1200u32).map(|i| i % CAPACITY));

        let rounds: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SaveEvent::RoundCompleted { round_count } => Some(*round_count),
                _ => None,
            })
            .collect();
        assert_eq!(rounds, vec![1, 2]);

        // 500 writes, 1 rollover tick, 500 writes, 1 rollover tick, 198 writes
        assert_eq!(store.write_log().len(), 1198);
        assert_eq!(store.file_count(), CAPACITY as usize);
        assert_eq!(state.round_count, 2);
        assert_eq!(state.current_count, 198);
        assert!(state.current_count <= CAPACITY);
    }

    struct FailingStore;

    impl FrameStore for FailingStore {
        fn available_bytes(&self) -> io::Result<u64> {
            Ok(u64::MAX)
        }

        fn write(&mut self, _name: &str, _bytes: &[u8]) -> io::Result<PathBuf> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[test]
    fn test_write_failure_leaves_state_untouched() {
        let (mut queue, events) =
            SaveQueue::start(Box::new(FailingStore), Box::new(LogIndexer), Some(8)).unwrap();
        queue.enqueue(job(1)).unwrap();
        queue.enqueue(job(1)).unwrap();

        let state = queue.shutdown().unwrap();
        assert_eq!(state, PersistenceState::default());
        assert_eq!(events.try_iter().count(), 0);
    }

    #[test]
    fn test_indexer_failure_is_not_fatal() {
        let indexed = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&indexed);
        let indexer = move |path: &Path| -> Result<(), String> {
            seen.lock().unwrap().push(path.to_path_buf());
            Err("catalog offline".to_string())
        };

        let store = MemoryStore::new(u64::MAX);
        let (mut queue, events) =
            SaveQueue::start(Box::new(store.clone()), Box::new(indexer), None).unwrap();
        queue.enqueue(job(0)).unwrap();
        queue.enqueue(job(1)).unwrap();
        let state = queue.shutdown().unwrap();

        assert_eq!(state.current_count, 2);
        assert_eq!(store.file_count(), 2);
        assert_eq!(indexed.lock().unwrap().len(), 2);
        assert_eq!(events.try_iter().count(), 2);
    }

    #[test]
    fn test_enqueue_after_shutdown() {
        let (mut queue, _events) =
            SaveQueue::start(Box::new(MemoryStore::new(0)), Box::new(LogIndexer), None).unwrap();
        queue.shutdown().unwrap();

        assert_eq!(queue.enqueue(job(0)), Err(EnqueueError::Closed));
        assert!(matches!(
            queue.shutdown(),
            Err(PipelineError::WorkerUnavailable(_))
        ));
    }
}
