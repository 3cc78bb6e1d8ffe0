// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Running the capture pipeline with a console progress display
//! - Rotating and encoding a single raw frame
//! - Showing the effective configuration

use capture_ring::PipelineError;
use capture_ring::backends::camera::{FrameSource, PixelFormat, RawFileSource, TestPatternSource};
use capture_ring::config::{self, Config};
use capture_ring::constants::frames::FRAME_LOG_INTERVAL;
use capture_ring::media::{FrameEncoder, Raster, rotate};
use capture_ring::pipelines::{FramePipeline, PipelineObserver, PipelineOptions};
use capture_ring::storage::{DirectoryStore, LogIndexer};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// Overrides for a single `run`
pub struct RunArgs {
    pub output: Option<PathBuf>,
    pub frames: Option<u64>,
    /// Raw input file with its (width, height)
    pub input: Option<(PathBuf, (u32, u32))>,
    pub looping: bool,
    pub pixel_format: Option<PixelFormat>,
    pub unbounded_backlog: bool,
    pub preview_dump: Option<PathBuf>,
}

/// Writes preview rasters to a file from its own thread
///
/// At most one dump waits behind the writer; newer previews are skipped while
/// it is busy, so the capture thread never touches the filesystem.
struct PreviewDumper {
    sender: Option<SyncSender<Vec<u8>>>,
    handle: Option<JoinHandle<()>>,
}

impl PreviewDumper {
    fn spawn(path: PathBuf) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<Vec<u8>>(1);
        let handle = thread::Builder::new()
            .name("preview-dump".into())
            .spawn(move || {
                for bytes in receiver {
                    if let Err(e) = std::fs::write(&path, &bytes) {
                        warn!(path = %path.display(), error = %e, "Failed to write preview dump");
                    }
                }
            })?;
        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    fn submit(&self, preview: &Raster) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(preview.as_bytes().to_vec()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Preview dump busy, skipping"),
            Err(TrySendError::Disconnected(_)) => warn!("Preview dump writer stopped"),
        }
    }
}

impl Drop for PreviewDumper {
    fn drop(&mut self) {
        // Closing the channel lets the writer finish the pending dump and exit
        self.sender.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!("Preview dump writer panicked");
        }
    }
}

/// Progress display in the terminal
struct ConsoleObserver {
    current_frame: u32,
    current_saved: Option<u32>,
    frame_round: u32,
    preview_dump: Option<PreviewDumper>,
}

impl ConsoleObserver {
    fn new(preview_dump: Option<PreviewDumper>) -> Self {
        Self {
            current_frame: 0,
            current_saved: None,
            frame_round: 0,
            preview_dump,
        }
    }

    fn redraw(&self) {
        let saved = self
            .current_saved
            .map(|slot| slot.to_string())
            .unwrap_or_else(|| "-".to_string());
        print!(
            "\rCurrent frame: {:>10}   Current saved: {:>3}   Frame round: {:>4}",
            self.current_frame, saved, self.frame_round
        );
        if let Err(e) = std::io::stdout().flush() {
            trace!(error = %e, "Failed to flush progress line");
        }
    }
}

impl PipelineObserver for ConsoleObserver {
    fn on_preview_frame(&mut self, preview: &Raster, sequence_id: u32) {
        self.current_frame = sequence_id;
        if sequence_id % FRAME_LOG_INTERVAL == 0
            && let Some(dumper) = &self.preview_dump
        {
            dumper.submit(preview);
        }
        self.redraw();
    }

    fn on_frame_saved(&mut self, slot_id: u32) {
        self.current_saved = Some(slot_id);
        self.redraw();
    }

    fn on_round_completed(&mut self, round_count: u32) {
        self.frame_round = round_count;
        self.redraw();
    }

    fn on_session_ended(&mut self, reason: &PipelineError) {
        println!();
        eprintln!("Capture stopped: {}", reason);
    }
}

/// Run the capture pipeline until Ctrl+C, the frame limit or the end of the
/// input file
pub fn run_capture(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load();
    if let Some(output) = args.output {
        config.output_dir = output;
    }
    if let Some(format) = args.pixel_format {
        config.pixel_format = format;
    }
    if args.unbounded_backlog {
        config.save_backlog = None;
    }

    let source: Box<dyn FrameSource> = match args.input {
        Some((path, (width, height))) => {
            println!("Reading frames from: {}", path.display());
            Box::new(RawFileSource::new(path, width, height).looping(args.looping))
        }
        None => {
            let capture = config.capture;
            println!(
                "Using test pattern: {}x{} @ {} fps",
                capture.width, capture.height, capture.framerate
            );
            Box::new(
                TestPatternSource::new(capture.width, capture.height, config.pixel_format)
                    .with_framerate(capture.framerate),
            )
        }
    };

    let store = DirectoryStore::new(&config.output_dir)?;
    println!("Saving to: {}", store.dir().display());
    let existing = store.saved_slots()?;
    if !existing.is_empty() {
        println!(
            "{} frames from an earlier session will be overwritten",
            existing.len()
        );
    }

    let preview_dump = args.preview_dump.map(PreviewDumper::spawn).transpose()?;

    let mut pipeline = FramePipeline::start(
        PipelineOptions::from(&config),
        source,
        Box::new(store),
        Box::new(LogIndexer),
        Box::new(ConsoleObserver::new(preview_dump)),
    )?;

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = Arc::clone(&stop_flag);
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Press Ctrl+C to stop");
    let run_result = pipeline.run(&stop_flag, args.frames);
    if stop_flag.load(Ordering::SeqCst) {
        println!();
        println!("Stopping...");
    }

    let summary = pipeline.shutdown()?;
    run_result?;

    println!();
    println!(
        "Processed {} frames ({} dropped, {} not saved)",
        summary.frames_processed, summary.frames_failed, summary.frames_backlogged
    );
    println!(
        "Saved {} frames in the current round, {} rounds completed",
        summary.persistence.current_count, summary.persistence.round_count
    );

    Ok(())
}

/// Rotate the first frame of a raw file and write it as JPEG
pub fn rotate_file(
    input: &Path,
    width: u32,
    height: u32,
    output: &Path,
    pixel_format: Option<PixelFormat>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pixel_format = pixel_format.unwrap_or_else(|| Config::load().pixel_format);

    let mut source = RawFileSource::new(input, width, height);
    source.open()?;
    let mut buffer = Vec::new();
    if !source.next_frame(&mut buffer)? {
        return Err(format!("No complete frame in {}", input.display()).into());
    }
    source.release();

    let rotated = rotate(&buffer, width, height)?;
    let jpeg = FrameEncoder::new(pixel_format).compress(&rotated, rotated.width, rotated.height)?;

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, &jpeg)?;

    println!(
        "Saved {}x{} {} frame to: {}",
        rotated.width,
        rotated.height,
        pixel_format,
        output.display()
    );
    Ok(())
}

/// Print the effective configuration as JSON, optionally writing it back
/// so every setting shows up in the config file
pub fn print_config(save: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    println!(
        "# {}",
        config::config_dir().join(config::CONFIG_FILE_NAME).display()
    );
    println!("{}", serde_json::to_string_pretty(&config)?);
    if save {
        let path = config.save()?;
        println!("Saved to: {}", path.display());
    }
    Ok(())
}
