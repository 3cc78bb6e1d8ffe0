// SPDX-License-Identifier: GPL-3.0-only

//! Raw frame file source
//!
//! Reads back-to-back semi-planar 4:2:0 frames of a fixed size from a file,
//! e.g. a dump taken with `v4l2-ctl --stream-to`. A trailing partial frame is
//! ignored.

use super::FrameSource;
use super::types::{validate_yuv420, yuv420_len};
use crate::errors::{PipelineError, PipelineResult};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Capture source backed by a raw YUV file
pub struct RawFileSource {
    path: PathBuf,
    width: u32,
    height: u32,
    looping: bool,
    reader: Option<BufReader<File>>,
    frames_read: u64,
}

impl RawFileSource {
    pub fn new(path: impl AsRef<Path>, width: u32, height: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            width,
            height,
            looping: false,
            reader: None,
            frames_read: 0,
        }
    }

    /// Restart from the first frame when the end of the file is reached
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    fn frame_len(&self) -> usize {
        yuv420_len(self.width, self.height)
    }

    /// Read exactly one frame; `Ok(false)` on a clean or partial end of file
    fn read_frame(reader: &mut BufReader<File>, buffer: &mut [u8]) -> std::io::Result<bool> {
        match reader.read_exact(buffer) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl FrameSource for RawFileSource {
    fn name(&self) -> &str {
        "raw-file"
    }

    fn open(&mut self) -> PipelineResult<()> {
        validate_yuv420(self.width, self.height, self.frame_len())
            .map_err(|e| PipelineError::CaptureUnavailable(e.to_string()))?;

        let file = File::open(&self.path).map_err(|e| {
            PipelineError::CaptureUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
        let frame_count = file_len / self.frame_len() as u64;
        if frame_count == 0 {
            return Err(PipelineError::CaptureUnavailable(format!(
                "{} holds no complete {}x{} frame",
                self.path.display(),
                self.width,
                self.height
            )));
        }

        info!(
            path = %self.path.display(),
            width = self.width,
            height = self.height,
            frame_count,
            "Raw file source opened"
        );
        self.reader = Some(BufReader::new(file));
        Ok(())
    }

    fn dimensions(&self) -> PipelineResult<(u32, u32)> {
        if self.reader.is_none() {
            return Err(PipelineError::CaptureUnavailable(
                "raw file source not opened".to_string(),
            ));
        }
        Ok((self.width, self.height))
    }

    fn next_frame(&mut self, buffer: &mut Vec<u8>) -> PipelineResult<bool> {
        let frame_len = self.frame_len();
        let looping = self.looping;
        let reader = self.reader.as_mut().ok_or_else(|| {
            PipelineError::CaptureUnavailable("raw file source not opened".to_string())
        })?;

        buffer.resize(frame_len, 0);
        let io_err = |e: std::io::Error| PipelineError::CaptureUnavailable(e.to_string());

        if Self::read_frame(reader, buffer).map_err(io_err)? {
            self.frames_read += 1;
            return Ok(true);
        }

        if !looping {
            debug!(frames = self.frames_read, "Raw file source exhausted");
            return Ok(false);
        }

        reader.seek(SeekFrom::Start(0)).map_err(io_err)?;
        if Self::read_frame(reader, buffer).map_err(io_err)? {
            self.frames_read += 1;
            Ok(true)
        } else {
            warn!(path = %self.path.display(), "Raw file shrank while looping");
            Ok(false)
        }
    }

    fn release(&mut self) {
        if self.reader.take().is_some() {
            debug!(frames = self.frames_read, "Raw file source released");
        }
    }
}
