// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture source
//!
//! Produces a moving diagonal luma gradient with slowly cycling chroma, so
//! rotation and encoding are visible without camera hardware.

use super::FrameSource;
use super::types::{PixelFormat, validate_yuv420, yuv420_len};
use crate::errors::{PipelineError, PipelineResult};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Test-pattern frame generator
pub struct TestPatternSource {
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
    frame_interval: Option<Duration>,
    frame_index: u64,
    last_frame_at: Option<Instant>,
    opened: bool,
}

impl TestPatternSource {
    /// Create a source that delivers frames as fast as they are pulled
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
            frame_interval: None,
            frame_index: 0,
            last_frame_at: None,
            opened: false,
        }
    }

    /// Pace delivery at the given frame rate (0 disables pacing)
    pub fn with_framerate(mut self, fps: u32) -> Self {
        self.frame_interval = (fps > 0).then(|| Duration::from_secs(1) / fps);
        self
    }

    fn fill(&self, buffer: &mut [u8]) {
        let w = self.width as usize;
        let h = self.height as usize;
        let shift = (self.frame_index % 256) as usize;

        let (luma, chroma) = buffer.split_at_mut(w * h);
        for (y, row) in luma.chunks_exact_mut(w).enumerate() {
            for (x, px) in row.iter_mut().enumerate() {
                *px = ((x + y + shift) & 0xFF) as u8;
            }
        }

        let (u_off, v_off) = self.pixel_format.chroma_offsets();
        let u = (128 + (shift as i32 - 128) / 2) as u8;
        let v = (255 - shift) as u8 / 2 + 64;
        for pair in chroma.chunks_exact_mut(2) {
            pair[u_off] = u;
            pair[v_off] = v;
        }
    }
}

impl FrameSource for TestPatternSource {
    fn name(&self) -> &str {
        "test-pattern"
    }

    fn open(&mut self) -> PipelineResult<()> {
        validate_yuv420(self.width, self.height, yuv420_len(self.width, self.height))
            .map_err(|e| PipelineError::CaptureUnavailable(e.to_string()))?;
        info!(
            width = self.width,
            height = self.height,
            format = %self.pixel_format,
            "Test pattern source opened"
        );
        self.opened = true;
        Ok(())
    }

    fn dimensions(&self) -> PipelineResult<(u32, u32)> {
        if !self.opened {
            return Err(PipelineError::CaptureUnavailable(
                "test pattern source not opened".to_string(),
            ));
        }
        Ok((self.width, self.height))
    }

    fn next_frame(&mut self, buffer: &mut Vec<u8>) -> PipelineResult<bool> {
        if !self.opened {
            return Err(PipelineError::CaptureUnavailable(
                "test pattern source not opened".to_string(),
            ));
        }

        if let (Some(interval), Some(last)) = (self.frame_interval, self.last_frame_at) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());

        buffer.resize(yuv420_len(self.width, self.height), 0);
        self.fill(buffer);
        self.frame_index += 1;
        Ok(true)
    }

    fn release(&mut self) {
        if self.opened {
            debug!(frames = self.frame_index, "Test pattern source released");
        }
        self.opened = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_open() {
        let mut source = TestPatternSource::new(4, 2, PixelFormat::Nv21);
        let mut buffer = Vec::new();
        assert!(source.dimensions().is_err());
        assert!(source.next_frame(&mut buffer).is_err());
    }

    #[test]
    fn test_frames_have_declared_shape() {
        let mut source = TestPatternSource::new(8, 4, PixelFormat::Nv12);
        source.open().unwrap();
        assert_eq!(source.dimensions().unwrap(), (8, 4));

        let mut buffer = Vec::new();
        assert!(source.next_frame(&mut buffer).unwrap());
        assert_eq!(buffer.len(), yuv420_len(8, 4));
        let first = buffer.clone();

        assert!(source.next_frame(&mut buffer).unwrap());
        assert_ne!(first, buffer, "pattern should move between frames");
    }

    #[test]
    fn test_odd_dimensions_are_unavailable() {
        let mut source = TestPatternSource::new(5, 4, PixelFormat::Nv21);
        assert!(matches!(
            source.open(),
            Err(PipelineError::CaptureUnavailable(_))
        ));
    }
}
