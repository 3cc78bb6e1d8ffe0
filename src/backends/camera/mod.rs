// SPDX-License-Identifier: GPL-3.0-only

//! Capture source abstraction
//!
//! The frame pipeline does not know where frames come from. Anything that can
//! hand out fixed-size semi-planar 4:2:0 buffers implements [`FrameSource`]:
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │ TestPatternSource│     │  RawFileSource   │
//! └────────┬─────────┘     └────────┬─────────┘
//!          └──────────┬─────────────┘
//!                     ▼
//!            ┌────────────────┐
//!            │ FrameSource    │  ← open / dimensions / next_frame / release
//!            └───────┬────────┘
//!                    ▼
//!            ┌────────────────┐
//!            │ FramePipeline  │
//!            └────────────────┘
//! ```

pub mod raw_file;
pub mod test_pattern;
pub mod types;

pub use raw_file::RawFileSource;
pub use test_pattern::TestPatternSource;
pub use types::*;

use crate::errors::PipelineResult;

/// A capture device delivering raw frames one at a time
///
/// Frames are delivered sequentially and never overlap. Dimensions are
/// constant for the lifetime of an opened source.
pub trait FrameSource: Send {
    /// Human readable name for logging
    fn name(&self) -> &str;

    /// Acquire the device
    ///
    /// # Returns
    /// * `Err(PipelineError::CaptureUnavailable)` if no device can be opened
    fn open(&mut self) -> PipelineResult<()>;

    /// Frame dimensions in sensor orientation (width, height)
    fn dimensions(&self) -> PipelineResult<(u32, u32)>;

    /// Fill `buffer` with the next frame
    ///
    /// The buffer is reused between calls; its previous content is
    /// overwritten.
    ///
    /// # Returns
    /// * `Ok(true)` - A frame was written into `buffer`
    /// * `Ok(false)` - The source is exhausted
    /// * `Err(PipelineError::CaptureUnavailable)` - The device stopped working
    fn next_frame(&mut self, buffer: &mut Vec<u8>) -> PipelineResult<bool>;

    /// Release the device
    fn release(&mut self);
}
