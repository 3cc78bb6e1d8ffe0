// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture sources

use crate::errors::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};

/// Chroma layout of a semi-planar YUV 4:2:0 frame
///
/// Both layouts carry a full-resolution Y plane followed by one plane of
/// interleaved chroma pairs at half resolution in each direction. They only
/// differ in which chroma sample comes first in each pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// NV21 - Y plane + interleaved VU plane (Android camera preview default)
    #[default]
    Nv21,
    /// NV12 - Y plane + interleaved UV plane
    Nv12,
}

impl PixelFormat {
    /// Offsets of (U, V) inside one interleaved chroma pair
    pub fn chroma_offsets(&self) -> (usize, usize) {
        match self {
            PixelFormat::Nv21 => (1, 0),
            PixelFormat::Nv12 => (0, 1),
        }
    }

    /// Get display name for the format
    pub fn display_name(&self) -> &'static str {
        match self {
            PixelFormat::Nv21 => "NV21",
            PixelFormat::Nv12 => "NV12",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Byte length of a 4:2:0 frame with the given dimensions
pub fn yuv420_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3 / 2
}

/// Check that a buffer is a well-formed 4:2:0 frame
///
/// Width and height must both be non-zero and even: the chroma plane pairs
/// columns two at a time and rows two at a time, so an odd dimension leaves
/// a column or row without a chroma sample.
pub fn validate_yuv420(width: u32, height: u32, len: usize) -> PipelineResult<()> {
    let shape_error = |reason| PipelineError::InvalidFrameShape {
        width,
        height,
        len,
        reason,
    };

    if width == 0 || height == 0 {
        return Err(shape_error("dimensions must be non-zero"));
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(shape_error("dimensions must be even"));
    }
    if len != yuv420_len(width, height) {
        return Err(shape_error("buffer length must equal width*height*3/2"));
    }
    Ok(())
}

/// A raw sensor frame borrowed from the capture source
///
/// The source may overwrite `plane_data` as soon as the pipeline returns
/// from processing it, so the pipeline never keeps this around.
#[derive(Debug, Clone, Copy)]
pub struct RawFrame<'a> {
    pub width: u32,
    pub height: u32,
    pub plane_data: &'a [u8],
}

impl<'a> RawFrame<'a> {
    pub fn new(width: u32, height: u32, plane_data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            plane_data,
        }
    }

    /// Validate the buffer length against the declared dimensions
    pub fn validate(&self) -> PipelineResult<()> {
        validate_yuv420(self.width, self.height, self.plane_data.len())
    }
}

/// A frame after a 90° rotation, owning its buffer
///
/// `width` and `height` are the rotated (display) dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotatedFrame {
    pub width: u32,
    pub height: u32,
    pub plane_data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuv420_len() {
        assert_eq!(yuv420_len(640, 480), 460_800);
        assert_eq!(yuv420_len(2, 2), 6);
    }

    #[test]
    fn test_validate_accepts_well_formed_frame() {
        let data = vec![0u8; yuv420_len(4, 2)];
        assert!(RawFrame::new(4, 2, &data).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        let data = vec![0u8; 12];
        assert!(matches!(
            validate_yuv420(0, 8, 0),
            Err(PipelineError::InvalidFrameShape { .. })
        ));
        assert!(matches!(
            validate_yuv420(3, 2, 9),
            Err(PipelineError::InvalidFrameShape { .. })
        ));
        assert!(matches!(
            RawFrame::new(4, 4, &data).validate(),
            Err(PipelineError::InvalidFrameShape { len: 12, .. })
        ));
    }

    #[test]
    fn test_chroma_offsets() {
        assert_eq!(PixelFormat::Nv21.chroma_offsets(), (1, 0));
        assert_eq!(PixelFormat::Nv12.chroma_offsets(), (0, 1));
    }
}
