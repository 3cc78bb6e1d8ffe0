// SPDX-License-Identifier: GPL-3.0-only

//! 90° rotation of semi-planar YUV 4:2:0 buffers
//!
//! Sensors deliver landscape frames; the viewer shows them portrait. The
//! rotation runs on the capture thread for every frame, so it is a single
//! linear pass over the output buffer with one allocation and no
//! intermediate planes.
//!
//! Chroma samples are moved as interleaved pairs, so the same code serves
//! NV12 and NV21.

use crate::backends::camera::types::{RotatedFrame, validate_yuv420};
use crate::errors::PipelineResult;

/// Rotate a frame 90° clockwise
///
/// The result has `width == height_in` and `height == width_in` and the same
/// byte length as the input.
///
/// # Errors
/// `InvalidFrameShape` if the dimensions are zero or odd, or the buffer length
/// is not `width * height * 3 / 2`.
pub fn rotate(buffer: &[u8], width: u32, height: u32) -> PipelineResult<RotatedFrame> {
    validate_yuv420(width, height, buffer.len())?;

    let w = width as usize;
    let h = height as usize;
    let luma_len = w * h;
    let mut out = vec![0u8; buffer.len()];

    // Luma: walk source columns left to right, each bottom to top
    let mut i = 0;
    for x in 0..w {
        for y in (0..h).rev() {
            out[i] = buffer[y * w + x];
            i += 1;
        }
    }

    // Chroma: fill from the end backwards, one pair per step, walking source
    // pair columns right to left and each column top to bottom
    let chroma = &buffer[luma_len..];
    let mut i = out.len() - 1;
    for x in (1..w).rev().step_by(2) {
        for y in 0..h / 2 {
            out[i] = chroma[y * w + x];
            out[i - 1] = chroma[y * w + x - 1];
            i -= 2;
        }
    }

    Ok(RotatedFrame {
        width: height,
        height: width,
        plane_data: out,
    })
}

/// Rotate a frame 90° counter-clockwise (inverse of [`rotate`])
pub fn rotate_counter_clockwise(
    buffer: &[u8],
    width: u32,
    height: u32,
) -> PipelineResult<RotatedFrame> {
    validate_yuv420(width, height, buffer.len())?;

    let w = width as usize;
    let h = height as usize;
    let luma_len = w * h;
    let mut out = vec![0u8; buffer.len()];

    // Output row r is source column w-1-r, read top to bottom
    let mut i = 0;
    for x in (0..w).rev() {
        for y in 0..h {
            out[i] = buffer[y * w + x];
            i += 1;
        }
    }

    // Same walk over chroma pairs (a pair column is two bytes wide)
    let chroma = &buffer[luma_len..];
    let mut i = luma_len;
    for pair_x in (0..w / 2).rev() {
        for y in 0..h / 2 {
            let src = y * w + pair_x * 2;
            out[i] = chroma[src];
            out[i + 1] = chroma[src + 1];
            i += 2;
        }
    }

    Ok(RotatedFrame {
        width: height,
        height: width,
        plane_data: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PipelineError;

    /// 4x2 frame: luma 0..8, chroma pairs (a0,b0) (a1,b1)
    fn sample_4x2() -> Vec<u8> {
        vec![0, 1, 2, 3, 4, 5, 6, 7, 100, 101, 110, 111]
    }

    #[test]
    fn test_rotate_known_frame() {
        let rotated = rotate(&sample_4x2(), 4, 2).unwrap();
        assert_eq!(rotated.width, 2);
        assert_eq!(rotated.height, 4);
        // Rows of the rotated luma: [4,0] [5,1] [6,2] [7,3]
        assert_eq!(&rotated.plane_data[..8], &[4, 0, 5, 1, 6, 2, 7, 3]);
        // One pair per rotated chroma row, pairs kept intact
        assert_eq!(&rotated.plane_data[8..], &[100, 101, 110, 111]);
    }

    #[test]
    fn test_rotate_square_chroma_grid() {
        // 4x4: chroma is 2 rows of 2 pairs
        // row 0: P00 P01, row 1: P10 P11
        let mut frame = vec![0u8; 16];
        frame.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let rotated = rotate(&frame, 4, 4).unwrap();
        // Clockwise: row 0 = P10 P00, row 1 = P11 P01
        assert_eq!(&rotated.plane_data[16..], &[5, 6, 1, 2, 7, 8, 3, 4]);
    }

    #[test]
    fn test_counter_clockwise_undoes_rotate() {
        let original = sample_4x2();
        let rotated = rotate(&original, 4, 2).unwrap();
        let restored =
            rotate_counter_clockwise(&rotated.plane_data, rotated.width, rotated.height).unwrap();
        assert_eq!(restored.width, 4);
        assert_eq!(restored.height, 2);
        assert_eq!(restored.plane_data, original);
    }

    #[test]
    fn test_rotate_rejects_malformed_input() {
        assert!(matches!(
            rotate(&[0u8; 11], 4, 2),
            Err(PipelineError::InvalidFrameShape { .. })
        ));
        assert!(matches!(
            rotate(&[], 0, 0),
            Err(PipelineError::InvalidFrameShape { .. })
        ));
        // 3x2 would need a half chroma pair per row
        assert!(matches!(
            rotate(&[0u8; 9], 3, 2),
            Err(PipelineError::InvalidFrameShape { .. })
        ));
    }
}
