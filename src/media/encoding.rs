// SPDX-License-Identifier: GPL-3.0-only

//! Frame encoding for persistence and preview
//!
//! Every rotated frame is compressed to JPEG at maximum quality. The preview
//! shown to the viewer is produced by decoding those JPEG bytes again into a
//! 16-bit RGB565 raster, so what the viewer sees is exactly what lands on
//! disk.

use crate::backends::camera::types::{PixelFormat, RotatedFrame, validate_yuv420};
use crate::constants::encoding::JPEG_QUALITY;
use crate::errors::{PipelineError, PipelineResult};
use image::{ExtendedColorType, ImageFormat};
use tracing::trace;

/// Pack 8-bit RGB into RGB565 (5 bits red, 6 bits green, 5 bits blue)
#[inline]
pub fn pack_rgb565(r: u8, g: u8, b: u8) -> u16 {
    ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3)
}

/// Expand an RGB565 value back to 8-bit RGB (low bits replicated)
#[inline]
pub fn unpack_rgb565(px: u16) -> [u8; 3] {
    let r = ((px >> 11) & 0x1F) as u8;
    let g = ((px >> 5) & 0x3F) as u8;
    let b = (px & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

/// Decoded preview image in RGB565, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u16>,
}

impl Raster {
    /// Pixel at (x, y) as 8-bit RGB
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        self.pixels.get(idx).copied().map(unpack_rgb565)
    }

    /// Raw native-endian RGB565 bytes, ready for a 16-bit framebuffer
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Result of encoding one frame
#[derive(Debug, Clone)]
pub struct EncodedOutput {
    /// JPEG bytes to persist
    pub compressed: Vec<u8>,
    /// Preview decoded from `compressed`
    pub preview: Raster,
}

/// JPEG encoder for rotated semi-planar frames
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    pixel_format: PixelFormat,
}

impl FrameEncoder {
    pub fn new(pixel_format: PixelFormat) -> Self {
        Self { pixel_format }
    }

    /// Compress a rotated frame and decode the preview raster from the result
    ///
    /// The compressed image covers the rectangle `[0, 0, out_width,
    /// out_height]` of the frame.
    ///
    /// # Errors
    /// `EncodingFailure` if the buffer does not match the frame dimensions,
    /// the rectangle is empty or exceeds the frame, or the codec fails. The
    /// failure only concerns this frame.
    pub fn encode(
        &self,
        rotated: &RotatedFrame,
        out_width: u32,
        out_height: u32,
    ) -> PipelineResult<EncodedOutput> {
        let compressed = self.compress(rotated, out_width, out_height)?;
        let preview = Self::decode_preview(&compressed)?;

        trace!(
            jpeg_bytes = compressed.len(),
            width = preview.width,
            height = preview.height,
            "Frame encoded"
        );

        Ok(EncodedOutput {
            compressed,
            preview,
        })
    }

    /// Compress the `[0, 0, out_width, out_height]` region to JPEG
    pub fn compress(
        &self,
        rotated: &RotatedFrame,
        out_width: u32,
        out_height: u32,
    ) -> PipelineResult<Vec<u8>> {
        validate_yuv420(rotated.width, rotated.height, rotated.plane_data.len())
            .map_err(|e| PipelineError::EncodingFailure(e.to_string()))?;

        if out_width == 0 || out_height == 0 {
            return Err(PipelineError::EncodingFailure(format!(
                "empty output rectangle {}x{}",
                out_width, out_height
            )));
        }
        if out_width > rotated.width || out_height > rotated.height {
            return Err(PipelineError::EncodingFailure(format!(
                "output rectangle {}x{} exceeds frame {}x{}",
                out_width, out_height, rotated.width, rotated.height
            )));
        }

        let rgb = yuv420sp_to_rgb(
            &rotated.plane_data,
            rotated.width,
            rotated.height,
            out_width,
            out_height,
            self.pixel_format,
        );

        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        let mut encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
        encoder.encode(&rgb, out_width, out_height, ExtendedColorType::Rgb8)?;

        Ok(buffer)
    }

    /// Decode JPEG bytes into an RGB565 raster
    pub fn decode_preview(jpeg: &[u8]) -> PipelineResult<Raster> {
        let image = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)?.to_rgb8();

        let (width, height) = image.dimensions();
        let pixels = image
            .pixels()
            .map(|p| pack_rgb565(p[0], p[1], p[2]))
            .collect();

        Ok(Raster {
            width,
            height,
            pixels,
        })
    }
}

/// Convert the top-left `out_width x out_height` region of a semi-planar
/// 4:2:0 frame to packed RGB8
///
/// BT.601 coefficients, full-range luma.
fn yuv420sp_to_rgb(
    data: &[u8],
    width: u32,
    height: u32,
    out_width: u32,
    out_height: u32,
    format: PixelFormat,
) -> Vec<u8> {
    let w = width as usize;
    let luma_len = w * height as usize;
    let (luma, chroma) = data.split_at(luma_len);
    let (u_off, v_off) = format.chroma_offsets();

    let ow = out_width as usize;
    let oh = out_height as usize;
    let mut rgb = Vec::with_capacity(ow * oh * 3);

    for y in 0..oh {
        let luma_row = &luma[y * w..y * w + ow];
        let chroma_row = &chroma[(y / 2) * w..];
        for (x, &luma_px) in luma_row.iter().enumerate() {
            let pair = (x / 2) * 2;
            let u = chroma_row[pair + u_off] as f32 - 128.0;
            let v = chroma_row[pair + v_off] as f32 - 128.0;
            let yf = luma_px as f32;

            rgb.push((yf + 1.402 * v).clamp(0.0, 255.0) as u8);
            rgb.push((yf - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8);
            rgb.push((yf + 1.772 * u).clamp(0.0, 255.0) as u8);
        }
    }

    rgb
}
