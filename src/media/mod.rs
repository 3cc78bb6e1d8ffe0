// SPDX-License-Identifier: GPL-3.0-only

//! Media processing for captured frames
//!
//! # Rotation
//!
//! Sensor frames arrive in landscape orientation as semi-planar YUV 4:2:0.
//! The [`rotation`] module turns them 90° in a single pass without
//! converting color space.
//!
//! # Encoding
//!
//! The [`encoding`] module compresses rotated frames to JPEG and decodes the
//! result into an RGB565 preview raster.

pub mod encoding;
pub mod rotation;

// Re-export commonly used types
pub use encoding::{EncodedOutput, FrameEncoder, Raster};
pub use rotation::{rotate, rotate_counter_clockwise};
