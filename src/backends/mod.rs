// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for frame capture
//!
//! - [`camera`]: capture source trait, frame types, and the synthetic and
//!   raw-file sources

pub mod camera;
