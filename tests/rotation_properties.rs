// SPDX-License-Identifier: GPL-3.0-only

//! Property-based tests for frame rotation
//!
//! Rotation must be a pure permutation of the buffer: dimensions swap, no
//! byte is lost, and rotating back (or four times forward) restores the
//! original frame.

use proptest::prelude::*;

use capture_ring::backends::camera::yuv420_len;
use capture_ring::media::{rotate, rotate_counter_clockwise};

/// Even dimensions up to 32x32 with a matching random buffer
fn frame() -> impl Strategy<Value = (u32, u32, Vec<u8>)> {
    (1u32..=16, 1u32..=16).prop_flat_map(|(half_w, half_h)| {
        let (width, height) = (half_w * 2, half_h * 2);
        (
            Just(width),
            Just(height),
            proptest::collection::vec(any::<u8>(), yuv420_len(width, height)),
        )
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn rotation_swaps_dimensions((width, height, data) in frame()) {
        let rotated = rotate(&data, width, height).unwrap();

        prop_assert_eq!(rotated.width, height);
        prop_assert_eq!(rotated.height, width);
        prop_assert_eq!(rotated.plane_data.len(), data.len());
    }

    #[test]
    fn luma_moves_clockwise((width, height, data) in frame()) {
        let rotated = rotate(&data, width, height).unwrap();
        let (w, h) = (width as usize, height as usize);

        // Source (x, y) lands at rotated column h-1-y of row x
        for y in 0..h {
            for x in 0..w {
                prop_assert_eq!(rotated.plane_data[x * h + (h - 1 - y)], data[y * w + x]);
            }
        }
    }

    #[test]
    fn chroma_pairs_stay_intact((width, height, data) in frame()) {
        let rotated = rotate(&data, width, height).unwrap();
        let luma_len = (width * height) as usize;

        let mut source_pairs: Vec<[u8; 2]> = data[luma_len..]
            .chunks_exact(2)
            .map(|p| [p[0], p[1]])
            .collect();
        let mut rotated_pairs: Vec<[u8; 2]> = rotated.plane_data[luma_len..]
            .chunks_exact(2)
            .map(|p| [p[0], p[1]])
            .collect();
        source_pairs.sort_unstable();
        rotated_pairs.sort_unstable();

        prop_assert_eq!(source_pairs, rotated_pairs);
    }

    #[test]
    fn counter_clockwise_restores_frame((width, height, data) in frame()) {
        let rotated = rotate(&data, width, height).unwrap();
        let restored =
            rotate_counter_clockwise(&rotated.plane_data, rotated.width, rotated.height).unwrap();

        prop_assert_eq!(restored.width, width);
        prop_assert_eq!(restored.height, height);
        prop_assert_eq!(restored.plane_data, data);
    }

    #[test]
    fn four_rotations_are_identity((width, height, data) in frame()) {
        let mut frame = rotate(&data, width, height).unwrap();
        for _ in 0..3 {
            frame = rotate(&frame.plane_data, frame.width, frame.height).unwrap();
        }

        prop_assert_eq!((frame.width, frame.height), (width, height));
        prop_assert_eq!(frame.plane_data, data);
    }

    #[test]
    fn odd_dimensions_are_rejected(half_w in 1u32..16, half_h in 1u32..16) {
        let (width, height) = (half_w * 2 + 1, half_h * 2);
        let data = vec![0u8; yuv420_len(width, height)];
        prop_assert!(rotate(&data, width, height).is_err());
    }
}
