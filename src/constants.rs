// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

/// Persistence limits for the round-robin save queue
pub mod persistence {
    /// Number of distinct save slots in one round
    ///
    /// Slot ids are `sequence_id % CAPACITY`, so files on disk are always
    /// `pic_0.jpg` through `pic_499.jpg`.
    pub const CAPACITY: u32 = 500;

    /// Minimum free bytes on the output filesystem before capture may start
    pub const MIN_FREE_BYTES: u64 = 500_000_000;

    /// Default number of save jobs that may wait behind the worker
    pub const DEFAULT_SAVE_BACKLOG: usize = 256;

    /// File name prefix for persisted frames
    pub const FILE_PREFIX: &str = "pic_";

    /// File extension for persisted frames
    pub const FILE_EXTENSION: &str = "jpg";

    /// File name for a slot (`pic_<slot>.jpg`)
    pub fn slot_file_name(slot_id: u32) -> String {
        format!("{}{}.{}", FILE_PREFIX, slot_id, FILE_EXTENSION)
    }

    /// Parse a slot id back out of a persisted file name
    pub fn slot_from_file_name(name: &str) -> Option<u32> {
        let slot = name
            .strip_prefix(FILE_PREFIX)?
            .strip_suffix(FILE_EXTENSION)?
            .strip_suffix('.')?
            .parse::<u32>()
            .ok()?;
        (slot < CAPACITY).then_some(slot)
    }
}

/// Frame counter constants
pub mod frames {
    /// Largest value the externally visible frame counter reaches before it
    /// wraps back to 0
    pub const MAX_FRAME_COUNT: u32 = i32::MAX as u32 - 10;

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u32 = 30;
}

/// Encoder constants
pub mod encoding {
    /// JPEG quality used for every persisted frame (maximum)
    pub const JPEG_QUALITY: u8 = 100;
}

/// Synthetic capture defaults
pub mod capture {
    /// Default capture width (sensor orientation, before rotation)
    pub const DEFAULT_WIDTH: u32 = 640;

    /// Default capture height (sensor orientation, before rotation)
    pub const DEFAULT_HEIGHT: u32 = 480;

    /// Default frame rate for the test-pattern source
    pub const DEFAULT_FRAMERATE: u32 = 30;
}

/// Application information utilities
pub mod app_info {
    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }
}

#[cfg(test)]
mod tests {
    use super::persistence::*;

    #[test]
    fn test_slot_file_names() {
        assert_eq!(slot_file_name(0), "pic_0.jpg");
        assert_eq!(slot_file_name(499), "pic_499.jpg");
        assert_eq!(slot_from_file_name("pic_42.jpg"), Some(42));
        assert_eq!(slot_from_file_name("pic_500.jpg"), None);
        assert_eq!(slot_from_file_name("pic_.jpg"), None);
        assert_eq!(slot_from_file_name("img_3.jpg"), None);
    }
}
