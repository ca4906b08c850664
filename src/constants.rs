// SPDX-License-Identifier: GPL-3.0-only

//! Library-wide constants

/// Hardware frame intervals are expressed in 100 ns ticks
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Environment variable naming the JSON configuration file
pub const CONFIG_ENV_VAR: &str = "BECAM_CONFIG";

/// Log filter used when neither RUST_LOG nor the configuration sets one
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Timing constants
pub mod timing {
    use std::time::Duration;

    /// How long a frame pull waits for a newer frame
    pub const FRAME_WAIT_TIMEOUT_MS: u64 = 1000;

    /// How long starting a graph may take before it is reported as failed
    pub const START_TIMEOUT_MS: u64 = 5000;

    /// How long stopping a graph may take before teardown continues anyway
    pub const STOP_TIMEOUT_MS: u64 = 2000;

    /// Frame interval used by scripted devices whose format has no rate
    pub const FALLBACK_FRAME_INTERVAL: Duration = Duration::from_millis(33);
}

/// Default format requested when the caller leaves any field at zero
pub mod formats {
    pub const DEFAULT_WIDTH: u32 = 1280;
    pub const DEFAULT_HEIGHT: u32 = 720;
    pub const DEFAULT_FPS: u32 = 60;
    pub const DEFAULT_PIXEL_FORMAT: &str = "MJPG";
}

/// GStreamer element and class names used by the desktop backend
pub mod gst_names {
    /// Device class watched by the device monitor
    pub const VIDEO_SOURCE_CLASS: &str = "Video/Source";
    pub const PIPELINE: &str = "becam-capture";
    pub const SOURCE: &str = "capture";
    pub const GRABBER: &str = "grabber";
    pub const TERMINATOR: &str = "terminator";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_ordered() {
        assert!(timing::FRAME_WAIT_TIMEOUT_MS < timing::START_TIMEOUT_MS);
        assert!(timing::STOP_TIMEOUT_MS > 0);
    }

    #[test]
    fn test_default_format_is_valid() {
        assert!(formats::DEFAULT_WIDTH > 0);
        assert!(formats::DEFAULT_HEIGHT > 0);
        assert!(formats::DEFAULT_FPS > 0);
        assert_eq!(formats::DEFAULT_PIXEL_FORMAT.len(), 4);
    }
}
