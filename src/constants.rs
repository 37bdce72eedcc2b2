// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Capture transport constants
pub mod capture {
    use super::Duration;

    /// Bounded depth of the shared capture channel (both media channels)
    ///
    /// Kept small so a stalled consumer surfaces as dropped samples rather
    /// than unbounded memory growth. Sources never block on a full channel.
    pub const QUEUE_DEPTH: usize = 32;

    /// Sleep interval for the sample pump when the channel is empty
    pub const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(2);
}

/// Recording pipeline constants
pub mod recording {
    /// Number of video frames the writer-side appsrc may buffer
    ///
    /// Multiplied by the frame size to set the appsrc byte cap; once the cap
    /// is reached the input reports not-ready and samples are dropped instead
    /// of queued.
    pub const VIDEO_QUEUE_FRAMES: u64 = 8;

    /// Byte cap for the writer-side audio appsrc
    pub const AUDIO_QUEUE_BYTES: u64 = 512 * 1024;

    /// Drop counter modulo for periodic not-ready logging
    pub const DROP_LOG_INTERVAL: u64 = 30;

    /// How long finalization waits for the pipeline to flush and emit EOS
    pub const FINALIZE_TIMEOUT_SECS: u64 = 10;
}

/// GStreamer pipeline constants
pub mod pipeline {
    /// Maximum buffer queue size (keep small for low latency)
    pub const MAX_BUFFERS: u32 = 2;

    /// Get number of threads for videoconvert based on available CPU threads
    pub fn videoconvert_threads() -> u32 {
        std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(4) // Fallback to 4 if detection fails
    }
}

/// Timing constants
pub mod timing {
    /// Sample counter modulo for periodic logging on the capture path
    pub const SAMPLE_LOG_INTERVAL: u64 = 30;

    /// GStreamer state change timeout for validation
    /// Reduced to minimize startup delay - we accept async state changes
    pub const STATE_CHANGE_TIMEOUT_MS: u64 = 50;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// Pipeline playing state timeout on start
    pub const START_TIMEOUT_SECS: u64 = 5;
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
    use super::*;

    #[test]
    fn test_videoconvert_threads_nonzero() {
        assert!(pipeline::videoconvert_threads() >= 1);
    }
}
