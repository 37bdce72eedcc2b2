// SPDX-License-Identifier: MPL-2.0

//! Muxer abstraction
//!
//! The recorder drives the container writer exclusively through this trait,
//! which keeps the session state machine testable without a media stack and
//! isolates it from writer implementation details. The production
//! implementation is [`crate::recording::gst_muxer::GstMuxer`].

use crate::capture::types::{Channel, MediaSample, Timestamp};
use crate::errors::RecordingResult;
use crate::recording::settings::ChannelSettings;

/// Externally observable writer state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxerStatus {
    /// Created, no session started yet
    Unknown,
    /// Session started, accepting samples
    Writing,
    /// Writer entered a failure state; no further samples will be accepted
    Failed,
    /// Finalized successfully
    Completed,
}

/// Completion callback invoked exactly once when finalization ends
///
/// The muxer chooses the invoking thread; callers must not assume any
/// particular execution context.
pub type FinalizeCallback = Box<dyn FnOnce(RecordingResult<()>) + Send + 'static>;

/// Stateful container writer
///
/// Lifecycle: inputs are registered while the status is still `Unknown`,
/// `start` is called exactly once with the timeline origin, samples are
/// appended while `Writing`, and `finalize` consumes the muxer - so a second
/// finalization is unrepresentable.
pub trait Muxer: Send {
    /// Register an input for a channel before the session starts
    ///
    /// # Returns
    /// * `Ok(())` - Input created and linked
    /// * `Err(RecordingError::ConfigurationUnsupported)` - The writer cannot
    ///   encode this channel; the caller is expected to omit it and continue
    fn register_input(&mut self, channel: Channel, settings: &ChannelSettings)
    -> RecordingResult<()>;

    /// Start the writing session at the timeline origin
    ///
    /// All sample timestamps are interpreted relative to `at`. Valid exactly
    /// once, before any append.
    fn start(&mut self, at: Timestamp) -> RecordingResult<()>;

    /// Current writer status
    fn status(&self) -> MuxerStatus;

    /// Whether the input for `channel` can take a sample right now
    ///
    /// False for unregistered channels and while the input's internal queue
    /// is full. Callers drop samples instead of waiting.
    fn is_input_ready(&self, channel: Channel) -> bool;

    /// Append one sample payload to the channel's input
    fn append(&mut self, channel: Channel, sample: &MediaSample) -> RecordingResult<()>;

    /// Failure detail, present once status is `Failed`
    fn failure(&self) -> Option<String>;

    /// Flush all inputs, close the container, and report the result
    ///
    /// Consumes the muxer. `on_complete` is invoked exactly once, on a thread
    /// of the muxer's choosing, after the output file is in its final state.
    fn finalize(self: Box<Self>, on_complete: FinalizeCallback);
}

#[cfg(test)]
pub(crate) mod tests {
    //! Scriptable muxer for recorder and router tests

    use super::*;
    use crate::errors::RecordingError;
    use std::sync::{Arc, Mutex};

    /// Shared, observable state of a [`MockMuxer`]
    ///
    /// Tests keep a clone of the `Arc` handed out by [`MockMuxer::call_log`]
    /// and toggle flags while the recorder owns the muxer box.
    pub struct MockState {
        pub status: MuxerStatus,
        pub registered: [bool; 2],
        /// Per-channel readiness, writable by tests mid-session
        pub ready: [bool; 2],
        /// Channels whose registration is rejected
        pub reject: [bool; 2],
        /// Latch status to Failed once this many appends have succeeded
        pub fail_after: Option<u64>,
        pub failure: Option<String>,
        /// (channel, timestamp nanos) for every append that reached the muxer
        pub appends: Vec<(Channel, u64)>,
        pub started_at: Option<Timestamp>,
        pub finalize_result: Result<(), RecordingError>,
        /// When set, finalize stashes its callback instead of firing it
        pub defer_finalize: bool,
        pub pending_callback: Option<FinalizeCallback>,
        pub finalized: bool,
    }

    pub struct MockMuxer {
        state: Arc<Mutex<MockState>>,
    }

    impl MockMuxer {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(MockState {
                    status: MuxerStatus::Unknown,
                    registered: [false; 2],
                    ready: [true; 2],
                    reject: [false; 2],
                    fail_after: None,
                    failure: None,
                    appends: Vec::new(),
                    started_at: None,
                    finalize_result: Ok(()),
                    defer_finalize: false,
                    pending_callback: None,
                    finalized: false,
                })),
            }
        }

        /// Shared handle to the observable call log and control flags
        pub fn call_log(&self) -> Arc<Mutex<MockState>> {
            Arc::clone(&self.state)
        }

        /// Fire a callback stashed by a deferred finalize
        pub fn fire_pending(state: &Arc<Mutex<MockState>>) {
            let (callback, result) = {
                let mut s = state.lock().unwrap();
                (s.pending_callback.take(), s.finalize_result.clone())
            };
            if let Some(callback) = callback {
                callback(result);
            }
        }
    }

    impl Muxer for MockMuxer {
        fn register_input(
            &mut self,
            channel: Channel,
            _settings: &ChannelSettings,
        ) -> RecordingResult<()> {
            let mut s = self.state.lock().unwrap();
            if s.reject[channel.index()] {
                return Err(RecordingError::ConfigurationUnsupported {
                    channel,
                    reason: "rejected by test".to_string(),
                });
            }
            s.registered[channel.index()] = true;
            Ok(())
        }

        fn start(&mut self, at: Timestamp) -> RecordingResult<()> {
            let mut s = self.state.lock().unwrap();
            s.status = MuxerStatus::Writing;
            s.started_at = Some(at);
            Ok(())
        }

        fn status(&self) -> MuxerStatus {
            self.state.lock().unwrap().status
        }

        fn is_input_ready(&self, channel: Channel) -> bool {
            let s = self.state.lock().unwrap();
            s.registered[channel.index()] && s.ready[channel.index()]
        }

        fn append(&mut self, channel: Channel, sample: &MediaSample) -> RecordingResult<()> {
            let mut s = self.state.lock().unwrap();
            s.appends.push((channel, sample.timestamp.as_nanos()));
            if let Some(limit) = s.fail_after
                && s.appends.len() as u64 >= limit
            {
                s.status = MuxerStatus::Failed;
                s.failure = Some("writer failed by test script".to_string());
            }
            Ok(())
        }

        fn failure(&self) -> Option<String> {
            self.state.lock().unwrap().failure.clone()
        }

        fn finalize(self: Box<Self>, on_complete: FinalizeCallback) {
            let result = {
                let mut s = self.state.lock().unwrap();
                s.finalized = true;
                if s.status != MuxerStatus::Failed && s.finalize_result.is_ok() {
                    s.status = MuxerStatus::Completed;
                }
                if s.defer_finalize {
                    s.pending_callback = Some(on_complete);
                    return;
                }
                s.finalize_result.clone()
            };
            on_complete(result);
        }
    }
}
