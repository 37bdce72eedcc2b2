// SPDX-License-Identifier: GPL-3.0-only

//! Session-scoped recording state machine
//!
//! One [`Recorder`] exists per recording attempt. It owns the muxer, funnels
//! every mutation through a single session mutex so appends arriving on the
//! capture worker and a finish request from any other thread are mutually
//! exclusive, and delivers its outcome through a single-fire channel.
//!
//! State flow: Idle -> Configuring -> Active -> Finishing -> Completed|Failed.
//! A writer failure mid-stream moves the session to Failed immediately; finish
//! still finalizes the muxer so writer resources are released.

use futures::channel::oneshot;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::capture::types::{Channel, FormatDescriptor, MediaSample, Timestamp};
use crate::constants::recording::DROP_LOG_INTERVAL;
use crate::errors::{RecordingError, RecordingResult};
use crate::recording::muxer::{Muxer, MuxerStatus};
use crate::recording::settings::{
    AudioEncodeSettings, AudioQuality, ChannelSettings, ContainerFormat, QualityPreset,
    VideoEncodeSettings,
};

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingState {
    /// Created, no channel configured yet
    Idle,
    /// At least one channel configured, no sample written
    Configuring,
    /// Writer session started, accepting samples
    Active,
    /// Finalization in flight
    Finishing,
    /// Finalized successfully
    Completed,
    /// Writer failed or finalization reported an error
    Failed,
}

/// Result of a finished recording session, delivered through the completion
/// channel exactly once
#[derive(Debug)]
pub struct RecordingOutcome {
    /// Location of the container file
    pub output: PathBuf,
    /// Timeline origin, `None` if no sample ever reached the writer
    pub started_at: Option<Timestamp>,
    /// Overall result; a mid-stream writer failure wins over a clean finalize
    pub result: RecordingResult<()>,
    /// Samples appended to the writer, per channel slot
    pub appended: [u64; 2],
    /// Samples dropped on an unready input, per channel slot
    pub dropped: [u64; 2],
}

impl RecordingOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Encode preferences applied when deriving per-channel settings
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodePrefs {
    pub quality: QualityPreset,
    pub audio_quality: AudioQuality,
    pub container: ContainerFormat,
}

/// Internal session state, guarded by the recorder's mutex
struct Session {
    state: RecordingState,
    /// Taken out by the first effective finish call
    muxer: Option<Box<dyn Muxer>>,
    output: PathBuf,
    configured: [bool; 2],
    started_at: Option<Timestamp>,
    /// Single-fire completion sender; `Option::take` under the mutex is the
    /// exactly-once guarantee
    completion: Option<oneshot::Sender<RecordingOutcome>>,
    /// First writer failure detail, recorded once
    failure: Option<String>,
    appended: [u64; 2],
    dropped: [u64; 2],
}

/// Recording session state machine
///
/// Shared as `Arc<Recorder>` between the owner and the sample router. All
/// entry points serialize on one mutex, so `append` from the capture worker
/// and `finish` from the owner never interleave.
pub struct Recorder {
    session: Mutex<Session>,
    prefs: EncodePrefs,
}

impl Recorder {
    /// Create a recorder for one attempt with default encode preferences
    pub fn new(muxer: Box<dyn Muxer>, output: PathBuf) -> Self {
        Self::with_prefs(muxer, output, EncodePrefs::default())
    }

    pub fn with_prefs(muxer: Box<dyn Muxer>, output: PathBuf, prefs: EncodePrefs) -> Self {
        debug!(output = %output.display(), "Creating recorder");
        Self {
            session: Mutex::new(Session {
                state: RecordingState::Idle,
                muxer: Some(muxer),
                output,
                configured: [false; 2],
                started_at: None,
                completion: None,
                failure: None,
                appended: [0; 2],
                dropped: [0; 2],
            }),
            prefs,
        }
    }

    /// Register a channel with the muxer from its live format descriptor
    ///
    /// Valid only before the session starts. A descriptor the settings layer
    /// or the muxer rejects does not abort the attempt: the channel is
    /// omitted, recording proceeds without it, and `Ok(false)` tells the
    /// caller about the omission.
    pub fn configure(&self, channel: Channel, format: &FormatDescriptor) -> RecordingResult<bool> {
        let mut s = self.session.lock().unwrap();
        if !matches!(s.state, RecordingState::Idle | RecordingState::Configuring) {
            return Err(RecordingError::AlreadyStarted);
        }

        let settings = match derive_channel_settings(channel, format, &self.prefs) {
            Ok(settings) => settings,
            Err(reason) => {
                warn!(channel = %channel, reason = %reason, "Channel omitted from recording");
                return Ok(false);
            }
        };

        let registered = match s.muxer.as_mut() {
            Some(muxer) => muxer.register_input(channel, &settings),
            None => return Ok(false),
        };
        match registered {
            Ok(()) => {
                s.configured[channel.index()] = true;
                if s.state == RecordingState::Idle {
                    s.state = RecordingState::Configuring;
                }
                info!(channel = %channel, format = %format, "Channel configured");
                Ok(true)
            }
            Err(e) => {
                warn!(channel = %channel, error = %e, "Channel omitted from recording");
                Ok(false)
            }
        }
    }

    /// Append one sample to the writer
    ///
    /// Bounded O(1) and free of I/O waits; called synchronously from the
    /// capture worker. Every outcome is resolved internally - nothing
    /// propagates back across the capture boundary.
    pub fn append(&self, channel: Channel, sample: &MediaSample) {
        let mut s = self.session.lock().unwrap();

        // Not-ready payloads are dropped before any other bookkeeping
        if !matches!(
            s.state,
            RecordingState::Configuring | RecordingState::Active
        ) || !sample.data_ready
        {
            return;
        }
        if !s.configured[channel.index()] {
            return;
        }

        let status = match s.muxer.as_ref() {
            Some(muxer) => muxer.status(),
            None => return,
        };
        if status == MuxerStatus::Failed {
            let detail = s
                .muxer
                .as_ref()
                .and_then(|m| m.failure())
                .unwrap_or_else(|| "writer entered failed state".to_string());
            fail_session(&mut s, detail);
            return;
        }

        // The first sample to get this far fixes the timeline origin, even if
        // the readiness check below then drops it.
        if s.started_at.is_none() {
            let at = sample.timestamp;
            let started = match s.muxer.as_mut() {
                Some(muxer) => muxer.start(at),
                None => return,
            };
            match started {
                Ok(()) => {
                    s.started_at = Some(at);
                    if s.state == RecordingState::Configuring {
                        s.state = RecordingState::Active;
                    }
                    info!(start = %at, "Writer session started");
                }
                Err(e) => {
                    fail_session(&mut s, e.to_string());
                    return;
                }
            }
        }

        let ready = s
            .muxer
            .as_ref()
            .map(|m| m.is_input_ready(channel))
            .unwrap_or(false);
        if !ready {
            // Drop-over-block: the source is live and cannot be paused
            s.dropped[channel.index()] += 1;
            let dropped = s.dropped[channel.index()];
            if dropped % DROP_LOG_INTERVAL == 1 {
                debug!(channel = %channel, dropped, "Input not ready, dropping sample");
            }
            return;
        }

        let appended = match s.muxer.as_mut() {
            Some(muxer) => muxer.append(channel, sample),
            None => return,
        };
        match appended {
            Ok(()) => s.appended[channel.index()] += 1,
            Err(e) => fail_session(&mut s, e.to_string()),
        }
    }

    /// Finalize the session and return the single-fire completion receiver
    ///
    /// The first effective call moves the session to Finishing (a session
    /// already Failed keeps its state but is still finalized so writer
    /// resources are released) and hands the muxer its completion callback.
    /// Any later call returns `None` with no other effect.
    pub fn finish(self: &Arc<Self>) -> Option<oneshot::Receiver<RecordingOutcome>> {
        let (muxer, receiver) = {
            let mut s = self.session.lock().unwrap();
            match s.state {
                RecordingState::Idle | RecordingState::Configuring | RecordingState::Active => {
                    s.state = RecordingState::Finishing;
                }
                // Failed sessions finalize too; Finishing/Completed means a
                // finish is already in flight or done.
                RecordingState::Failed => {}
                RecordingState::Finishing | RecordingState::Completed => return None,
            }
            let muxer = s.muxer.take()?;
            let (sender, receiver) = oneshot::channel();
            s.completion = Some(sender);
            info!(output = %s.output.display(), "Finishing recording");
            (muxer, receiver)
        };

        let recorder = Arc::clone(self);
        muxer.finalize(Box::new(move |result| recorder.complete_finish(result)));
        Some(receiver)
    }

    /// Terminal transition, invoked from the muxer's completion context
    fn complete_finish(&self, result: RecordingResult<()>) {
        let mut s = self.session.lock().unwrap();

        let final_result = match s.failure.clone() {
            Some(detail) => Err(RecordingError::WriterFailure(detail)),
            None => result,
        };
        s.state = if final_result.is_ok() {
            RecordingState::Completed
        } else {
            RecordingState::Failed
        };
        info!(state = ?s.state, appended = ?s.appended, dropped = ?s.dropped, "Recording finished");

        let outcome = RecordingOutcome {
            output: s.output.clone(),
            started_at: s.started_at,
            result: final_result,
            appended: s.appended,
            dropped: s.dropped,
        };
        if let Some(sender) = s.completion.take() {
            // The owner may have dropped the receiver; that is not an error
            let _ = sender.send(outcome);
        }
    }

    pub fn state(&self) -> RecordingState {
        self.session.lock().unwrap().state
    }

    pub fn output_path(&self) -> PathBuf {
        self.session.lock().unwrap().output.clone()
    }

    pub fn is_channel_configured(&self, channel: Channel) -> bool {
        self.session.lock().unwrap().configured[channel.index()]
    }

    /// Timestamp of the first sample accepted by the writer
    pub fn session_start(&self) -> Option<Timestamp> {
        self.session.lock().unwrap().started_at
    }

    pub fn appended_count(&self, channel: Channel) -> u64 {
        self.session.lock().unwrap().appended[channel.index()]
    }

    pub fn dropped_count(&self, channel: Channel) -> u64 {
        self.session.lock().unwrap().dropped[channel.index()]
    }
}

/// Record the first failure detail and move the session to Failed
fn fail_session(s: &mut Session, detail: String) {
    if s.failure.is_none() {
        error!(error = %detail, "Writer failure, session failed");
        s.failure = Some(detail);
    }
    s.state = RecordingState::Failed;
}

/// Derive validated per-channel settings from a live descriptor
fn derive_channel_settings(
    channel: Channel,
    format: &FormatDescriptor,
    prefs: &EncodePrefs,
) -> Result<ChannelSettings, String> {
    match (channel, format) {
        (Channel::Video, FormatDescriptor::Video(video)) => {
            VideoEncodeSettings::derive(video, prefs.quality, prefs.container)
                .map(ChannelSettings::Video)
        }
        (Channel::Audio, FormatDescriptor::Audio(audio)) => {
            AudioEncodeSettings::derive(audio, prefs.audio_quality, prefs.container)
                .map(ChannelSettings::Audio)
        }
        _ => Err(format!("Descriptor does not describe the {} channel", channel)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::types::{
        AudioFormat, AudioSampleFormat, Framerate, PixelFormat, SampleData, VideoFormat,
    };
    use crate::recording::muxer::tests::MockMuxer;
    use futures::executor::block_on;

    fn video_descriptor() -> FormatDescriptor {
        FormatDescriptor::Video(VideoFormat {
            width: 1920,
            height: 1080,
            pixel_format: PixelFormat::NV12,
            framerate: Some(Framerate::from_int(30)),
        })
    }

    fn audio_descriptor() -> FormatDescriptor {
        FormatDescriptor::Audio(AudioFormat {
            sample_rate: 48_000,
            channels: 2,
            sample_format: AudioSampleFormat::S16le,
        })
    }

    fn sample(channel: Channel, millis: u64) -> MediaSample {
        MediaSample {
            channel,
            timestamp: Timestamp::from_millis(millis),
            payload: SampleData::Copied(vec![0u8; 64].into()),
            data_ready: true,
        }
    }

    fn output() -> PathBuf {
        std::env::temp_dir().join("recorder-test.mkv")
    }

    fn new_recorder(muxer: MockMuxer) -> Arc<Recorder> {
        Arc::new(Recorder::with_prefs(
            Box::new(muxer),
            output(),
            EncodePrefs {
                container: ContainerFormat::Matroska,
                ..EncodePrefs::default()
            },
        ))
    }

    #[test]
    fn test_scenario_a_both_tracks_alternating() {
        let muxer = MockMuxer::new();
        let log = muxer.call_log();
        let recorder = new_recorder(muxer);

        assert_eq!(
            recorder.configure(Channel::Video, &video_descriptor()),
            Ok(true)
        );
        assert_eq!(
            recorder.configure(Channel::Audio, &audio_descriptor()),
            Ok(true)
        );
        assert_eq!(recorder.state(), RecordingState::Configuring);

        // 100 alternating samples, video first at t=0
        for i in 0..100u64 {
            let channel = if i % 2 == 0 { Channel::Video } else { Channel::Audio };
            recorder.append(channel, &sample(channel, i * 10));
        }
        assert_eq!(recorder.state(), RecordingState::Active);
        assert_eq!(recorder.session_start(), Some(Timestamp::ZERO));
        assert_eq!(recorder.appended_count(Channel::Video), 50);
        assert_eq!(recorder.appended_count(Channel::Audio), 50);

        let receiver = recorder.finish().expect("first finish returns receiver");
        let outcome = block_on(receiver).expect("completion fires");
        assert!(outcome.is_success());
        assert_eq!(outcome.started_at, Some(Timestamp::ZERO));
        assert_eq!(recorder.state(), RecordingState::Completed);

        let s = log.lock().unwrap();
        assert!(s.registered[Channel::Video.index()]);
        assert!(s.registered[Channel::Audio.index()]);
        assert!(s.finalized);
        assert_eq!(s.appends.len(), 100);
        // Arrival order is preserved: strict video/audio alternation
        for (i, (channel, _)) in s.appends.iter().enumerate() {
            let expected = if i % 2 == 0 { Channel::Video } else { Channel::Audio };
            assert_eq!(*channel, expected, "append {} out of order", i);
        }
        assert_eq!(s.started_at, Some(Timestamp::ZERO));
    }

    #[test]
    fn test_scenario_b_audio_rejected_video_only() {
        let muxer = MockMuxer::new();
        let log = muxer.call_log();
        log.lock().unwrap().reject[Channel::Audio.index()] = true;
        let recorder = new_recorder(muxer);

        assert_eq!(
            recorder.configure(Channel::Video, &video_descriptor()),
            Ok(true)
        );
        // Rejected settings omit the channel instead of aborting
        assert_eq!(
            recorder.configure(Channel::Audio, &audio_descriptor()),
            Ok(false)
        );
        assert!(!recorder.is_channel_configured(Channel::Audio));

        for i in 0..50u64 {
            recorder.append(Channel::Video, &sample(Channel::Video, i * 33));
            // Unconfigured channel appends are no-ops
            recorder.append(Channel::Audio, &sample(Channel::Audio, i * 33 + 1));
        }

        let receiver = recorder.finish().expect("receiver");
        let outcome = block_on(receiver).expect("completion fires");
        assert!(outcome.is_success(), "no failure reported: {:?}", outcome.result);
        assert_eq!(outcome.appended[Channel::Video.index()], 50);
        assert_eq!(outcome.appended[Channel::Audio.index()], 0);

        let s = log.lock().unwrap();
        assert!(s.appends.iter().all(|(c, _)| *c == Channel::Video));
    }

    #[test]
    fn test_scenario_c_unready_input_drops_silently() {
        let muxer = MockMuxer::new();
        let log = muxer.call_log();
        let recorder = new_recorder(muxer);
        recorder
            .configure(Channel::Video, &video_descriptor())
            .expect("configure");

        log.lock().unwrap().ready[Channel::Video.index()] = false;
        for i in 0..10u64 {
            recorder.append(Channel::Video, &sample(Channel::Video, i * 33));
        }

        // All 10 dropped, session promoted and still healthy
        assert_eq!(recorder.dropped_count(Channel::Video), 10);
        assert_eq!(recorder.appended_count(Channel::Video), 0);
        assert_eq!(recorder.state(), RecordingState::Active);
        // The very first sample still fixed the timeline origin
        assert_eq!(recorder.session_start(), Some(Timestamp::ZERO));
        assert!(log.lock().unwrap().appends.is_empty());
    }

    #[test]
    fn test_scenario_d_writer_failure_latches() {
        let muxer = MockMuxer::new();
        let log = muxer.call_log();
        log.lock().unwrap().fail_after = Some(20);
        let recorder = new_recorder(muxer);
        recorder
            .configure(Channel::Video, &video_descriptor())
            .expect("configure");

        for i in 0..50u64 {
            recorder.append(Channel::Video, &sample(Channel::Video, i * 33));
        }

        // 20 reached the writer, 21-50 were no-ops
        assert_eq!(log.lock().unwrap().appends.len(), 20);
        assert_eq!(recorder.state(), RecordingState::Failed);

        // finish still runs and completes with the writer failure
        let receiver = recorder.finish().expect("receiver");
        let outcome = block_on(receiver).expect("completion fires");
        assert!(!outcome.is_success());
        match outcome.result {
            Err(RecordingError::WriterFailure(detail)) => {
                assert!(detail.contains("test script"));
            }
            other => panic!("Expected writer failure, got {:?}", other),
        }
        assert!(log.lock().unwrap().finalized);
        assert_eq!(recorder.state(), RecordingState::Failed);
    }

    #[test]
    fn test_append_before_configure_is_noop() {
        let muxer = MockMuxer::new();
        let log = muxer.call_log();
        let recorder = new_recorder(muxer);

        recorder.append(Channel::Video, &sample(Channel::Video, 0));
        assert_eq!(recorder.state(), RecordingState::Idle);
        assert_eq!(recorder.session_start(), None);
        assert!(log.lock().unwrap().appends.is_empty());
    }

    #[test]
    fn test_not_ready_payload_dropped_first() {
        let muxer = MockMuxer::new();
        let log = muxer.call_log();
        let recorder = new_recorder(muxer);
        recorder
            .configure(Channel::Video, &video_descriptor())
            .expect("configure");

        let mut bad = sample(Channel::Video, 0);
        bad.data_ready = false;
        recorder.append(Channel::Video, &bad);

        // Dropped before the writer session could even start
        assert_eq!(recorder.session_start(), None);
        assert!(log.lock().unwrap().appends.is_empty());
    }

    #[test]
    fn test_configure_after_start_rejected() {
        let muxer = MockMuxer::new();
        let recorder = new_recorder(muxer);
        recorder
            .configure(Channel::Video, &video_descriptor())
            .expect("configure");
        recorder.append(Channel::Video, &sample(Channel::Video, 0));
        assert_eq!(recorder.state(), RecordingState::Active);

        assert!(matches!(
            recorder.configure(Channel::Audio, &audio_descriptor()),
            Err(RecordingError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_mismatched_descriptor_omits_channel() {
        let muxer = MockMuxer::new();
        let recorder = new_recorder(muxer);
        // An audio descriptor cannot configure the video channel
        assert_eq!(
            recorder.configure(Channel::Video, &audio_descriptor()),
            Ok(false)
        );
        assert!(!recorder.is_channel_configured(Channel::Video));
        assert_eq!(recorder.state(), RecordingState::Idle);
    }

    #[test]
    fn test_second_finish_is_noop() {
        let muxer = MockMuxer::new();
        let log = muxer.call_log();
        log.lock().unwrap().defer_finalize = true;
        let recorder = new_recorder(muxer);
        recorder
            .configure(Channel::Video, &video_descriptor())
            .expect("configure");
        recorder.append(Channel::Video, &sample(Channel::Video, 0));

        let receiver = recorder.finish().expect("first finish");
        assert_eq!(recorder.state(), RecordingState::Finishing);
        // Second call while Finishing has no observable effect
        assert!(recorder.finish().is_none());

        MockMuxer::fire_pending(&log);
        let outcome = block_on(receiver).expect("completion fires once");
        assert!(outcome.is_success());
        assert_eq!(recorder.state(), RecordingState::Completed);

        // And a third call after completion is still a no-op
        assert!(recorder.finish().is_none());
    }

    #[test]
    fn test_finish_without_samples_completes() {
        let muxer = MockMuxer::new();
        let recorder = new_recorder(muxer);
        recorder
            .configure(Channel::Video, &video_descriptor())
            .expect("configure");

        let receiver = recorder.finish().expect("receiver");
        let outcome = block_on(receiver).expect("completion fires");
        assert_eq!(outcome.started_at, None);
        assert_eq!(outcome.appended, [0, 0]);
    }

    #[test]
    fn test_finalize_error_fails_session() {
        let muxer = MockMuxer::new();
        let log = muxer.call_log();
        log.lock().unwrap().finalize_result =
            Err(RecordingError::WriterFailure("flush failed".to_string()));
        let recorder = new_recorder(muxer);
        recorder
            .configure(Channel::Video, &video_descriptor())
            .expect("configure");
        recorder.append(Channel::Video, &sample(Channel::Video, 0));

        let receiver = recorder.finish().expect("receiver");
        let outcome = block_on(receiver).expect("completion fires");
        assert!(!outcome.is_success());
        assert_eq!(recorder.state(), RecordingState::Failed);
    }
}
