// SPDX-License-Identifier: MPL-2.0

//! GStreamer-backed container writer
//!
//! Production [`Muxer`] implementation: one appsrc-fed branch per registered
//! channel, encoded and muxed into a single file.
//!
//! Video branch: appsrc -> videoconvert -> videoscale -> capsfilter ->
//! encoder [-> parser] -> muxer -> filesink. Audio branch: appsrc ->
//! audioconvert -> audioresample -> encoder -> muxer.
//!
//! Each appsrc carries a byte cap so input readiness is observable; full
//! inputs report not-ready and the recorder drops instead of queueing. Bus
//! errors latch into shared state, which is how a mid-stream writer failure
//! becomes visible to `status()` between samples.

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSrc;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::capture::types::{Channel, MediaSample, Timestamp};
use crate::constants::{recording, timing};
use crate::errors::{RecordingError, RecordingResult};
use crate::recording::encoders::{select_audio_encoder, select_video_encoder};
use crate::recording::muxer::{FinalizeCallback, Muxer, MuxerStatus};
use crate::recording::settings::{ChannelSettings, ContainerFormat};

/// First bus error, latched from the sync handler
struct ErrorLatch {
    failed: AtomicBool,
    detail: Mutex<Option<String>>,
}

impl ErrorLatch {
    fn new() -> Self {
        Self {
            failed: AtomicBool::new(false),
            detail: Mutex::new(None),
        }
    }

    fn latch(&self, detail: String) {
        if !self.failed.swap(true, Ordering::SeqCst) {
            error!(error = %detail, "Writer pipeline error");
            *self.detail.lock().unwrap() = Some(detail);
        }
    }

    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    fn detail(&self) -> Option<String> {
        self.detail.lock().unwrap().clone()
    }
}

/// One registered input branch
struct InputBranch {
    appsrc: AppSrc,
    /// Nominal per-buffer duration, known for video from the framerate
    buffer_duration: Option<gst::ClockTime>,
}

/// GStreamer pipeline implementing the [`Muxer`] contract
pub struct GstMuxer {
    pipeline: gst::Pipeline,
    muxer: gst::Element,
    inputs: [Option<InputBranch>; 2],
    errors: Arc<ErrorLatch>,
    /// Timeline origin; `Some` once the session started
    origin: Option<Timestamp>,
    output: PathBuf,
}

impl GstMuxer {
    /// Create the pipeline skeleton: muxer element and filesink
    ///
    /// Inputs are registered separately, before the session starts.
    pub fn new(output: &Path, container: ContainerFormat) -> Result<Self, String> {
        gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

        info!(
            output = %output.display(),
            container = ?container,
            "Creating writer pipeline"
        );

        let pipeline = gst::Pipeline::new();

        let muxer = gst::ElementFactory::make(container.muxer_name())
            .build()
            .map_err(|e| format!("Failed to create {}: {}", container.muxer_name(), e))?;
        // Seekable output: duration and indexes are written on finalize
        if muxer.has_property("streamable") {
            let _ = muxer.set_property("streamable", false);
        }

        let filesink = gst::ElementFactory::make("filesink")
            .property("location", output.to_string_lossy().as_ref())
            .build()
            .map_err(|e| format!("Failed to create filesink: {}", e))?;

        pipeline
            .add_many([&muxer, &filesink])
            .map_err(|e| format!("Failed to add muxer elements: {}", e))?;
        muxer
            .link(&filesink)
            .map_err(|_| "Failed to link muxer to filesink".to_string())?;

        let errors = Arc::new(ErrorLatch::new());
        let bus = pipeline
            .bus()
            .ok_or_else(|| "Pipeline has no bus".to_string())?;
        let latch = Arc::clone(&errors);
        bus.set_sync_handler(move |_, msg| {
            if let gst::MessageView::Error(err) = msg.view() {
                latch.latch(format!(
                    "{} (from {:?})",
                    err.error(),
                    err.src().map(|s| s.name())
                ));
            }
            // Keep messages flowing for the finalize wait
            gst::BusSyncReply::Pass
        });

        Ok(Self {
            pipeline,
            muxer,
            inputs: [None, None],
            errors,
            origin: None,
            output: output.to_path_buf(),
        })
    }

    fn branch(&self, channel: Channel) -> Option<&InputBranch> {
        self.inputs[channel.index()].as_ref()
    }

    /// Build and link the video branch for these settings
    fn register_video(&mut self, settings: &ChannelSettings) -> Result<AppSrc, String> {
        let ChannelSettings::Video(video) = settings else {
            return Err("Video input needs video settings".to_string());
        };

        let selected = select_video_encoder(video)?;

        let caps = gst::Caps::builder("video/x-raw")
            .field("format", video.pixel_format.to_gst_format_string())
            .field("width", video.width as i32)
            .field("height", video.height as i32)
            .field(
                "framerate",
                gst::Fraction::new(video.framerate.num as i32, video.framerate.denom as i32),
            )
            .build();

        let appsrc = AppSrc::builder()
            .caps(&caps)
            .format(gst::Format::Time)
            .build();
        appsrc.set_is_live(true);
        appsrc.set_do_timestamp(false);
        appsrc.set_property("block", false);
        appsrc.set_max_bytes(video.frame_size_bytes() * recording::VIDEO_QUEUE_FRAMES);

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| format!("Failed to create videoconvert: {}", e))?;
        let videoscale = gst::ElementFactory::make("videoscale")
            .property("add-borders", video.scaling.add_borders())
            .build()
            .map_err(|e| format!("Failed to create videoscale: {}", e))?;

        let encode_caps = gst::Caps::builder("video/x-raw")
            .field("width", video.width as i32)
            .field("height", video.height as i32)
            .field(
                "framerate",
                gst::Fraction::new(video.framerate.num as i32, video.framerate.denom as i32),
            )
            .build();
        let capsfilter = gst::ElementFactory::make("capsfilter")
            .property("caps", &encode_caps)
            .build()
            .map_err(|e| format!("Failed to create capsfilter: {}", e))?;

        let mut elements: Vec<&gst::Element> = vec![
            appsrc.upcast_ref(),
            &videoconvert,
            &videoscale,
            &capsfilter,
            &selected.encoder,
        ];
        if let Some(parser) = &selected.parser {
            elements.push(parser);
        }

        self.pipeline
            .add_many(&elements)
            .map_err(|e| format!("Failed to add video branch: {}", e))?;
        gst::Element::link_many(&elements)
            .map_err(|_| "Failed to link video branch".to_string())?;
        let tail: &gst::Element = elements[elements.len() - 1];
        tail.link(&self.muxer)
            .map_err(|_| "Failed to link video branch to muxer".to_string())?;

        info!(
            encoder = %selected.element_name,
            codec = ?selected.codec,
            width = video.width,
            height = video.height,
            "Video input registered"
        );
        Ok(appsrc)
    }

    /// Build and link the audio branch for these settings
    fn register_audio(&mut self, settings: &ChannelSettings) -> Result<AppSrc, String> {
        let ChannelSettings::Audio(audio) = settings else {
            return Err("Audio input needs audio settings".to_string());
        };

        let selected = select_audio_encoder(audio)?;

        let caps = gst::Caps::builder("audio/x-raw")
            .field("format", audio.sample_format.to_gst_format_string())
            .field("rate", audio.sample_rate as i32)
            .field("channels", audio.channels.count() as i32)
            .field("layout", "interleaved")
            .build();

        let appsrc = AppSrc::builder()
            .caps(&caps)
            .format(gst::Format::Time)
            .build();
        appsrc.set_is_live(true);
        appsrc.set_do_timestamp(false);
        appsrc.set_property("block", false);
        appsrc.set_max_bytes(recording::AUDIO_QUEUE_BYTES);

        let audioconvert = gst::ElementFactory::make("audioconvert")
            .build()
            .map_err(|e| format!("Failed to create audioconvert: {}", e))?;
        let audioresample = gst::ElementFactory::make("audioresample")
            .build()
            .map_err(|e| format!("Failed to create audioresample: {}", e))?;

        let elements: Vec<&gst::Element> = vec![
            appsrc.upcast_ref(),
            &audioconvert,
            &audioresample,
            &selected.encoder,
        ];
        self.pipeline
            .add_many(&elements)
            .map_err(|e| format!("Failed to add audio branch: {}", e))?;
        gst::Element::link_many(&elements)
            .map_err(|_| "Failed to link audio branch".to_string())?;
        selected
            .encoder
            .link(&self.muxer)
            .map_err(|_| "Failed to link audio branch to muxer".to_string())?;

        info!(
            codec = ?selected.codec,
            rate = audio.sample_rate,
            channels = audio.channels.count(),
            "Audio input registered"
        );
        Ok(appsrc)
    }
}

impl Muxer for GstMuxer {
    fn register_input(
        &mut self,
        channel: Channel,
        settings: &ChannelSettings,
    ) -> RecordingResult<()> {
        if self.origin.is_some() {
            return Err(RecordingError::ConfigurationUnsupported {
                channel,
                reason: "Session already started".to_string(),
            });
        }
        if self.inputs[channel.index()].is_some() {
            return Err(RecordingError::ConfigurationUnsupported {
                channel,
                reason: "Input already registered".to_string(),
            });
        }

        let registered = match channel {
            Channel::Video => self.register_video(settings),
            Channel::Audio => self.register_audio(settings),
        };
        match registered {
            Ok(appsrc) => {
                let buffer_duration = match settings {
                    ChannelSettings::Video(video) => video
                        .framerate
                        .frame_duration()
                        .map(|d| gst::ClockTime::from_nseconds(d.as_nanos() as u64)),
                    ChannelSettings::Audio(_) => None,
                };
                self.inputs[channel.index()] = Some(InputBranch {
                    appsrc,
                    buffer_duration,
                });
                Ok(())
            }
            Err(reason) => Err(RecordingError::ConfigurationUnsupported { channel, reason }),
        }
    }

    fn start(&mut self, at: Timestamp) -> RecordingResult<()> {
        if self.origin.is_some() {
            return Err(RecordingError::AlreadyStarted);
        }

        info!(origin = %at, "Starting writer session");
        self.pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| RecordingError::WriterFailure(format!("Failed to start pipeline: {}", e)))?;

        // Give the pipeline a moment to surface immediate errors (missing
        // elements, unwritable output) before the first sample is pushed
        let (_, state, _) = self.pipeline.state(gst::ClockTime::from_mseconds(
            timing::STATE_CHANGE_TIMEOUT_MS,
        ));
        debug!(state = ?state, "Writer pipeline state after start");
        if self.errors.is_failed() {
            return Err(RecordingError::WriterFailure(
                self.errors
                    .detail()
                    .unwrap_or_else(|| "pipeline failed to start".to_string()),
            ));
        }

        self.origin = Some(at);
        Ok(())
    }

    fn status(&self) -> MuxerStatus {
        if self.errors.is_failed() {
            MuxerStatus::Failed
        } else if self.origin.is_some() {
            MuxerStatus::Writing
        } else {
            MuxerStatus::Unknown
        }
    }

    fn is_input_ready(&self, channel: Channel) -> bool {
        match self.branch(channel) {
            Some(branch) => branch.appsrc.current_level_bytes() < branch.appsrc.max_bytes(),
            None => false,
        }
    }

    fn append(&mut self, channel: Channel, sample: &MediaSample) -> RecordingResult<()> {
        let origin = self
            .origin
            .ok_or_else(|| RecordingError::WriterFailure("Session not started".to_string()))?;
        let branch = self.branch(channel).ok_or_else(|| {
            RecordingError::WriterFailure(format!("No {} input registered", channel))
        })?;

        let mut buffer = gst::Buffer::with_size(sample.payload.len())
            .map_err(|e| RecordingError::WriterFailure(format!("Buffer allocation: {}", e)))?;
        {
            let buffer_ref = buffer
                .get_mut()
                .ok_or_else(|| RecordingError::WriterFailure("Buffer not writable".to_string()))?;
            // Zero-based output timeline: the first accepted sample lands at
            // PTS 0 regardless of the capture clock's absolute value
            let pts = sample.timestamp.saturating_since(origin);
            buffer_ref.set_pts(gst::ClockTime::from_nseconds(pts.as_nanos() as u64));
            if let Some(duration) = branch.buffer_duration {
                buffer_ref.set_duration(duration);
            }
            let mut map = buffer_ref
                .map_writable()
                .map_err(|e| RecordingError::WriterFailure(format!("Buffer map: {}", e)))?;
            map.copy_from_slice(sample.payload.as_ref());
        }

        branch.appsrc.push_buffer(buffer).map_err(|e| {
            let detail = format!("Push to {} input failed: {:?}", channel, e);
            self.errors.latch(detail.clone());
            RecordingError::WriterFailure(detail)
        })?;
        Ok(())
    }

    fn failure(&self) -> Option<String> {
        self.errors.detail()
    }

    fn finalize(self: Box<Self>, on_complete: FinalizeCallback) {
        // Never started: there is no valid container to flush
        if self.origin.is_none() {
            warn!(output = %self.output.display(), "Finalizing writer that never started");
            let _ = self.pipeline.set_state(gst::State::Null);
            on_complete(Err(RecordingError::WriterFailure(
                "Finalized before any samples were written".to_string(),
            )));
            return;
        }

        info!(output = %self.output.display(), "Finalizing writer pipeline");
        for branch in self.inputs.iter().flatten() {
            if let Err(e) = branch.appsrc.end_of_stream() {
                warn!(error = ?e, "Failed to send EOS to input");
            }
        }

        // The wait happens off the caller's thread; the callback fires from
        // here once the file is in its final state
        std::thread::spawn(move || {
            let result = match self.pipeline.bus() {
                Some(bus) => {
                    match bus.timed_pop_filtered(
                        gst::ClockTime::from_seconds(recording::FINALIZE_TIMEOUT_SECS),
                        &[gst::MessageType::Eos, gst::MessageType::Error],
                    ) {
                        Some(msg) => match msg.view() {
                            gst::MessageView::Eos(_) => Ok(()),
                            gst::MessageView::Error(err) => Err(RecordingError::WriterFailure(
                                format!("Finalize error: {}", err.error()),
                            )),
                            _ => Ok(()),
                        },
                        None => Err(RecordingError::WriterFailure(
                            "Timed out waiting for pipeline flush".to_string(),
                        )),
                    }
                }
                None => Err(RecordingError::WriterFailure(
                    "Pipeline has no bus".to_string(),
                )),
            };

            let _ = self.pipeline.set_state(gst::State::Null);

            // An error latched mid-stream outranks a clean-looking EOS
            let result = match self.errors.detail() {
                Some(detail) => Err(RecordingError::WriterFailure(detail)),
                None => result,
            };
            match &result {
                Ok(()) => info!(output = %self.output.display(), "Writer finalized"),
                Err(e) => {
                    error!(output = %self.output.display(), error = %e, "Writer finalize failed");
                }
            }
            on_complete(result);
        });
    }
}

impl Drop for GstMuxer {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
