// SPDX-License-Identifier: MPL-2.0

//! PipeWire capture pipelines for live video and audio
//!
//! Two small GStreamer pipelines, one per media channel, each ending in an
//! appsink whose callback wraps the buffer into a [`MediaSample`] and pushes
//! it over the shared bounded channel. Pushing uses `try_send`, so a stalled
//! consumer costs dropped samples, never a blocked streaming thread.

use futures::channel::mpsc;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use crate::capture::types::{
    AudioFormat, AudioSampleFormat, CapturedSample, Channel, FormatDescriptor, Framerate,
    MediaSample, PixelFormat, SampleData, Timestamp, VideoFormat,
};
use crate::constants::{capture, pipeline, timing};

static VIDEO_SAMPLE_COUNTER: AtomicU64 = AtomicU64::new(0);
static AUDIO_SAMPLE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Optional explicit PipeWire device targets
///
/// `None` means the default device for that channel. Values follow the
/// `pipewire-serial-{serial}` / `pipewire-{node}` convention, or a bare node
/// name.
#[derive(Debug, Clone, Default)]
pub struct CaptureTargets {
    pub video: Option<String>,
    pub audio: Option<String>,
}

/// Live PipeWire capture source feeding one shared sample channel
pub struct PipeWireCapture {
    video_pipeline: gst::Pipeline,
    audio_pipeline: Option<gst::Pipeline>,
}

impl PipeWireCapture {
    /// Build the capture pipelines
    ///
    /// Audio is optional; when disabled only the video pipeline exists.
    /// Nothing flows until [`PipeWireCapture::start`] is called.
    pub fn new(
        targets: &CaptureTargets,
        enable_audio: bool,
        sender: mpsc::Sender<CapturedSample>,
    ) -> Result<Self, String> {
        gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

        let video_pipeline = build_video_pipeline(targets.video.as_deref(), sender.clone())?;
        let audio_pipeline = if enable_audio {
            Some(build_audio_pipeline(targets.audio.as_deref(), sender)?)
        } else {
            info!("Audio capture disabled");
            None
        };

        Ok(Self {
            video_pipeline,
            audio_pipeline,
        })
    }

    /// Set both pipelines playing
    pub fn start(&self) -> Result<(), String> {
        set_playing(&self.video_pipeline, "video capture")?;
        if let Some(audio) = &self.audio_pipeline {
            set_playing(audio, "audio capture")?;
        }
        info!("PipeWire capture started");
        Ok(())
    }

    /// Stop capture and release the devices
    pub fn stop(self) -> Result<(), String> {
        info!("Stopping PipeWire capture");
        set_null(&self.video_pipeline, "video capture")?;
        if let Some(audio) = &self.audio_pipeline {
            set_null(audio, "audio capture")?;
        }
        Ok(())
    }
}

impl Drop for PipeWireCapture {
    fn drop(&mut self) {
        let _ = self.video_pipeline.set_state(gst::State::Null);
        if let Some(audio) = &self.audio_pipeline {
            let _ = audio.set_state(gst::State::Null);
        }
    }
}

/// Create a pipewiresrc, applying an explicit target if one was given
fn make_pipewire_source(target: Option<&str>) -> Result<gst::Element, String> {
    let mut builder = gst::ElementFactory::make("pipewiresrc").property("do-timestamp", true);

    // pipewiresrc target-object expects a serial number or node name
    if let Some(target) = target {
        if let Some(serial) = target.strip_prefix("pipewire-serial-") {
            info!(serial = %serial, "Using PipeWire target-object serial");
            builder = builder.property("target-object", serial);
        } else if let Some(node) = target.strip_prefix("pipewire-") {
            info!(node = %node, "Using PipeWire target-object node name");
            builder = builder.property("target-object", node);
        } else {
            info!(node = %target, "Using PipeWire target-object node name");
            builder = builder.property("target-object", target);
        }
    }
    // With no target, PipeWire picks the default device

    builder
        .build()
        .map_err(|e| format!("Failed to create pipewiresrc: {}", e))
}

/// pipewiresrc -> queue -> videoconvert -> capsfilter(NV12) -> appsink
fn build_video_pipeline(
    target: Option<&str>,
    sender: mpsc::Sender<CapturedSample>,
) -> Result<gst::Pipeline, String> {
    let pipeline = gst::Pipeline::new();

    let source = make_pipewire_source(target)?;
    let queue = gst::ElementFactory::make("queue")
        .build()
        .map_err(|e| format!("Failed to create queue: {}", e))?;
    let videoconvert = gst::ElementFactory::make("videoconvert")
        .property("n-threads", pipeline::videoconvert_threads())
        .build()
        .map_err(|e| format!("Failed to create videoconvert: {}", e))?;

    let caps = gst::Caps::builder("video/x-raw")
        .field("format", PixelFormat::NV12.to_gst_format_string())
        .build();
    let capsfilter = gst::ElementFactory::make("capsfilter")
        .property("caps", &caps)
        .build()
        .map_err(|e| format!("Failed to create capsfilter: {}", e))?;

    let appsink = gst::ElementFactory::make("appsink")
        .build()
        .map_err(|e| format!("Failed to create appsink: {}", e))?
        .dynamic_cast::<AppSink>()
        .map_err(|_| "Failed to cast to AppSink".to_string())?;
    appsink.set_property("sync", false);
    appsink.set_property("max-buffers", pipeline::MAX_BUFFERS);
    appsink.set_property("drop", true);
    appsink.set_property("enable-last-sample", false);

    pipeline
        .add_many([
            &source,
            &queue,
            &videoconvert,
            &capsfilter,
            appsink.upcast_ref(),
        ])
        .map_err(|e| format!("Failed to add video elements: {}", e))?;
    gst::Element::link_many([
        &source,
        &queue,
        &videoconvert,
        &capsfilter,
        appsink.upcast_ref(),
    ])
    .map_err(|e| format!("Failed to link video pipeline: {}", e))?;

    appsink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let count = VIDEO_SAMPLE_COUNTER.fetch_add(1, Ordering::Relaxed);

                let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                match captured_video_sample(&sample, count) {
                    Some(captured) => {
                        let mut sender = sender.clone();
                        if sender.try_send(captured).is_err()
                            && count % timing::SAMPLE_LOG_INTERVAL == 0
                        {
                            debug!(sample = count, "Video sample dropped (channel full)");
                        }
                    }
                    None => {
                        if count % timing::SAMPLE_LOG_INTERVAL == 0 {
                            warn!(sample = count, "Skipping unusable video sample");
                        }
                    }
                }

                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );

    Ok(pipeline)
}

/// pipewiresrc -> queue -> audioconvert -> capsfilter(S16LE) -> appsink
fn build_audio_pipeline(
    target: Option<&str>,
    sender: mpsc::Sender<CapturedSample>,
) -> Result<gst::Pipeline, String> {
    let pipeline = gst::Pipeline::new();

    let source = make_pipewire_source(target)?;
    let queue = gst::ElementFactory::make("queue")
        .build()
        .map_err(|e| format!("Failed to create queue: {}", e))?;
    let audioconvert = gst::ElementFactory::make("audioconvert")
        .build()
        .map_err(|e| format!("Failed to create audioconvert: {}", e))?;

    let caps = gst::Caps::builder("audio/x-raw")
        .field("format", AudioSampleFormat::S16le.to_gst_format_string())
        .build();
    let capsfilter = gst::ElementFactory::make("capsfilter")
        .property("caps", &caps)
        .build()
        .map_err(|e| format!("Failed to create capsfilter: {}", e))?;

    let appsink = gst::ElementFactory::make("appsink")
        .build()
        .map_err(|e| format!("Failed to create appsink: {}", e))?
        .dynamic_cast::<AppSink>()
        .map_err(|_| "Failed to cast to AppSink".to_string())?;
    appsink.set_property("sync", false);
    appsink.set_property("max-buffers", 8u32);
    appsink.set_property("drop", true);
    appsink.set_property("enable-last-sample", false);

    pipeline
        .add_many([
            &source,
            &queue,
            &audioconvert,
            &capsfilter,
            appsink.upcast_ref(),
        ])
        .map_err(|e| format!("Failed to add audio elements: {}", e))?;
    gst::Element::link_many([
        &source,
        &queue,
        &audioconvert,
        &capsfilter,
        appsink.upcast_ref(),
    ])
    .map_err(|e| format!("Failed to link audio pipeline: {}", e))?;

    appsink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let count = AUDIO_SAMPLE_COUNTER.fetch_add(1, Ordering::Relaxed);

                let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                match captured_audio_sample(&sample, count) {
                    Some(captured) => {
                        let mut sender = sender.clone();
                        if sender.try_send(captured).is_err()
                            && count % timing::SAMPLE_LOG_INTERVAL == 0
                        {
                            debug!(sample = count, "Audio sample dropped (channel full)");
                        }
                    }
                    None => {
                        if count % timing::SAMPLE_LOG_INTERVAL == 0 {
                            warn!(sample = count, "Skipping unusable audio sample");
                        }
                    }
                }

                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );

    Ok(pipeline)
}

/// Build a [`CapturedSample`] from one appsink video sample
fn captured_video_sample(sample: &gst::Sample, count: u64) -> Option<CapturedSample> {
    let caps = sample.caps()?;
    let video_info = VideoInfo::from_caps(caps).ok()?;

    let format = VideoFormat {
        width: video_info.width(),
        height: video_info.height(),
        pixel_format: PixelFormat::from_gst_format(video_info.format().to_str())
            .unwrap_or(PixelFormat::NV12),
        framerate: {
            let fps = video_info.fps();
            if fps.numer() > 0 {
                Some(Framerate::new(fps.numer() as u32, fps.denom() as u32))
            } else {
                None
            }
        },
    };

    let buffer = sample.buffer_owned()?;
    let timestamp = Timestamp::from_nanos(buffer.pts().or(buffer.dts())?.nseconds());
    // Incomplete DMA transfers at high framerates arrive flagged corrupted;
    // they still travel downstream so the recorder's data-ready gate sees them
    let data_ready = !buffer.flags().contains(gst::BufferFlags::CORRUPTED);
    let payload = SampleData::from_mapped_buffer(buffer.into_mapped_buffer_readable().ok()?);

    if count % timing::SAMPLE_LOG_INTERVAL == 0 {
        debug!(
            sample = count,
            format = %format,
            timestamp = %timestamp,
            size_kb = payload.len() / 1024,
            "Video sample captured"
        );
    }

    Some(CapturedSample {
        sample: MediaSample {
            channel: Channel::Video,
            timestamp,
            payload,
            data_ready,
        },
        format: FormatDescriptor::Video(format),
    })
}

/// Build a [`CapturedSample`] from one appsink audio sample
///
/// The audio format is read straight off the caps structure (rate, channels,
/// format fields) rather than through a dedicated caps parser.
fn captured_audio_sample(sample: &gst::Sample, count: u64) -> Option<CapturedSample> {
    let caps = sample.caps()?;
    let structure = caps.structure(0)?;

    let format = AudioFormat {
        sample_rate: structure.get::<i32>("rate").ok()? as u32,
        channels: structure.get::<i32>("channels").ok()? as u32,
        sample_format: AudioSampleFormat::from_gst_format(structure.get::<&str>("format").ok()?)
            .unwrap_or(AudioSampleFormat::S16le),
    };

    let buffer = sample.buffer_owned()?;
    let timestamp = Timestamp::from_nanos(buffer.pts().or(buffer.dts())?.nseconds());
    let data_ready = !buffer.flags().contains(gst::BufferFlags::CORRUPTED);
    let payload = SampleData::from_mapped_buffer(buffer.into_mapped_buffer_readable().ok()?);

    if count % timing::SAMPLE_LOG_INTERVAL == 0 {
        debug!(
            sample = count,
            format = %format,
            timestamp = %timestamp,
            bytes = payload.len(),
            "Audio sample captured"
        );
    }

    Some(CapturedSample {
        sample: MediaSample {
            channel: Channel::Audio,
            timestamp,
            payload,
            data_ready,
        },
        format: FormatDescriptor::Audio(format),
    })
}

fn set_playing(pipeline: &gst::Pipeline, name: &str) -> Result<(), String> {
    pipeline
        .set_state(gst::State::Playing)
        .map_err(|e| format!("Failed to start {} pipeline: {}", name, e))?;

    let (result, state, pending) =
        pipeline.state(gst::ClockTime::from_seconds(timing::START_TIMEOUT_SECS));
    debug!(pipeline = %name, result = ?result, state = ?state, pending = ?pending, "Pipeline state");
    if state != gst::State::Playing {
        warn!(pipeline = %name, "Pipeline is not in PLAYING state yet");
    }
    Ok(())
}

fn set_null(pipeline: &gst::Pipeline, name: &str) -> Result<(), String> {
    pipeline
        .set_state(gst::State::Null)
        .map_err(|e| format!("Failed to stop {} pipeline: {}", name, e))?;

    let (result, state, _) =
        pipeline.state(gst::ClockTime::from_seconds(timing::STOP_TIMEOUT_SECS));
    match result {
        Ok(_) => debug!(pipeline = %name, state = ?state, "Pipeline stopped"),
        Err(e) => debug!(pipeline = %name, error = ?e, state = ?state, "Pipeline stop had issues"),
    }
    Ok(())
}

/// Bounded channel sized for the capture transport
pub fn capture_channel() -> (mpsc::Sender<CapturedSample>, mpsc::Receiver<CapturedSample>) {
    mpsc::channel(capture::QUEUE_DEPTH)
}
