// SPDX-License-Identifier: GPL-3.0-only

//! Recording: session state machine, settings, and the container writer
//!
//! The [`recorder::Recorder`] drives a [`muxer::Muxer`] with samples the
//! router forwards. Encode settings are derived from live capture formats and
//! validated before they reach the writer; encoder elements are probed and
//! configured in [`encoders`]. [`gst_muxer::GstMuxer`] is the production
//! writer.

pub mod encoders;
pub mod gst_muxer;
pub mod muxer;
pub mod recorder;
pub mod settings;

pub use gst_muxer::GstMuxer;
pub use muxer::{FinalizeCallback, Muxer, MuxerStatus};
pub use recorder::{EncodePrefs, Recorder, RecordingOutcome, RecordingState};
pub use settings::{
    AudioCodec, AudioEncodeSettings, AudioQuality, ChannelSettings, ContainerFormat,
    QualityPreset, ScalingMode, VideoCodec, VideoEncodeSettings,
};
