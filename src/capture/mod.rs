// SPDX-License-Identifier: GPL-3.0-only

//! Live capture: sources, routing, and the capture worker
//!
//! Samples originate in a capture source ([`pipewire::PipeWireCapture`] in
//! production), travel over one bounded channel to the sample pump running on
//! the capture worker, and are forwarded by the [`router::SampleRouter`] into
//! an attached recorder. Both media channels share the worker, so
//! cross-channel ordering is simply arrival order.

pub mod pipewire;
pub mod router;
pub mod types;
pub mod worker;

pub use pipewire::{CaptureTargets, PipeWireCapture};
pub use router::SampleRouter;
pub use types::{
    AudioFormat, AudioSampleFormat, CapturedSample, Channel, FormatDescriptor, Framerate,
    MediaSample, PixelFormat, SampleData, Timestamp, VideoFormat,
};
pub use worker::{CaptureWorker, LoopAction, start_sample_pump};
