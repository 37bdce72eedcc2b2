// SPDX-License-Identifier: GPL-3.0-only
// Shared types for the capture-to-recording path

//! Shared sample and format types
//!
//! Everything that flows from a capture source through the router into the
//! recorder is described here: which channel a sample belongs to, when it was
//! presented, what its payload is, and the last-known stream format per
//! channel.

use gstreamer::buffer::{MappedBuffer, Readable};
use std::sync::Arc;
use std::time::Duration;

/// Media channel carried through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Video,
    Audio,
}

impl Channel {
    /// Both channels, in fixed slot order
    pub const ALL: [Channel; 2] = [Channel::Video, Channel::Audio];

    /// Slot index for per-channel arrays
    pub fn index(&self) -> usize {
        match self {
            Channel::Video => 0,
            Channel::Audio => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Video => "video",
            Channel::Audio => "audio",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Presentation timestamp in nanoseconds
///
/// Capture sources stamp samples on a shared monotonic clock, so timestamps
/// are comparable across channels. The recorder re-bases them against the
/// session start, so absolute values never reach the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn from_nanos(nanos: u64) -> Self {
        Timestamp(nanos)
    }

    pub fn from_millis(millis: u64) -> Self {
        Timestamp(millis * 1_000_000)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Elapsed time since an earlier timestamp (zero if `earlier` is later)
    pub fn saturating_since(&self, earlier: Timestamp) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}s", self.0 as f64 / 1_000_000_000.0)
    }
}

/// Sample payload storage - either pre-copied bytes or zero-copy GStreamer buffer
///
/// The `Mapped` variant keeps the GStreamer buffer mapped and alive until all
/// references are dropped, so samples can cross thread boundaries without
/// copying media data.
#[derive(Clone)]
pub enum SampleData {
    /// Pre-copied bytes (synthetic sources, tests)
    Copied(Arc<[u8]>),
    /// Zero-copy mapped GStreamer buffer
    Mapped(Arc<MappedBuffer<Readable>>),
}

impl SampleData {
    /// Create SampleData from a mapped GStreamer buffer (zero-copy)
    pub fn from_mapped_buffer(buffer: MappedBuffer<Readable>) -> Self {
        SampleData::Mapped(Arc::new(buffer))
    }

    /// Payload length in bytes
    pub fn len(&self) -> usize {
        match self {
            SampleData::Copied(data) => data.len(),
            SampleData::Mapped(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for SampleData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SampleData::Copied(data) => write!(f, "SampleData::Copied({} bytes)", data.len()),
            SampleData::Mapped(buf) => write!(f, "SampleData::Mapped({} bytes)", buf.len()),
        }
    }
}

impl AsRef<[u8]> for SampleData {
    fn as_ref(&self) -> &[u8] {
        match self {
            SampleData::Copied(data) => data.as_ref(),
            SampleData::Mapped(buf) => buf.as_slice(),
        }
    }
}

impl std::ops::Deref for SampleData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_ref()
    }
}

/// A single timed media sample from a capture source
///
/// Immutable once produced. `data_ready` is false for buffers the source
/// flagged corrupted or incomplete; the recorder drops those before any other
/// bookkeeping.
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub channel: Channel,
    pub timestamp: Timestamp,
    pub payload: SampleData,
    pub data_ready: bool,
}

/// Framerate as a fraction (numerator/denominator)
/// Stores exact framerate to handle NTSC rates like 59.94fps (60000/1001)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Create a framerate from an integer (e.g., 30 becomes 30/1)
    pub fn from_int(fps: u32) -> Self {
        Self { num: fps, denom: 1 }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Nominal duration of one frame, if the rate is valid
    pub fn frame_duration(&self) -> Option<Duration> {
        if self.num == 0 {
            return None;
        }
        Some(Duration::from_nanos(
            1_000_000_000u64 * self.denom as u64 / self.num as u64,
        ))
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fps = self.as_f64();
        // Show decimal for non-integer framerates (NTSC)
        if self.denom != 1 {
            write!(f, "{:.2}", fps)
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self { num: 30, denom: 1 }
    }
}

/// Raw pixel layout of video samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// RGBA - 32-bit with alpha (4 bytes per pixel)
    RGBA,
    /// BGRA - 32-bit with alpha (B G R A byte order)
    BGRA,
    /// NV12 - Semi-planar 4:2:0 (Y plane + interleaved UV plane)
    NV12,
    /// I420 - Planar 4:2:0 (separate Y, U, V planes)
    I420,
    /// YUYV - Packed 4:2:2 (Y0 U Y1 V interleaved)
    YUYV,
    /// UYVY - Packed 4:2:2 (U Y0 V Y1 interleaved)
    UYVY,
    /// RGB24 - 24-bit RGB (3 bytes per pixel, no alpha)
    RGB24,
    /// Gray8 - 8-bit grayscale (single channel)
    Gray8,
}

impl PixelFormat {
    /// Average bytes per pixel (accounting for chroma subsampling)
    pub fn bytes_per_pixel(&self) -> f32 {
        match self {
            Self::RGBA | Self::BGRA => 4.0,
            Self::NV12 | Self::I420 => 1.5, // 4:2:0 subsampling
            Self::YUYV | Self::UYVY => 2.0, // 4:2:2 subsampling
            Self::RGB24 => 3.0,
            Self::Gray8 => 1.0,
        }
    }

    /// Convert to a GStreamer video/x-raw format string.
    ///
    /// Used when setting caps on an appsrc element to feed captured samples
    /// into an encoding pipeline.
    pub fn to_gst_format_string(&self) -> &'static str {
        match self {
            Self::RGBA => "RGBA",
            Self::BGRA => "BGRA",
            Self::NV12 => "NV12",
            Self::I420 => "I420",
            Self::YUYV => "YUY2",
            Self::UYVY => "UYVY",
            Self::RGB24 => "RGB",
            Self::Gray8 => "GRAY8",
        }
    }

    /// Parse format from GStreamer format string
    pub fn from_gst_format(format: &str) -> Option<Self> {
        match format {
            "RGBA" | "RGBx" | "xRGB" | "ARGB" => Some(Self::RGBA),
            "BGRA" | "BGRx" => Some(Self::BGRA),
            "NV12" => Some(Self::NV12),
            "I420" | "YV12" => Some(Self::I420),
            "YUYV" | "YUY2" => Some(Self::YUYV),
            "UYVY" => Some(Self::UYVY),
            "RGB" | "BGR" => Some(Self::RGB24),
            "GRAY8" | "GREY" | "Y8" => Some(Self::Gray8),
            _ => None,
        }
    }
}

/// Raw sample layout of audio samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSampleFormat {
    /// Signed 16-bit little-endian PCM
    S16le,
    /// Signed 32-bit little-endian PCM
    S32le,
    /// 32-bit float little-endian PCM
    F32le,
}

impl AudioSampleFormat {
    /// Convert to a GStreamer audio/x-raw format string
    pub fn to_gst_format_string(&self) -> &'static str {
        match self {
            Self::S16le => "S16LE",
            Self::S32le => "S32LE",
            Self::F32le => "F32LE",
        }
    }

    /// Parse format from GStreamer format string
    pub fn from_gst_format(format: &str) -> Option<Self> {
        match format {
            "S16LE" => Some(Self::S16le),
            "S32LE" => Some(Self::S32le),
            "F32LE" => Some(Self::F32le),
            _ => None,
        }
    }

    /// Size of one sample for one channel, in bytes
    pub fn bytes_per_sample(&self) -> u32 {
        match self {
            Self::S16le => 2,
            Self::S32le | Self::F32le => 4,
        }
    }
}

/// Video stream format as reported by the capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub framerate: Option<Framerate>,
}

impl std::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(fps) = &self.framerate {
            write!(f, "{}x{} @ {}fps", self.width, self.height, fps)
        } else {
            write!(f, "{}x{}", self.width, self.height)
        }
    }
}

/// Audio stream format as reported by the capture source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u32,
    pub sample_format: AudioSampleFormat,
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}",
            self.sample_rate,
            self.channels,
            self.sample_format.to_gst_format_string()
        )
    }
}

/// Per-channel stream format descriptor
///
/// Capture sources attach the current descriptor to every sample they emit;
/// the router keeps the last-seen value per channel so a recorder can be
/// configured from live formats rather than assumptions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatDescriptor {
    Video(VideoFormat),
    Audio(AudioFormat),
}

impl FormatDescriptor {
    pub fn channel(&self) -> Channel {
        match self {
            FormatDescriptor::Video(_) => Channel::Video,
            FormatDescriptor::Audio(_) => Channel::Audio,
        }
    }
}

impl std::fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormatDescriptor::Video(v) => write!(f, "video ({})", v),
            FormatDescriptor::Audio(a) => write!(f, "audio ({})", a),
        }
    }
}

/// A sample paired with the format descriptor current at capture time
///
/// This is what capture sources push over the transport channel to the
/// sample pump.
#[derive(Debug, Clone)]
pub struct CapturedSample {
    pub sample: MediaSample,
    pub format: FormatDescriptor,
}
