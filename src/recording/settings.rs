// SPDX-License-Identifier: MPL-2.0

//! Typed, validated encode settings
//!
//! Settings are derived from the live per-channel stream formats at
//! configure time and validated at construction, so invalid dimensions and
//! unsupported codec/container combinations never reach the writer pipeline.
//! Nothing in here touches GStreamer; element probing happens in
//! [`crate::recording::encoders`].

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::capture::types::{
    AudioFormat, AudioSampleFormat, Channel, Framerate, PixelFormat, VideoFormat,
};

/// Video codec types in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    /// HEVC/H.265 codec (good compression)
    HEVC,
    /// H.264 codec (best compatibility)
    H264,
}

impl VideoCodec {
    /// Get the parser element name (if needed)
    pub fn parser_name(&self) -> Option<&'static str> {
        match self {
            VideoCodec::HEVC => Some("h265parse"),
            VideoCodec::H264 => Some("h264parse"),
        }
    }
}

/// Audio codec types in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    /// Opus codec (preferred - best quality, all channels)
    Opus,
    /// AAC codec (fallback - good compatibility)
    AAC,
}

impl AudioCodec {
    /// Get audio caps string for this codec
    pub fn caps_string(&self) -> &'static str {
        match self {
            AudioCodec::Opus => "audio/x-opus",
            AudioCodec::AAC => "audio/mpeg,mpegversion=4",
        }
    }
}

/// Container formats for the output file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// MP4 container (good compatibility)
    #[default]
    MP4,
    /// Matroska container (open format, takes any codec)
    Matroska,
}

impl ContainerFormat {
    /// Get file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::MP4 => "mp4",
            ContainerFormat::Matroska => "mkv",
        }
    }

    /// Get muxer element name
    pub fn muxer_name(&self) -> &'static str {
        match self {
            ContainerFormat::MP4 => "mp4mux",
            ContainerFormat::Matroska => "matroskamux",
        }
    }

    /// Video codecs this container accepts, in selection priority order
    pub fn supported_video_codecs(&self) -> &'static [VideoCodec] {
        match self {
            ContainerFormat::MP4 => &[VideoCodec::H264, VideoCodec::HEVC],
            ContainerFormat::Matroska => &[VideoCodec::H264, VideoCodec::HEVC],
        }
    }

    /// Audio codecs this container accepts, in selection priority order
    ///
    /// Opus-in-MP4 support is too patchy across players to rely on, so MP4
    /// is restricted to AAC.
    pub fn supported_audio_codecs(&self) -> &'static [AudioCodec] {
        match self {
            ContainerFormat::MP4 => &[AudioCodec::AAC],
            ContainerFormat::Matroska => &[AudioCodec::Opus, AudioCodec::AAC],
        }
    }
}

/// Video quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QualityPreset {
    /// Low quality (high compression, smaller files)
    Low,
    /// Medium quality (balanced)
    #[default]
    Medium,
    /// High quality (low compression, larger files)
    High,
    /// Maximum quality (minimal compression)
    Maximum,
}

impl QualityPreset {
    /// Get bitrate in kbps for given quality
    ///
    /// Bitrate scales with resolution using realistic encoding factors:
    /// - 720p: ~2-8 Mbps depending on quality
    /// - 1080p: ~4-15 Mbps depending on quality
    /// - 4K: ~15-40 Mbps depending on quality
    pub fn bitrate_kbps(&self, width: u32, height: u32) -> u32 {
        let pixels = width * height;
        // Factors chosen to give sensible bitrates:
        // 1080p (2M pixels): Low ~4Mbps, Med ~8Mbps, High ~12Mbps, Max ~20Mbps
        let base_bitrate = match self {
            QualityPreset::Low => (pixels as f64 * 0.002) as u32,
            QualityPreset::Medium => (pixels as f64 * 0.004) as u32,
            QualityPreset::High => (pixels as f64 * 0.006) as u32,
            QualityPreset::Maximum => (pixels as f64 * 0.010) as u32,
        };
        // Ensure minimum 500 kbps, maximum 50000 kbps (50 Mbps)
        base_bitrate.clamp(500, 50000)
    }

    /// Get x264/x265 preset name
    pub fn x264_preset(&self) -> &'static str {
        match self {
            QualityPreset::Low => "veryfast",
            QualityPreset::Medium => "fast",
            QualityPreset::High => "medium",
            QualityPreset::Maximum => "slow",
        }
    }
}

/// Audio quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioQuality {
    /// Low quality (64 kbps)
    Low,
    /// Medium quality (96 kbps)
    #[default]
    Medium,
    /// High quality (128 kbps)
    High,
    /// Maximum quality (192 kbps)
    Maximum,
}

impl AudioQuality {
    /// Get bitrate in bits per second
    pub fn bitrate_bps(&self) -> i32 {
        match self {
            AudioQuality::Low => 64_000,
            AudioQuality::Medium => 96_000,
            AudioQuality::High => 128_000,
            AudioQuality::Maximum => 192_000,
        }
    }
}

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioChannels {
    /// Mono (1 channel)
    Mono,
    /// Stereo (2 channels)
    Stereo,
    /// Multi-channel (more than 2)
    MultiChannel(u32),
}

impl AudioChannels {
    /// Get number of channels
    pub fn count(&self) -> u32 {
        match self {
            AudioChannels::Mono => 1,
            AudioChannels::Stereo => 2,
            AudioChannels::MultiChannel(n) => *n,
        }
    }

    /// Create from channel count
    pub fn from_count(count: u32) -> Self {
        match count {
            1 => AudioChannels::Mono,
            2 => AudioChannels::Stereo,
            n => AudioChannels::MultiChannel(n),
        }
    }
}

/// How video is fitted when encode dimensions differ from the source
///
/// Encode dimensions are derived from the live stream format, so the two
/// normally agree and no fitting happens. The mode only takes effect when a
/// caller overrides dimensions explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalingMode {
    /// Scale to fill the target, cropping overflow
    #[default]
    AspectFill,
    /// Scale to fit inside the target, adding borders
    AspectFit,
    /// Scale both axes independently
    Stretch,
}

impl ScalingMode {
    /// Whether the scaler should letterbox instead of filling
    pub fn add_borders(&self) -> bool {
        matches!(self, ScalingMode::AspectFit)
    }
}

/// Validated video encode settings for one recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoEncodeSettings {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub framerate: Framerate,
    pub quality: QualityPreset,
    pub container: ContainerFormat,
    pub scaling: ScalingMode,
}

impl VideoEncodeSettings {
    /// OpenH264's resolution ceiling (roughly 3072x3072); the weakest encoder
    /// in the fallback chain, so dimensions are capped to what it can take
    const MAX_PIXELS: u32 = 9_437_184;

    /// Derive settings from a live stream format
    ///
    /// Odd dimensions are rounded down to even (a hard requirement of the
    /// H.264/H.265 encoders); a missing framerate falls back to the default.
    /// Sources above the encoder resolution ceiling are downscaled
    /// proportionally until they fit under it, whatever their orientation.
    pub fn derive(
        format: &VideoFormat,
        quality: QualityPreset,
        container: ContainerFormat,
    ) -> Result<Self, String> {
        // Encoders require even dimensions
        let mut width = format.width & !1;
        let mut height = format.height & !1;
        if width == 0 || height == 0 {
            return Err(format!(
                "Invalid video dimensions {}x{}",
                format.width, format.height
            ));
        }

        // Pixel count in u64: extreme descriptors overflow a u32 product
        let pixels = width as u64 * height as u64;
        if pixels > Self::MAX_PIXELS as u64 {
            // Scale both axes so the result sits under the ceiling with the
            // aspect ratio preserved; rounding down to even only shrinks it
            let scale = (Self::MAX_PIXELS as f64 / pixels as f64).sqrt();
            let capped_width = ((width as f64 * scale) as u32) & !1;
            let capped_height = ((height as f64 * scale) as u32) & !1;
            if capped_width == 0 || capped_height == 0 {
                return Err(format!(
                    "Invalid video dimensions {}x{}",
                    format.width, format.height
                ));
            }
            warn!(
                source_width = width,
                source_height = height,
                width = capped_width,
                height = capped_height,
                "Source exceeds encoder resolution ceiling, downscaling"
            );
            width = capped_width;
            height = capped_height;
        }

        let framerate = format.framerate.unwrap_or_default();
        if framerate.num == 0 {
            return Err(format!("Invalid framerate {}/{}", framerate.num, framerate.denom));
        }

        if container.supported_video_codecs().is_empty() {
            return Err(format!("Container {:?} accepts no video codec", container));
        }

        Ok(Self {
            width,
            height,
            pixel_format: format.pixel_format,
            framerate,
            quality,
            container,
            scaling: ScalingMode::default(),
        })
    }

    /// Target bitrate for these dimensions
    pub fn bitrate_kbps(&self) -> u32 {
        self.quality.bitrate_kbps(self.width, self.height)
    }

    /// Approximate size of one raw frame in bytes
    pub fn frame_size_bytes(&self) -> u64 {
        (self.width as f64 * self.height as f64 * self.pixel_format.bytes_per_pixel() as f64)
            as u64
    }
}

/// Validated audio encode settings for one recording
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioEncodeSettings {
    pub sample_rate: u32,
    pub channels: AudioChannels,
    pub sample_format: AudioSampleFormat,
    pub quality: AudioQuality,
    pub container: ContainerFormat,
}

impl AudioEncodeSettings {
    /// Derive settings from a live stream format
    pub fn derive(
        format: &AudioFormat,
        quality: AudioQuality,
        container: ContainerFormat,
    ) -> Result<Self, String> {
        if !(8_000..=192_000).contains(&format.sample_rate) {
            return Err(format!("Invalid sample rate {}", format.sample_rate));
        }
        if format.channels == 0 || format.channels > 8 {
            return Err(format!("Invalid channel count {}", format.channels));
        }
        if container.supported_audio_codecs().is_empty() {
            return Err(format!("Container {:?} accepts no audio codec", container));
        }

        Ok(Self {
            sample_rate: format.sample_rate,
            channels: AudioChannels::from_count(format.channels),
            sample_format: format.sample_format,
            quality,
            container,
        })
    }
}

/// Per-channel settings handed to the muxer at registration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ChannelSettings {
    Video(VideoEncodeSettings),
    Audio(AudioEncodeSettings),
}

impl ChannelSettings {
    pub fn channel(&self) -> Channel {
        match self {
            ChannelSettings::Video(_) => Channel::Video,
            ChannelSettings::Audio(_) => Channel::Audio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_format(width: u32, height: u32) -> VideoFormat {
        VideoFormat {
            width,
            height,
            pixel_format: PixelFormat::NV12,
            framerate: Some(Framerate::from_int(30)),
        }
    }

    #[test]
    fn test_quality_bitrates() {
        // 1920x1080 (Full HD)
        let low = QualityPreset::Low.bitrate_kbps(1920, 1080);
        let high = QualityPreset::High.bitrate_kbps(1920, 1080);
        assert!(low < high);
        assert!(low >= 500); // Minimum
        assert!(high <= 50000); // Maximum
    }

    #[test]
    fn test_container_formats() {
        assert_eq!(ContainerFormat::MP4.extension(), "mp4");
        assert_eq!(ContainerFormat::Matroska.extension(), "mkv");
        assert_eq!(ContainerFormat::MP4.muxer_name(), "mp4mux");
        assert_eq!(ContainerFormat::Matroska.muxer_name(), "matroskamux");
    }

    #[test]
    fn test_container_codec_compat() {
        // MP4 does not take Opus; Matroska takes everything
        assert!(!ContainerFormat::MP4
            .supported_audio_codecs()
            .contains(&AudioCodec::Opus));
        assert!(ContainerFormat::Matroska
            .supported_audio_codecs()
            .contains(&AudioCodec::Opus));
        assert!(ContainerFormat::MP4
            .supported_video_codecs()
            .contains(&VideoCodec::H264));
    }

    #[test]
    fn test_video_derive_rounds_odd_dimensions() {
        let settings =
            VideoEncodeSettings::derive(&video_format(1921, 1081), QualityPreset::Medium, ContainerFormat::MP4)
                .expect("valid format");
        assert_eq!(settings.width, 1920);
        assert_eq!(settings.height, 1080);
    }

    #[test]
    fn test_video_derive_rejects_zero_dimensions() {
        assert!(
            VideoEncodeSettings::derive(&video_format(0, 1080), QualityPreset::Medium, ContainerFormat::MP4)
                .is_err()
        );
        // Width 1 rounds down to 0 and is rejected too
        assert!(
            VideoEncodeSettings::derive(&video_format(1, 1080), QualityPreset::Medium, ContainerFormat::MP4)
                .is_err()
        );
    }

    #[test]
    fn test_video_derive_caps_oversized_sources() {
        // Landscape, portrait, and square sources above the ceiling; the cap
        // must hold regardless of orientation
        for (w, h) in [(4000u32, 2800u32), (2000, 6000), (4000, 4000)] {
            let settings = VideoEncodeSettings::derive(
                &video_format(w, h),
                QualityPreset::Medium,
                ContainerFormat::MP4,
            )
            .expect("oversized format must still derive");

            assert!(
                settings.width * settings.height <= VideoEncodeSettings::MAX_PIXELS,
                "{}x{} capped to {}x{}, still above the ceiling",
                w,
                h,
                settings.width,
                settings.height
            );
            assert_eq!(settings.width % 2, 0);
            assert_eq!(settings.height % 2, 0);
            // Aspect ratio survives the downscale
            let source_ratio = w as f64 / h as f64;
            let capped_ratio = settings.width as f64 / settings.height as f64;
            assert!(
                (source_ratio - capped_ratio).abs() / source_ratio < 0.01,
                "{}x{} aspect ratio not preserved by {}x{}",
                w,
                h,
                settings.width,
                settings.height
            );
        }
    }

    #[test]
    fn test_video_derive_survives_extreme_dimensions() {
        // 65536x65536 overflows a u32 pixel product; the clamp must still
        // land exactly on the ceiling instead of panicking
        let settings = VideoEncodeSettings::derive(
            &video_format(65536, 65536),
            QualityPreset::Medium,
            ContainerFormat::MP4,
        )
        .expect("extreme format must still derive");
        assert_eq!(settings.width, 3072);
        assert_eq!(settings.height, 3072);
    }

    #[test]
    fn test_video_derive_defaults_missing_framerate() {
        let mut format = video_format(1280, 720);
        format.framerate = None;
        let settings =
            VideoEncodeSettings::derive(&format, QualityPreset::Medium, ContainerFormat::MP4)
                .expect("valid format");
        assert_eq!(settings.framerate, Framerate::from_int(30));
    }

    #[test]
    fn test_audio_derive_validation() {
        let format = AudioFormat {
            sample_rate: 48_000,
            channels: 2,
            sample_format: AudioSampleFormat::S16le,
        };
        let settings =
            AudioEncodeSettings::derive(&format, AudioQuality::Medium, ContainerFormat::MP4)
                .expect("valid format");
        assert_eq!(settings.channels, AudioChannels::Stereo);

        let bad_rate = AudioFormat {
            sample_rate: 1_000,
            ..format
        };
        assert!(
            AudioEncodeSettings::derive(&bad_rate, AudioQuality::Medium, ContainerFormat::MP4)
                .is_err()
        );

        let bad_channels = AudioFormat {
            channels: 0,
            ..format
        };
        assert!(
            AudioEncodeSettings::derive(&bad_channels, AudioQuality::Medium, ContainerFormat::MP4)
                .is_err()
        );
    }

    #[test]
    fn test_scaling_mode_default_fills() {
        assert_eq!(ScalingMode::default(), ScalingMode::AspectFill);
        assert!(!ScalingMode::AspectFill.add_borders());
        assert!(ScalingMode::AspectFit.add_borders());
    }
}
