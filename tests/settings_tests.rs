// SPDX-License-Identifier: MPL-2.0

//! Integration tests for encode settings derivation

use avrec::capture::types::{
    AudioFormat, AudioSampleFormat, Framerate, PixelFormat, VideoFormat,
};
use avrec::recording::{
    AudioEncodeSettings, AudioQuality, ContainerFormat, QualityPreset, VideoEncodeSettings,
};

fn video_format(width: u32, height: u32) -> VideoFormat {
    VideoFormat {
        width,
        height,
        pixel_format: PixelFormat::NV12,
        framerate: Some(Framerate::from_int(30)),
    }
}

#[test]
fn test_video_settings_follow_live_format() {
    let settings = VideoEncodeSettings::derive(
        &video_format(1920, 1080),
        QualityPreset::Medium,
        ContainerFormat::MP4,
    )
    .expect("1080p must derive");

    assert_eq!(settings.width, 1920);
    assert_eq!(settings.height, 1080);
    assert_eq!(settings.pixel_format, PixelFormat::NV12);
    assert_eq!(settings.framerate, Framerate::from_int(30));
}

#[test]
fn test_odd_dimensions_round_down_to_even() {
    // 1080p cropped by a pixel; encoders reject odd dimensions
    let settings = VideoEncodeSettings::derive(
        &video_format(1919, 1079),
        QualityPreset::Medium,
        ContainerFormat::MP4,
    )
    .expect("odd dimensions must still derive");

    assert_eq!(settings.width, 1918);
    assert_eq!(settings.height, 1078);
}

#[test]
fn test_degenerate_dimensions_rejected() {
    assert!(
        VideoEncodeSettings::derive(
            &video_format(0, 1080),
            QualityPreset::Medium,
            ContainerFormat::MP4
        )
        .is_err(),
        "Zero width must be rejected"
    );
    // 1 rounds down to 0
    assert!(
        VideoEncodeSettings::derive(
            &video_format(1920, 1),
            QualityPreset::Medium,
            ContainerFormat::MP4
        )
        .is_err()
    );
}

#[test]
fn test_missing_framerate_falls_back_to_default() {
    let mut format = video_format(1280, 720);
    format.framerate = None;

    let settings =
        VideoEncodeSettings::derive(&format, QualityPreset::Medium, ContainerFormat::Matroska)
            .expect("missing framerate must not fail derivation");
    assert_eq!(settings.framerate, Framerate::default());
}

#[test]
fn test_bitrate_scales_with_quality_and_resolution() {
    let low_720 = VideoEncodeSettings::derive(
        &video_format(1280, 720),
        QualityPreset::Low,
        ContainerFormat::MP4,
    )
    .unwrap();
    let max_720 = VideoEncodeSettings::derive(
        &video_format(1280, 720),
        QualityPreset::Maximum,
        ContainerFormat::MP4,
    )
    .unwrap();
    let max_4k = VideoEncodeSettings::derive(
        &video_format(3840, 2160),
        QualityPreset::Maximum,
        ContainerFormat::MP4,
    )
    .unwrap();

    assert!(low_720.bitrate_kbps() < max_720.bitrate_kbps());
    assert!(max_720.bitrate_kbps() < max_4k.bitrate_kbps());
    assert!(max_4k.bitrate_kbps() <= 50_000, "Bitrate must stay clamped");
}

#[test]
fn test_frame_size_accounts_for_subsampling() {
    let settings = VideoEncodeSettings::derive(
        &video_format(1920, 1080),
        QualityPreset::Medium,
        ContainerFormat::MP4,
    )
    .unwrap();
    // NV12 is 1.5 bytes per pixel
    assert_eq!(settings.frame_size_bytes(), 1920 * 1080 * 3 / 2);
}

#[test]
fn test_audio_settings_follow_live_format() {
    let settings = AudioEncodeSettings::derive(
        &AudioFormat {
            sample_rate: 48_000,
            channels: 2,
            sample_format: AudioSampleFormat::S16le,
        },
        AudioQuality::Medium,
        ContainerFormat::Matroska,
    )
    .expect("stereo 48kHz must derive");

    assert_eq!(settings.sample_rate, 48_000);
    assert_eq!(settings.channels.count(), 2);
}

#[test]
fn test_audio_rejects_degenerate_formats() {
    let base = AudioFormat {
        sample_rate: 48_000,
        channels: 2,
        sample_format: AudioSampleFormat::S16le,
    };

    let mut no_channels = base;
    no_channels.channels = 0;
    assert!(
        AudioEncodeSettings::derive(&no_channels, AudioQuality::Medium, ContainerFormat::MP4)
            .is_err()
    );

    let mut silly_rate = base;
    silly_rate.sample_rate = 1_000;
    assert!(
        AudioEncodeSettings::derive(&silly_rate, AudioQuality::Medium, ContainerFormat::MP4)
            .is_err()
    );
}

#[test]
fn test_container_codec_priorities() {
    use avrec::recording::AudioCodec;

    // MP4 stays AAC-only for player compatibility
    assert_eq!(ContainerFormat::MP4.supported_audio_codecs(), &[AudioCodec::AAC]);
    assert_eq!(
        ContainerFormat::Matroska.supported_audio_codecs().first(),
        Some(&AudioCodec::Opus)
    );

    assert_eq!(ContainerFormat::MP4.extension(), "mp4");
    assert_eq!(ContainerFormat::Matroska.extension(), "mkv");
}
