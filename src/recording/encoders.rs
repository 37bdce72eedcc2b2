// SPDX-License-Identifier: MPL-2.0

//! Encoder element selection with hardware acceleration priority
//!
//! Candidate elements are probed in priority order (hardware before
//! software) and configured from the validated encode settings. Selection is
//! constrained to the codecs the chosen container accepts.

use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

use crate::recording::settings::{
    AudioChannels, AudioCodec, AudioEncodeSettings, QualityPreset, VideoCodec,
    VideoEncodeSettings,
};

/// Video encoder candidates: (element, display name, codec, hardware)
///
/// Order within a codec is selection priority.
const VIDEO_ENCODER_SPECS: &[(&str, &str, VideoCodec, bool)] = &[
    // Hardware HEVC/H.265
    ("vah265enc", "VA-API H.265 (HW)", VideoCodec::HEVC, true),
    ("vaapih265enc", "VA-API H.265 (HW)", VideoCodec::HEVC, true),
    ("nvh265enc", "NVIDIA H.265 (HW)", VideoCodec::HEVC, true),
    ("qsvh265enc", "Intel QSV H.265 (HW)", VideoCodec::HEVC, true),
    ("amfh265enc", "AMD AMF H.265 (HW)", VideoCodec::HEVC, true),
    ("v4l2h265enc", "V4L2 H.265 (HW)", VideoCodec::HEVC, true),
    // Software HEVC/H.265
    ("x265enc", "x265 H.265 (SW)", VideoCodec::HEVC, false),
    // Hardware H.264
    ("vah264enc", "VA-API H.264 (HW)", VideoCodec::H264, true),
    ("vaapih264enc", "VA-API H.264 (HW)", VideoCodec::H264, true),
    ("nvh264enc", "NVIDIA H.264 (HW)", VideoCodec::H264, true),
    ("qsvh264enc", "Intel QSV H.264 (HW)", VideoCodec::H264, true),
    ("amfh264enc", "AMD AMF H.264 (HW)", VideoCodec::H264, true),
    ("v4l2h264enc", "V4L2 H.264 (HW)", VideoCodec::H264, true),
    // Software H.264
    ("x264enc", "x264 H.264 (SW)", VideoCodec::H264, false),
    ("openh264enc", "OpenH264 H.264 (SW)", VideoCodec::H264, false),
];

/// Audio encoder candidates: (element, display name, codec)
const AUDIO_ENCODER_SPECS: &[(&str, &str, AudioCodec)] = &[
    ("opusenc", "Opus (SW)", AudioCodec::Opus),
    ("avenc_aac", "FFmpeg AAC (SW)", AudioCodec::AAC),
    ("faac", "FAAC AAC (SW)", AudioCodec::AAC),
    ("voaacenc", "VisualOn AAC (SW)", AudioCodec::AAC),
];

/// Information about an available encoder element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderInfo {
    /// GStreamer element name
    pub element_name: &'static str,
    /// Human-readable name
    pub display_name: &'static str,
    /// Whether this is hardware accelerated
    pub is_hardware: bool,
}

/// Selected video encoder with configuration applied
pub struct SelectedVideoEncoder {
    /// The encoder element
    pub encoder: gst::Element,
    /// Optional parser element
    pub parser: Option<gst::Element>,
    /// Codec being used
    pub codec: VideoCodec,
    /// Element name the encoder was created from
    pub element_name: &'static str,
}

/// Selected audio encoder with configuration applied
pub struct SelectedAudioEncoder {
    /// The encoder element
    pub encoder: gst::Element,
    /// Codec being used
    pub codec: AudioCodec,
}

/// Enumerate available video encoder elements in priority order
pub fn enumerate_video_encoders() -> Vec<EncoderInfo> {
    let _ = gst::init();

    VIDEO_ENCODER_SPECS
        .iter()
        .filter(|(element_name, _, _, _)| {
            gst::ElementFactory::make(element_name).build().is_ok()
        })
        .map(|(element_name, display_name, _, is_hardware)| EncoderInfo {
            element_name,
            display_name,
            is_hardware: *is_hardware,
        })
        .collect()
}

/// Enumerate available audio encoder elements in priority order
pub fn enumerate_audio_encoders() -> Vec<EncoderInfo> {
    let _ = gst::init();

    AUDIO_ENCODER_SPECS
        .iter()
        .filter(|(element_name, _, _)| gst::ElementFactory::make(element_name).build().is_ok())
        .map(|(element_name, display_name, _)| EncoderInfo {
            element_name,
            display_name,
            is_hardware: false,
        })
        .collect()
}

/// Select the best available video encoder for these settings
///
/// Tries the container's supported codecs in priority order, hardware
/// encoders before software, and configures the first element that can be
/// created.
///
/// # Returns
/// * `Ok(SelectedVideoEncoder)` - Selected encoder with configuration
/// * `Err(String)` - No usable encoder element on this system
pub fn select_video_encoder(
    settings: &VideoEncodeSettings,
) -> Result<SelectedVideoEncoder, String> {
    gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

    for codec in settings.container.supported_video_codecs() {
        let candidates = VIDEO_ENCODER_SPECS
            .iter()
            .filter(|(_, _, spec_codec, _)| spec_codec == codec);

        for (encoder_name, _, _, is_hardware) in candidates {
            if let Ok(encoder) = gst::ElementFactory::make(encoder_name).build() {
                info!(
                    encoder = %encoder_name,
                    codec = ?codec,
                    hardware = is_hardware,
                    "Selected video encoder"
                );

                configure_video_encoder(&encoder, encoder_name, settings);

                // Create parser if needed
                let parser = if let Some(parser_name) = codec.parser_name() {
                    match gst::ElementFactory::make(parser_name).build() {
                        Ok(p) => {
                            debug!("Created parser: {}", parser_name);
                            Some(p)
                        }
                        Err(e) => {
                            warn!("Failed to create parser {}: {}", parser_name, e);
                            None
                        }
                    }
                } else {
                    None
                };

                return Ok(SelectedVideoEncoder {
                    encoder,
                    parser,
                    codec: *codec,
                    element_name: encoder_name,
                });
            }
        }
    }

    Err(format!(
        "No video encoder available for {:?}. Please install gstreamer1-plugins-ugly (x264enc) or gstreamer1-plugin-openh264",
        settings.container
    ))
}

/// Select the best available audio encoder for these settings
///
/// # Returns
/// * `Ok(SelectedAudioEncoder)` - Selected encoder with configuration
/// * `Err(String)` - No usable encoder element on this system
pub fn select_audio_encoder(
    settings: &AudioEncodeSettings,
) -> Result<SelectedAudioEncoder, String> {
    gst::init().map_err(|e| format!("Failed to initialize GStreamer: {}", e))?;

    for codec in settings.container.supported_audio_codecs() {
        let candidates = AUDIO_ENCODER_SPECS
            .iter()
            .filter(|(_, _, spec_codec)| spec_codec == codec);

        for (encoder_name, _, _) in candidates {
            if let Ok(encoder) = gst::ElementFactory::make(encoder_name).build() {
                info!(
                    codec = ?codec,
                    encoder = %encoder_name,
                    channels = settings.channels.count(),
                    "Selected audio encoder"
                );

                match codec {
                    AudioCodec::Opus => configure_opus_encoder(&encoder, settings),
                    AudioCodec::AAC => configure_aac_encoder(&encoder, encoder_name, settings),
                }

                return Ok(SelectedAudioEncoder {
                    encoder,
                    codec: *codec,
                });
            }
        }
    }

    Err(format!(
        "No audio encoder available for {:?}. Please install gstreamer1-plugins-base (opusenc) or gstreamer1-plugins-bad (avenc_aac)",
        settings.container
    ))
}

/// Configure video encoder based on element type and settings
fn configure_video_encoder(
    encoder: &gst::Element,
    encoder_name: &str,
    settings: &VideoEncodeSettings,
) {
    let bitrate = settings.bitrate_kbps();
    let quality = settings.quality;

    match encoder_name {
        // x264 software encoder
        "x264enc" => {
            let _ = encoder.set_property_from_str("speed-preset", quality.x264_preset());
            let _ = encoder.set_property_from_str("tune", "zerolatency");
            let _ = encoder.set_property("bitrate", bitrate);
            debug!(
                "Configured x264enc: preset={}, bitrate={} kbps",
                quality.x264_preset(),
                bitrate
            );
        }

        // x265 software encoder
        "x265enc" => {
            let _ = encoder.set_property_from_str("speed-preset", quality.x264_preset());
            let _ = encoder.set_property("bitrate", bitrate);
            debug!(
                "Configured x265enc: preset={}, bitrate={} kbps",
                quality.x264_preset(),
                bitrate
            );
        }

        // VA-API encoders (old plugin style - uses integer)
        "vaapih264enc" | "vaapih265enc" => {
            let _ = encoder.set_property("rate-control", 2); // CBR
            let _ = encoder.set_property("bitrate", bitrate);
            debug!("Configured VA-API encoder: bitrate={} kbps", bitrate);
        }

        // VA-API encoders (new plugin style - uses string)
        "vah264enc" | "vah265enc" => {
            let _ = encoder.set_property_from_str("rate-control", "cbr");
            let _ = encoder.set_property("bitrate", bitrate);
            debug!("Configured VA-API encoder: bitrate={} kbps", bitrate);
        }

        // NVIDIA encoders
        "nvh264enc" | "nvh265enc" => {
            let _ = encoder.set_property("bitrate", bitrate);
            let _ = encoder.set_property_from_str("rc-mode", "vbr"); // Variable bitrate
            let preset = match quality {
                QualityPreset::Low | QualityPreset::Medium => "fast",
                QualityPreset::High | QualityPreset::Maximum => "hq",
            };
            let _ = encoder.set_property_from_str("preset", preset);
            debug!(
                "Configured NVIDIA encoder: preset={}, bitrate={} kbps",
                preset, bitrate
            );
        }

        // AMD AMF encoders
        "amfh264enc" | "amfh265enc" => {
            let _ = encoder.set_property("bitrate", bitrate);
            let _ = encoder.set_property_from_str("rate-control", "cbr");
            debug!("Configured AMD AMF encoder: bitrate={} kbps", bitrate);
        }

        // Intel QSV encoders
        "qsvh264enc" | "qsvh265enc" => {
            let _ = encoder.set_property("bitrate", bitrate);
            debug!("Configured Intel QSV encoder: bitrate={} kbps", bitrate);
        }

        // V4L2 hardware encoders
        "v4l2h264enc" | "v4l2h265enc" => {
            // V4L2 encoders typically have limited configuration
            debug!("Using V4L2 encoder with default configuration");
        }

        // OpenH264 (software H.264 encoder)
        "openh264enc" => {
            // Set rate control mode to bitrate mode using string enum
            let _ = encoder.set_property_from_str("rate-control", "bitrate");
            let _ = encoder.set_property("bitrate", bitrate * 1000); // Bits per second
            // Set usage type to camera for real-time encoding
            let _ = encoder.set_property_from_str("usage-type", "camera");
            debug!(
                "Configured openh264enc: rate-control=bitrate, bitrate={} bps",
                bitrate * 1000
            );
        }

        _ => {
            debug!("Unknown encoder type, using default configuration");
        }
    }
}

/// Configure Opus encoder
fn configure_opus_encoder(encoder: &gst::Element, settings: &AudioEncodeSettings) {
    let bitrate = settings.quality.bitrate_bps();

    // Opus bitrate is in bits per second
    let _ = encoder.set_property("bitrate", bitrate);

    // Audio type: voice for mono, music for stereo/multi-channel
    let audio_type = match settings.channels {
        AudioChannels::Mono => "voice",
        AudioChannels::Stereo | AudioChannels::MultiChannel(_) => "generic",
    };
    let _ = encoder.set_property_from_str("audio-type", audio_type);

    // Bandwidth: wide for voice, fullband for music
    let bandwidth = match settings.channels {
        AudioChannels::Mono => "wideband",
        AudioChannels::Stereo | AudioChannels::MultiChannel(_) => "fullband",
    };
    let _ = encoder.set_property_from_str("bandwidth", bandwidth);

    debug!(
        "Configured opusenc: bitrate={} bps, audio-type={}, bandwidth={}",
        bitrate, audio_type, bandwidth
    );
}

/// Configure AAC encoder
fn configure_aac_encoder(
    encoder: &gst::Element,
    encoder_name: &str,
    settings: &AudioEncodeSettings,
) {
    let bitrate = settings.quality.bitrate_bps();

    match encoder_name {
        "avenc_aac" => {
            // avenc_aac uses bitrate in bits per second
            let _ = encoder.set_property("bitrate", bitrate);
            debug!("Configured avenc_aac: bitrate={} bps", bitrate);
        }

        "faac" => {
            // faac uses bitrate in kbps
            let _ = encoder.set_property("bitrate", bitrate / 1000);
            debug!("Configured faac: bitrate={} kbps", bitrate / 1000);
        }

        "voaacenc" => {
            // voaacenc uses bitrate in bits per second
            let _ = encoder.set_property("bitrate", bitrate);
            debug!("Configured voaacenc: bitrate={} bps", bitrate);
        }

        _ => {
            debug!("Unknown AAC encoder type, using default configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_candidates_cover_codecs() {
        let h264: Vec<_> = VIDEO_ENCODER_SPECS
            .iter()
            .filter(|(_, _, codec, _)| *codec == VideoCodec::H264)
            .collect();
        let hevc: Vec<_> = VIDEO_ENCODER_SPECS
            .iter()
            .filter(|(_, _, codec, _)| *codec == VideoCodec::HEVC)
            .collect();
        assert!(!h264.is_empty());
        assert!(!hevc.is_empty());
        // Software fallbacks come last within a codec
        assert_eq!(h264.last().unwrap().0, "openh264enc");
        assert_eq!(hevc.last().unwrap().0, "x265enc");
    }

    #[test]
    fn test_audio_candidates_prefer_opus() {
        assert_eq!(AUDIO_ENCODER_SPECS[0].0, "opusenc");
        assert_eq!(AUDIO_ENCODER_SPECS[0].2, AudioCodec::Opus);
    }
}
