// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands: the recording owner and encoder listing
//!
//! `record` is the owner described by the core's contract: it creates one
//! recorder per attempt, starts and stops sample forwarding through the
//! router, triggers finish, and hands the finished file to persistence.

use avrec::capture::pipewire::{CaptureTargets, PipeWireCapture, capture_channel};
use avrec::capture::worker::start_sample_pump;
use avrec::capture::{Channel, SampleRouter};
use avrec::config::Config;
use avrec::persist::{ContinuationToken, PersistenceHandoff};
use avrec::recording::encoders::{enumerate_audio_encoders, enumerate_video_encoders};
use avrec::recording::{EncodePrefs, GstMuxer, Recorder, RecordingOutcome};
use avrec::storage::{VideoLibrary, session_temp_path};
use futures::channel::oneshot;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Record from the default (or explicitly targeted) PipeWire devices
pub fn record(
    duration: u64,
    output: Option<PathBuf>,
    no_audio: bool,
    video_target: Option<String>,
    audio_target: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    gstreamer::init()?;

    let config = Config::load_or_default();
    let enable_audio = config.record_audio && !no_audio;
    let session_id = Uuid::new_v4();
    let temp_output = session_temp_path(session_id, config.container);

    // Start live capture feeding the shared sample channel
    let (sender, receiver) = capture_channel();
    let targets = CaptureTargets {
        video: video_target,
        audio: audio_target,
    };
    let capture = PipeWireCapture::new(&targets, enable_audio, sender)?;
    capture.start()?;

    let router = Arc::new(SampleRouter::new());
    let mut pump = start_sample_pump(receiver, Arc::clone(&router));

    // Warm-up: wait for live format descriptors before configuring
    println!("Waiting for capture formats...");
    wait_for_descriptor(&router, Channel::Video, Duration::from_secs(5))
        .ok_or("No video samples arrived from the capture source")?;
    if enable_audio {
        // Audio may lag the camera; give it a shorter grace period
        if wait_for_descriptor(&router, Channel::Audio, Duration::from_secs(2)).is_none() {
            println!("No audio samples arrived; recording video only");
        }
    }

    // One recorder per attempt
    let muxer = GstMuxer::new(&temp_output, config.container)?;
    let recorder = Arc::new(Recorder::with_prefs(
        Box::new(muxer),
        temp_output.clone(),
        EncodePrefs {
            quality: config.quality,
            audio_quality: config.audio_quality,
            container: config.container,
        },
    ));

    for channel in Channel::ALL {
        if channel == Channel::Audio && !enable_audio {
            continue;
        }
        if let Some(format) = router.latest_format(channel) {
            match recorder.configure(channel, &format)? {
                true => println!("{}: {}", channel, format),
                false => println!("{}: not supported, omitted", channel),
            }
        }
    }
    if !recorder.is_channel_configured(Channel::Video)
        && !recorder.is_channel_configured(Channel::Audio)
    {
        return Err("No channel could be configured".into());
    }

    router.attach(Arc::clone(&recorder));

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!();
    println!("Recording... (press Ctrl+C to stop early)");
    let start = Instant::now();
    let target_duration = Duration::from_secs(duration);

    while start.elapsed() < target_duration {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }

        let elapsed = start.elapsed().as_secs();
        print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
        std::io::Write::flush(&mut std::io::stdout())?;

        std::thread::sleep(Duration::from_millis(100));
    }
    println!();

    // Stop: detach forwarding, keep executing through finalize + persistence
    router.detach();
    let token = ContinuationToken::acquire("finalize-recording");
    let (receiver, token) = begin_finalize(&recorder, token)?;

    capture.stop()?;
    pump.stop();

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(receiver)?;
    println!(
        "Recorded {} video / {} audio samples ({} / {} dropped)",
        outcome.appended[Channel::Video.index()],
        outcome.appended[Channel::Audio.index()],
        outcome.dropped[Channel::Video.index()],
        outcome.dropped[Channel::Audio.index()],
    );
    if let Err(e) = &outcome.result {
        println!("Recording ended with a writer failure: {}", e);
    }

    // Persist whatever the writer actually produced; a session that failed
    // before any sample leaves nothing behind
    if !outcome.output.exists() {
        token.release();
        return Err("Recording produced no output file".into());
    }

    let library = match output {
        Some(dir) => VideoLibrary::at(dir),
        None => match &config.save_folder {
            Some(dir) => VideoLibrary::at(dir.clone()),
            None => VideoLibrary::new(),
        },
    };
    let handoff = PersistenceHandoff::new(Box::new(library), Some(token));
    let report = handoff.run(&outcome.output);

    match (report.saved_to, report.error) {
        (Some(dest), _) => println!("Video saved: {}", dest.display()),
        (None, Some(e)) => return Err(format!("Video not saved: {}", e).into()),
        (None, None) => return Err("Video not saved".into()),
    }

    Ok(())
}

/// List the encoder elements available on this system
pub fn list_encoders() -> Result<(), Box<dyn std::error::Error>> {
    gstreamer::init()?;

    let video = enumerate_video_encoders();
    let audio = enumerate_audio_encoders();

    println!("Video encoders:");
    if video.is_empty() {
        println!("  (none available)");
    }
    for info in video {
        let kind = if info.is_hardware { "hardware" } else { "software" };
        println!("  {:<16} {} [{}]", info.element_name, info.display_name, kind);
    }

    println!();
    println!("Audio encoders:");
    if audio.is_empty() {
        println!("  (none available)");
    }
    for info in audio {
        println!("  {:<16} {}", info.element_name, info.display_name);
    }

    Ok(())
}

/// Trigger finalization, carrying the token through to the handoff
///
/// A session that is already finalizing releases the token right here; the
/// handled error must not fall through to the drop backstop's leak warning.
fn begin_finalize(
    recorder: &Arc<Recorder>,
    token: ContinuationToken,
) -> Result<(oneshot::Receiver<RecordingOutcome>, ContinuationToken), String> {
    match recorder.finish() {
        Some(receiver) => Ok((receiver, token)),
        None => {
            token.release();
            Err("Recording was already being finalized".to_string())
        }
    }
}

/// Poll the router until a channel's descriptor shows up
fn wait_for_descriptor(
    router: &SampleRouter,
    channel: Channel,
    timeout: Duration,
) -> Option<()> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if router.latest_format(channel).is_some() {
            return Some(());
        }
        std::thread::sleep(Duration::from_millis(16));
    }
    None
}
