// SPDX-License-Identifier: MPL-2.0

//! avrec - real-time audio/video capture-to-file recording
//!
//! This library captures continuous, independently-timed video and audio
//! sample streams from live sources, muxes them into a single container file
//! through a stateful writer, and hands the finished file to durable storage
//! exactly once.
//!
//! # Architecture
//!
//! - [`capture`]: capture sources, the sample router, and the capture worker
//! - [`recording`]: the session state machine, encode settings, and the
//!   container writer
//! - [`persist`]: persistence handoff into durable storage
//! - [`storage`]: library and temp-file locations
//! - [`config`]: user configuration handling
//!
//! # Example
//!
//! ```ignore
//! // One recording attempt, driven by an owner:
//! let muxer = GstMuxer::new(&output, container)?;
//! let recorder = Arc::new(Recorder::new(Box::new(muxer), output));
//! recorder.configure(Channel::Video, &router.latest_format(Channel::Video).unwrap())?;
//! router.attach(Arc::clone(&recorder));
//! // ... samples flow ...
//! router.detach();
//! let outcome = block_on(recorder.finish().unwrap())?;
//! ```

pub mod capture;
pub mod config;
pub mod constants;
pub mod errors;
pub mod persist;
pub mod recording;
pub mod storage;

// Re-export commonly used types
pub use capture::{Channel, FormatDescriptor, MediaSample, SampleRouter, Timestamp};
pub use config::Config;
pub use errors::{PersistError, RecordingError};
pub use persist::{ContinuationToken, MediaLibrary, PersistenceHandoff};
pub use recording::{GstMuxer, Muxer, Recorder, RecordingOutcome, RecordingState};
pub use storage::VideoLibrary;
