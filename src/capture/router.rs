// SPDX-License-Identifier: GPL-3.0-only

//! Sample routing between capture sources and the recorder
//!
//! The router does two jobs: it keeps the last-known format descriptor per
//! channel so a recorder started later configures against fresh formats, and
//! it forwards samples into the attached recorder while a session is active.
//! Descriptor updates happen on every sample, attached or not.

use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

use crate::capture::types::{Channel, FormatDescriptor, MediaSample};
use crate::recording::recorder::Recorder;

/// Routes capture samples to the active recording session
///
/// Thread-safe; the capture worker calls [`SampleRouter::on_sample`] while an
/// owner attaches and detaches recorders from other threads. Both internal
/// locks are held only for O(1) slot access, never across a forward, so the
/// router cannot stall sample arrival.
pub struct SampleRouter {
    /// Last-seen format descriptor per channel slot
    formats: Mutex<[Option<FormatDescriptor>; 2]>,
    /// Forwarding gate; `None` means no session is active
    session: Mutex<Option<Arc<Recorder>>>,
}

impl SampleRouter {
    pub fn new() -> Self {
        Self {
            formats: Mutex::new([None, None]),
            session: Mutex::new(None),
        }
    }

    /// Start forwarding samples into `recorder`
    pub fn attach(&self, recorder: Arc<Recorder>) {
        debug!("Attaching recorder to sample router");
        *self.session.lock().unwrap() = Some(recorder);
    }

    /// Stop forwarding; returns the recorder that was attached, if any
    pub fn detach(&self) -> Option<Arc<Recorder>> {
        let detached = self.session.lock().unwrap().take();
        if detached.is_some() {
            debug!("Detached recorder from sample router");
        }
        detached
    }

    /// Whether a recorder is currently attached
    pub fn is_attached(&self) -> bool {
        self.session.lock().unwrap().is_some()
    }

    /// Last-known format descriptor for a channel
    pub fn latest_format(&self, channel: Channel) -> Option<FormatDescriptor> {
        self.formats.lock().unwrap()[channel.index()]
    }

    /// Handle one sample arriving from a capture source
    ///
    /// Always records the descriptor; forwards the sample only while a
    /// recorder is attached. Forwarding is synchronous but the recorder's
    /// append is bounded, so this never blocks the capture worker on I/O.
    /// Never panics across the capture boundary.
    pub fn on_sample(&self, sample: MediaSample, format: FormatDescriptor) {
        self.formats.lock().unwrap()[format.channel().index()] = Some(format);

        // Clone the gate out before forwarding so this lock never nests with
        // the recorder's session lock.
        let attached = self.session.lock().unwrap().clone();
        if let Some(recorder) = attached {
            trace!(channel = %sample.channel, timestamp = %sample.timestamp, "Forwarding sample");
            recorder.append(sample.channel, &sample);
        }
    }
}

impl Default for SampleRouter {
    fn default() -> Self {
        Self::new()
    }
}
