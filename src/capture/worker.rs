// SPDX-License-Identifier: GPL-3.0-only

//! Capture worker thread lifecycle and the sample pump
//!
//! One named worker thread drains the shared capture channel and hands every
//! sample to the router. Both media channels arrive over the same channel, so
//! the worker is the single serial execution context that fixes cross-channel
//! ordering.

use futures::channel::mpsc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::capture::router::SampleRouter;
use crate::capture::types::CapturedSample;
use crate::constants::capture::IDLE_POLL_INTERVAL;

/// Action returned by the worker loop callback to control loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Controller for a capture loop running in a separate thread
///
/// Stops on request, when the loop callback asks for it, or on drop.
pub struct CaptureWorker {
    thread_handle: Option<JoinHandle<()>>,
    stop_signal: Arc<AtomicBool>,
    name: String,
}

impl CaptureWorker {
    /// Start a worker thread that calls `loop_fn` until it returns
    /// [`LoopAction::Stop`] or [`CaptureWorker::stop`] is called
    pub fn start<F>(name: &str, mut loop_fn: F) -> Self
    where
        F: FnMut() -> LoopAction + Send + 'static,
    {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);
        let name_clone = name.to_string();

        info!(name = %name, "Starting capture worker");

        let thread_handle = thread::spawn(move || {
            debug!(name = %name_clone, "Capture worker thread started");

            loop {
                if stop_signal_clone.load(Ordering::SeqCst) {
                    debug!(name = %name_clone, "Stop signal received");
                    break;
                }

                match loop_fn() {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name_clone, "Loop requested stop");
                        break;
                    }
                }
            }

            info!(name = %name_clone, "Capture worker thread exiting");
        });

        Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            name: name.to_string(),
        }
    }

    /// Check if the worker thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture worker stop");
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Stop the loop and wait for the thread to finish
    pub fn stop(&mut self) {
        self.request_stop();
        self.join();
    }

    /// Wait for the thread to finish without sending a stop signal
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            debug!(name = %self.name, "Waiting for capture worker thread to finish");
            if let Err(e) = handle.join() {
                warn!(name = %self.name, "Capture worker thread panicked: {:?}", e);
            } else {
                debug!(name = %self.name, "Capture worker thread finished");
            }
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "CaptureWorker dropped, stopping loop");
            self.stop();
        }
    }
}

/// Start the sample pump: drain the capture channel into the router
///
/// Drains everything currently queued each iteration and sleeps briefly when
/// the channel is empty. The loop exits on its own once every sender side of
/// the channel is gone.
pub fn start_sample_pump(
    mut receiver: mpsc::Receiver<CapturedSample>,
    router: Arc<SampleRouter>,
) -> CaptureWorker {
    CaptureWorker::start("sample-pump", move || {
        loop {
            match receiver.try_next() {
                Ok(Some(captured)) => {
                    router.on_sample(captured.sample, captured.format);
                }
                // All senders dropped, nothing more will arrive
                Ok(None) => return LoopAction::Stop,
                Err(_) => {
                    thread::sleep(IDLE_POLL_INTERVAL);
                    return LoopAction::Continue;
                }
            }
        }
    })
}
