// SPDX-License-Identifier: GPL-3.0-only

//! Handoff of a finished recording into durable storage
//!
//! Runs once per completed session: request access, move the file into the
//! library, then clean up. Cleanup is unconditional - the temporary file is
//! deleted and any held continuation token released in every outcome,
//! including permission denial and a failed move. Nothing here is fatal and
//! nothing is retried; the report's flags are the whole story.

pub mod continuation;

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::errors::PersistError;

pub use continuation::{ContinuationToken, TokenObserver};

/// Durable storage a finished recording is imported into
pub trait MediaLibrary: Send {
    /// Request write access to the library
    fn request_access(&self) -> Result<(), PersistError>;

    /// Move (not copy) the file into the library as a video asset
    ///
    /// The source file is consumed on success.
    fn import_video(&self, src: &Path) -> Result<PathBuf, PersistError>;
}

/// Outcome of one persistence handoff
#[derive(Debug)]
pub struct PersistReport {
    /// Final library location, when the import succeeded
    pub saved_to: Option<PathBuf>,
    /// Why the recording was not persisted, when it was not
    pub error: Option<PersistError>,
}

impl PersistReport {
    /// The success/failure flag callers branch on
    pub fn persisted(&self) -> bool {
        self.saved_to.is_some()
    }
}

/// One-shot handoff of a finished file into a [`MediaLibrary`]
pub struct PersistenceHandoff {
    library: Box<dyn MediaLibrary>,
    token: Option<ContinuationToken>,
}

impl PersistenceHandoff {
    pub fn new(library: Box<dyn MediaLibrary>, token: Option<ContinuationToken>) -> Self {
        Self { library, token }
    }

    /// Run the handoff for the file at `output`
    ///
    /// Consumes the handoff, so the cleanup step cannot execute twice.
    pub fn run(self, output: &Path) -> PersistReport {
        let mut saved_to = None;
        let mut error = None;

        match self.library.request_access() {
            Ok(()) => match self.library.import_video(output) {
                Ok(dest) => {
                    info!(from = %output.display(), to = %dest.display(), "Recording persisted");
                    saved_to = Some(dest);
                }
                Err(e) => {
                    warn!(path = %output.display(), error = %e, "Failed to import recording");
                    error = Some(e);
                }
            },
            Err(e) => {
                warn!(error = %e, "Library access denied, recording will not be persisted");
                error = Some(e);
            }
        }

        // Cleanup runs in every outcome. A successful move already consumed
        // the source, so NotFound is the expected case there.
        match std::fs::remove_file(output) {
            Ok(()) => debug!(path = %output.display(), "Removed temporary recording"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %output.display(), error = %e, "Failed to remove temporary recording"),
        }
        if let Some(token) = self.token {
            token.release();
        }

        PersistReport { saved_to, error }
    }
}
