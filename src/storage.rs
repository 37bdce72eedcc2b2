// SPDX-License-Identifier: MPL-2.0

//! Storage locations: the durable video library and session temp files

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::PersistError;
use crate::persist::MediaLibrary;
use crate::recording::ContainerFormat;

/// Default folder name for saved recordings, under the user's video directory
const DEFAULT_SAVE_FOLDER: &str = "Camera";

/// Filesystem-backed [`MediaLibrary`] under the user's video directory
pub struct VideoLibrary {
    directory: PathBuf,
}

impl VideoLibrary {
    /// Library at the default location (`~/Videos/Camera` or equivalent)
    pub fn new() -> Self {
        Self::at(default_video_dir())
    }

    /// Library rooted at an explicit directory
    pub fn at(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl Default for VideoLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaLibrary for VideoLibrary {
    /// Create the library directory and probe that it is writable
    fn request_access(&self) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.directory)?;

        let probe = self.directory.join(format!(".probe-{}", Uuid::new_v4()));
        std::fs::write(&probe, b"")?;
        std::fs::remove_file(&probe)?;
        debug!(directory = %self.directory.display(), "Library access granted");
        Ok(())
    }

    /// Move the file in under a timestamped name
    fn import_video(&self, src: &Path) -> Result<PathBuf, PersistError> {
        let extension = src
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| ContainerFormat::default().extension().to_string());

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let mut dest = self
            .directory
            .join(format!("video_{}.{}", timestamp, extension));
        if dest.exists() {
            // Two recordings finishing within the same second
            dest = self
                .directory
                .join(format!("video_{}_{}.{}", timestamp, Uuid::new_v4(), extension));
        }

        match std::fs::rename(src, &dest) {
            Ok(()) => {}
            Err(_) => {
                // Rename fails across filesystems; fall back to copy+remove
                // so the source is consumed either way
                std::fs::copy(src, &dest)?;
                std::fs::remove_file(src)?;
            }
        }
        info!(dest = %dest.display(), "Video imported into library");
        Ok(dest)
    }
}

/// Default video library directory
pub fn default_video_dir() -> PathBuf {
    dirs::video_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
}

/// Fixed session-scoped temporary output location
///
/// One path per session id; a new attempt overwrites its own leftovers and
/// never another session's.
pub fn session_temp_path(session_id: Uuid, container: ContainerFormat) -> PathBuf {
    std::env::temp_dir().join(format!("avrec-{}.{}", session_id, container.extension()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_temp_paths_are_session_scoped() {
        let a = session_temp_path(Uuid::new_v4(), ContainerFormat::MP4);
        let b = session_temp_path(Uuid::new_v4(), ContainerFormat::MP4);
        assert_ne!(a, b);

        let id = Uuid::new_v4();
        assert_eq!(
            session_temp_path(id, ContainerFormat::Matroska),
            session_temp_path(id, ContainerFormat::Matroska)
        );
    }

    #[test]
    fn test_library_import_moves_file() {
        let dir = std::env::temp_dir().join(format!("library-{}", Uuid::new_v4()));
        let library = VideoLibrary::at(dir.clone());
        library.request_access().expect("writable temp dir");

        let src = std::env::temp_dir().join(format!("import-{}.mkv", Uuid::new_v4()));
        std::fs::write(&src, b"data").expect("write source");

        let dest = library.import_video(&src).expect("import");
        assert!(dest.exists());
        assert!(!src.exists(), "source must be consumed");

        std::fs::remove_dir_all(dir).ok();
    }
}
