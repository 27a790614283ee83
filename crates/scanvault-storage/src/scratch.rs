//! Local copies of stored bytes for the scanner.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use scanvault_core::constants::SCRATCH_FILE_PREFIX;
use tempfile::{NamedTempFile, TempPath};

use crate::traits::StorageResult;

/// A path the scanner can read.
///
/// `Scratch` copies are single-owner: [`LocalFile::release`] removes the file and
/// reports failures, and dropping an unreleased copy removes it as well.
#[derive(Debug)]
pub enum LocalFile {
    /// The backend's own file; never deleted through this handle.
    Stored(PathBuf),
    /// A private copy staged for scanning.
    Scratch(TempPath),
}

impl LocalFile {
    pub fn path(&self) -> &Path {
        match self {
            LocalFile::Stored(path) => path.as_path(),
            LocalFile::Scratch(temp) => &**temp,
        }
    }

    pub fn is_scratch(&self) -> bool {
        matches!(self, LocalFile::Scratch(_))
    }

    pub fn release(self) -> io::Result<()> {
        match self {
            LocalFile::Stored(_) => Ok(()),
            LocalFile::Scratch(temp) => temp.close(),
        }
    }
}

/// Directory holding scratch copies.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a uniquely named scratch file readable only by this process's user.
    pub fn create(&self, extension: &str) -> StorageResult<NamedTempFile> {
        let file = tempfile::Builder::new()
            .prefix(SCRATCH_FILE_PREFIX)
            .suffix(extension)
            .tempfile_in(&self.root)?;
        Ok(file)
    }

    /// Remove scratch files older than `max_age`. Returns how many were removed.
    ///
    /// Live copies are always younger than a scan's time limit, so a generous
    /// `max_age` only ever catches files orphaned by a crashed process.
    pub fn sweep_stale(&self, max_age: Duration) -> io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(SCRATCH_FILE_PREFIX) {
                continue;
            }

            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();

            if age >= max_age {
                match std::fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if removed > 0 {
            tracing::info!(
                dir = %self.root.display(),
                removed,
                "Removed stale scratch files"
            );
        }

        Ok(removed)
    }
}
