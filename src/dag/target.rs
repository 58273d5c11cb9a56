// src/dag/target.rs

//! Durable completion markers.
//!
//! A [`Target`] is "done" exactly when its file exists. Writes go to a hidden
//! temp file in the same directory and are renamed into place on
//! [`TargetWriter::commit`], so a partially written marker is never visible
//! at the final path.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::{BatchdagError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    name: String,
    path: PathBuf,
}

impl Target {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Logical name (used in logs and reports).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Open a scoped writer for this marker.
    ///
    /// Fails with [`BatchdagError::AlreadyExists`] if the marker is present;
    /// callers that want to redo work must [`remove`](Self::remove) it first.
    pub fn open_for_write(&self) -> Result<TargetWriter> {
        if self.exists() {
            return Err(BatchdagError::AlreadyExists(self.path.clone()));
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let file = tempfile::Builder::new()
            .prefix(".batchdag-")
            .suffix(".partial")
            .tempfile_in(dir)?;

        debug!(
            target_name = %self.name,
            temp = ?file.path(),
            "opened target for write"
        );

        Ok(TargetWriter {
            file,
            dest: self.path.clone(),
        })
    }

    /// Write `payload` and commit in one step.
    pub fn write_payload(&self, payload: &str) -> Result<()> {
        let mut writer = self.open_for_write()?;
        writer.write_all(payload.as_bytes())?;
        writer.commit()
    }

    /// Read back the diagnostic payload stored in the marker.
    pub fn read(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.path)?)
    }

    /// Delete the marker. Returns `false` if it did not exist.
    pub fn remove(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write handle returned by [`Target::open_for_write`].
///
/// Dropping it without calling [`commit`](Self::commit) discards everything
/// written so far and leaves the target absent.
#[derive(Debug)]
pub struct TargetWriter {
    file: NamedTempFile,
    dest: PathBuf,
}

impl TargetWriter {
    /// Flush, sync and move the temp file to the final marker path.
    ///
    /// The rename never overwrites: if another writer got there first this
    /// returns [`BatchdagError::AlreadyExists`].
    pub fn commit(mut self) -> Result<()> {
        self.file.flush()?;
        self.file.as_file().sync_all()?;

        match self.file.persist_noclobber(&self.dest) {
            Ok(_) => {
                debug!(path = ?self.dest, "target committed");
                Ok(())
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                Err(BatchdagError::AlreadyExists(self.dest))
            }
            Err(e) => Err(BatchdagError::IoError(e.error)),
        }
    }
}

impl Write for TargetWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}
