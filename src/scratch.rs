//! Scratch files that hold a package between download and publish.
//!
//! Each artifact gets a unique name carrying the package identity, so
//! concurrent runs or workers sharing a scratch directory never collide. The
//! file is removed when the [`ScratchArtifact`] is dropped.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nuget_feed::package::PackageIdentity;
use tempfile::NamedTempFile;

use crate::cancel::CancellationToken;
use crate::error::{MirrorError, Result};

/// A uniquely named `.nupkg` file in the scratch directory.
#[derive(Debug)]
pub struct ScratchArtifact {
    file: NamedTempFile,
}

impl ScratchArtifact {
    /// Create an empty artifact for `identity` inside `dir`.
    ///
    /// The file name is `{id}.{version}.{random}.nupkg`, with every character
    /// outside `[A-Za-z0-9._+-]` replaced by `_` so a version string from a
    /// feed can never name another directory.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::ScratchIo`] if the file cannot be created.
    pub fn create(dir: &Path, identity: &PackageIdentity) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix(&file_prefix(identity))
            .suffix(".nupkg")
            .tempfile_in(dir)
            .map_err(|source| MirrorError::ScratchIo {
                path: dir.to_path_buf(),
                source,
            })?;
        Ok(Self { file })
    }

    /// Location of the artifact on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Writable handle for streaming the package body.
    ///
    /// Writes fail once `cancel` fires. See [`ScratchWriter::into_fault`].
    pub fn writer<'a>(&'a mut self, cancel: &'a CancellationToken) -> ScratchWriter<'a> {
        let path = self.path_buf();
        ScratchWriter {
            file: self.file.as_file_mut(),
            path,
            cancel,
            fault: None,
        }
    }

    /// Flush buffered bytes and sync them to disk.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::ScratchIo`] if flushing or syncing fails.
    pub fn finish(&mut self) -> Result<()> {
        let path = self.path_buf();
        let file = self.file.as_file_mut();
        file.flush()
            .and_then(|()| file.sync_all())
            .map_err(|source| MirrorError::ScratchIo { path, source })
    }

    fn path_buf(&self) -> PathBuf {
        self.file.path().to_path_buf()
    }
}

/// Writer over a scratch file that refuses bytes once the run is cancelled.
///
/// A feed client only sees an `io::Error` from this writer, which it cannot
/// tell apart from a failure reading the network. The writer keeps the real
/// cause so the caller can report it.
#[derive(Debug)]
pub struct ScratchWriter<'a> {
    file: &'a mut File,
    path: PathBuf,
    cancel: &'a CancellationToken,
    fault: Option<MirrorError>,
}

impl ScratchWriter<'_> {
    /// The first local failure seen by this writer, if any.
    ///
    /// This is [`MirrorError::Cancelled`] when a write arrived after
    /// cancellation, or [`MirrorError::ScratchIo`] when the file itself
    /// could not be written.
    #[must_use]
    pub fn into_fault(self) -> Option<MirrorError> {
        self.fault
    }

    fn guard<T>(&mut self, op: impl FnOnce(&mut File) -> io::Result<T>) -> io::Result<T> {
        if self.cancel.is_cancelled() {
            self.record(MirrorError::Cancelled);
            return Err(io::Error::other("mirroring cancelled"));
        }
        match op(&mut *self.file) {
            Err(source) if source.kind() != io::ErrorKind::Interrupted => {
                let reported = io::Error::new(source.kind(), source.to_string());
                self.record(MirrorError::ScratchIo {
                    path: self.path.clone(),
                    source,
                });
                Err(reported)
            }
            other => other,
        }
    }

    fn record(&mut self, fault: MirrorError) {
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
    }
}

impl Write for ScratchWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.guard(|file| file.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.guard(|file| file.flush())
    }
}

fn file_prefix(identity: &PackageIdentity) -> String {
    let mut prefix: String = identity
        .to_string()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect();
    prefix.push('.');
    prefix
}
