//! Download-then-publish driver for missing versions.
//!
//! Every version walks the same state machine:
//!
//! ```text
//! Pending -> Downloading -> Downloaded -> Publishing -> Done
//!                 |                           |
//!                 +---------> Failed <--------+
//! ```
//!
//! With a concurrency of one, versions are processed strictly in order and
//! the first failure stops the run before the next version starts. With a
//! higher limit, scoped worker threads pull versions in order; after a
//! failure no new version is started and in-flight transfers finish.
//!
//! A download stops at its next write once the run is cancelled. A publish
//! that has started is left to finish.

use std::fmt;
use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, mpsc};
use std::time::Duration;

use log::{debug, info, warn};
use nuget_feed::client::FeedClient;
use nuget_feed::endpoint::ApiKey;
use nuget_feed::error::FeedError;
use nuget_feed::package::{PackageId, PackageIdentity, PackageVersion};

use crate::cancel::CancellationToken;
use crate::diff::MissingVersions;
use crate::error::{MirrorError, Result};
use crate::output::{progress_line, write_line};
use crate::scratch::ScratchArtifact;

/// Default time allowed for a single publish request.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(600);

/// Lifecycle of a single version transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Not started.
    Pending,
    /// Streaming the package from the source into scratch.
    Downloading,
    /// The scratch file holds the complete package.
    Downloaded,
    /// The destination is receiving the package.
    Publishing,
    /// The destination holds the version.
    Done,
    /// The transfer stopped with an error.
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Publishing => "publishing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// What to do when a version cannot be downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadFailurePolicy {
    /// Stop the run with [`MirrorError::DownloadFailure`].
    #[default]
    Abort,
    /// Record the version as skipped and continue.
    Skip,
}

/// How to treat a publish the destination reports as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Count the version as already present.
    #[default]
    TreatAsPresent,
    /// Stop the run with [`MirrorError::PublishFailure`].
    Fail,
}

/// Settings for a [`TransferDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Directory that receives scratch artifacts.
    pub scratch_dir: PathBuf,
    /// Maximum number of versions in flight.
    pub concurrency: NonZeroUsize,
    /// Time allowed for each publish request.
    pub publish_timeout: Duration,
    /// Download failure handling.
    pub on_download_failure: DownloadFailurePolicy,
    /// Duplicate publish handling.
    pub on_duplicate: DuplicatePolicy,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            scratch_dir: std::env::temp_dir(),
            concurrency: NonZeroUsize::MIN,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            on_download_failure: DownloadFailurePolicy::default(),
            on_duplicate: DuplicatePolicy::default(),
        }
    }
}

/// Final state of one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Downloaded and published.
    Mirrored,
    /// The destination already held the version.
    AlreadyPresent,
    /// Download failed and the skip policy applied.
    Skipped,
}

/// Per-version results of a transfer run, in mirroring order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    /// Versions published by this run.
    pub mirrored: Vec<PackageIdentity>,
    /// Versions the destination reported as duplicates.
    pub already_present: Vec<PackageIdentity>,
    /// Versions skipped after a download failure.
    pub skipped: Vec<PackageIdentity>,
}

impl TransferReport {
    fn record(&mut self, identity: PackageIdentity, outcome: Outcome) {
        match outcome {
            Outcome::Mirrored => self.mirrored.push(identity),
            Outcome::AlreadyPresent => self.already_present.push(identity),
            Outcome::Skipped => self.skipped.push(identity),
        }
    }
}

type Slot = (usize, PackageIdentity, Result<Outcome>);

/// Moves missing versions from the source feed to the destination feed.
#[derive(Clone, Copy)]
pub struct TransferDriver<'a> {
    source: &'a dyn FeedClient,
    destination: &'a dyn FeedClient,
    api_key: &'a ApiKey,
    options: &'a TransferOptions,
    cancel: &'a CancellationToken,
}

impl fmt::Debug for TransferDriver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferDriver")
            .field("source", self.source.endpoint())
            .field("destination", self.destination.endpoint())
            .field("options", self.options)
            .finish_non_exhaustive()
    }
}

impl<'a> TransferDriver<'a> {
    /// Create a driver over the given clients.
    #[must_use]
    pub fn new(
        source: &'a dyn FeedClient,
        destination: &'a dyn FeedClient,
        api_key: &'a ApiKey,
        options: &'a TransferOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            source,
            destination,
            api_key,
            options,
            cancel,
        }
    }

    /// Transfer every version in `missing`, writing a progress line to `out`
    /// before each one starts.
    ///
    /// # Errors
    ///
    /// Returns the first [`MirrorError`] raised by a transfer. Versions
    /// completed before it remain at the destination.
    pub fn run(
        &self,
        package: &PackageId,
        missing: &MissingVersions,
        out: &mut dyn Write,
    ) -> Result<TransferReport> {
        if self.options.concurrency.get() == 1 || missing.len() <= 1 {
            self.run_sequential(package, missing.as_slice(), out)
        } else {
            self.run_parallel(package, missing.as_slice(), out)
        }
    }

    fn run_sequential(
        &self,
        package: &PackageId,
        versions: &[PackageVersion],
        out: &mut dyn Write,
    ) -> Result<TransferReport> {
        let mut report = TransferReport::default();
        for version in versions {
            let identity = PackageIdentity::new(package.clone(), version.clone());
            self.cancel.check()?;
            write_line(out, progress_line(&identity));
            let outcome = self.transfer_one(&identity)?;
            report.record(identity, outcome);
        }
        Ok(report)
    }

    fn run_parallel(
        &self,
        package: &PackageId,
        versions: &[PackageVersion],
        out: &mut dyn Write,
    ) -> Result<TransferReport> {
        let workers = self.options.concurrency.get().min(versions.len());
        let next = AtomicUsize::new(0);
        let stop = AtomicBool::new(false);
        let slots: Mutex<Vec<Slot>> = Mutex::new(Vec::with_capacity(versions.len()));
        let (progress_tx, progress_rx) = mpsc::channel::<PackageIdentity>();

        debug!("transferring {} version(s) with {workers} workers", versions.len());
        std::thread::scope(|scope| {
            for _ in 0..workers {
                let progress_tx = progress_tx.clone();
                let (next, stop, slots) = (&next, &stop, &slots);
                scope.spawn(move || {
                    while !stop.load(Ordering::SeqCst) {
                        let index = next.fetch_add(1, Ordering::SeqCst);
                        let Some(version) = versions.get(index) else {
                            break;
                        };
                        let identity = PackageIdentity::new(package.clone(), version.clone());
                        let result = self.cancel.check().and_then(|()| {
                            if progress_tx.send(identity.clone()).is_err() {
                                // The receiver outlives every worker.
                            }
                            self.transfer_one(&identity)
                        });
                        if result.is_err() {
                            stop.store(true, Ordering::SeqCst);
                        }
                        slots
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner)
                            .push((index, identity, result));
                    }
                });
            }
            drop(progress_tx);
            for identity in progress_rx {
                write_line(out, progress_line(&identity));
            }
        });

        let mut slots = slots.into_inner().unwrap_or_else(PoisonError::into_inner);
        slots.sort_by_key(|(index, _, _)| *index);
        let mut report = TransferReport::default();
        for (_, identity, result) in slots {
            report.record(identity, result?);
        }
        Ok(report)
    }

    fn transfer_one(&self, identity: &PackageIdentity) -> Result<Outcome> {
        transition(identity, TransferState::Pending, TransferState::Downloading);
        let mut artifact = ScratchArtifact::create(&self.options.scratch_dir, identity)?;
        let mut writer = artifact.writer(self.cancel);
        let downloaded = self.source.download_package(identity, &mut writer);
        if let Some(fault) = writer.into_fault() {
            transition(identity, TransferState::Downloading, TransferState::Failed);
            return Err(fault);
        }
        match downloaded {
            Ok(bytes) => debug!("{identity}: received {bytes} bytes"),
            Err(source) => {
                transition(identity, TransferState::Downloading, TransferState::Failed);
                return match self.options.on_download_failure {
                    DownloadFailurePolicy::Skip => {
                        warn!("skipping {identity}: download failed: {source}");
                        Ok(Outcome::Skipped)
                    }
                    DownloadFailurePolicy::Abort => Err(MirrorError::DownloadFailure {
                        identity: identity.clone(),
                        source,
                    }),
                };
            }
        }
        artifact.finish()?;
        transition(identity, TransferState::Downloading, TransferState::Downloaded);

        self.cancel.check()?;
        transition(identity, TransferState::Downloaded, TransferState::Publishing);
        let published = self.destination.publish_package(
            artifact.path(),
            self.api_key,
            self.options.publish_timeout,
        );
        match published {
            Ok(()) => {
                transition(identity, TransferState::Publishing, TransferState::Done);
                Ok(Outcome::Mirrored)
            }
            Err(FeedError::AlreadyExists { .. })
                if self.options.on_duplicate == DuplicatePolicy::TreatAsPresent =>
            {
                info!("{identity} already present at destination");
                transition(identity, TransferState::Publishing, TransferState::Done);
                Ok(Outcome::AlreadyPresent)
            }
            Err(FeedError::PackageFile { path, source }) => {
                transition(identity, TransferState::Publishing, TransferState::Failed);
                Err(MirrorError::ScratchIo { path, source })
            }
            Err(source) => {
                transition(identity, TransferState::Publishing, TransferState::Failed);
                Err(MirrorError::PublishFailure {
                    identity: identity.clone(),
                    source,
                })
            }
        }
    }
}

fn transition(identity: &PackageIdentity, from: TransferState, to: TransferState) {
    debug!("{identity}: {from} -> {to}");
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
