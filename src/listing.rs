//! Version listing with bounded retry.
//!
//! Listing is read-only and idempotent, so transient failures are retried
//! with exponential backoff. Protocol and credential failures are returned
//! immediately. The source and destination listings run concurrently and both
//! complete before the diff is computed.

use std::collections::HashSet;
use std::time::Duration;

use log::{debug, warn};
use nuget_feed::client::FeedClient;
use nuget_feed::error::FeedError;
use nuget_feed::package::{PackageId, PackageVersion};

use crate::cancel::CancellationToken;
use crate::error::{MirrorError, Result};

/// Versions reported by one feed for one package.
///
/// Duplicates are dropped on construction, keeping the first occurrence, so
/// iteration follows the feed's enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSet {
    ordered: Vec<PackageVersion>,
    members: HashSet<PackageVersion>,
}

impl VersionSet {
    /// Number of distinct versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    /// Returns true when the feed reported no versions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// Exact-string membership test.
    #[must_use]
    pub fn contains(&self, version: &PackageVersion) -> bool {
        self.members.contains(version)
    }

    /// Iterate in feed enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &PackageVersion> {
        self.ordered.iter()
    }
}

impl FromIterator<PackageVersion> for VersionSet {
    fn from_iter<I: IntoIterator<Item = PackageVersion>>(iter: I) -> Self {
        let mut set = Self::default();
        for version in iter {
            if set.members.insert(version.clone()) {
                set.ordered.push(version);
            }
        }
        set
    }
}

impl<'a> FromIterator<&'a str> for VersionSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        iter.into_iter().map(PackageVersion::from).collect()
    }
}

/// Retry settings for listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. `1` disables retries.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    /// A policy that makes a single attempt.
    #[must_use]
    pub const fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use nuget_mirror::listing::RetryPolicy;
    ///
    /// let policy = RetryPolicy::default();
    /// assert_eq!(policy.backoff(1), Duration::from_millis(500));
    /// assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    /// ```
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1_u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// List every version `client` reports for `package`.
///
/// # Errors
///
/// Returns [`MirrorError::InvalidPackageName`] for a blank package,
/// [`MirrorError::FeedUnreachable`] once transient failures exhaust the retry
/// budget, [`MirrorError::FeedProtocol`] for malformed responses,
/// [`MirrorError::FeedCredentials`] when the read credentials are refused, and
/// [`MirrorError::Cancelled`] when the token fires.
pub fn list_versions(
    client: &dyn FeedClient,
    package: &PackageId,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<VersionSet> {
    if package.is_blank() {
        return Err(MirrorError::InvalidPackageName);
    }
    let feed = client.endpoint().name();
    let attempts = retry.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        cancel.check()?;
        match client.list_versions(package) {
            Ok(versions) => {
                let set: VersionSet = versions.into_iter().collect();
                debug!("feed {feed} lists {} version(s) of {package}", set.len());
                return Ok(set);
            }
            Err(err) if err.is_transient() && attempt < attempts => {
                let delay = retry.backoff(attempt);
                warn!(
                    "listing {package} on feed {feed} failed (attempt {attempt}/{attempts}): {err}; retrying in {}ms",
                    delay.as_millis()
                );
                cancel.sleep(delay)?;
                attempt += 1;
            }
            Err(err) => return Err(MirrorError::from_listing(feed, err)),
        }
    }
}

/// Version sets from both feeds, taken as one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Versions at the source feed.
    pub source: VersionSet,
    /// Versions at the destination feed.
    pub destination: VersionSet,
}

/// List `package` on both feeds concurrently.
///
/// Both listings complete before this returns. When both fail, the source
/// feed's error is reported.
///
/// # Errors
///
/// Returns the first listing error as described on [`list_versions`].
pub fn list_source_and_destination(
    source: &dyn FeedClient,
    destination: &dyn FeedClient,
    package: &PackageId,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<Snapshot> {
    let (source_result, destination_result) = std::thread::scope(|scope| {
        let destination_handle =
            scope.spawn(|| list_versions(destination, package, retry, cancel));
        let source_result = list_versions(source, package, retry, cancel);
        let destination_result = destination_handle.join().unwrap_or_else(|_| {
            Err(MirrorError::from_listing(
                destination.endpoint().name(),
                FeedError::Io(std::io::Error::other("destination listing thread panicked")),
            ))
        });
        (source_result, destination_result)
    });
    Ok(Snapshot {
        source: source_result?,
        destination: destination_result?,
    })
}
