//! The capability set every feed client provides.
//!
//! A trait keeps the mirroring pipeline independent of the transport so tests
//! can drive it with in-memory or mocked feeds.

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use crate::endpoint::{ApiKey, FeedEndpoint};
use crate::error::FeedError;
use crate::package::{PackageId, PackageIdentity, PackageVersion};

/// Operations the mirror needs from a package feed.
#[cfg_attr(any(test, feature = "test-support"), mockall::automock)]
pub trait FeedClient: Send + Sync {
    /// The endpoint this client talks to.
    fn endpoint(&self) -> &FeedEndpoint;

    /// List every version the feed reports for `id`, in feed order.
    ///
    /// A package the feed has never seen yields an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Unreachable`] or [`FeedError::Timeout`] on
    /// transport failure and [`FeedError::Protocol`] on a malformed response.
    fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>, FeedError>;

    /// Stream the `.nupkg` for `identity` into `dest`, returning the byte count.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::PackageNotFound`] when the version has vanished,
    /// and transport or I/O errors otherwise. An error returned by `dest`
    /// aborts the download and surfaces as [`FeedError::Io`].
    fn download_package(
        &self,
        identity: &PackageIdentity,
        dest: &mut dyn Write,
    ) -> Result<u64, FeedError>;

    /// Publish the package file at `path`, authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::AlreadyExists`] for a duplicate version,
    /// [`FeedError::Unauthorized`] for a bad key, [`FeedError::Timeout`] when
    /// `timeout` elapses, [`FeedError::Unreachable`] for transport failures and
    /// server errors, [`FeedError::PackageFile`] when `path` cannot be read,
    /// and [`FeedError::Rejected`] for other refusals.
    fn publish_package(
        &self,
        path: &Path,
        api_key: &ApiKey,
        timeout: Duration,
    ) -> Result<(), FeedError>;
}
