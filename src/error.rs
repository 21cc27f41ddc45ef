//! Error types for the mirroring pipeline.
//!
//! Every stage returns [`Result`] and propagates with `?`. The top level maps
//! an error to an exit code and a recovery hint through [`ErrorClass`], which
//! separates failures that are safe to simply rerun from those that need an
//! operator to change something first.

use std::path::PathBuf;

use nuget_feed::config::ConfigError;
use nuget_feed::error::FeedError;
use nuget_feed::package::PackageIdentity;
use thiserror::Error;

/// Exit code for failures that need operator intervention.
pub const EXIT_OPERATOR_ACTION: i32 = 2;

/// Exit code for failures that are safe to rerun.
pub const EXIT_TRANSIENT: i32 = 3;

/// Exit code for a run cancelled by a signal.
pub const EXIT_CANCELLED: i32 = 130;

/// Broad recovery category for a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// A transient failure; rerunning is safe and likely to succeed.
    Transient,
    /// A permanent failure; configuration or credentials need fixing.
    OperatorAction,
    /// The operator asked the run to stop.
    Cancelled,
}

/// Errors that abort a mirroring run.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The feed configuration is unusable or a feed name did not resolve.
    #[error("configuration error: {0}")]
    Configuration(#[source] FeedError),

    /// The package name is empty.
    #[error("package name must not be empty")]
    InvalidPackageName,

    /// A feed could not be reached while listing versions.
    #[error("could not list versions from feed {feed}: {source}")]
    FeedUnreachable {
        /// Feed name.
        feed: String,
        /// The underlying feed error.
        #[source]
        source: FeedError,
    },

    /// A feed answered the listing with a malformed response.
    #[error("feed {feed} returned an unusable version listing: {source}")]
    FeedProtocol {
        /// Feed name.
        feed: String,
        /// The underlying feed error.
        #[source]
        source: FeedError,
    },

    /// A feed refused the read credentials while listing versions.
    #[error("feed {feed} refused the configured read credentials: {source}")]
    FeedCredentials {
        /// Feed name.
        feed: String,
        /// The underlying feed error.
        #[source]
        source: FeedError,
    },

    /// Fetching a package from the source feed failed.
    #[error("failed to download {identity}: {source}")]
    DownloadFailure {
        /// The package being downloaded.
        identity: PackageIdentity,
        /// The underlying feed error.
        #[source]
        source: FeedError,
    },

    /// The destination feed refused or failed to accept a package.
    #[error("failed to publish {identity}: {source}")]
    PublishFailure {
        /// The package being published.
        identity: PackageIdentity,
        /// The underlying feed error.
        #[source]
        source: FeedError,
    },

    /// The local scratch file could not be created, written or flushed.
    #[error("scratch file error at {}: {source}", .path.display())]
    ScratchIo {
        /// Scratch directory or file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled before it finished.
    #[error("mirroring cancelled")]
    Cancelled,
}

impl MirrorError {
    /// Wrap a listing failure in the variant matching its cause.
    #[must_use]
    pub fn from_listing(feed: &str, source: FeedError) -> Self {
        match source {
            FeedError::Protocol { .. } => Self::FeedProtocol {
                feed: feed.to_owned(),
                source,
            },
            FeedError::Unauthorized { .. } => Self::FeedCredentials {
                feed: feed.to_owned(),
                source,
            },
            other => Self::FeedUnreachable {
                feed: feed.to_owned(),
                source: other,
            },
        }
    }

    /// The recovery category of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_mirror::error::{ErrorClass, MirrorError};
    ///
    /// assert_eq!(MirrorError::InvalidPackageName.class(), ErrorClass::OperatorAction);
    /// assert_eq!(MirrorError::Cancelled.class(), ErrorClass::Cancelled);
    /// ```
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Cancelled => ErrorClass::Cancelled,
            Self::FeedUnreachable { source, .. }
            | Self::DownloadFailure { source, .. }
            | Self::PublishFailure { source, .. }
                if source.is_transient() =>
            {
                ErrorClass::Transient
            }
            Self::PublishFailure {
                source: FeedError::AlreadyExists { .. },
                ..
            } => ErrorClass::Transient,
            Self::DownloadFailure {
                source: FeedError::PackageNotFound { .. },
                ..
            } => ErrorClass::Transient,
            _ => ErrorClass::OperatorAction,
        }
    }

    /// Process exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self.class() {
            ErrorClass::Transient => EXIT_TRANSIENT,
            ErrorClass::OperatorAction => EXIT_OPERATOR_ACTION,
            ErrorClass::Cancelled => EXIT_CANCELLED,
        }
    }

    /// A one-line recovery hint for the operator.
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match (self, self.class()) {
            (_, ErrorClass::Cancelled) => {
                "versions mirrored before cancellation are kept; rerun to continue"
            }
            (Self::PublishFailure { .. }, ErrorClass::Transient) => {
                "safe to rerun: versions already mirrored are skipped"
            }
            (_, ErrorClass::Transient) => "safe to rerun once the feed is reachable",
            (Self::Configuration(_), _) => "check the feed names against feeds.toml",
            (
                Self::PublishFailure {
                    source: FeedError::Unauthorized { .. },
                    ..
                },
                _,
            ) => "check the API key for the destination feed",
            (Self::FeedCredentials { .. }, _) => {
                "check username and password for the feed in feeds.toml"
            }
            (Self::ScratchIo { .. }, _) => "check free space and permissions of --scratch-dir",
            _ => "operator intervention required before rerunning",
        }
    }
}

impl From<ConfigError> for MirrorError {
    fn from(error: ConfigError) -> Self {
        Self::Configuration(FeedError::Config(error))
    }
}

/// Result type alias using [`MirrorError`].
pub type Result<T> = std::result::Result<T, MirrorError>;
