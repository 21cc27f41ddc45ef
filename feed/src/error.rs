//! Error types for feed resolution and feed client operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while resolving feeds or talking to them.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// No configured feed carries the requested name.
    #[error("feed {name} is not configured (available: {})", display_names(.available))]
    FeedNotFound {
        /// The name that was requested.
        name: String,
        /// Names of the feeds that are configured.
        available: Vec<String>,
    },

    /// The feed could not be reached, or failed with a server error.
    #[error("feed {feed} unreachable at {url}: {reason}")]
    Unreachable {
        /// Feed name.
        feed: String,
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// A request exceeded its timeout.
    #[error("request to feed {feed} timed out: {url}")]
    Timeout {
        /// Feed name.
        feed: String,
        /// The URL that was requested.
        url: String,
    },

    /// The feed answered with something that does not follow the protocol.
    #[error("feed {feed} returned an invalid response from {url}: {reason}")]
    Protocol {
        /// Feed name.
        feed: String,
        /// The URL that was requested.
        url: String,
        /// What was wrong with the response.
        reason: String,
    },

    /// The requested package version does not exist on the feed.
    #[error("package {identity} not found on feed {feed}")]
    PackageNotFound {
        /// Feed name.
        feed: String,
        /// Display form of the missing package identity.
        identity: String,
    },

    /// The destination already holds this package version.
    #[error("feed {feed} already contains this package version")]
    AlreadyExists {
        /// Feed name.
        feed: String,
    },

    /// The feed refused the credential presented.
    #[error("feed {feed} rejected the credential (HTTP {status})")]
    Unauthorized {
        /// Feed name.
        feed: String,
        /// HTTP status returned.
        status: u16,
    },

    /// The feed refused the request for another reason (quota, validation).
    #[error("feed {feed} rejected the request (HTTP {status})")]
    Rejected {
        /// Feed name.
        feed: String,
        /// HTTP status returned.
        status: u16,
    },

    /// The local package file handed to publish could not be read.
    #[error("could not read package file {}: {source}", .path.display())]
    PackageFile {
        /// The package file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Streaming the package body failed.
    #[error("I/O error while transferring package: {0}")]
    Io(#[from] std::io::Error),
}

impl FeedError {
    /// Returns true when retrying the same request may succeed.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_feed::error::FeedError;
    ///
    /// let err = FeedError::Timeout {
    ///     feed: "nuget.org".to_owned(),
    ///     url: "https://api.nuget.org/v3/index.json".to_owned(),
    /// };
    /// assert!(err.is_transient());
    /// ```
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unreachable { .. } | Self::Timeout { .. } | Self::Io(_)
        )
    }
}

fn display_names(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_owned()
    } else {
        names.join(", ")
    }
}
