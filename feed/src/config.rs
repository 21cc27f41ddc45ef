//! Feed configuration loaded from `feeds.toml`.
//!
//! The file lists named NuGet v3 feeds. The configuration is an explicit value
//! handed to [`crate::resolver::FeedResolver`]; nothing here reads ambient
//! global state beyond locating the default file path.
//!
//! ```toml
//! [[feeds]]
//! name = "nuget.org"
//! url = "https://api.nuget.org/v3/index.json"
//!
//! [[feeds]]
//! name = "internal"
//! url = "https://pkgs.example.test/v3/index.json"
//! username = "mirror"
//! password = "secret"
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

const CONFIG_FILENAME: &str = "feeds.toml";
const APPLICATION: &str = "nuget-mirror";

/// Errors raised while loading or validating the feed configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read feed configuration {path}: {source}")]
    Read {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("invalid feed configuration {}: {reason}", display_origin(.path.as_deref()))]
    Parse {
        /// Path to the configuration file, when loaded from disk.
        path: Option<PathBuf>,
        /// Parser message.
        reason: String,
    },

    /// A feed entry is missing a usable name.
    #[error("feed configuration contains an entry with an empty name")]
    EmptyName,

    /// Two feed entries share a name.
    #[error("feed {name} is configured more than once")]
    DuplicateFeed {
        /// The repeated name.
        name: String,
    },

    /// A feed URL is not an HTTP(S) URL.
    #[error("feed {name} has an unsupported URL {url}; expected http:// or https://")]
    InvalidUrl {
        /// Feed name.
        name: String,
        /// The rejected URL.
        url: String,
    },

    /// A username was given without a password, or the reverse.
    #[error("feed {name} must set both username and password, or neither")]
    IncompleteCredentials {
        /// Feed name.
        name: String,
    },

    /// No default configuration directory exists on this platform.
    #[error("could not determine the configuration directory; pass --config")]
    MissingConfigDirectory,
}

fn display_origin(path: Option<&Path>) -> String {
    path.map_or_else(|| "<inline>".to_owned(), |p| p.display().to_string())
}

/// One named feed entry.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FeedSource {
    /// Name used on the command line to select the feed.
    pub name: String,
    /// URL of the NuGet v3 service index.
    pub url: String,
    /// Optional basic-auth username for reads.
    #[serde(default)]
    pub username: Option<String>,
    /// Optional basic-auth password for reads.
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for FeedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSource")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The full set of configured feeds.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// Configured feeds, in file order.
    pub feeds: Vec<FeedSource>,
}

impl FeedConfig {
    /// Build a configuration from feed entries, validating them.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry is invalid or names repeat.
    pub fn new(feeds: Vec<FeedSource>) -> Result<Self, ConfigError> {
        let config = Self { feeds };
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and the validation
    /// errors described on [`FeedConfig::new`].
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_feed::config::FeedConfig;
    ///
    /// let config = FeedConfig::from_toml_str(
    ///     "[[feeds]]\nname = \"nuget.org\"\nurl = \"https://api.nuget.org/v3/index.json\"\n",
    /// )?;
    /// assert_eq!(config.names(), vec!["nuget.org".to_owned()]);
    /// # Ok::<(), nuget_feed::config::ConfigError>(())
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Self::parse(source, None)
    }

    /// Load and validate the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, and the
    /// errors of [`FeedConfig::from_toml_str`] otherwise.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("loaded feed configuration from {}", path.display());
        Self::parse(&source, Some(path))
    }

    /// Names of all configured feeds, in file order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.feeds.iter().map(|feed| feed.name.clone()).collect()
    }

    fn parse(source: &str, path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = toml::from_str::<Self>(source).map_err(|e| ConfigError::Parse {
            path: path.map(Path::to_path_buf),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(ConfigError::EmptyName);
            }
            if !seen.insert(feed.name.as_str()) {
                return Err(ConfigError::DuplicateFeed {
                    name: feed.name.clone(),
                });
            }
            if !(feed.url.starts_with("https://") || feed.url.starts_with("http://")) {
                return Err(ConfigError::InvalidUrl {
                    name: feed.name.clone(),
                    url: feed.url.clone(),
                });
            }
            if feed.username.is_some() != feed.password.is_some() {
                return Err(ConfigError::IncompleteCredentials {
                    name: feed.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Default location of `feeds.toml` in the platform configuration directory.
///
/// Returns `None` when the platform has no home directory to anchor it.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories_next::ProjectDirs::from("", "", APPLICATION)
        .map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

/// Pick the explicit path when given, otherwise the default location.
///
/// # Errors
///
/// Returns [`ConfigError::MissingConfigDirectory`] when no explicit path is
/// given and the platform has no configuration directory.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path().ok_or(ConfigError::MissingConfigDirectory),
    }
}
