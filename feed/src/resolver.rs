//! Resolution of feed names to [`FeedEndpoint`]s.

use crate::config::{FeedConfig, FeedSource};
use crate::endpoint::{Credentials, FeedEndpoint};
use crate::error::FeedError;

/// Looks up configured feeds by exact name.
///
/// Resolution touches configuration only; no network I/O happens here.
///
/// # Examples
///
/// ```
/// use nuget_feed::config::FeedConfig;
/// use nuget_feed::resolver::FeedResolver;
///
/// let config = FeedConfig::from_toml_str(
///     "[[feeds]]\nname = \"nuget.org\"\nurl = \"https://api.nuget.org/v3/index.json\"\n",
/// )?;
/// let resolver = FeedResolver::new(config);
/// let endpoint = resolver.resolve("nuget.org")?;
/// assert_eq!(endpoint.service_index_url(), "https://api.nuget.org/v3/index.json");
/// assert!(resolver.resolve("NuGet.org").is_err());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct FeedResolver {
    config: FeedConfig,
}

impl FeedResolver {
    /// Create a resolver over an explicit configuration.
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    /// Resolve `name` to an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::FeedNotFound`] when no feed matches `name`
    /// exactly.
    pub fn resolve(&self, name: &str) -> Result<FeedEndpoint, FeedError> {
        self.config
            .feeds
            .iter()
            .find(|feed| feed.name == name)
            .map(endpoint_for)
            .ok_or_else(|| FeedError::FeedNotFound {
                name: name.to_owned(),
                available: self.config.names(),
            })
    }
}

fn endpoint_for(source: &FeedSource) -> FeedEndpoint {
    let credentials = match (&source.username, &source.password) {
        (Some(username), Some(password)) => Some(Credentials::new(username, password)),
        _ => None,
    };
    FeedEndpoint::new(&source.name, &source.url, credentials)
}
