//! Pipeline wiring over in-memory feeds for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use nuget_feed::client::FeedClient;
use nuget_feed::config::{FeedConfig, FeedSource};
use nuget_feed::endpoint::FeedEndpoint;
use nuget_feed::error::FeedError;
use nuget_feed::resolver::FeedResolver;
use nuget_feed::testing::InMemoryFeed;

use crate::error::{MirrorError, Result};
use crate::pipeline::FeedConnector;

/// A named set of [`InMemoryFeed`]s acting as both configuration and
/// connector.
///
/// # Examples
///
/// ```
/// use nuget_feed::testing::InMemoryFeed;
/// use nuget_mirror::testing::FeedSet;
///
/// let feeds = FeedSet::new()
///     .with_feed(InMemoryFeed::new("upstream"))
///     .with_feed(InMemoryFeed::new("mirror"));
/// assert!(feeds.resolver().resolve("mirror").is_ok());
/// ```
#[derive(Debug, Default)]
pub struct FeedSet {
    feeds: HashMap<String, Arc<InMemoryFeed>>,
    order: Vec<String>,
    connections: Mutex<Vec<String>>,
}

impl FeedSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `feed` under its endpoint name.
    #[must_use]
    pub fn with_feed(mut self, feed: InMemoryFeed) -> Self {
        let name = feed.endpoint().name().to_owned();
        if self.feeds.insert(name.clone(), Arc::new(feed)).is_none() {
            self.order.push(name);
        }
        self
    }

    /// Shared handle to the feed called `name`.
    #[must_use]
    pub fn feed(&self, name: &str) -> Option<Arc<InMemoryFeed>> {
        self.feeds.get(name).cloned()
    }

    /// A resolver whose configuration lists every feed in the set.
    #[must_use]
    pub fn resolver(&self) -> FeedResolver {
        let sources = self
            .order
            .iter()
            .filter_map(|name| self.feeds.get(name))
            .map(|feed| FeedSource {
                name: feed.endpoint().name().to_owned(),
                url: feed.endpoint().service_index_url().to_owned(),
                username: None,
                password: None,
            })
            .collect();
        FeedResolver::new(FeedConfig { feeds: sources })
    }

    /// Endpoint names passed to [`FeedConnector::connect`], in call order.
    #[must_use]
    pub fn connections(&self) -> Vec<String> {
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FeedConnector for FeedSet {
    fn connect(&self, endpoint: &FeedEndpoint) -> Result<Arc<dyn FeedClient>> {
        let name = endpoint.name();
        self.connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(name.to_owned());
        let feed = self.feeds.get(name).ok_or_else(|| {
            MirrorError::Configuration(FeedError::FeedNotFound {
                name: name.to_owned(),
                available: self.order.clone(),
            })
        })?;
        Ok(Arc::clone(feed) as Arc<dyn FeedClient>)
    }
}
