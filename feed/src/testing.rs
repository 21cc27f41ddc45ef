//! In-memory feed for exercising the mirror without a network.
//!
//! Package payloads are synthesised as `"{id}/{version}"` so a published file
//! can be traced back to the identity it carries. Publishing a payload adds
//! its version to the feed's listing, which lets tests observe idempotence
//! across consecutive runs.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::client::FeedClient;
use crate::endpoint::{ApiKey, FeedEndpoint};
use crate::error::FeedError;
use crate::package::{PackageId, PackageIdentity, PackageVersion};

/// Record of one accepted publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtefact {
    /// Path of the file handed to `publish_package`.
    pub path: PathBuf,
    /// Bytes read from that file.
    pub payload: Vec<u8>,
    /// Version decoded from the payload.
    pub version: PackageVersion,
    /// Whether the scratch file still existed when the publish began.
    pub existed: bool,
}

#[derive(Debug, Default)]
struct State {
    versions: HashMap<String, Vec<PackageVersion>>,
    list_calls: usize,
    download_calls: usize,
    publish_calls: usize,
    downloaded: Vec<PackageIdentity>,
    published: Vec<PublishedArtefact>,
    rejected_paths: Vec<PathBuf>,
}

/// Scripted failures for an [`InMemoryFeed`].
#[derive(Debug, Clone, Default)]
struct Failures {
    unreachable_listings: usize,
    malformed_listings: bool,
    download_on_call: Option<usize>,
    publish_on_call: Option<usize>,
    publish_unavailable_on_call: Option<usize>,
    publish_unauthorized: bool,
}

/// A scriptable feed held entirely in memory.
///
/// # Examples
///
/// ```
/// use nuget_feed::client::FeedClient;
/// use nuget_feed::package::PackageId;
/// use nuget_feed::testing::InMemoryFeed;
///
/// let feed = InMemoryFeed::new("upstream").with_versions("Serilog", &["1.0.0", "1.1.0"]);
/// let versions = feed.list_versions(&PackageId::from("Serilog"))?;
/// assert_eq!(versions.len(), 2);
/// # Ok::<(), nuget_feed::error::FeedError>(())
/// ```
#[derive(Debug)]
pub struct InMemoryFeed {
    endpoint: FeedEndpoint,
    state: Mutex<State>,
    failures: Failures,
}

impl InMemoryFeed {
    /// Create an empty feed with the given name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            endpoint: FeedEndpoint::new(name, format!("https://{name}.test/v3/index.json"), None),
            state: Mutex::new(State::default()),
            failures: Failures::default(),
        }
    }

    /// Seed the listing for `id` with `versions`, in order.
    #[must_use]
    pub fn with_versions(self, id: &str, versions: &[&str]) -> Self {
        {
            let mut state = self.lock();
            let entry = state.versions.entry(id.to_lowercase()).or_default();
            entry.extend(versions.iter().map(|v| PackageVersion::from(*v)));
        }
        self
    }

    /// Fail the first `count` listings with a transient transport error.
    #[must_use]
    pub fn failing_listings(mut self, count: usize) -> Self {
        self.failures.unreachable_listings = count;
        self
    }

    /// Fail every listing with a protocol error.
    #[must_use]
    pub fn malformed_listings(mut self) -> Self {
        self.failures.malformed_listings = true;
        self
    }

    /// Fail the `n`th download (1-based) with a transport error.
    #[must_use]
    pub fn failing_download_on(mut self, n: usize) -> Self {
        self.failures.download_on_call = Some(n);
        self
    }

    /// Reject the `n`th publish (1-based) as invalid (HTTP 400).
    #[must_use]
    pub fn failing_publish_on(mut self, n: usize) -> Self {
        self.failures.publish_on_call = Some(n);
        self
    }

    /// Fail the `n`th publish (1-based) with a server error (HTTP 503).
    #[must_use]
    pub fn unavailable_publish_on(mut self, n: usize) -> Self {
        self.failures.publish_unavailable_on_call = Some(n);
        self
    }

    /// Reject every publish as unauthorised.
    #[must_use]
    pub fn rejecting_credentials(mut self) -> Self {
        self.failures.publish_unauthorized = true;
        self
    }

    /// Number of `list_versions` calls seen.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Number of `download_package` calls seen.
    #[must_use]
    pub fn download_calls(&self) -> usize {
        self.lock().download_calls
    }

    /// Number of `publish_package` calls seen.
    #[must_use]
    pub fn publish_calls(&self) -> usize {
        self.lock().publish_calls
    }

    /// Identities downloaded, in call order.
    #[must_use]
    pub fn downloaded(&self) -> Vec<PackageIdentity> {
        self.lock().downloaded.clone()
    }

    /// Accepted publishes, in call order.
    #[must_use]
    pub fn published(&self) -> Vec<PublishedArtefact> {
        self.lock().published.clone()
    }

    /// Versions accepted by publish, in call order.
    #[must_use]
    pub fn published_versions(&self) -> Vec<String> {
        self.lock()
            .published
            .iter()
            .map(|artefact| artefact.version.to_string())
            .collect()
    }

    /// Paths of publishes that were rejected.
    #[must_use]
    pub fn rejected_paths(&self) -> Vec<PathBuf> {
        self.lock().rejected_paths.clone()
    }

    /// Payload the feed serves for `id` at `version`.
    #[must_use]
    pub fn payload_for(id: &str, version: &str) -> Vec<u8> {
        format!("{}/{version}", id.to_lowercase()).into_bytes()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn unreachable(&self, reason: &str) -> FeedError {
        FeedError::Unreachable {
            feed: self.endpoint.name().to_owned(),
            url: self.endpoint.service_index_url().to_owned(),
            reason: reason.to_owned(),
        }
    }
}

impl FeedClient for InMemoryFeed {
    fn endpoint(&self) -> &FeedEndpoint {
        &self.endpoint
    }

    fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>, FeedError> {
        let mut state = self.lock();
        state.list_calls += 1;
        if state.list_calls <= self.failures.unreachable_listings {
            return Err(self.unreachable("connection reset"));
        }
        if self.failures.malformed_listings {
            return Err(FeedError::Protocol {
                feed: self.endpoint.name().to_owned(),
                url: self.endpoint.service_index_url().to_owned(),
                reason: "expected value at line 1 column 1".to_owned(),
            });
        }
        Ok(state.versions.get(&id.lower()).cloned().unwrap_or_default())
    }

    fn download_package(
        &self,
        identity: &PackageIdentity,
        dest: &mut dyn Write,
    ) -> Result<u64, FeedError> {
        let mut state = self.lock();
        state.download_calls += 1;
        if self.failures.download_on_call == Some(state.download_calls) {
            return Err(self.unreachable("connection reset during download"));
        }
        let known = state
            .versions
            .get(&identity.id().lower())
            .is_some_and(|versions| versions.contains(identity.version()));
        if !known {
            return Err(FeedError::PackageNotFound {
                feed: self.endpoint.name().to_owned(),
                identity: identity.to_string(),
            });
        }
        let payload = Self::payload_for(identity.id().as_str(), identity.version().as_str());
        dest.write_all(&payload)?;
        state.downloaded.push(identity.clone());
        Ok(payload.len() as u64)
    }

    fn publish_package(
        &self,
        path: &Path,
        _api_key: &ApiKey,
        _timeout: Duration,
    ) -> Result<(), FeedError> {
        let mut state = self.lock();
        state.publish_calls += 1;
        if self.failures.publish_unauthorized {
            state.rejected_paths.push(path.to_path_buf());
            return Err(FeedError::Unauthorized {
                feed: self.endpoint.name().to_owned(),
                status: 401,
            });
        }
        if self.failures.publish_on_call == Some(state.publish_calls) {
            state.rejected_paths.push(path.to_path_buf());
            return Err(FeedError::Rejected {
                feed: self.endpoint.name().to_owned(),
                status: 400,
            });
        }
        if self.failures.publish_unavailable_on_call == Some(state.publish_calls) {
            state.rejected_paths.push(path.to_path_buf());
            return Err(self.unreachable("server error (HTTP 503)"));
        }

        let existed = path.exists();
        let payload = std::fs::read(path).map_err(|source| FeedError::PackageFile {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8_lossy(&payload).into_owned();
        let Some((id, version)) = text.split_once('/') else {
            return Err(FeedError::Rejected {
                feed: self.endpoint.name().to_owned(),
                status: 400,
            });
        };
        let version = PackageVersion::from(version);
        let versions = state.versions.entry(id.to_owned()).or_default();
        if versions.contains(&version) {
            return Err(FeedError::AlreadyExists {
                feed: self.endpoint.name().to_owned(),
            });
        }
        versions.push(version.clone());
        state.published.push(PublishedArtefact {
            path: path.to_path_buf(),
            payload,
            version,
            existed,
        });
        Ok(())
    }
}
