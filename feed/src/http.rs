//! NuGet v3 feed client over HTTP using `ureq`.
//!
//! The service index is fetched lazily on first use and cached for the
//! lifetime of the client. Listing and downloading go through the flat
//! container (`PackageBaseAddress/3.0.0`); publishing goes through
//! `PackagePublish/2.0.0` as a multipart `PUT`.

use std::io::Write;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, trace};
use serde::de::DeserializeOwned;

use crate::client::FeedClient;
use crate::endpoint::{ApiKey, FeedEndpoint};
use crate::error::FeedError;
use crate::package::{PackageId, PackageIdentity, PackageVersion};
use crate::service_index::{PACKAGE_BASE_ADDRESS, PACKAGE_PUBLISH, ServiceIndex, VersionIndex};

const API_KEY_HEADER: &str = "X-NuGet-ApiKey";
const PROTOCOL_VERSION_HEADER: &str = "X-NuGet-Protocol-Version";
const PROTOCOL_VERSION: &str = "4.1.0";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Resource URLs picked out of the service index.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Resources {
    package_base: String,
    publish: Option<String>,
}

/// HTTP client for one NuGet v3 feed.
///
/// # Examples
///
/// ```no_run
/// use nuget_feed::client::FeedClient;
/// use nuget_feed::endpoint::FeedEndpoint;
/// use nuget_feed::http::HttpFeedClient;
/// use nuget_feed::package::PackageId;
///
/// let endpoint = FeedEndpoint::new("nuget.org", "https://api.nuget.org/v3/index.json", None);
/// let client = HttpFeedClient::new(endpoint);
/// let versions = client.list_versions(&PackageId::from("Serilog"))?;
/// # Ok::<(), nuget_feed::error::FeedError>(())
/// ```
pub struct HttpFeedClient {
    endpoint: FeedEndpoint,
    agent: ureq::Agent,
    resources: OnceLock<Resources>,
}

impl HttpFeedClient {
    /// Create a client for `endpoint`.
    ///
    /// Connecting gives up after 30 seconds. Listing and downloading give up
    /// when the feed sends nothing for two minutes.
    #[must_use]
    pub fn new(endpoint: FeedEndpoint) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(CONNECT_TIMEOUT))
            .timeout_recv_response(Some(READ_TIMEOUT))
            .timeout_recv_body(Some(READ_TIMEOUT))
            .build();
        Self {
            endpoint,
            agent: ureq::Agent::new_with_config(config),
            resources: OnceLock::new(),
        }
    }

    /// URL of the flat-container version listing for `id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_feed::http::HttpFeedClient;
    /// use nuget_feed::package::PackageId;
    ///
    /// let url = HttpFeedClient::versions_url(
    ///     "https://api.nuget.org/v3-flatcontainer",
    ///     &PackageId::from("Serilog"),
    /// );
    /// assert_eq!(url, "https://api.nuget.org/v3-flatcontainer/serilog/index.json");
    /// ```
    #[must_use]
    pub fn versions_url(package_base: &str, id: &PackageId) -> String {
        format!("{package_base}/{}/index.json", id.lower())
    }

    /// URL of the `.nupkg` for `identity` in the flat container.
    #[must_use]
    pub fn package_url(package_base: &str, identity: &PackageIdentity) -> String {
        format!(
            "{package_base}/{}/{}/{}",
            identity.id().lower(),
            identity.version().lower(),
            identity.nupkg_file_name()
        )
    }

    fn resources(&self) -> Result<&Resources, FeedError> {
        if let Some(resources) = self.resources.get() {
            return Ok(resources);
        }
        let url = self.endpoint.service_index_url();
        debug!("fetching service index for feed {}", self.endpoint.name());
        let index: ServiceIndex = self.get_json(url).map_err(|e| match e {
            FeedError::PackageNotFound { feed, .. } => FeedError::Protocol {
                feed,
                url: url.to_owned(),
                reason: "service index not found (HTTP 404)".to_owned(),
            },
            other => other,
        })?;
        let resources = resources_from_index(&self.endpoint, &index)?;
        // A concurrent caller may have won the race; either value is equivalent.
        Ok(self.resources.get_or_init(|| resources))
    }

    fn get(&self, url: &str) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        let request = self.agent.get(url);
        match self.endpoint.credentials() {
            Some(credentials) => request.header("Authorization", credentials.basic_auth_header()),
            None => request,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FeedError> {
        trace!("GET {url}");
        let response = self
            .get(url)
            .call()
            .map_err(|e| map_ureq_error(&self.endpoint, url, &e))?;
        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| map_ureq_error(&self.endpoint, url, &e))?;
        serde_json::from_str(&body).map_err(|e| FeedError::Protocol {
            feed: self.endpoint.name().to_owned(),
            url: url.to_owned(),
            reason: e.to_string(),
        })
    }
}

impl FeedClient for HttpFeedClient {
    fn endpoint(&self) -> &FeedEndpoint {
        &self.endpoint
    }

    fn list_versions(&self, id: &PackageId) -> Result<Vec<PackageVersion>, FeedError> {
        let resources = self.resources()?;
        let url = Self::versions_url(&resources.package_base, id);
        match self.get_json::<VersionIndex>(&url) {
            Ok(index) => Ok(index.versions.into_iter().map(PackageVersion::from).collect()),
            Err(FeedError::PackageNotFound { .. }) => {
                debug!("feed {} does not know package {id}", self.endpoint.name());
                Ok(Vec::new())
            }
            Err(other) => Err(other),
        }
    }

    fn download_package(
        &self,
        identity: &PackageIdentity,
        dest: &mut dyn Write,
    ) -> Result<u64, FeedError> {
        let resources = self.resources()?;
        let url = Self::package_url(&resources.package_base, identity);
        trace!("GET {url}");
        let response = self.get(&url).call().map_err(|e| {
            match map_ureq_error(&self.endpoint, &url, &e) {
                FeedError::PackageNotFound { feed, .. } => FeedError::PackageNotFound {
                    feed,
                    identity: identity.to_string(),
                },
                other => other,
            }
        })?;
        let bytes = std::io::copy(&mut response.into_body().into_reader(), dest)?;
        debug!("downloaded {identity} ({bytes} bytes)");
        Ok(bytes)
    }

    fn publish_package(
        &self,
        path: &Path,
        api_key: &ApiKey,
        timeout: Duration,
    ) -> Result<(), FeedError> {
        let resources = self.resources()?;
        let url = resources.publish.as_deref().ok_or_else(|| FeedError::Protocol {
            feed: self.endpoint.name().to_owned(),
            url: self.endpoint.service_index_url().to_owned(),
            reason: format!("service index does not advertise {PACKAGE_PUBLISH}"),
        })?;

        let package = std::fs::read(path).map_err(|source| FeedError::PackageFile {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map_or_else(|| "package.nupkg".to_owned(), |n| n.to_string_lossy().into_owned());
        let boundary = multipart_boundary();
        let body = multipart_body(&boundary, &file_name, &package);

        debug!(
            "PUT {url} ({} bytes, timeout {}s)",
            package.len(),
            timeout.as_secs()
        );
        let mut request = self
            .agent
            .put(url)
            .config()
            .timeout_global(Some(timeout))
            .build()
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(API_KEY_HEADER, api_key.expose())
            .header(PROTOCOL_VERSION_HEADER, PROTOCOL_VERSION);
        if let Some(credentials) = self.endpoint.credentials() {
            request = request.header("Authorization", credentials.basic_auth_header());
        }

        request
            .send(&body[..])
            .map_err(|e| map_publish_error(&self.endpoint, url, &e))?;
        Ok(())
    }
}

fn resources_from_index(
    endpoint: &FeedEndpoint,
    index: &ServiceIndex,
) -> Result<Resources, FeedError> {
    let package_base = index
        .resource(PACKAGE_BASE_ADDRESS)
        .ok_or_else(|| FeedError::Protocol {
            feed: endpoint.name().to_owned(),
            url: endpoint.service_index_url().to_owned(),
            reason: format!("service index does not advertise {PACKAGE_BASE_ADDRESS}"),
        })?
        .to_owned();
    let publish = index.resource(PACKAGE_PUBLISH).map(str::to_owned);
    Ok(Resources {
        package_base,
        publish,
    })
}

/// Boundary unique enough that it will not appear inside a package payload.
fn multipart_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    format!("nuget-mirror-{:x}-{nanos:x}", std::process::id())
}

/// Build the `multipart/form-data` body NuGet push expects.
fn multipart_body(boundary: &str, file_name: &str, package: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(package.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"package\"; filename=\"{file_name}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(package);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Map a ureq error on a read request to a [`FeedError`].
fn map_ureq_error(endpoint: &FeedEndpoint, url: &str, err: &ureq::Error) -> FeedError {
    let feed = endpoint.name().to_owned();
    match err {
        ureq::Error::StatusCode(404) => FeedError::PackageNotFound {
            feed,
            identity: url.to_owned(),
        },
        ureq::Error::StatusCode(status @ (401 | 403)) => FeedError::Unauthorized {
            feed,
            status: *status,
        },
        ureq::Error::StatusCode(status) if *status >= 500 => FeedError::Unreachable {
            feed,
            url: url.to_owned(),
            reason: format!("server error (HTTP {status})"),
        },
        ureq::Error::StatusCode(status) => FeedError::Protocol {
            feed,
            url: url.to_owned(),
            reason: format!("unexpected HTTP {status}"),
        },
        ureq::Error::Timeout(_) => FeedError::Timeout {
            feed,
            url: url.to_owned(),
        },
        other => FeedError::Unreachable {
            feed,
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// Map a ureq error on a publish request to a [`FeedError`].
fn map_publish_error(endpoint: &FeedEndpoint, url: &str, err: &ureq::Error) -> FeedError {
    let feed = endpoint.name().to_owned();
    match err {
        ureq::Error::StatusCode(409) => FeedError::AlreadyExists { feed },
        ureq::Error::StatusCode(status @ (401 | 403)) => FeedError::Unauthorized {
            feed,
            status: *status,
        },
        ureq::Error::StatusCode(status) if *status >= 500 => FeedError::Unreachable {
            feed,
            url: url.to_owned(),
            reason: format!("server error (HTTP {status})"),
        },
        ureq::Error::StatusCode(status) => FeedError::Rejected {
            feed,
            status: *status,
        },
        ureq::Error::Timeout(_) => FeedError::Timeout {
            feed,
            url: url.to_owned(),
        },
        other => FeedError::Unreachable {
            feed,
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
