//! NuGet v3 service index and flat-container documents.

use serde::Deserialize;

/// Resource type of the flat container used for listing and downloads.
pub const PACKAGE_BASE_ADDRESS: &str = "PackageBaseAddress/3.0.0";

/// Resource type of the push endpoint.
pub const PACKAGE_PUBLISH: &str = "PackagePublish/2.0.0";

/// The `index.json` document at the root of a v3 feed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceIndex {
    /// Protocol version string, e.g. `3.0.0`.
    pub version: String,
    /// Advertised resources.
    #[serde(default)]
    pub resources: Vec<ServiceResource>,
}

/// One advertised resource.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceResource {
    /// Resource URL.
    #[serde(rename = "@id")]
    pub id: String,
    /// Resource type, e.g. `PackageBaseAddress/3.0.0`.
    #[serde(rename = "@type")]
    pub kind: String,
}

impl ServiceIndex {
    /// URL of the first resource whose type is `kind`, without a trailing slash.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_feed::service_index::{PACKAGE_BASE_ADDRESS, ServiceIndex};
    ///
    /// let index: ServiceIndex = serde_json::from_str(r#"{
    ///     "version": "3.0.0",
    ///     "resources": [
    ///         {"@id": "https://feed.test/flat/", "@type": "PackageBaseAddress/3.0.0"}
    ///     ]
    /// }"#)?;
    /// assert_eq!(index.resource(PACKAGE_BASE_ADDRESS), Some("https://feed.test/flat"));
    /// # Ok::<(), serde_json::Error>(())
    /// ```
    #[must_use]
    pub fn resource(&self, kind: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|resource| resource.kind == kind)
            .map(|resource| resource.id.trim_end_matches('/'))
    }
}

/// The flat-container `index.json` listing a package's versions.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct VersionIndex {
    /// Versions in feed order.
    #[serde(default)]
    pub versions: Vec<String>,
}
