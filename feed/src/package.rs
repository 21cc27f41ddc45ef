//! Semantic wrappers for package names, versions and identities.
//!
//! Versions are compared as exact strings. `1.0` and `1.0.0` are distinct
//! versions here even though a semantic-version comparison would treat them
//! as equal; feeds report the strings they store and the mirror copies them
//! verbatim.

use std::fmt;

/// A package name as reported by a feed.
///
/// The name is case-preserving. Feed URLs use the lowercased form, which
/// [`PackageId::lower`] provides.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId(String);

impl PackageId {
    /// Create a new package id.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the package id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the id is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// The lowercased id used by the NuGet v3 flat container.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_feed::package::PackageId;
    ///
    /// assert_eq!(PackageId::from("Newtonsoft.Json").lower(), "newtonsoft.json");
    /// ```
    #[must_use]
    pub fn lower(&self) -> String {
        self.0.to_lowercase()
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PackageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A version identifier exactly as the feed reported it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageVersion(String);

impl PackageVersion {
    /// Create a new version identifier.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Get the version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The lowercased version used by the NuGet v3 flat container.
    #[must_use]
    pub fn lower(&self) -> String {
        self.0.to_lowercase()
    }
}

impl AsRef<str> for PackageVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageVersion {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PackageVersion {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One publishable artefact: a package name paired with a version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    id: PackageId,
    version: PackageVersion,
}

impl PackageIdentity {
    /// Pair a package id with a version.
    #[must_use]
    pub fn new(id: PackageId, version: PackageVersion) -> Self {
        Self { id, version }
    }

    /// The package id.
    #[must_use]
    pub fn id(&self) -> &PackageId {
        &self.id
    }

    /// The package version.
    #[must_use]
    pub fn version(&self) -> &PackageVersion {
        &self.version
    }

    /// File name of the `.nupkg` in the flat container layout.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_feed::package::{PackageId, PackageIdentity, PackageVersion};
    ///
    /// let identity = PackageIdentity::new(
    ///     PackageId::from("Serilog"),
    ///     PackageVersion::from("2.0.0-Beta"),
    /// );
    /// assert_eq!(identity.nupkg_file_name(), "serilog.2.0.0-beta.nupkg");
    /// ```
    #[must_use]
    pub fn nupkg_file_name(&self) -> String {
        format!("{}.{}.nupkg", self.id.lower(), self.version.lower())
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.version)
    }
}
