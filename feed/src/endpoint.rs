//! Resolved feed handles and the credentials attached to them.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Read credentials for a feed, sent as HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Pair a username with a password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Value for the `Authorization` header.
    ///
    /// # Examples
    ///
    /// ```
    /// use nuget_feed::endpoint::Credentials;
    ///
    /// let creds = Credentials::new("user", "pass");
    /// assert_eq!(creds.basic_auth_header(), "Basic dXNlcjpwYXNz");
    /// ```
    #[must_use]
    pub fn basic_auth_header(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The API key presented to a destination feed when publishing.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw API key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key, for the `X-NuGet-ApiKey` header only.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// A configured feed, resolved by name.
///
/// Only [`crate::resolver::FeedResolver`] constructs endpoints from
/// configuration; every other component borrows them read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEndpoint {
    name: String,
    service_index_url: String,
    credentials: Option<Credentials>,
}

impl FeedEndpoint {
    /// Build an endpoint from its parts.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        service_index_url: impl Into<String>,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            name: name.into(),
            service_index_url: service_index_url.into(),
            credentials,
        }
    }

    /// The configured feed name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// URL of the NuGet v3 service index.
    #[must_use]
    pub fn service_index_url(&self) -> &str {
        &self.service_index_url
    }

    /// Read credentials, if the feed needs any.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

impl fmt::Display for FeedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.service_index_url)
    }
}
