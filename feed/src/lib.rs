//! NuGet feed access for `nuget-mirror`.
//!
//! This crate owns everything the mirror needs from the outside world: named
//! feed configuration, resolution of names to endpoints, and the client
//! capability set (list, download, publish) with a NuGet v3 HTTP
//! implementation.
//!
//! # Modules
//!
//! - [`client`] - The [`client::FeedClient`] capability trait
//! - [`config`] - `feeds.toml` loading and validation
//! - [`endpoint`] - Resolved feed handles, read credentials and API keys
//! - [`error`] - Feed-level error types
//! - [`http`] - NuGet v3 client over HTTP
//! - [`package`] - Package id, version and identity newtypes
//! - [`resolver`] - Name-to-endpoint resolution
//! - [`service_index`] - NuGet v3 service index documents

pub mod client;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod package;
pub mod resolver;
pub mod service_index;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;
