//! End-to-end mirroring of one package between two named feeds.
//!
//! The pipeline validates the request, resolves both feed names before any
//! network I/O, lists both feeds concurrently, computes the missing set and
//! drives the transfers. Feed clients are built through a [`FeedConnector`]
//! so tests can substitute in-memory feeds.

use std::io::Write;
use std::sync::Arc;

use log::info;
use nuget_feed::client::FeedClient;
use nuget_feed::endpoint::{ApiKey, FeedEndpoint};
use nuget_feed::http::HttpFeedClient;
use nuget_feed::package::{PackageId, PackageIdentity};
use nuget_feed::resolver::FeedResolver;

use crate::cancel::CancellationToken;
use crate::diff::{MissingVersions, compute_missing};
use crate::error::{MirrorError, Result};
use crate::listing::{RetryPolicy, list_source_and_destination};
use crate::output::{dry_run_line, write_line};
use crate::transfer::{TransferDriver, TransferOptions, TransferReport};

/// Builds a feed client for a resolved endpoint.
#[cfg_attr(test, mockall::automock)]
pub trait FeedConnector {
    /// Connect to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns a [`MirrorError`] when no client can be built.
    fn connect(&self, endpoint: &FeedEndpoint) -> Result<Arc<dyn FeedClient>>;
}

/// Connector producing NuGet v3 HTTP clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpConnector;

impl FeedConnector for HttpConnector {
    fn connect(&self, endpoint: &FeedEndpoint) -> Result<Arc<dyn FeedClient>> {
        Ok(Arc::new(HttpFeedClient::new(endpoint.clone())))
    }
}

/// What to mirror and where.
#[derive(Debug, Clone)]
pub struct MirrorRequest {
    /// Package to mirror.
    pub package: PackageId,
    /// Name of the source feed.
    pub source: String,
    /// Name of the destination feed.
    pub destination: String,
    /// Key used to publish to the destination.
    pub api_key: ApiKey,
}

/// How to mirror.
#[derive(Debug, Clone, Default)]
pub struct MirrorOptions {
    /// Listing retry policy.
    pub retry: RetryPolicy,
    /// Transfer settings.
    pub transfer: TransferOptions,
    /// List and diff only.
    pub dry_run: bool,
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    /// The mirrored package.
    pub package: PackageId,
    /// Distinct versions at the source.
    pub source_count: usize,
    /// Distinct versions at the destination before the run.
    pub destination_count: usize,
    /// Versions the run set out to mirror.
    pub missing: MissingVersions,
    /// Whether transfers were skipped.
    pub dry_run: bool,
    /// Per-version transfer results; empty for a dry run.
    pub transfer: TransferReport,
}

/// Mirror every version of `request.package` that the destination lacks.
///
/// Progress lines are written to `out`.
///
/// # Errors
///
/// Returns [`MirrorError::InvalidPackageName`] or
/// [`MirrorError::Configuration`] before any feed is contacted, and any
/// listing or transfer error afterwards.
pub fn run_mirror(
    request: &MirrorRequest,
    resolver: &FeedResolver,
    connector: &dyn FeedConnector,
    options: &MirrorOptions,
    cancel: &CancellationToken,
    out: &mut dyn Write,
) -> Result<MirrorReport> {
    if request.package.is_blank() {
        return Err(MirrorError::InvalidPackageName);
    }
    let source_endpoint = resolver
        .resolve(&request.source)
        .map_err(MirrorError::Configuration)?;
    let destination_endpoint = resolver
        .resolve(&request.destination)
        .map_err(MirrorError::Configuration)?;

    let source = connector.connect(&source_endpoint)?;
    let destination = connector.connect(&destination_endpoint)?;

    let snapshot = list_source_and_destination(
        source.as_ref(),
        destination.as_ref(),
        &request.package,
        &options.retry,
        cancel,
    )?;
    let missing = compute_missing(&snapshot.source, &snapshot.destination);
    info!(
        "{}: {} at {}, {} at {}, {} to mirror",
        request.package,
        snapshot.source.len(),
        source_endpoint,
        snapshot.destination.len(),
        destination_endpoint,
        missing.len()
    );

    let transfer = if options.dry_run {
        for version in &missing {
            let identity = PackageIdentity::new(request.package.clone(), version.clone());
            write_line(out, dry_run_line(&identity));
        }
        TransferReport::default()
    } else {
        TransferDriver::new(
            source.as_ref(),
            destination.as_ref(),
            &request.api_key,
            &options.transfer,
            cancel,
        )
        .run(&request.package, &missing, out)?
    };

    Ok(MirrorReport {
        package: request.package.clone(),
        source_count: snapshot.source.len(),
        destination_count: snapshot.destination.len(),
        missing,
        dry_run: options.dry_run,
        transfer,
    })
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
