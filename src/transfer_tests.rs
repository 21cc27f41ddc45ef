//! Tests for the transfer driver.

use super::*;
use crate::listing::VersionSet;
use nuget_feed::client::MockFeedClient;
use nuget_feed::endpoint::FeedEndpoint;
use nuget_feed::testing::InMemoryFeed;
use rstest::{fixture, rstest};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const PACKAGE: &str = "Serilog";

struct Harness {
    scratch: TempDir,
    options: TransferOptions,
    api_key: ApiKey,
    cancel: CancellationToken,
}

impl Harness {
    fn run(
        &self,
        source: &dyn FeedClient,
        destination: &dyn FeedClient,
        versions: &[&str],
    ) -> (Result<TransferReport>, Vec<String>) {
        let missing = missing(versions);
        let driver = TransferDriver::new(
            source,
            destination,
            &self.api_key,
            &self.options,
            &self.cancel,
        );
        let mut out = Vec::new();
        let result = driver.run(&PackageId::from(PACKAGE), &missing, &mut out);
        let lines = String::from_utf8(out)
            .expect("utf-8 output")
            .lines()
            .map(str::to_owned)
            .collect();
        (result, lines)
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path())
            .expect("read scratch dir")
            .next()
            .is_none()
    }
}

fn missing(versions: &[&str]) -> MissingVersions {
    let source: VersionSet = versions.iter().copied().collect();
    crate::diff::compute_missing(&source, &VersionSet::default())
}

fn versions_of(identities: &[PackageIdentity]) -> Vec<&str> {
    identities
        .iter()
        .map(|identity| identity.version().as_str())
        .collect()
}

#[fixture]
fn harness() -> Harness {
    let scratch = tempfile::tempdir().expect("scratch dir");
    let options = TransferOptions {
        scratch_dir: scratch.path().to_path_buf(),
        ..TransferOptions::default()
    };
    Harness {
        scratch,
        options,
        api_key: ApiKey::new("secret-key"),
        cancel: CancellationToken::new(),
    }
}

fn upstream() -> InMemoryFeed {
    InMemoryFeed::new("upstream").with_versions(PACKAGE, &["1.0.0", "1.1.0", "2.0.0"])
}

#[rstest]
fn mirrors_every_version_in_order(harness: Harness) {
    let source = upstream();
    let destination = InMemoryFeed::new("mirror");

    let (result, lines) = harness.run(&source, &destination, &["1.0.0", "1.1.0", "2.0.0"]);

    let report = result.expect("transfer succeeds");
    assert_eq!(versions_of(&report.mirrored), ["1.0.0", "1.1.0", "2.0.0"]);
    assert_eq!(destination.published_versions(), ["1.0.0", "1.1.0", "2.0.0"]);
    assert_eq!(
        lines,
        [
            "Mirroring Serilog.1.0.0...",
            "Mirroring Serilog.1.1.0...",
            "Mirroring Serilog.2.0.0...",
        ]
    );
}

#[rstest]
fn published_bytes_match_the_source(harness: Harness) {
    let source = upstream();
    let destination = InMemoryFeed::new("mirror");

    let (result, _) = harness.run(&source, &destination, &["1.1.0"]);

    result.expect("transfer succeeds");
    let published = destination.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].payload, InMemoryFeed::payload_for(PACKAGE, "1.1.0"));
}

#[rstest]
fn scratch_files_are_isolated_and_removed(harness: Harness) {
    let source = upstream();
    let destination = InMemoryFeed::new("mirror");

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0"]);

    result.expect("transfer succeeds");
    let published = destination.published();
    assert!(published.iter().all(|artefact| artefact.existed));
    assert!(
        published
            .iter()
            .all(|artefact| artefact.path.starts_with(harness.scratch.path()))
    );
    assert_ne!(published[0].path, published[1].path);
    assert!(harness.scratch_is_empty());
}

#[rstest]
fn publish_failure_stops_before_the_next_version(harness: Harness) {
    let source = upstream();
    let destination = InMemoryFeed::new("mirror").failing_publish_on(2);

    let (result, lines) = harness.run(&source, &destination, &["1.0.0", "1.1.0", "2.0.0"]);

    let err = result.expect_err("second publish fails");
    assert!(
        matches!(err, MirrorError::PublishFailure { ref identity, .. } if identity.version().as_str() == "1.1.0")
    );
    assert_eq!(destination.published_versions(), ["1.0.0"]);
    assert_eq!(source.download_calls(), 2);
    assert_eq!(lines.len(), 2);
    assert!(harness.scratch_is_empty());
}

#[rstest]
fn download_failure_aborts_by_default(harness: Harness) {
    let source = upstream().failing_download_on(1);
    let destination = InMemoryFeed::new("mirror");

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0"]);

    let err = result.expect_err("download fails");
    assert!(matches!(err, MirrorError::DownloadFailure { .. }));
    assert_eq!(err.class(), crate::error::ErrorClass::Transient);
    assert_eq!(destination.publish_calls(), 0);
    assert!(harness.scratch_is_empty());
}

#[rstest]
fn download_failure_can_be_skipped(mut harness: Harness) {
    harness.options.on_download_failure = DownloadFailurePolicy::Skip;
    let source = upstream().failing_download_on(1);
    let destination = InMemoryFeed::new("mirror");

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0"]);

    let report = result.expect("run continues past the skipped version");
    assert_eq!(versions_of(&report.skipped), ["1.0.0"]);
    assert_eq!(versions_of(&report.mirrored), ["1.1.0"]);
    assert!(harness.scratch_is_empty());
}

#[rstest]
fn duplicate_publish_counts_as_present(harness: Harness) {
    let source = upstream();
    let destination = InMemoryFeed::new("mirror").with_versions(PACKAGE, &["1.1.0"]);

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0", "2.0.0"]);

    let report = result.expect("duplicates are tolerated");
    assert_eq!(versions_of(&report.mirrored), ["1.0.0", "2.0.0"]);
    assert_eq!(versions_of(&report.already_present), ["1.1.0"]);
}

#[rstest]
fn duplicate_publish_fails_when_requested(mut harness: Harness) {
    harness.options.on_duplicate = DuplicatePolicy::Fail;
    let source = upstream();
    let destination = InMemoryFeed::new("mirror").with_versions(PACKAGE, &["1.0.0"]);

    let (result, _) = harness.run(&source, &destination, &["1.0.0"]);

    let err = result.expect_err("duplicate is fatal");
    assert!(matches!(
        err,
        MirrorError::PublishFailure {
            source: FeedError::AlreadyExists { .. },
            ..
        }
    ));
}

#[rstest]
fn unauthorised_publish_needs_operator_action(harness: Harness) {
    let source = upstream();
    let destination = InMemoryFeed::new("mirror").rejecting_credentials();

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0"]);

    let err = result.expect_err("bad key");
    assert_eq!(err.class(), crate::error::ErrorClass::OperatorAction);
    assert_eq!(destination.publish_calls(), 1);
}

#[rstest]
fn cancelled_run_starts_nothing(harness: Harness) {
    harness.cancel.cancel();
    let source = upstream();
    let destination = InMemoryFeed::new("mirror");

    let (result, lines) = harness.run(&source, &destination, &["1.0.0"]);

    assert!(matches!(result, Err(MirrorError::Cancelled)));
    assert_eq!(source.download_calls(), 0);
    assert!(lines.is_empty());
}

#[rstest]
fn cancellation_after_download_skips_publish(harness: Harness) {
    let token = harness.cancel.clone();
    let mut source = MockFeedClient::new();
    source
        .expect_endpoint()
        .return_const(FeedEndpoint::new("upstream", "https://upstream.test/v3/index.json", None));
    source
        .expect_download_package()
        .times(1)
        .returning(move |_, dest| {
            token.cancel();
            dest.write_all(b"serilog/1.0.0")?;
            Ok(13)
        });
    let destination = InMemoryFeed::new("mirror");

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0"]);

    assert!(matches!(result, Err(MirrorError::Cancelled)));
    assert_eq!(destination.publish_calls(), 0);
    assert!(harness.scratch_is_empty());
}

fn mock_upstream() -> MockFeedClient {
    let mut source = MockFeedClient::new();
    source
        .expect_endpoint()
        .return_const(FeedEndpoint::new("upstream", "https://upstream.test/v3/index.json", None));
    source
}

/// Source that streams 100 chunks and cancels `token` after the first.
fn chunked_source_cancelling_after_first(
    token: CancellationToken,
    accepted: Arc<AtomicUsize>,
) -> MockFeedClient {
    let mut source = mock_upstream();
    source
        .expect_download_package()
        .times(1)
        .returning(move |_, dest| {
            let chunk = [0_u8; 1024];
            for _ in 0..100 {
                dest.write_all(&chunk)?;
                accepted.fetch_add(1, Ordering::SeqCst);
                token.cancel();
            }
            Ok(100 * 1024)
        });
    source
}

#[rstest]
fn cancellation_stops_a_download_in_progress(harness: Harness) {
    let accepted = Arc::new(AtomicUsize::new(0));
    let source = chunked_source_cancelling_after_first(harness.cancel.clone(), Arc::clone(&accepted));
    let destination = InMemoryFeed::new("mirror");

    let (result, _) = harness.run(&source, &destination, &["1.0.0"]);

    assert!(matches!(result, Err(MirrorError::Cancelled)));
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert_eq!(destination.publish_calls(), 0);
    assert!(harness.scratch_is_empty());
}

#[rstest]
fn skip_policy_does_not_hide_local_download_faults(mut harness: Harness) {
    harness.options.on_download_failure = DownloadFailurePolicy::Skip;
    let accepted = Arc::new(AtomicUsize::new(0));
    let source = chunked_source_cancelling_after_first(harness.cancel.clone(), accepted);
    let destination = InMemoryFeed::new("mirror");

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0"]);

    assert!(matches!(result, Err(MirrorError::Cancelled)));
    assert_eq!(destination.publish_calls(), 0);
}

#[rstest]
fn unreadable_scratch_file_at_publish_is_scratch_io(harness: Harness) {
    let source = upstream();
    let mut destination = MockFeedClient::new();
    destination
        .expect_endpoint()
        .return_const(FeedEndpoint::new("mirror", "https://mirror.test/v3/index.json", None));
    destination
        .expect_publish_package()
        .times(1)
        .returning(|path, _, _| {
            Err(FeedError::PackageFile {
                path: path.to_path_buf(),
                source: std::io::Error::other("input/output error"),
            })
        });

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0"]);

    let err = result.expect_err("publish cannot read the file");
    assert!(matches!(err, MirrorError::ScratchIo { .. }), "{err:?}");
    assert_eq!(err.class(), crate::error::ErrorClass::OperatorAction);
    assert_eq!(source.download_calls(), 1);
    assert!(harness.scratch_is_empty());
}

#[rstest]
fn server_error_on_publish_is_safe_to_rerun(harness: Harness) {
    let source = upstream();
    let destination = InMemoryFeed::new("mirror").unavailable_publish_on(2);

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0", "2.0.0"]);

    let err = result.expect_err("second publish fails");
    assert_eq!(err.class(), crate::error::ErrorClass::Transient);
    assert_eq!(destination.published_versions(), ["1.0.0"]);
    assert_eq!(source.download_calls(), 2);
}

#[rstest]
fn rejected_publish_needs_operator_action(harness: Harness) {
    let source = upstream();
    let destination = InMemoryFeed::new("mirror").failing_publish_on(1);

    let (result, _) = harness.run(&source, &destination, &["1.0.0"]);

    let err = result.expect_err("publish rejected");
    assert_eq!(err.class(), crate::error::ErrorClass::OperatorAction);
}

#[rstest]
#[case::two_workers(2)]
#[case::more_workers_than_versions(8)]
fn parallel_transfers_keep_report_order(mut harness: Harness, #[case] workers: usize) {
    harness.options.concurrency = NonZeroUsize::new(workers).expect("non-zero");
    let source = upstream();
    let destination = InMemoryFeed::new("mirror");

    let (result, lines) = harness.run(&source, &destination, &["1.0.0", "1.1.0", "2.0.0"]);

    let report = result.expect("transfer succeeds");
    assert_eq!(versions_of(&report.mirrored), ["1.0.0", "1.1.0", "2.0.0"]);
    let mut published = destination.published_versions();
    published.sort();
    assert_eq!(published, ["1.0.0", "1.1.0", "2.0.0"]);
    assert_eq!(lines.len(), 3);
    assert!(harness.scratch_is_empty());
}

#[rstest]
fn parallel_failure_is_reported(mut harness: Harness) {
    harness.options.concurrency = NonZeroUsize::new(2).expect("non-zero");
    let source = upstream();
    let destination = InMemoryFeed::new("mirror").rejecting_credentials();

    let (result, _) = harness.run(&source, &destination, &["1.0.0", "1.1.0", "2.0.0"]);

    let err = result.expect_err("publishes are rejected");
    assert!(matches!(err, MirrorError::PublishFailure { .. }));
    assert!(destination.publish_calls() <= 2);
    assert!(harness.scratch_is_empty());
}
