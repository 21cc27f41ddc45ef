//! Operator-facing text for the mirror CLI.
//!
//! Progress and summaries go to stdout; errors go to stderr. Writes are best
//! effort, a closed pipe never fails the run.

use std::fmt::Display;
use std::io::Write;

use nuget_feed::package::PackageIdentity;

use crate::error::MirrorError;
use crate::pipeline::MirrorReport;

/// Final line printed by a successful run.
pub const COMPLETE: &str = "Complete.";

/// Progress line written before a version is transferred.
///
/// # Example
///
/// ```
/// use nuget_feed::package::{PackageId, PackageIdentity, PackageVersion};
/// use nuget_mirror::output::progress_line;
///
/// let identity = PackageIdentity::new(PackageId::from("Serilog"), PackageVersion::from("2.0.0"));
/// assert_eq!(progress_line(&identity), "Mirroring Serilog.2.0.0...");
/// ```
#[must_use]
pub fn progress_line(identity: &PackageIdentity) -> String {
    format!("Mirroring {identity}...")
}

/// Line written for each missing version in a dry run.
#[must_use]
pub fn dry_run_line(identity: &PackageIdentity) -> String {
    format!("Would mirror {identity}")
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 { one } else { many }
}

/// Summary lines for a finished run.
#[must_use]
pub fn summary_lines(report: &MirrorReport) -> Vec<String> {
    let missing = report.missing.len();
    let mut lines = vec![format!(
        "{}: {} source {}, {} at destination, {} missing",
        report.package,
        report.source_count,
        plural(report.source_count, "version", "versions"),
        report.destination_count,
        missing,
    )];
    if report.dry_run {
        return lines;
    }

    let transfer = &report.transfer;
    lines.push(format!(
        "Mirrored {} {}",
        transfer.mirrored.len(),
        plural(transfer.mirrored.len(), "version", "versions")
    ));
    if !transfer.already_present.is_empty() {
        lines.push(format!(
            "Already present at destination: {}",
            join_versions(&transfer.already_present)
        ));
    }
    if !transfer.skipped.is_empty() {
        lines.push(format!(
            "Skipped after download failure: {}",
            join_versions(&transfer.skipped)
        ));
    }
    lines
}

fn join_versions(identities: &[PackageIdentity]) -> String {
    identities
        .iter()
        .map(|identity| identity.version().as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Write a run failure as `error: ...` followed by a hint.
pub fn write_error(stderr: &mut dyn Write, err: &MirrorError) {
    write_line(stderr, format!("error: {err}"));
    write_line(stderr, format!("hint: {}", err.hint()));
}

/// Write one line, ignoring write failures.
pub fn write_line(out: &mut dyn Write, message: impl Display) {
    if writeln!(out, "{message}").is_err() {
        // Best-effort output; a closed pipe is not a run failure.
    }
}
