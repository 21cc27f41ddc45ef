//! CLI argument definitions for `nuget-mirror`.
//!
//! The flags are defined with clap. Single-dash spellings of the four
//! required flags (`-package`, `-source`, `-destination`, `-apikey`) are
//! accepted for compatibility with older scripts; [`normalise_legacy_args`]
//! rewrites them before clap parses the command line.

use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use nuget_feed::endpoint::ApiKey;
use nuget_feed::package::PackageId;

use crate::listing::RetryPolicy;
use crate::pipeline::{MirrorOptions, MirrorRequest};
use crate::transfer::{DownloadFailurePolicy, DuplicatePolicy, TransferOptions};

const LEGACY_FLAGS: [&str; 4] = ["package", "source", "destination", "apikey"];

/// Mirror every version of a NuGet package from one feed to another.
#[derive(Parser, Debug, Clone)]
#[command(name = "nuget-mirror")]
#[command(version, about)]
#[command(long_about = concat!(
    "Mirror every version of a NuGet package from one feed to another.\n\n",
    "Both feeds are named entries in feeds.toml. The versions at the source are ",
    "compared with those at the destination, and each missing version is ",
    "downloaded to a scratch file and published to the destination with the ",
    "given API key. Versions already at the destination are left alone, so ",
    "rerunning after a failure only transfers what is still missing.",
))]
#[command(after_help = concat!(
    "EXIT CODES:\n",
    "  0    all missing versions mirrored\n",
    "  2    operator action needed (configuration, credentials, rejection)\n",
    "  3    transient failure; safe to rerun\n",
    "  130  cancelled\n\n",
    "EXAMPLES:\n",
    "  Mirror a package into an internal feed:\n",
    "    $ nuget-mirror --package Serilog --source nuget.org --destination internal --apikey $KEY\n\n",
    "  Show what would be mirrored:\n",
    "    $ nuget-mirror --package Serilog --source nuget.org --destination internal --apikey x --dry-run",
))]
pub struct Cli {
    /// Package id to mirror.
    #[arg(long, value_name = "ID")]
    pub package: String,

    /// Name of the feed to copy from.
    #[arg(long, value_name = "FEED")]
    pub source: String,

    /// Name of the feed to copy to.
    #[arg(long, value_name = "FEED")]
    pub destination: String,

    /// API key for publishing to the destination.
    #[arg(long, value_name = "KEY", env = "NUGET_MIRROR_API_KEY", hide_env_values = true)]
    pub apikey: String,

    /// Feed configuration file [default: platform config dir]/nuget-mirror/feeds.toml.
    #[arg(long, value_name = "FILE", env = "NUGET_MIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for scratch package files [default: system temp dir].
    #[arg(long, value_name = "DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Maximum number of versions transferred at once.
    #[arg(long, value_name = "N", default_value = "1")]
    pub concurrency: NonZeroUsize,

    /// Attempts per version listing, including the first.
    #[arg(
        long,
        value_name = "N",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub list_retries: u32,

    /// Seconds allowed for each publish request.
    #[arg(
        long,
        value_name = "SECS",
        default_value_t = 600,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub publish_timeout: u64,

    /// What to do when a version cannot be downloaded.
    #[arg(long, value_enum, value_name = "POLICY", default_value_t = OnDownloadFailure::Abort)]
    pub on_download_failure: OnDownloadFailure,

    /// Fail when the destination already holds a version being published.
    #[arg(long)]
    pub fail_on_duplicate: bool,

    /// List and diff only; transfer nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[arg(
        short,
        long = "verbose",
        action = clap::ArgAction::Count,
        conflicts_with = "quiet"
    )]
    pub verbosity: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbosity")]
    pub quiet: bool,
}

/// CLI spelling of [`DownloadFailurePolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnDownloadFailure {
    /// Stop the run.
    Abort,
    /// Skip the version and continue.
    Skip,
}

impl From<OnDownloadFailure> for DownloadFailurePolicy {
    fn from(value: OnDownloadFailure) -> Self {
        match value {
            OnDownloadFailure::Abort => Self::Abort,
            OnDownloadFailure::Skip => Self::Skip,
        }
    }
}

impl Cli {
    /// Parse the process arguments, accepting legacy single-dash flags.
    #[must_use]
    pub fn parse_normalised() -> Self {
        Self::parse_from(normalise_legacy_args(std::env::args_os()))
    }

    /// The package and feeds this invocation names.
    #[must_use]
    pub fn request(&self) -> MirrorRequest {
        MirrorRequest {
            package: PackageId::new(self.package.trim()),
            source: self.source.clone(),
            destination: self.destination.clone(),
            api_key: ApiKey::new(self.apikey.clone()),
        }
    }

    /// Run options derived from the flags.
    #[must_use]
    pub fn mirror_options(&self) -> MirrorOptions {
        let defaults = TransferOptions::default();
        MirrorOptions {
            retry: RetryPolicy {
                max_attempts: self.list_retries,
                ..RetryPolicy::default()
            },
            transfer: TransferOptions {
                scratch_dir: self.scratch_dir.clone().unwrap_or(defaults.scratch_dir),
                concurrency: self.concurrency,
                publish_timeout: Duration::from_secs(self.publish_timeout),
                on_download_failure: self.on_download_failure.into(),
                on_duplicate: if self.fail_on_duplicate {
                    DuplicatePolicy::Fail
                } else {
                    DuplicatePolicy::TreatAsPresent
                },
            },
            dry_run: self.dry_run,
        }
    }
}

impl Default for Cli {
    /// Creates a `Cli` with empty names and every optional flag at its default.
    fn default() -> Self {
        Self {
            package: String::new(),
            source: String::new(),
            destination: String::new(),
            apikey: String::new(),
            config: None,
            scratch_dir: None,
            concurrency: NonZeroUsize::MIN,
            list_retries: 3,
            publish_timeout: 600,
            on_download_failure: OnDownloadFailure::Abort,
            fail_on_duplicate: false,
            dry_run: false,
            verbosity: 0,
            quiet: false,
        }
    }
}

/// Rewrite `-package`, `-source`, `-destination` and `-apikey` (with or
/// without `=value`) to their double-dash forms.
///
/// Arguments after a `--` terminator are left untouched.
///
/// # Examples
///
/// ```
/// use nuget_mirror::cli::normalise_legacy_args;
///
/// let args = normalise_legacy_args(["nuget-mirror", "-package", "Serilog", "-v"]);
/// assert_eq!(args, ["nuget-mirror", "--package", "Serilog", "-v"]);
/// ```
pub fn normalise_legacy_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    let mut terminated = false;
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if terminated {
                return arg;
            }
            if arg == "--" {
                terminated = true;
                return arg;
            }
            legacy_rewrite(&arg).unwrap_or(arg)
        })
        .collect()
}

fn legacy_rewrite(arg: &OsString) -> Option<OsString> {
    let text = arg.to_str()?;
    let body = text.strip_prefix('-')?;
    if body.starts_with('-') {
        return None;
    }
    let name = body.split_once('=').map_or(body, |(name, _)| name);
    LEGACY_FLAGS
        .contains(&name)
        .then(|| OsString::from(format!("-{text}")))
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
