//! `nuget-mirror` CLI entrypoint.
//!
//! Loads the feed configuration, mirrors the requested package and maps the
//! outcome to an exit code.

use std::io::Write;

use nuget_feed::config::{FeedConfig, resolve_config_path};
use nuget_feed::resolver::FeedResolver;
use nuget_mirror::cancel::CancellationToken;
use nuget_mirror::cli::Cli;
use nuget_mirror::error::Result;
use nuget_mirror::logging;
use nuget_mirror::output::{COMPLETE, summary_lines, write_error, write_line};
use nuget_mirror::pipeline::{FeedConnector, HttpConnector, MirrorReport, run_mirror};

fn main() {
    let cli = Cli::parse_normalised();
    logging::init(cli.verbosity, cli.quiet);

    let cancel = CancellationToken::new();
    if let Err(err) = cancel.cancel_on_signals() {
        log::warn!("could not install signal handlers: {err}");
    }

    let mut stdout = std::io::stdout().lock();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &HttpConnector, &cancel, &mut stdout);
    let exit_code = exit_code_for_run_result(run_result, &mut stdout, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(
    cli: &Cli,
    connector: &dyn FeedConnector,
    cancel: &CancellationToken,
    stdout: &mut dyn Write,
) -> Result<MirrorReport> {
    let config_path = resolve_config_path(cli.config.as_deref())?;
    let resolver = FeedResolver::new(FeedConfig::load(&config_path)?);
    run_mirror(
        &cli.request(),
        &resolver,
        connector,
        &cli.mirror_options(),
        cancel,
        stdout,
    )
}

fn exit_code_for_run_result(
    result: Result<MirrorReport>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> i32 {
    match result {
        Ok(report) => {
            for line in summary_lines(&report) {
                write_line(stdout, line);
            }
            write_line(stdout, COMPLETE);
            0
        }
        Err(err) => {
            log::debug!("run failed: {err:?}");
            write_error(stderr, &err);
            err.exit_code()
        }
    }
}
