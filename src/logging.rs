//! Logger initialisation for the CLI.

use log::LevelFilter;

/// Map `-v`/`-q` flags to a level filter.
///
/// # Examples
///
/// ```
/// use log::LevelFilter;
/// use nuget_mirror::logging::level_for;
///
/// assert_eq!(level_for(0, false), LevelFilter::Warn);
/// assert_eq!(level_for(2, false), LevelFilter::Debug);
/// assert_eq!(level_for(3, true), LevelFilter::Error);
/// ```
#[must_use]
pub const fn level_for(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install `env_logger` on stderr at the level chosen by the flags.
///
/// Directives in `RUST_LOG` override the flag-derived level. Calling this
/// more than once keeps the first logger.
pub fn init(verbosity: u8, quiet: bool) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level_for(verbosity, quiet))
        .target(env_logger::Target::Stderr);
    if let Ok(directives) = std::env::var("RUST_LOG") {
        builder.parse_filters(&directives);
    }
    if builder.try_init().is_err() {
        log::debug!("logger already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default(0, false, LevelFilter::Warn)]
    #[case::verbose(1, false, LevelFilter::Info)]
    #[case::very_verbose(2, false, LevelFilter::Debug)]
    #[case::trace(3, false, LevelFilter::Trace)]
    #[case::saturates(9, false, LevelFilter::Trace)]
    #[case::quiet(0, true, LevelFilter::Error)]
    #[case::quiet_wins(2, true, LevelFilter::Error)]
    fn flags_map_to_levels(
        #[case] verbosity: u8,
        #[case] quiet: bool,
        #[case] expected: LevelFilter,
    ) {
        assert_eq!(level_for(verbosity, quiet), expected);
    }
}
