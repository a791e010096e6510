//! Run configuration from CLI arguments and environment variables.

use std::{ffi::OsString, path::PathBuf};

use clap::{value_parser, Arg, ArgMatches, Command};

use crate::Result;

/// Options shared by profilers, usually set by whoever launches the program.
///
/// | Option          | CLI argument    | Environment variable |
/// |-----------------|-----------------|----------------------|
/// | [`repeat`]      | `--repeat`      | `STINT_REPEAT`       |
/// | [`out`]         | `--out`         | `STINT_OUT`          |
/// | [`line_filter`] | `--line-filter` | `STINT_LINE_FILTER`  |
///
/// [`repeat`]: Self::repeat
/// [`out`]: Self::out
/// [`line_filter`]: Self::line_filter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Number of trials. At least 1.
    pub repeat: u32,

    /// Report file. Reports go to standard error if unset.
    pub out: Option<PathBuf>,

    /// Regex selecting which files line tracing reports.
    pub line_filter: Option<String>,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self { repeat: 1, out: None, line_filter: None }
    }
}

fn command() -> Command {
    Command::new("stint")
        .arg(
            Arg::new("repeat")
                .long("repeat")
                .env("STINT_REPEAT")
                .value_name("N")
                .help("Number of trials per profiling session")
                .value_parser(value_parser!(u32).range(1..))
                .default_value("1"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .env("STINT_OUT")
                .value_name("PATH")
                .help("Write reports to PATH instead of stderr; a .csv extension selects CSV")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("line-filter")
                .long("line-filter")
                .env("STINT_LINE_FILTER")
                .value_name("REGEX")
                .help("Only trace lines in files matching REGEX"),
        )
}

impl Config {
    /// Parses the process arguments, exiting with usage on error.
    pub fn from_args() -> Self {
        let mut command = command();
        let matches = command.get_matches_mut();

        match Self::from_matches(&matches) {
            Ok(config) => config,
            Err(error) => {
                let kind = clap::error::ErrorKind::ValueValidation;
                command.error(kind, error).exit();
            }
        }
    }

    /// Parses `args`, whose first item is the program name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) on invalid arguments
    /// and [`Error::Filter`](crate::Error::Filter) on an invalid line filter.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        Self::from_matches(&matches)
    }

    fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let line_filter = matches.get_one::<String>("line-filter").cloned();

        // Fail at parse time on a bad pattern.
        if let Some(pattern) = &line_filter {
            regex::Regex::new(pattern)?;
        }

        Ok(Self {
            repeat: matches.get_one::<u32>("repeat").copied().unwrap_or(1),
            out: matches.get_one::<PathBuf>("out").cloned(),
            line_filter,
        })
    }
}
