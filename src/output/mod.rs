//! Writes reports to standard streams, caller streams or files.

use std::{
    fmt,
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{report::Report, Error, Result};

pub(crate) mod csv;
pub(crate) mod table;

/// Where a report is written.
#[derive(Default)]
pub enum Target<'a> {
    /// Standard error, as text.
    #[default]
    Stderr,

    /// Standard output, as text.
    Stdout,

    /// A caller-provided stream, as text.
    Stream(&'a mut dyn Write),

    /// A file, as CSV if the extension is `csv` and as text otherwise.
    ///
    /// Missing parent directories are created. Existing files are
    /// overwritten.
    Path(PathBuf),

    /// Nowhere. The report is only returned.
    Discard,
}

impl fmt::Debug for Target<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Stderr => f.write_str("Stderr"),
            Self::Stdout => f.write_str("Stdout"),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Discard => f.write_str("Discard"),
        }
    }
}

impl<'a, W: Write> From<&'a mut W> for Target<'a> {
    #[inline]
    fn from(stream: &'a mut W) -> Self {
        Self::Stream(stream)
    }
}

impl From<PathBuf> for Target<'_> {
    #[inline]
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<&Path> for Target<'_> {
    #[inline]
    fn from(path: &Path) -> Self {
        Self::Path(path.to_owned())
    }
}

impl From<&str> for Target<'_> {
    #[inline]
    fn from(path: &str) -> Self {
        Self::Path(path.into())
    }
}

impl From<String> for Target<'_> {
    #[inline]
    fn from(path: String) -> Self {
        Self::Path(path.into())
    }
}

/// `None` writes to standard error.
impl From<Option<PathBuf>> for Target<'_> {
    #[inline]
    fn from(path: Option<PathBuf>) -> Self {
        path.map_or(Self::Stderr, Self::Path)
    }
}

/// Rendering chosen for a target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Format {
    Text,
    Csv,
}

impl Format {
    fn of_path(path: &Path) -> Self {
        match path.extension() {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Self::Csv,
            _ => Self::Text,
        }
    }
}

/// Writes `report` to `target`.
///
/// # Errors
///
/// Returns [`Error::SinkUnavailable`] if a file target or its parent
/// directories cannot be created, and [`Error::Io`] if writing fails.
pub fn emit(report: &Report, target: Target<'_>) -> Result<()> {
    tracing::debug!(?target, mode = ?report.mode(), "emitting report");

    match target {
        Target::Stderr => write_report(report, Format::Text, &mut io::stderr().lock())?,
        Target::Stdout => write_report(report, Format::Text, &mut io::stdout().lock())?,
        Target::Stream(stream) => {
            write_report(report, Format::Text, stream)?;
            stream.flush()?;
        }
        Target::Path(path) => emit_file(report, &path)?,
        Target::Discard => {}
    }

    Ok(())
}

fn emit_file(report: &Report, path: &Path) -> Result<()> {
    let unavailable = |source| Error::SinkUnavailable { path: path.to_owned(), source };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        if !parent.is_dir() {
            tracing::debug!(dir = %parent.display(), "creating report directory");
            fs::create_dir_all(parent).map_err(unavailable)?;
        }
    }

    if path.exists() {
        tracing::debug!(path = %path.display(), "overwriting report file");
    }

    let file = File::create(path).map_err(unavailable)?;
    let mut writer = BufWriter::new(file);

    write_report(report, Format::of_path(path), &mut writer)?;
    writer.flush()?;

    Ok(())
}

fn write_report(report: &Report, format: Format, w: &mut dyn Write) -> io::Result<()> {
    match format {
        Format::Text => table::write(report, w),
        Format::Csv => csv::write(report, w),
    }
}
