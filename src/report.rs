//! The report model handed to sinks.

use std::fmt;

use crate::{
    stats::{SampleStore, Stats},
    Error, Result,
};

/// Code text shown for lines whose source could not be read.
pub const SOURCE_UNAVAILABLE: &str = "<source unavailable>";

/// What a report's samples measure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Measure {
    /// Elapsed seconds.
    Time,

    /// Bytes.
    Memory,
}

impl Measure {
    /// Leading words of report titles.
    pub fn report_name(self) -> &'static str {
        match self {
            Self::Time => "Timing report",
            Self::Memory => "Memory usage report",
        }
    }
}

/// How a report's body is shaped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    SingleValue,
    Statistical,
    PerLine,
}

/// The name and formatted arguments of the profiled unit of work.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subject {
    name: String,
    arguments: Vec<(String, String)>,
}

impl Subject {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), arguments: Vec::new() }
    }

    /// Appends an argument. Arguments keep insertion order.
    pub fn arg(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.arguments.push((key.into(), value.to_string()));
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn arguments(&self) -> &[(String, String)] {
        &self.arguments
    }

    /// Arguments as `k1=v1,k2=v2`.
    pub fn arguments_text(&self) -> String {
        let mut text = String::new();
        for (i, (key, value)) in self.arguments.iter().enumerate() {
            if i > 0 {
                text.push(',');
            }
            text.push_str(key);
            text.push('=');
            text.push_str(value);
        }
        text
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}({})", self.name, self.arguments_text())
    }
}

/// Aggregated observations of one source line.
#[derive(Clone, Debug, PartialEq)]
pub struct LineRecord {
    pub file: String,
    pub line: u32,

    /// Dedented source text, or `None` if the source could not be read.
    pub code: Option<String>,

    pub total: f64,
    pub avg: f64,
    pub count: usize,
}

impl LineRecord {
    /// Source text, or a placeholder if unavailable.
    #[inline]
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or(SOURCE_UNAVAILABLE)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    /// The raw value of a single-sample session.
    Single(f64),

    /// Statistics over every trial, plus the trial values in trial order.
    Statistical { stats: Stats, trials: Vec<f64> },

    /// One record per observed line, ascending by (file, line).
    PerLine {
        /// The file in which tracing started.
        file: Option<String>,
        lines: Vec<LineRecord>,
    },
}

/// The outcome of one profiling session.
///
/// Created once at the end of a session and consumed once by
/// [`output::emit`](crate::output::emit).
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub measure: Measure,
    pub subject: Option<Subject>,
    pub body: Body,
}

impl Report {
    #[inline]
    pub fn single(measure: Measure, value: f64) -> Self {
        Self { measure, subject: None, body: Body::Single(value) }
    }

    /// Builds a report from per-trial samples.
    ///
    /// A single sample yields [`Mode::SingleValue`], more yield
    /// [`Mode::Statistical`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InsufficientData`] if there are no samples.
    pub fn from_trials(measure: Measure, samples: &SampleStore<u32>) -> Result<Self> {
        let trials = samples.values();

        let body = match trials.as_slice() {
            [] => return Err(Error::InsufficientData),
            &[value] => Body::Single(value),
            _ => Body::Statistical { stats: Stats::compute(&trials)?, trials },
        };

        Ok(Self { measure, subject: None, body })
    }

    #[inline]
    pub fn per_line(measure: Measure, file: Option<String>, lines: Vec<LineRecord>) -> Self {
        Self { measure, subject: None, body: Body::PerLine { file, lines } }
    }

    #[inline]
    pub fn with_subject(mut self, subject: Option<Subject>) -> Self {
        self.subject = subject;
        self
    }

    pub fn mode(&self) -> Mode {
        match self.body {
            Body::Single(_) => Mode::SingleValue,
            Body::Statistical { .. } => Mode::Statistical,
            Body::PerLine { .. } => Mode::PerLine,
        }
    }

    /// Values of every trial, in trial order. Empty for per-line reports.
    pub fn trial_values(&self) -> &[f64] {
        match &self.body {
            Body::Single(value) => std::slice::from_ref(value),
            Body::Statistical { trials, .. } => trials,
            Body::PerLine { .. } => &[],
        }
    }

    /// E.g. `Timing report for function fib(n=20)`.
    pub fn title(&self) -> String {
        let mut title = self.measure.report_name().to_owned();

        if let Some(subject) = &self.subject {
            title.push_str(&format!(" for function {subject}"));
        }

        if let Body::PerLine { file: Some(file), .. } = &self.body {
            title.push_str(&format!(" for code in file '{file}'"));
        }

        title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_rendering() {
        let subject = Subject::new("fib").arg("n", 20).arg("memo", true);

        assert_eq!(subject.to_string(), "fib(n=20,memo=true)");
        assert_eq!(subject.arguments_text(), "n=20,memo=true");
        assert_eq!(Subject::new("main").to_string(), "main()");
    }

    #[test]
    fn mode_follows_sample_count() {
        let mut samples = SampleStore::default();
        assert!(matches!(
            Report::from_trials(Measure::Time, &samples),
            Err(Error::InsufficientData)
        ));

        samples.push(1, 0.5);
        let report = Report::from_trials(Measure::Time, &samples).unwrap();
        assert_eq!(report.mode(), Mode::SingleValue);
        assert_eq!(report.trial_values(), [0.5]);

        samples.push(2, 1.5);
        let report = Report::from_trials(Measure::Time, &samples).unwrap();
        assert_eq!(report.mode(), Mode::Statistical);
        assert_eq!(report.trial_values(), [0.5, 1.5]);

        let Body::Statistical { stats, .. } = report.body else { panic!("{report:?}") };
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn titles() {
        let report = Report::single(Measure::Time, 1.0);
        assert_eq!(report.title(), "Timing report");

        let subject = Subject::new("load").arg("n", 3);
        let report = Report::single(Measure::Memory, 1.0).with_subject(Some(subject));
        assert_eq!(report.title(), "Memory usage report for function load(n=3)");

        let report = Report::per_line(Measure::Time, Some("src/main.rs".into()), Vec::new());
        assert_eq!(report.title(), "Timing report for code in file 'src/main.rs'");
        assert_eq!(report.mode(), Mode::PerLine);
        assert!(report.trial_values().is_empty());
    }

    #[test]
    fn unavailable_code() {
        let record =
            LineRecord { file: "x.rs".into(), line: 1, code: None, total: 0.0, avg: 0.0, count: 1 };
        assert_eq!(record.code(), SOURCE_UNAVAILABLE);
    }
}
