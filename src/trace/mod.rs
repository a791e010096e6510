//! Per-line tracing.
//!
//! A [`LineTracer`] attaches a recorder to a [`LineEventSource`]. Every line
//! event closes the interval opened by the previous event and opens a new one,
//! so the time (or memory) spent between two events is charged to the line of
//! the earlier event.
//!
//! Events are raised by instrumented code only; the entry point used by the
//! macros is not part of the public API:
//!
//! ```compile_fail
//! stint::trace::line_event(file!(), line!(), "");
//! ```

use std::{cell::RefCell, fmt, rc::Rc};

use regex::Regex;

use crate::{
    output::{self, Target},
    report::{Body, LineRecord, Report, Subject},
    stats::{SampleStore, Stats},
    time::{Clock, MonotonicClock},
    trial::{Elapsed, Probe},
    Result,
};

pub(crate) mod hook;
mod source;

pub use hook::{Instrumented, LineEventSink, LineEventSource, LineSite};

use source::SourceCache;

/// A source line, ordered by file then line number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineKey {
    pub file: &'static str,
    pub line: u32,
}

/// Profiles a block line by line.
///
/// # Examples
///
/// ```
/// let tracer = stint::LineTracer::new();
///
/// let mut out = Vec::new();
/// let sum = tracer.trace(&mut out, || stint::traced! {
///     let mut sum = 0;
///     for i in 0..10 {
///         sum += i;
///     }
///     sum
/// })?;
///
/// assert_eq!(sum, 45);
/// # Ok::<_, stint::Error>(())
/// ```
pub struct LineTracer<S = Instrumented, P = Elapsed<MonotonicClock>> {
    source: S,
    probe: P,
    filter: Option<Regex>,
    subject: Option<Subject>,
}

impl<S: fmt::Debug, P: fmt::Debug> fmt::Debug for LineTracer<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LineTracer")
            .field("source", &self.source)
            .field("probe", &self.probe)
            .field("filter", &self.filter.as_ref().map(Regex::as_str))
            .field("subject", &self.subject)
            .finish()
    }
}

impl Default for LineTracer {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl LineTracer {
    /// Times code instrumented with [`#[stint::lines]`](macro@crate::lines)
    /// and [`traced!`](crate::traced).
    #[inline]
    pub fn new() -> Self {
        Self {
            source: Instrumented,
            probe: Elapsed(MonotonicClock),
            filter: None,
            subject: None,
        }
    }
}

impl<S, P> LineTracer<S, P> {
    /// Reads time from `clock`.
    #[inline]
    pub fn with_clock<C: Clock>(self, clock: C) -> LineTracer<S, Elapsed<C>> {
        self.with_probe(Elapsed(clock))
    }

    /// Attributes readings of `probe` to lines, such as
    /// [`Allocated`](crate::Allocated) memory.
    #[inline]
    pub fn with_probe<P2: Probe>(self, probe: P2) -> LineTracer<S, P2> {
        LineTracer { source: self.source, probe, filter: self.filter, subject: self.subject }
    }

    /// Receives line events from `source`.
    #[inline]
    pub fn with_source<S2: LineEventSource>(self, source: S2) -> LineTracer<S2, P> {
        LineTracer { source, probe: self.probe, filter: self.filter, subject: self.subject }
    }

    /// Ignores events from files whose `file!()` path does not match
    /// `pattern`. Time spent in ignored files is charged to the calling line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filter`](crate::Error::Filter) if `pattern` is not a
    /// valid regex.
    pub fn only_files(mut self, pattern: &str) -> Result<Self> {
        self.filter = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Names the traced code in report titles.
    #[inline]
    pub fn subject(mut self, subject: impl Into<Option<Subject>>) -> Self {
        self.subject = subject.into();
        self
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[inline]
    pub fn probe(&self) -> &P {
        &self.probe
    }
}

impl<S, P> LineTracer<S, P>
where
    S: LineEventSource,
    P: Probe + Clone + 'static,
{
    /// Starts tracing on the current thread.
    ///
    /// The report is emitted to `target` when the returned session finishes
    /// or is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TraceAttachmentConflict`](crate::Error::TraceAttachmentConflict)
    /// if another session is tracing this thread.
    pub fn run<'t>(&self, target: impl Into<Target<'t>>) -> Result<LineSession<'_, 't, S>> {
        let recorder = Rc::new(Recorder {
            probe: self.probe.clone(),
            filter: self.filter.clone(),
            state: RefCell::default(),
        });

        self.source.attach(recorder.clone())?;
        tracing::debug!(filter = ?self.filter.as_ref().map(Regex::as_str), "attached line tracer");

        Ok(LineSession {
            source: &self.source,
            recorder,
            target: Some(target.into()),
            subject: self.subject.clone(),
        })
    }

    /// Traces `f` and emits the report to `target`.
    ///
    /// If `f` panics, the report of the lines traced so far is still emitted.
    pub fn trace<'t, T>(&self, target: impl Into<Target<'t>>, f: impl FnOnce() -> T) -> Result<T> {
        let session = self.run(target)?;
        let output = f();
        session.finish()?;
        Ok(output)
    }
}

/// A running trace, ended by [`finish`](Self::finish) or by dropping.
#[must_use = "tracing ends when the session is dropped"]
pub struct LineSession<'s, 't, S: LineEventSource> {
    source: &'s S,
    recorder: Rc<dyn SessionRecorder>,
    target: Option<Target<'t>>,
    subject: Option<Subject>,
}

impl<S: LineEventSource> LineSession<'_, '_, S> {
    /// Stops tracing, then builds and emits the report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub fn finish(mut self) -> Result<Report> {
        self.end()
    }

    fn end(&mut self) -> Result<Report> {
        self.source.detach();
        let report = self.recorder.finish().with_subject(self.subject.take());
        tracing::debug!(lines = report_lines(&report), "detached line tracer");

        if let Some(target) = self.target.take() {
            output::emit(&report, target)?;
        }

        Ok(report)
    }
}

impl<S: LineEventSource> Drop for LineSession<'_, '_, S> {
    fn drop(&mut self) {
        if self.target.is_none() {
            return;
        }

        if let Err(error) = self.end() {
            tracing::error!(%error, "failed to emit line report");
        }
    }
}

fn report_lines(report: &Report) -> usize {
    match &report.body {
        Body::PerLine { lines, .. } => lines.len(),
        _ => 0,
    }
}

/// Type-erased recorder so that sessions are not generic over the probe.
trait SessionRecorder: LineEventSink {
    fn finish(&self) -> Report;
}

struct Recorder<P> {
    probe: P,
    filter: Option<Regex>,
    state: RefCell<RecorderState>,
}

#[derive(Default)]
struct RecorderState {
    /// The line whose interval is open, and the reading it opened with.
    pending: Option<(LineKey, f64)>,

    /// The first traced file.
    root_file: Option<&'static str>,

    samples: SampleStore<LineKey>,
    sources: SourceCache,
}

impl RecorderState {
    #[inline]
    fn close_pending(&mut self, now: f64) {
        if let Some((key, start)) = self.pending.take() {
            self.samples.push(key, now - start);
        }
    }
}

impl<P: Probe> LineEventSink for Recorder<P> {
    fn line_entered(&self, site: LineSite) {
        let now = self.probe.read();

        let Ok(mut state) = self.state.try_borrow_mut() else { return };

        let traced = self.filter.as_ref().map_or(true, |filter| filter.is_match(site.file));
        if traced {
            state.close_pending(now);
            state.root_file.get_or_insert(site.file);
            state.sources.register(site.file, site.root);
        }

        // Bookkeeping above is excluded from the next interval.
        let resume = self.probe.read();

        if traced {
            state.pending = Some((LineKey { file: site.file, line: site.line }, resume));
        } else if let Some((_, start)) = &mut state.pending {
            *start += resume - now;
        }
    }
}

impl<P: Probe> SessionRecorder for Recorder<P> {
    fn finish(&self) -> Report {
        let now = self.probe.read();

        let mut state = self.state.borrow_mut();
        state.close_pending(now);

        let state = &*state;
        let mut lines = Vec::with_capacity(state.samples.key_count());

        // Keys are ordered by file, so each file's lines are contiguous.
        let mut file_start = 0;
        let keys: Vec<(&LineKey, &[f64])> = state.samples.iter().collect();
        while file_start < keys.len() {
            let file = keys[file_start].0.file;
            let file_end = keys[file_start..]
                .iter()
                .position(|(key, _)| key.file != file)
                .map_or(keys.len(), |i| file_start + i);
            let group = &keys[file_start..file_end];

            let numbers: Vec<u32> = group.iter().map(|(key, _)| key.line).collect();
            let snippets = state.sources.snippets(file, &numbers);

            for ((key, samples), code) in group.iter().zip(snippets) {
                // Keys yielded by the store always have samples.
                let Ok(stats) = Stats::compute(samples) else { continue };
                let summary = stats.line_summary();

                lines.push(LineRecord {
                    file: key.file.to_owned(),
                    line: key.line,
                    code,
                    total: summary.total,
                    avg: summary.avg,
                    count: summary.count,
                });
            }

            file_start = file_end;
        }

        Report::per_line(P::MEASURE, state.root_file.map(str::to_owned), lines)
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{catch_unwind, AssertUnwindSafe};

    use crate::{report::Measure, time::ManualClock, Error};

    use super::hook::line_event;

    use super::*;

    fn lines(report: &Report) -> Vec<(u32, usize, f64)> {
        let Body::PerLine { lines, .. } = &report.body else { panic!("{report:?}") };
        lines.iter().map(|r| (r.line, r.count, r.total)).collect()
    }

    /// Scripted event source for driving a tracer without instrumentation.
    #[derive(Default)]
    struct Script {
        sink: RefCell<Option<Rc<dyn LineEventSink>>>,
    }

    impl Script {
        fn emit(&self, file: &'static str, line: u32) {
            let sink = self.sink.borrow().clone();
            if let Some(sink) = sink {
                sink.line_entered(LineSite { file, line, root: "" });
            }
        }
    }

    impl LineEventSource for Script {
        fn attach(&self, sink: Rc<dyn LineEventSink>) -> Result<()> {
            let mut slot = self.sink.borrow_mut();
            if slot.is_some() {
                return Err(Error::TraceAttachmentConflict);
            }
            *slot = Some(sink);
            Ok(())
        }

        fn detach(&self) {
            self.sink.borrow_mut().take();
        }
    }

    #[test]
    fn intervals_close_on_next_event() {
        let clock = ManualClock::new();
        let tracer = LineTracer::new().with_clock(clock.clone());

        let mut out = Vec::new();
        let session = tracer.run(&mut out).unwrap();

        line_event("a.rs", 1, "");
        clock.advance(1.0);
        for _ in 0..3 {
            line_event("a.rs", 2, "");
            clock.advance(0.5);
        }
        line_event("a.rs", 3, "");
        clock.advance(0.25);

        let report = session.finish().unwrap();

        assert_eq!(lines(&report), [(1, 1, 1.0), (2, 3, 1.5), (3, 1, 0.25)]);
        assert_eq!(report.measure, Measure::Time);
        assert!(String::from_utf8(out).unwrap().contains("Timing report for code in file 'a.rs'"));
    }

    #[test]
    fn lines_sorted_by_file_then_line() {
        let tracer = LineTracer::new().with_clock(ManualClock::new());

        let session = tracer.run(Target::Discard).unwrap();
        line_event("b.rs", 1, "");
        line_event("a.rs", 9, "");
        line_event("a.rs", 2, "");
        let report = session.finish().unwrap();

        let Body::PerLine { file, lines } = &report.body else { panic!() };
        assert_eq!(file.as_deref(), Some("b.rs"));

        let keys: Vec<(&str, u32)> = lines.iter().map(|r| (r.file.as_str(), r.line)).collect();
        assert_eq!(keys, [("a.rs", 2), ("a.rs", 9), ("b.rs", 1)]);
        assert!(lines.iter().all(|r| r.code.is_none()));
    }

    #[test]
    fn filtered_files_fold_into_caller() {
        let clock = ManualClock::new();
        let tracer = LineTracer::new().with_clock(clock.clone()).only_files(r"^main\.rs$").unwrap();

        let session = tracer.run(Target::Discard).unwrap();
        line_event("main.rs", 1, "");
        clock.advance(1.0);
        line_event("dep.rs", 40, "");
        clock.advance(2.0);
        line_event("main.rs", 2, "");
        let report = session.finish().unwrap();

        assert_eq!(lines(&report), [(1, 1, 3.0), (2, 1, 0.0)]);
    }

    #[test]
    fn invalid_filter() {
        assert!(matches!(LineTracer::new().only_files("("), Err(Error::Filter(_))));
    }

    #[test]
    fn nested_session_conflicts() {
        let outer = LineTracer::new();
        let inner = LineTracer::new();

        let session = outer.run(Target::Discard).unwrap();
        assert!(matches!(inner.run(Target::Discard), Err(Error::TraceAttachmentConflict)));
        drop(session);

        inner.run(Target::Discard).unwrap().finish().unwrap();
    }

    #[test]
    fn sessions_do_not_share_samples() {
        let tracer = LineTracer::new().with_clock(ManualClock::new());

        for _ in 0..2 {
            let session = tracer.run(Target::Discard).unwrap();
            line_event("a.rs", 1, "");
            line_event("a.rs", 1, "");
            let report = session.finish().unwrap();

            assert_eq!(lines(&report), [(1, 2, 0.0)]);
        }
    }

    #[test]
    fn report_emitted_on_panic() {
        let clock = ManualClock::new();
        let tracer = LineTracer::new().with_clock(clock.clone());
        let mut out = Vec::new();

        let result = catch_unwind(AssertUnwindSafe(|| {
            tracer.trace(&mut out, || {
                line_event("a.rs", 1, "");
                clock.advance(2.0);
                line_event("a.rs", 2, "");
                panic!("traced code failed");
            })
        }));

        assert!(result.is_err());

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Line No."), "{out}");
        assert!(out.contains("2.000000"), "{out}");

        // The panic detached the session.
        LineTracer::new().run(Target::Discard).unwrap().finish().unwrap();
    }

    #[test]
    fn custom_source() {
        let clock = ManualClock::new();
        let tracer = LineTracer::new().with_source(Script::default()).with_clock(clock.clone());

        let session = tracer.run(Target::Discard).unwrap();
        tracer.source().emit("s.rs", 5);
        clock.advance(0.5);
        tracer.source().emit("s.rs", 6);

        // Not attached to instrumented code.
        line_event("a.rs", 1, "");

        let report = session.finish().unwrap();
        assert_eq!(lines(&report), [(5, 1, 0.5), (6, 1, 0.0)]);
    }

    #[test]
    fn subject_in_title() {
        let tracer = LineTracer::new().subject(Subject::new("work").arg("n", 2));

        let session = tracer.run(Target::Discard).unwrap();
        line_event("w.rs", 1, "");
        let report = session.finish().unwrap();

        assert_eq!(report.title(), "Timing report for function work(n=2) for code in file 'w.rs'");
    }
}
