//! Entry points that run code under a probe and emit the report.

use std::fmt;

use crate::{
    config::Config,
    memory::HeapProbe,
    output::{self, Target},
    report::{Report, Subject},
    time::{Clock, MonotonicClock},
    trace::{Instrumented, LineEventSource, LineTracer},
    trial::{Allocated, Elapsed, Probe, TrialError, Trials},
    BoxError, Error, Result,
};

/// Profiles a closure or a scope.
///
/// # Examples
///
/// ```
/// use stint::{Profiler, Subject};
///
/// let mut out = Vec::new();
/// let sum = Profiler::time()
///     .repeat(5)
///     .subject(Subject::new("sum").arg("n", 1000))
///     .out(&mut out)
///     .run(|| (0..1000u64).sum::<u64>())?;
///
/// assert_eq!(sum, 499500);
/// assert!(String::from_utf8(out).unwrap().contains("over 5 runs"));
/// # Ok::<_, stint::Error>(())
/// ```
pub struct Profiler<'t, P = Elapsed<MonotonicClock>> {
    probe: P,
    repeat: u32,
    target: Target<'t>,
    subject: Option<Subject>,
}

impl<P: fmt::Debug> fmt::Debug for Profiler<'_, P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Profiler")
            .field("probe", &self.probe)
            .field("repeat", &self.repeat)
            .field("target", &self.target)
            .field("subject", &self.subject)
            .finish()
    }
}

impl Profiler<'static> {
    /// Measures elapsed time.
    #[inline]
    pub fn time() -> Self {
        Self::with_probe_default(Elapsed(MonotonicClock))
    }
}

impl Profiler<'static, Allocated<HeapProbe>> {
    /// Measures net heap bytes allocated by the current thread.
    ///
    /// Requires [`AllocProfiler`](crate::AllocProfiler) as the global
    /// allocator.
    #[inline]
    pub fn memory() -> Self {
        if !crate::alloc::is_installed() {
            tracing::warn!("AllocProfiler is not the global allocator, heap readings will be zero");
        }

        Self::with_probe_default(Allocated(HeapProbe::thread()))
    }
}

impl<P> Profiler<'static, P> {
    fn with_probe_default(probe: P) -> Self {
        Self { probe, repeat: 1, target: Target::default(), subject: None }
    }
}

impl<'t, P> Profiler<'t, P> {
    /// Sets the number of trials. Defaults to 1.
    #[inline]
    pub fn repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets where the report is written. Defaults to standard error.
    #[inline]
    pub fn out<'u>(self, target: impl Into<Target<'u>>) -> Profiler<'u, P> {
        Profiler {
            probe: self.probe,
            repeat: self.repeat,
            target: target.into(),
            subject: self.subject,
        }
    }

    /// Names the profiled code in report titles and CSV rows.
    #[inline]
    pub fn subject(mut self, subject: impl Into<Option<Subject>>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Replaces the probe, e.g. with [`RssProbe`](crate::RssProbe) memory.
    #[inline]
    pub fn with_probe<P2: Probe>(self, probe: P2) -> Profiler<'t, P2> {
        Profiler { probe, repeat: self.repeat, target: self.target, subject: self.subject }
    }

    /// Reads time from `clock`.
    #[inline]
    pub fn with_clock<C: Clock>(self, clock: C) -> Profiler<'t, Elapsed<C>> {
        self.with_probe(Elapsed(clock))
    }

    /// Applies the repeat count and output path of `config`.
    pub fn config(self, config: &Config) -> Self {
        let this = self.repeat(config.repeat);
        match &config.out {
            Some(path) => this.out(path.clone()),
            None => this,
        }
    }
}

impl<'t, P: Probe> Profiler<'t, P> {
    /// Runs `work` once per trial, emits the report and returns the output of
    /// the last trial.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRepeat`] if the repeat count is 0, or an error
    /// if the report cannot be written.
    pub fn run<T>(self, work: impl FnMut() -> T) -> Result<T> {
        let trials = Trials::new(self.probe, self.repeat)?;
        let outcome = trials.run(work);

        let report = Report::from_trials(P::MEASURE, &outcome.samples)?.with_subject(self.subject);
        output::emit(&report, self.target)?;

        Ok(outcome.output)
    }

    /// Like [`run`](Self::run), but stops at the first failing trial without
    /// emitting a report.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Trial`] with the failing trial's error.
    pub fn try_run<T, E>(self, work: impl FnMut() -> Result<T, E>) -> Result<T>
    where
        E: Into<BoxError>,
    {
        let trials = Trials::new(self.probe, self.repeat)?;
        let outcome = trials
            .try_run(work)
            .map_err(|TrialError { trial, error }| Error::Trial { trial, source: error.into() })?;

        let report = Report::from_trials(P::MEASURE, &outcome.samples)?.with_subject(self.subject);
        output::emit(&report, self.target)?;

        Ok(outcome.output)
    }

    /// Starts measuring a scope, which ends when the returned guard finishes
    /// or drops. The repeat count is ignored.
    ///
    /// ```
    /// let mut out = Vec::new();
    /// {
    ///     let _scope = stint::Profiler::time().out(&mut out).start();
    ///     std::thread::sleep(std::time::Duration::from_millis(1));
    /// }
    /// assert!(String::from_utf8(out).unwrap().starts_with("Elapsed time: "));
    /// ```
    pub fn start(self) -> Scope<'t, P> {
        let start = self.probe.read();
        Scope { probe: self.probe, start, target: Some(self.target), subject: self.subject }
    }
}

/// A measured scope, created by [`Profiler::start`].
#[must_use = "the scope is measured until it is dropped"]
pub struct Scope<'t, P: Probe> {
    probe: P,
    start: f64,
    target: Option<Target<'t>>,
    subject: Option<Subject>,
}

impl<P: Probe> Scope<'_, P> {
    /// Ends the scope and emits its report.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be written.
    pub fn finish(mut self) -> Result<Report> {
        self.end()
    }

    fn end(&mut self) -> Result<Report> {
        let value = self.probe.read() - self.start;
        let report = Report::single(P::MEASURE, value).with_subject(self.subject.take());

        if let Some(target) = self.target.take() {
            output::emit(&report, target)?;
        }

        Ok(report)
    }
}

impl<P: Probe> Drop for Scope<'_, P> {
    fn drop(&mut self) {
        if self.target.is_none() {
            return;
        }

        if let Err(error) = self.end() {
            tracing::error!(%error, "failed to emit scope report");
        }
    }
}

/// Line-by-line profiling with an output target.
///
/// # Examples
///
/// ```
/// let mut out = Vec::new();
/// stint::LineProfiler::new().out(&mut out).run(|| stint::traced! {
///     let v: Vec<u32> = (0..100).collect();
///     let total: u32 = v.iter().sum();
///     assert_eq!(total, 4950);
/// })?;
///
/// assert!(String::from_utf8(out).unwrap().contains("Line No."));
/// # Ok::<_, stint::Error>(())
/// ```
pub struct LineProfiler<'t, S = Instrumented, P = Elapsed<MonotonicClock>> {
    tracer: LineTracer<S, P>,
    repeat: u32,
    target: Target<'t>,
}

impl<S: fmt::Debug, P: fmt::Debug> fmt::Debug for LineProfiler<'_, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LineProfiler")
            .field("tracer", &self.tracer)
            .field("repeat", &self.repeat)
            .field("target", &self.target)
            .finish()
    }
}

impl Default for LineProfiler<'static> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl LineProfiler<'static> {
    /// Times code instrumented with [`#[stint::lines]`](macro@crate::lines)
    /// and [`traced!`](crate::traced).
    #[inline]
    pub fn new() -> Self {
        Self { tracer: LineTracer::new(), repeat: 1, target: Target::default() }
    }
}

impl<'t, S, P> LineProfiler<'t, S, P> {
    /// Sets how many times [`run`](Self::run) calls its closure. Defaults
    /// to 1.
    ///
    /// All calls are traced by one session, so a line executed `K` times per
    /// call is counted `K × repeat` times.
    #[inline]
    pub fn repeat(mut self, repeat: u32) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets where the report is written. Defaults to standard error.
    #[inline]
    pub fn out<'u>(self, target: impl Into<Target<'u>>) -> LineProfiler<'u, S, P> {
        LineProfiler { tracer: self.tracer, repeat: self.repeat, target: target.into() }
    }

    #[inline]
    pub fn subject(self, subject: impl Into<Option<Subject>>) -> Self {
        self.map_tracer(|tracer| tracer.subject(subject))
    }

    /// See [`LineTracer::only_files`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filter`] if `pattern` is not a valid regex.
    pub fn only_files(self, pattern: &str) -> Result<Self> {
        let tracer = self.tracer.only_files(pattern)?;
        Ok(Self { tracer, repeat: self.repeat, target: self.target })
    }

    /// Attributes readings of `probe` to lines instead of time.
    #[inline]
    pub fn with_probe<P2: Probe>(self, probe: P2) -> LineProfiler<'t, S, P2> {
        let tracer = self.tracer.with_probe(probe);
        LineProfiler { tracer, repeat: self.repeat, target: self.target }
    }

    /// Reads time from `clock`.
    #[inline]
    pub fn with_clock<C: Clock>(self, clock: C) -> LineProfiler<'t, S, Elapsed<C>> {
        self.with_probe(Elapsed(clock))
    }

    /// Receives line events from `source`.
    #[inline]
    pub fn with_source<S2: LineEventSource>(self, source: S2) -> LineProfiler<'t, S2, P> {
        let tracer = self.tracer.with_source(source);
        LineProfiler { tracer, repeat: self.repeat, target: self.target }
    }

    /// Applies the repeat count, output path and line filter of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Filter`] if the line filter is not a valid regex.
    pub fn config(self, config: &Config) -> Result<Self> {
        let this = match &config.line_filter {
            Some(pattern) => self.only_files(pattern)?,
            None => self,
        }
        .repeat(config.repeat);

        Ok(match &config.out {
            Some(path) => Self { target: Target::Path(path.clone()), ..this },
            None => this,
        })
    }

    #[inline]
    pub fn tracer(&self) -> &LineTracer<S, P> {
        &self.tracer
    }

    fn map_tracer(self, f: impl FnOnce(LineTracer<S, P>) -> LineTracer<S, P>) -> Self {
        Self { tracer: f(self.tracer), repeat: self.repeat, target: self.target }
    }
}

impl<S, P> LineProfiler<'_, S, P>
where
    S: LineEventSource,
    P: Probe + Clone + 'static,
{
    /// Traces `f` once per repeat in a single session, emits the per-line
    /// report and returns the output of the last call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRepeat`] if the repeat count is 0,
    /// [`Error::TraceAttachmentConflict`] if this thread is already being
    /// traced, or an error if the report cannot be written.
    pub fn run<T>(self, mut f: impl FnMut() -> T) -> Result<T> {
        let Some(extra) = self.repeat.checked_sub(1) else {
            return Err(Error::InvalidRepeat);
        };

        self.tracer.trace(self.target, || {
            for _ in 0..extra {
                f();
            }
            f()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, fs};

    use crate::{time::ManualClock, trace::hook::line_event};

    use super::*;

    fn text(out: Vec<u8>) -> String {
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn single_trial() {
        let clock = ManualClock::new();
        let mut out = Vec::new();

        let value = Profiler::time()
            .with_clock(clock.clone())
            .out(&mut out)
            .run(|| {
                clock.advance(0.125);
                7
            })
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(text(out), "Elapsed time: 0.125000 seconds\n");
    }

    #[test]
    fn statistical() {
        let clock = ManualClock::new();
        let step = Cell::new(0.0);
        let mut out = Vec::new();

        Profiler::time()
            .with_clock(clock.clone())
            .repeat(5)
            .subject(Subject::new("step"))
            .out(&mut out)
            .run(|| {
                step.set(step.get() + 1.0);
                clock.advance(step.get());
            })
            .unwrap();

        let out = text(out);
        assert!(out.starts_with("Timing report for function step()\n"), "{out}");
        assert!(out.contains("15.000000 seconds over 5 runs"), "{out}");
        assert!(out.contains("│ Minimum time              │ 1.000000 seconds"), "{out}");
        assert!(out.contains("│ Maximum time              │ 5.000000 seconds"), "{out}");
    }

    #[test]
    fn zero_repeat() {
        let mut calls = 0;
        let result = Profiler::time().repeat(0).out(Target::Discard).run(|| calls += 1);

        assert!(matches!(result, Err(Error::InvalidRepeat)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn failing_trial() {
        let mut out = Vec::new();
        let mut calls = 0;

        let result = Profiler::time().repeat(4).out(&mut out).try_run(|| {
            calls += 1;
            if calls == 2 {
                Err("broken")
            } else {
                Ok(())
            }
        });

        match result {
            Err(Error::Trial { trial, source }) => {
                assert_eq!(trial, 2);
                assert_eq!(source.to_string(), "broken");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(out.is_empty());
    }

    #[test]
    fn memory_single() {
        let mut out = Vec::new();

        let buf = Profiler::memory().out(&mut out).run(|| vec![0u8; 4096]).unwrap();

        assert_eq!(buf.len(), 4096);
        let out = text(out);
        assert!(out.starts_with("Total Memory Used: "), "{out}");
        assert!(out.contains("KB"), "{out}");
    }

    #[test]
    fn scope() {
        let clock = ManualClock::new();
        let mut out = Vec::new();

        {
            let _scope = Profiler::time().with_clock(clock.clone()).out(&mut out).start();
            clock.advance(2.5);
        }

        assert_eq!(text(out), "Elapsed time: 2.500000 seconds\n");
    }

    #[test]
    fn scope_finish_returns_report() {
        let clock = ManualClock::new();
        let scope = Profiler::time().with_clock(clock.clone()).out(Target::Discard).start();
        clock.advance(1.0);

        let report = scope.finish().unwrap();
        assert_eq!(report.trial_values(), [1.0]);
    }

    #[test]
    fn config_applies() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("trials.csv");
        let config = Config { repeat: 3, out: Some(path.clone()), line_filter: None };

        Profiler::time().config(&config).run(|| ()).unwrap();

        let csv = fs::read_to_string(&path).unwrap();
        assert_eq!(csv.lines().count(), 4);
        assert_eq!(csv.lines().next(), Some("run,execution_time_seconds,function_name,arguments"));
    }

    #[test]
    fn line_profiler() {
        let clock = ManualClock::new();
        let mut out = Vec::new();

        LineProfiler::new()
            .with_clock(clock.clone())
            .subject(Subject::new("lines"))
            .out(&mut out)
            .run(|| {
                line_event("l.rs", 1, "");
                clock.advance(1.0);
                line_event("l.rs", 2, "");
            })
            .unwrap();

        let out = text(out);
        let title = "Timing report for function lines() for code in file 'l.rs'\n";
        assert!(out.starts_with(title), "{out}");
        assert!(out.contains("1.000000"), "{out}");
    }

    #[test]
    fn line_profiler_repeat_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.csv");
        let clock = ManualClock::new();
        let mut calls = 0;

        let last = LineProfiler::new()
            .with_clock(clock.clone())
            .repeat(4)
            .out(path.as_path())
            .run(|| {
                calls += 1;
                line_event("r.rs", 1, "");
                for _ in 0..3 {
                    line_event("r.rs", 2, "");
                    clock.advance(0.5);
                }
                calls
            })
            .unwrap();

        assert_eq!(last, 4);

        let csv = fs::read_to_string(&path).unwrap();
        let counts: Vec<&str> =
            csv.lines().skip(1).filter_map(|row| row.rsplit(',').next()).collect();
        assert_eq!(counts, ["4", "12"], "{csv}");
    }

    #[test]
    fn line_profiler_zero_repeat() {
        let mut calls = 0;
        let result = LineProfiler::new().repeat(0).out(Target::Discard).run(|| calls += 1);

        assert!(matches!(result, Err(Error::InvalidRepeat)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn line_profiler_config() {
        let config = Config { repeat: 1, out: None, line_filter: Some("[".into()) };
        assert!(matches!(LineProfiler::new().config(&config), Err(Error::Filter(_))));
    }
}
