//! Repeated-trial execution.

use std::{
    convert::Infallible,
    hint::black_box,
    num::NonZeroU32,
    sync::atomic::{compiler_fence, Ordering::SeqCst},
};

use crate::{
    memory::MemoryProbe,
    report::Measure,
    stats::SampleStore,
    time::Clock,
    Error, Result,
};

/// A scalar reading taken immediately before and after each trial.
pub trait Probe {
    /// What the readings measure.
    const MEASURE: Measure;

    fn read(&self) -> f64;
}

/// Reads elapsed seconds from a [`Clock`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Elapsed<C>(pub C);

impl<C: Clock> Probe for Elapsed<C> {
    const MEASURE: Measure = Measure::Time;

    #[inline(always)]
    fn read(&self) -> f64 {
        self.0.now()
    }
}

/// Reads bytes in use from a [`MemoryProbe`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Allocated<M>(pub M);

impl<M: MemoryProbe> Probe for Allocated<M> {
    const MEASURE: Measure = Measure::Memory;

    #[inline(always)]
    fn read(&self) -> f64 {
        self.0.current_bytes() as f64
    }
}

/// Runs a unit of work a fixed number of times, one sample per trial.
#[derive(Clone, Debug)]
pub struct Trials<P> {
    probe: P,
    repeat: NonZeroU32,
}

/// The result of a completed trial session.
#[derive(Debug)]
pub struct Outcome<T> {
    /// Output of the final trial.
    pub output: T,

    /// One sample per trial, keyed by trial index starting at 1.
    pub samples: SampleStore<u32>,
}

/// A trial whose unit of work returned an error.
#[derive(Debug)]
pub struct TrialError<E> {
    /// Index of the failed trial, starting at 1.
    pub trial: u32,
    pub error: E,
}

impl<P: Probe> Trials<P> {
    /// # Errors
    ///
    /// Returns [`Error::InvalidRepeat`] if `repeat` is 0.
    pub fn new(probe: P, repeat: u32) -> Result<Self> {
        let repeat = NonZeroU32::new(repeat).ok_or(Error::InvalidRepeat)?;
        Ok(Self { probe, repeat })
    }

    #[inline]
    pub fn repeat(&self) -> u32 {
        self.repeat.get()
    }

    #[inline]
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Runs `work` once per trial and returns the final output.
    pub fn run<T>(&self, mut work: impl FnMut() -> T) -> Outcome<T> {
        match self.try_run(|| Ok::<T, Infallible>(work())) {
            Ok(outcome) => outcome,
            Err(TrialError { error, .. }) => match error {},
        }
    }

    /// Runs `work` once per trial and returns the final output.
    ///
    /// The first error aborts the session and the samples of earlier trials
    /// are discarded.
    pub fn try_run<T, E>(
        &self,
        mut work: impl FnMut() -> Result<T, E>,
    ) -> Result<Outcome<T>, TrialError<E>> {
        let mut samples = SampleStore::default();
        let mut output = None;

        for trial in 1..=self.repeat.get() {
            let before = self.probe.read();
            compiler_fence(SeqCst);
            let result = black_box(work());
            compiler_fence(SeqCst);
            let after = self.probe.read();

            match result {
                Ok(value) => output = Some(value),
                Err(error) => return Err(TrialError { trial, error }),
            }

            samples.push(trial, after - before);
        }

        // `repeat` is non-zero, so at least one trial ran.
        match output {
            Some(output) => Ok(Outcome { output, samples }),
            None => unreachable!("trial session ran no trials"),
        }
    }
}
