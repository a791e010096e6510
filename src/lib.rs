#![doc = include_str!("../README.md")]

/// Instruments every statement of a function to raise line events.
///
/// See [`LineTracer`] for collecting them.
#[doc(inline)]
pub use stint_macros::lines;

#[doc(inline)]
pub use stint_macros::traced;

// Used by generated code. Not public API and thus not subject to SemVer.
#[doc(hidden)]
#[path = "private.rs"]
pub mod __private;

mod alloc;
mod config;
mod error;
mod memory;
mod profiler;
mod trial;
mod util;

pub mod output;
pub mod report;
pub mod stats;
pub mod time;
pub mod trace;

#[doc(inline)]
pub use crate::{
    alloc::{AllocOp, AllocProfiler, AllocSnapshot, AllocTally},
    config::Config,
    error::{BoxError, Error, Result},
    memory::{HeapProbe, HeapScope, MemoryProbe, RssProbe},
    output::{emit, Target},
    profiler::{LineProfiler, Profiler, Scope},
    report::{Measure, Mode, Report, Subject},
    stats::{SampleStore, Stats},
    time::{Clock, ManualClock, MonotonicClock},
    trace::{
        Instrumented, LineEventSink, LineEventSource, LineKey, LineSession, LineSite, LineTracer,
    },
    trial::{Allocated, Elapsed, Outcome, Probe, TrialError, Trials},
    util::format_bytes,
};
