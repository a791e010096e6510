use std::{cell::RefCell, rc::Rc};

use crate::{Error, Result};

/// Where a line event was raised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSite {
    /// `file!()` of the instrumented code.
    pub file: &'static str,

    /// `line!()` of the instrumented statement.
    pub line: u32,

    /// Manifest directory of the crate the instrumented code belongs to.
    pub root: &'static str,
}

/// Receives line events while attached to a [`LineEventSource`].
pub trait LineEventSink {
    /// Called when execution enters a new source line.
    fn line_entered(&self, site: LineSite);
}

/// Something that can report line events of the current thread to one sink
/// at a time.
pub trait LineEventSource {
    /// # Errors
    ///
    /// Returns [`Error::TraceAttachmentConflict`] if a sink is already
    /// attached.
    fn attach(&self, sink: Rc<dyn LineEventSink>) -> Result<()>;

    /// Stops reporting events. Does nothing if no sink is attached.
    fn detach(&self);
}

impl<S: LineEventSource + ?Sized> LineEventSource for &S {
    #[inline]
    fn attach(&self, sink: Rc<dyn LineEventSink>) -> Result<()> {
        (**self).attach(sink)
    }

    #[inline]
    fn detach(&self) {
        (**self).detach()
    }
}

/// Line events raised by code instrumented with
/// [`#[stint::lines]`](macro@crate::lines) or [`traced!`](crate::traced).
#[derive(Clone, Copy, Debug, Default)]
pub struct Instrumented;

thread_local! {
    static ACTIVE: RefCell<Option<Rc<dyn LineEventSink>>> = const { RefCell::new(None) };
}

impl LineEventSource for Instrumented {
    fn attach(&self, sink: Rc<dyn LineEventSink>) -> Result<()> {
        ACTIVE.with(|active| {
            let mut active = active.borrow_mut();
            if active.is_some() {
                return Err(Error::TraceAttachmentConflict);
            }

            *active = Some(sink);
            Ok(())
        })
    }

    fn detach(&self) {
        // Sessions may be dropped while thread-local storage is torn down.
        _ = ACTIVE.try_with(|active| active.borrow_mut().take());
    }
}

/// Reports a line event to the sink attached on this thread, if any.
///
/// Instrumentation macros expand to calls of this function.
#[inline]
pub fn line_event(file: &'static str, line: u32, root: &'static str) {
    let sink = ACTIVE.try_with(|active| active.borrow().clone()).ok().flatten();

    if let Some(sink) = sink {
        sink.line_entered(LineSite { file, line, root });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        lines: RefCell<Vec<u32>>,
    }

    impl LineEventSink for Counter {
        fn line_entered(&self, site: LineSite) {
            self.lines.borrow_mut().push(site.line);
        }
    }

    #[test]
    fn events_reach_attached_sink() {
        let sink = Rc::new(Counter::default());

        line_event("a.rs", 1, "");
        Instrumented.attach(sink.clone()).unwrap();
        line_event("a.rs", 2, "");
        line_event("a.rs", 3, "");
        Instrumented.detach();
        line_event("a.rs", 4, "");

        assert_eq!(*sink.lines.borrow(), [2, 3]);
    }

    #[test]
    fn second_attach_conflicts() {
        Instrumented.attach(Rc::new(Counter::default())).unwrap();

        let result = Instrumented.attach(Rc::new(Counter::default()));
        assert!(matches!(result, Err(Error::TraceAttachmentConflict)));

        Instrumented.detach();
        Instrumented.attach(Rc::new(Counter::default())).unwrap();
        Instrumented.detach();
    }

    #[test]
    fn attachment_is_per_thread() {
        let sink = Rc::new(Counter::default());
        Instrumented.attach(sink.clone()).unwrap();

        let attached_elsewhere = std::thread::spawn(|| {
            line_event("b.rs", 9, "");
            let ok = Instrumented.attach(Rc::new(Counter::default())).is_ok();
            Instrumented.detach();
            ok
        })
        .join()
        .unwrap();

        Instrumented.detach();
        assert!(attached_elsewhere);
        assert!(sink.lines.borrow().is_empty());
    }
}
