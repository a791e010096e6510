pub use std;

pub use crate::trace::hook::line_event;
