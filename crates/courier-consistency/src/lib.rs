//! Courier Consistency — tracking strong-consistency waits.
//!
//! A dispatcher that asked for strong consistency registers the
//! `(handler, version)` pairs it must see acknowledged, then waits on the
//! returned [`WaitHandle`] with a timeout. Handler workers report each
//! `(stream, version, handler)` they finish; the tracker routes the report
//! to every pending record on that stream.

mod tracker;

pub use tracker::{ConsistencyTracker, Expectation, Resolution, WaitHandle};
