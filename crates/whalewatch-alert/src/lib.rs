//! Alert delivery for whale transfer events.
//!
//! An [`AlertSink`] formats and delivers one event; the [`AlertDispatcher`]
//! drains the pipeline channel and pushes each event through the sink with
//! at-most-once semantics.

pub mod dispatcher;
pub mod sink;

pub use dispatcher::{AlertDispatcher, DispatcherStats};
pub use sink::{AlertSink, LogSink, SinkError};
