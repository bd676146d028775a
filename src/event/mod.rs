//! Event-level coordination.
//!
//! [`EventProcessor`] owns the per-car state for one event and exposes the
//! inbound operations (telemetry, lap batches, flags, overrides) plus the
//! periodic commit. [`EventDriver`] wires it to an inbound message stream and
//! the outbound [`StintSink`] / [`ChannelPublisher`] collaborators.

mod dirty;
mod driver;
mod processor;
mod sink;

pub use dirty::DirtyCars;
pub use driver::{EventDriver, EventHandles, Inbound};
pub use processor::{CarSnapshot, CommitSummary, EventProcessor, EventSnapshot};
pub use sink::{ChannelPublisher, StintSink};
