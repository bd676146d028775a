//! Authoritative stint timelines.
//!
//! [`CarRange`] owns one car's stint list and merges trigger deltas into it;
//! [`CarRegistry`] holds the per-car instances for an event.

mod car_range;
mod registry;

pub use car_range::CarRange;
pub use registry::CarRegistry;
