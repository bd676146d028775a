//! Core data types shared by the trigger, range and consumption layers.
//!
//! ## Overview
//!
//! - [`ChannelDataSet`] / [`Sample`]: inbound telemetry and outbound derived channels
//! - [`Lap`] / [`TrackFlag`]: lap records from the timing provider
//! - [`Stint`]: the authoritative on-track period owned by one [`CarRange`](crate::CarRange)
//! - [`StintDelta`]: proposed start/end emitted by a trigger source
//! - [`EventFlag`]: yellow/red periods used for duration attribution
//! - [`CarRangeSettings`] / [`ChannelMapping`]: per-car configuration
//!
//! All types are plain values. Derived state (pit stops, statistics) is
//! recomputed by the classifier rather than stored here.

mod flag;
mod lap;
mod sample;
mod settings;
mod stint;

pub use flag::EventFlag;
pub use lap::{Lap, TrackFlag};
pub use sample::{ChannelDataSet, ChannelId, Sample};
pub use settings::{CarRangeSettings, ChannelMapping};
pub use stint::{RangeUpdate, Stint, StintCommit, StintDelta};
