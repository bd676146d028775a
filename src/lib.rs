//! Stint detection and fuel range estimation for live racing telemetry.
//!
//! Pitwall Range reconciles two disagreeing sources of truth into one stint
//! timeline per car: speed and fuel telemetry from the car, and lap records
//! from the timing provider. On top of that timeline it classifies pit stops,
//! projects the next pit window and publishes fuel range channels.
//!
//! # Features
//!
//! - **Dual-source stints**: telemetry triggers preferred while fresh, lap
//!   triggers as the fallback and for finish/stop flags
//! - **Refuel detection**: stationary fuel rise with confirmation and cooldown
//! - **Flag attribution**: yellow and red minutes per stint
//! - **Strategy**: pit stop classification with duration estimates and
//!   descriptive statistics
//! - **Consumption**: raw and filtered range in laps and minutes
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use pitwall_range::{
//!     ChannelDataSet, ChannelPublisher, EventDriver, EventProcessor, Inbound, ServiceConfig,
//!     StintCommit, StintSink, SystemClock,
//! };
//! use tokio_stream::wrappers::ReceiverStream;
//!
//! struct LogSink;
//!
//! #[async_trait::async_trait]
//! impl StintSink for LogSink {
//!     async fn commit(&self, commit: StintCommit) -> pitwall_range::Result<()> {
//!         println!("car {} has {} stints", commit.car_number, commit.stints.len());
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait::async_trait]
//! impl ChannelPublisher for LogSink {
//!     async fn publish(&self, data: ChannelDataSet) -> pitwall_range::Result<()> {
//!         println!("device {}: {} derived values", data.device_id, data.samples.len());
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::load("range.yaml")?;
//!     let processor = Arc::new(EventProcessor::new(42, &config, Arc::new(SystemClock)));
//!
//!     let (tx, rx) = tokio::sync::mpsc::channel::<Inbound>(256);
//!     let handles = EventDriver::spawn(
//!         processor,
//!         ReceiverStream::new(rx),
//!         Arc::new(LogSink),
//!         Arc::new(LogSink),
//!         Duration::from_secs(config.commit_interval_secs),
//!     );
//!
//!     // Feed telemetry and lap batches through `tx`, then shut down
//!     drop(tx);
//!     handles.task.await?;
//!     Ok(())
//! }
//! ```

mod clock;
mod error;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Stint timeline
pub mod flag_durations;
pub mod range;
pub mod triggers;

// Strategy and consumption
pub mod classifier;
pub mod consumption;

// Coordination
pub mod config;
pub mod event;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::*;
pub use types::*;

pub use classifier::{CarStrategy, LapClassifier, StrategyStats};
pub use config::ServiceConfig;
pub use consumption::{CarConsumption, ConsumptionProcessor, RangeEstimate};
pub use event::{
    ChannelPublisher, EventDriver, EventHandles, EventProcessor, EventSnapshot, Inbound, StintSink,
};
pub use range::{CarRange, CarRegistry};
pub use triggers::{LapDataTriggers, RefuelCheck, TelemetryTriggers, TriggerPreference};
