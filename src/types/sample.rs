//! Telemetry samples and channel data sets

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a logged or virtual telemetry channel.
pub type ChannelId = u32;

/// A single telemetry value for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub channel_id: ChannelId,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn new(channel_id: ChannelId, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self { channel_id, value, timestamp }
    }
}

/// A batch of samples received from (or published for) one device.
///
/// Virtual data sets carry values derived by this crate and are ignored by
/// the trigger and consumption paths so published output never feeds back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "camelCase")]
pub struct ChannelDataSet {
    pub device_id: u32,
    pub timestamp: DateTime<Utc>,
    pub is_virtual: bool,
    pub samples: Vec<Sample>,
}

impl ChannelDataSet {
    /// Create an empty physical data set.
    pub fn new(device_id: u32, timestamp: DateTime<Utc>) -> Self {
        Self { device_id, timestamp, is_virtual: false, samples: Vec::new() }
    }

    /// Create an empty virtual data set for derived channels.
    pub fn new_virtual(device_id: u32, timestamp: DateTime<Utc>) -> Self {
        Self { device_id, timestamp, is_virtual: true, samples: Vec::new() }
    }

    /// Builder-style sample insertion.
    pub fn with_sample(mut self, channel_id: ChannelId, value: f64) -> Self {
        self.push(channel_id, value);
        self
    }

    /// Append a sample stamped with the data set timestamp.
    pub fn push(&mut self, channel_id: ChannelId, value: f64) {
        self.samples.push(Sample::new(channel_id, value, self.timestamp));
    }

    /// Latest sample for a channel, if the data set carries one.
    ///
    /// Samples are not guaranteed to be ordered, so the newest timestamp wins.
    pub fn latest(&self, channel_id: ChannelId) -> Option<&Sample> {
        self.samples
            .iter()
            .filter(|s| s.channel_id == channel_id)
            .max_by_key(|s| s.timestamp)
    }

    /// Value of the latest sample for a channel.
    pub fn value_of(&self, channel_id: ChannelId) -> Option<f64> {
        self.latest(channel_id).map(|s| s.value)
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
