//! Outbound collaborator traits

use crate::Result;
use crate::types::{ChannelDataSet, StintCommit};

/// Destination for committed stint lists (database, message bus).
///
/// Called from the commit interval with one car's full stint list. A failed
/// commit leaves the car dirty and it is offered again on the next interval.
#[async_trait::async_trait]
pub trait StintSink: Send + Sync + 'static {
    async fn commit(&self, commit: StintCommit) -> Result<()>;
}

/// Destination for derived virtual channel values.
#[async_trait::async_trait]
pub trait ChannelPublisher: Send + Sync + 'static {
    /// Publish one data set of range and consumption channels.
    ///
    /// Failures are logged by the caller; values are recomputed on the next
    /// lap.
    async fn publish(&self, data: ChannelDataSet) -> Result<()>;
}
