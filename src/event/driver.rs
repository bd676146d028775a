//! Driver runs the inbound message loop and periodic commits for one event

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{ChannelPublisher, EventProcessor, EventSnapshot, StintSink};
use crate::types::{ChannelDataSet, EventFlag, Lap, RangeUpdate};

/// One inbound message for an event.
#[derive(Debug, Clone)]
pub enum Inbound {
    Telemetry(ChannelDataSet),
    Laps(Vec<Lap>),
    Flags(Vec<EventFlag>),
    Override(RangeUpdate),
}

/// Handles returned by [`EventDriver::spawn`].
pub struct EventHandles {
    /// Snapshot published after every commit pass
    pub snapshots: watch::Receiver<Option<Arc<EventSnapshot>>>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// The driver task; completes after the final commit
    pub task: JoinHandle<()>,
}

/// Spawns the processing loop for one event.
///
/// Inbound messages are applied as they arrive. Dirty cars are committed on
/// a fixed interval and once more when the inbound stream ends or the token
/// is cancelled.
pub struct EventDriver;

impl EventDriver {
    pub fn spawn<S>(
        processor: Arc<EventProcessor>,
        inbound: S,
        sink: Arc<dyn StintSink>,
        publisher: Arc<dyn ChannelPublisher>,
        commit_interval: Duration,
    ) -> EventHandles
    where
        S: Stream<Item = Inbound> + Send + Unpin + 'static,
    {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let cancel_loop = cancel.clone();

        let task = tokio::spawn(async move {
            Self::event_loop(processor, inbound, sink, publisher, commit_interval, snapshot_tx, cancel_loop)
                .await;
        });

        EventHandles { snapshots: snapshot_rx, cancel, task }
    }

    async fn event_loop<S>(
        processor: Arc<EventProcessor>,
        mut inbound: S,
        sink: Arc<dyn StintSink>,
        publisher: Arc<dyn ChannelPublisher>,
        commit_interval: Duration,
        snapshot_tx: watch::Sender<Option<Arc<EventSnapshot>>>,
        cancel: CancellationToken,
    ) where
        S: Stream<Item = Inbound> + Send + Unpin + 'static,
    {
        let event_id = processor.event_id();
        info!(event_id, "Event driver started");
        let mut ticker = tokio::time::interval(commit_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately
        ticker.tick().await;
        let mut messages = 0u64;

        loop {
            if cancel.is_cancelled() {
                info!(event_id, "Event driver cancelled");
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(event_id, "Event driver cancelled while waiting");
                    break;
                }
                _ = ticker.tick() => {
                    Self::commit(&processor, sink.as_ref(), &snapshot_tx).await;
                }
                message = inbound.next() => {
                    let Some(message) = message else {
                        info!(event_id, messages, "Inbound stream ended");
                        break;
                    };
                    messages += 1;
                    Self::handle(&processor, publisher.as_ref(), message).await;
                }
            }
        }

        Self::commit(&processor, sink.as_ref(), &snapshot_tx).await;
        info!(event_id, messages, "Event driver stopped");
    }

    async fn handle(processor: &EventProcessor, publisher: &dyn ChannelPublisher, message: Inbound) {
        match message {
            Inbound::Telemetry(data) => {
                trace!(device = data.device_id, samples = data.samples.len(), "Telemetry received");
                processor.process_telemetry(&data);
            }
            Inbound::Laps(laps) => {
                debug!(laps = laps.len(), "Lap batch received");
                for data in processor.process_laps(laps).await {
                    let device = data.device_id;
                    if let Err(error) = publisher.publish(data).await {
                        warn!(device, %error, "Failed to publish derived channels");
                    }
                }
            }
            Inbound::Flags(flags) => {
                processor.process_flags(flags);
            }
            Inbound::Override(update) => {
                if processor.apply_override(&update) {
                    info!(stint = %update.stint_id, "Override applied");
                }
            }
        }
    }

    async fn commit(
        processor: &EventProcessor,
        sink: &dyn StintSink,
        snapshot_tx: &watch::Sender<Option<Arc<EventSnapshot>>>,
    ) {
        processor.refresh_flag_durations();
        let summary = processor.commit_dirty(sink).await;
        if summary.is_empty() {
            return;
        }
        for (car, error) in &summary.failed {
            warn!(car = %car, %error, "Commit failed");
        }
        debug!(
            committed = summary.committed.len(),
            failed = summary.failed.len(),
            "Commit pass finished"
        );
        // send_replace keeps the value even with no receivers left
        snapshot_tx.send_replace(Some(Arc::new(processor.snapshot())));
    }
}
