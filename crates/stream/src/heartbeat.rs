use std::sync::Weak;
use std::time::Duration;

use order_engine_types::OrderId;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::registry::{ListenerId, OrderStream, OutboundFrame};

/// Periodic liveness ping for one observer.
///
/// Runs until `cancel` fires or the observer's channel is found closed, in
/// which case the observer is removed from the registry.
pub(crate) async fn run(
    registry: Weak<OrderStream>,
    order_id: OrderId,
    listener_id: ListenerId,
    tx: mpsc::Sender<OutboundFrame>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => match tx.try_send(OutboundFrame::Ping) {
                Ok(()) => {}
                // A backed-up observer is still alive; skip this ping.
                Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(%order_id, listener_id, "heartbeat found observer closed");
                    if let Some(registry) = registry.upgrade() {
                        registry.unsubscribe(order_id, listener_id);
                    }
                    break;
                }
            },
        }
    }
}
