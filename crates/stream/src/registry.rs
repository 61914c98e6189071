use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use order_engine_types::{EventDetail, OrderEvent, OrderId, OrderStatus};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::heartbeat;

pub type ListenerId = u64;

/// What the registry hands to an observer's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Event(Arc<OrderEvent>),
    Ping,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("observer for order {0} closed before it could be registered")]
    ObserverClosed(OrderId),
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub heartbeat_interval: Duration,
    /// Per-observer channel capacity
    pub observer_buffer: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_millis(10_000),
            observer_buffer: 64,
        }
    }
}

/// A registered observer. Dropping it cancels its heartbeat.
struct Listener {
    tx: mpsc::Sender<OutboundFrame>,
    _heartbeat: DropGuard,
}

/// Registry of live observers keyed by order id.
pub struct OrderStream {
    listeners: DashMap<OrderId, HashMap<ListenerId, Listener>>,
    settings: StreamSettings,
    next_id: AtomicU64,
    me: Weak<OrderStream>,
}

impl OrderStream {
    pub fn new(settings: StreamSettings) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            listeners: DashMap::new(),
            settings,
            next_id: AtomicU64::new(1),
            me: me.clone(),
        })
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// A channel sized for one observer.
    pub fn channel(&self) -> (mpsc::Sender<OutboundFrame>, mpsc::Receiver<OutboundFrame>) {
        mpsc::channel(self.settings.observer_buffer.max(1))
    }

    /// Register `tx` as an observer of `order_id`.
    ///
    /// The observer first receives a `pending` acknowledgement addressed to it
    /// alone, then every event published for the order until the returned
    /// [`Subscription`] is dropped or the channel closes.
    pub fn subscribe(
        &self,
        order_id: OrderId,
        tx: mpsc::Sender<OutboundFrame>,
    ) -> Result<Subscription, StreamError> {
        let ack = OrderEvent::new(order_id, OrderStatus::Pending, Some(EventDetail::subscribed()));
        tx.try_send(OutboundFrame::Event(Arc::new(ack)))
            .map_err(|_| StreamError::ObserverClosed(order_id))?;

        let listener_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        tokio::spawn(heartbeat::run(
            self.me.clone(),
            order_id,
            listener_id,
            tx.clone(),
            self.settings.heartbeat_interval,
            cancel.clone(),
        ));

        self.listeners.entry(order_id).or_default().insert(
            listener_id,
            Listener {
                tx,
                _heartbeat: cancel.drop_guard(),
            },
        );

        tracing::debug!(%order_id, listener_id, "observer subscribed");

        Ok(Subscription {
            order_id,
            listener_id,
            registry: self.me.clone(),
        })
    }

    /// Send one event to every live observer of `order_id`.
    ///
    /// Returns how many observers accepted it. Observers found closed are
    /// removed; a full observer misses this event but stays registered.
    pub fn publish(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        detail: Option<EventDetail>,
    ) -> usize {
        let event = Arc::new(OrderEvent::new(order_id, status, detail));
        let mut delivered = 0;
        let mut closed = Vec::new();

        if let Some(listeners) = self.listeners.get(&order_id) {
            for (listener_id, listener) in listeners.iter() {
                match listener.tx.try_send(OutboundFrame::Event(event.clone())) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            %order_id,
                            listener_id,
                            %status,
                            "observer backlog full, event dropped"
                        );
                    }
                    Err(TrySendError::Closed(_)) => closed.push(*listener_id),
                }
            }
        } else {
            tracing::trace!(%order_id, %status, "no observers, event dropped");
        }

        for listener_id in closed {
            self.unsubscribe(order_id, listener_id);
        }

        delivered
    }

    /// Remove one observer and stop its heartbeat. Returns whether it was registered.
    pub fn unsubscribe(&self, order_id: OrderId, listener_id: ListenerId) -> bool {
        let removed = match self.listeners.get_mut(&order_id) {
            Some(mut listeners) => listeners.remove(&listener_id),
            None => None,
        };
        self.listeners.remove_if(&order_id, |_, listeners| listeners.is_empty());

        if removed.is_some() {
            tracing::debug!(%order_id, listener_id, "observer removed");
        }
        removed.is_some()
    }

    pub fn listener_count(&self, order_id: OrderId) -> usize {
        self.listeners
            .get(&order_id)
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.iter().map(|entry| entry.value().len()).sum()
    }
}

/// Owned registration of one observer. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    order_id: OrderId,
    listener_id: ListenerId,
    registry: Weak<OrderStream>,
}

impl Subscription {
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(self.order_id, self.listener_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn stream(heartbeat_ms: u64) -> Arc<OrderStream> {
        OrderStream::new(StreamSettings {
            heartbeat_interval: Duration::from_millis(heartbeat_ms),
            observer_buffer: 16,
        })
    }

    fn expect_event(frame: Option<OutboundFrame>) -> Arc<OrderEvent> {
        match frame {
            Some(OutboundFrame::Event(event)) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_sends_private_ack() {
        let stream = stream(10_000);
        let order_id = Uuid::new_v4();

        let (tx_a, mut rx_a) = stream.channel();
        let _a = stream.subscribe(order_id, tx_a).unwrap();
        let ack = expect_event(rx_a.recv().await);
        assert_eq!(ack.status, OrderStatus::Pending);
        assert_eq!(ack.detail, Some(EventDetail::subscribed()));

        // A second observer's ack is not broadcast to the first.
        let (tx_b, mut rx_b) = stream.channel();
        let _b = stream.subscribe(order_id, tx_b).unwrap();
        expect_event(rx_b.recv().await);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(stream.listener_count(order_id), 2);
    }

    #[tokio::test]
    async fn test_publish_reaches_every_observer_identically() {
        let stream = stream(10_000);
        let order_id = Uuid::new_v4();

        let (tx_a, mut rx_a) = stream.channel();
        let (tx_b, mut rx_b) = stream.channel();
        let _a = stream.subscribe(order_id, tx_a).unwrap();
        let _b = stream.subscribe(order_id, tx_b).unwrap();
        rx_a.recv().await;
        rx_b.recv().await;

        let delivered = stream.publish(order_id, OrderStatus::Routing, None);
        assert_eq!(delivered, 2);

        let a = expect_event(rx_a.recv().await);
        let b = expect_event(rx_b.recv().await);
        assert_eq!(a, b);
        assert_eq!(a.status, OrderStatus::Routing);
    }

    #[tokio::test]
    async fn test_publish_without_observers_is_dropped() {
        let stream = stream(10_000);
        let order_id = Uuid::new_v4();

        assert_eq!(stream.publish(order_id, OrderStatus::Routing, None), 0);

        // Late subscriber sees only its ack, no backlog.
        let (tx, mut rx) = stream.channel();
        let _sub = stream.subscribe(order_id, tx).unwrap();
        expect_event(rx.recv().await);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_events_are_scoped_to_their_order() {
        let stream = stream(10_000);
        let watched = Uuid::new_v4();

        let (tx, mut rx) = stream.channel();
        let _sub = stream.subscribe(watched, tx).unwrap();
        rx.recv().await;

        stream.publish(Uuid::new_v4(), OrderStatus::Confirmed, None);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_observer_is_pruned_without_affecting_others() {
        let stream = stream(10_000);
        let order_id = Uuid::new_v4();

        let (tx_gone, rx_gone) = stream.channel();
        let (tx_live, mut rx_live) = stream.channel();
        let _gone = stream.subscribe(order_id, tx_gone).unwrap();
        let _live = stream.subscribe(order_id, tx_live).unwrap();
        rx_live.recv().await;

        drop(rx_gone);

        assert_eq!(stream.publish(order_id, OrderStatus::Building, None), 1);
        assert_eq!(stream.listener_count(order_id), 1);
        assert_eq!(
            expect_event(rx_live.recv().await).status,
            OrderStatus::Building
        );
    }

    #[tokio::test]
    async fn test_dropping_subscription_unsubscribes() {
        let stream = stream(10_000);
        let order_id = Uuid::new_v4();

        let (tx, mut rx) = stream.channel();
        let sub = stream.subscribe(order_id, tx).unwrap();
        rx.recv().await;

        drop(sub);
        assert_eq!(stream.listener_count(order_id), 0);
        assert_eq!(stream.total_listeners(), 0);
        assert_eq!(stream.publish(order_id, OrderStatus::Submitted, None), 0);

        // Registry and heartbeat both released their senders.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_to_closed_channel_fails() {
        let stream = stream(10_000);
        let order_id = Uuid::new_v4();

        let (tx, rx) = stream.channel();
        drop(rx);

        assert_eq!(
            stream.subscribe(order_id, tx).unwrap_err(),
            StreamError::ObserverClosed(order_id)
        );
        assert_eq!(stream.listener_count(order_id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_pings_on_interval() {
        let stream = stream(1_000);
        let order_id = Uuid::new_v4();

        let (tx, mut rx) = stream.channel();
        let _sub = stream.subscribe(order_id, tx).unwrap();
        expect_event(rx.recv().await);

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        assert_eq!(rx.try_recv().ok(), Some(OutboundFrame::Ping));

        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(rx.try_recv().ok(), Some(OutboundFrame::Ping));
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_removes_closed_observer() {
        let stream = stream(1_000);
        let order_id = Uuid::new_v4();

        let (tx, rx) = stream.channel();
        let sub = stream.subscribe(order_id, tx).unwrap();
        drop(rx);
        assert_eq!(stream.listener_count(order_id), 1);

        tokio::time::sleep(Duration::from_millis(1_050)).await;
        assert_eq!(stream.listener_count(order_id), 0);

        // Already removed; dropping the handle is a no-op.
        drop(sub);
        assert_eq!(stream.total_listeners(), 0);
    }
}
