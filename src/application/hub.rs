use crate::domain::money::Amount;
use crate::domain::transaction::{Address, Direction, Receipt, TxId, TxStatus};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// A status-change event fanned out to subscribers.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub tx_id: TxId,
    pub address: Address,
    pub direction: Direction,
    pub amount: Amount,
    /// `None` for the synthetic current-state event a new subscriber receives.
    pub previous: Option<TxStatus>,
    pub status: TxStatus,
    pub receipt: Option<Receipt>,
    pub at: DateTime<Utc>,
}

pub type StatusCallback = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

/// What a subscriber is interested in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    Transaction(TxId),
    Payee(Address),
    All,
}

impl Topic {
    fn matches(&self, event: &StatusEvent) -> bool {
        match self {
            Self::Transaction(id) => *id == event.tx_id,
            Self::Payee(address) => *address == event.address,
            Self::All => true,
        }
    }
}

struct Subscriber {
    id: u64,
    topic: Topic,
    callback: StatusCallback,
}

/// Minimal publish/subscribe fan-out for status events.
///
/// Delivery is synchronous and in registration order. Publishing iterates a
/// snapshot of the subscriber table, so unsubscribing from inside a callback
/// is safe. There is no replay: late subscribers only see new events (the
/// tracker hands them one synthetic current-state event at subscribe time).
#[derive(Default)]
pub struct NotificationHub {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(self: &Arc<Self>, topic: Topic, callback: StatusCallback) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let mut subscribers = self.subscribers.lock().expect("subscriber table poisoned");
        subscribers.push(Subscriber {
            id,
            topic,
            callback,
        });
        SubscriptionHandle {
            id,
            hub: Arc::clone(self),
        }
    }

    pub fn publish(&self, event: &StatusEvent) {
        let matching: Vec<StatusCallback> = {
            let subscribers = self.subscribers.lock().expect("subscriber table poisoned");
            subscribers
                .iter()
                .filter(|sub| sub.topic.matches(event))
                .map(|sub| Arc::clone(&sub.callback))
                .collect()
        };
        // Lock released: callbacks may subscribe or unsubscribe freely.
        for callback in matching {
            callback(event);
        }
    }

    fn unsubscribe(&self, id: u64) {
        let mut subscribers = self.subscribers.lock().expect("subscriber table poisoned");
        subscribers.retain(|sub| sub.id != id);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.lock().expect("subscriber table poisoned").len()
    }
}

/// Deregisters a subscriber. Safe to cancel more than once, and safe to
/// cancel from inside a notification callback.
pub struct SubscriptionHandle {
    id: u64,
    hub: Arc<NotificationHub>,
}

impl SubscriptionHandle {
    pub fn cancel(&self) {
        self.hub.unsubscribe(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::AtomicUsize;

    fn event(tx_id: &TxId, status: TxStatus) -> StatusEvent {
        StatusEvent {
            tx_id: tx_id.clone(),
            address: Address::new("V1"),
            direction: Direction::Incoming,
            amount: Amount::new(dec!(0.5)).unwrap(),
            previous: Some(TxStatus::Pending),
            status,
            receipt: None,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_topic_filtering() {
        let hub = Arc::new(NotificationHub::new());
        let for_id = Arc::new(AtomicUsize::new(0));
        let for_all = Arc::new(AtomicUsize::new(0));

        let id = TxId::generate();
        let other = TxId::generate();

        let c = Arc::clone(&for_id);
        hub.subscribe(
            Topic::Transaction(id.clone()),
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let c = Arc::clone(&for_all);
        hub.subscribe(
            Topic::All,
            Arc::new(move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            }),
        );

        hub.publish(&event(&id, TxStatus::Confirmed));
        hub.publish(&event(&other, TxStatus::Confirmed));

        assert_eq!(for_id.load(Ordering::SeqCst), 1);
        assert_eq!(for_all.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delivery_in_registration_order() {
        let hub = Arc::new(NotificationHub::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            hub.subscribe(
                Topic::All,
                Arc::new(move |_| log.lock().unwrap().push(tag)),
            );
        }

        hub.publish(&event(&TxId::generate(), TxStatus::Confirmed));
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_from_inside_callback() {
        let hub = Arc::new(NotificationHub::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handle: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::new(Mutex::new(None));
        let handle_inner = Arc::clone(&handle);
        let calls_inner = Arc::clone(&calls);
        let created = hub.subscribe(
            Topic::All,
            Arc::new(move |_| {
                calls_inner.fetch_add(1, Ordering::SeqCst);
                if let Some(h) = handle_inner.lock().unwrap().take() {
                    h.cancel();
                }
            }),
        );
        *handle.lock().unwrap() = Some(created);

        hub.publish(&event(&TxId::generate(), TxStatus::Confirmed));
        hub.publish(&event(&TxId::generate(), TxStatus::Confirmed));

        // Second publish reaches nobody: the callback removed itself.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_cancel_twice_is_noop() {
        let hub = Arc::new(NotificationHub::new());
        let handle = hub.subscribe(Topic::All, Arc::new(|_| {}));
        handle.cancel();
        handle.cancel();
        assert_eq!(hub.subscriber_count(), 0);
    }
}
