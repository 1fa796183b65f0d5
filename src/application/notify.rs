use crate::application::hub::StatusEvent;
use crate::domain::order::{NotificationKind, OrderNotification};
use crate::domain::transaction::{Direction, TxStatus};

/// Which user type a payload routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    Payer,
    Payee,
}

/// An abstract notification handed to the external delivery mechanism.
/// Construction and addressing only; transport lives elsewhere.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub audience: Audience,
    /// Target view derived from the event's category.
    pub deep_link: String,
}

/// Builds a payload for a status-change event, or `None` when the change is
/// not worth pushing (synthetic events, intermediate confirmations).
pub fn payment_payload(event: &StatusEvent) -> Option<NotificationPayload> {
    // Synthetic current-state events are for subscribers, not for push.
    event.previous?;

    let (title, body) = match event.status {
        TxStatus::Finalized => match event.direction {
            Direction::Incoming => (
                "Payment received".to_string(),
                format!("{} received", event.amount),
            ),
            Direction::Outgoing => (
                "Payment sent".to_string(),
                format!("{} sent to {}", event.amount, event.address),
            ),
        },
        TxStatus::Failed => (
            "Payment failed".to_string(),
            format!("Transfer of {} could not be completed", event.amount),
        ),
        TxStatus::Expired => (
            "Payment expired".to_string(),
            format!(
                "This payment could not be confirmed before expiring ({})",
                event.tx_id
            ),
        ),
        TxStatus::Pending | TxStatus::Confirmed => return None,
    };

    let (audience, deep_link) = match event.direction {
        Direction::Incoming => (Audience::Payee, "/sales".to_string()),
        Direction::Outgoing => (Audience::Payer, format!("/payments/{}", event.tx_id)),
    };

    Some(NotificationPayload {
        title,
        body,
        audience,
        deep_link,
    })
}

/// Builds a payload for a persisted order notification.
pub fn order_payload(notification: &OrderNotification) -> NotificationPayload {
    let title = match notification.kind {
        NotificationKind::OrderPlaced => "New order".to_string(),
        NotificationKind::OrderUpdated => "Order update".to_string(),
    };
    NotificationPayload {
        title,
        body: notification.message.clone(),
        audience: Audience::Payee,
        deep_link: format!("/orders/{}", notification.order_id),
    }
}
