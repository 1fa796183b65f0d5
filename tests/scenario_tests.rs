mod common;

use common::{amount, confirmed, fast_config};
use chrono::Duration as ChronoDuration;
use payflow::application::context::{EngineContext, EngineStores};
use payflow::domain::intent::IntentStatus;
use payflow::domain::money::Amount;
use payflow::domain::order::{LineItem, NotificationKind, OrderStatus};
use payflow::domain::transaction::{Address, TxStatus};
use payflow::infrastructure::simulated::SimulatedGateway;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn context_with(
    gateway: &SimulatedGateway,
    intent_ttl: ChronoDuration,
) -> EngineContext {
    EngineContext::with_intent_ttl(
        Arc::new(gateway.clone()),
        EngineStores::in_memory(),
        fast_config(),
        intent_ttl,
    )
}

#[tokio::test]
async fn test_happy_path_intent_completed_by_one_poll() {
    let gateway = SimulatedGateway::new();
    let context = context_with(&gateway, ChronoDuration::minutes(15));
    let payee = Address::new("V1");

    let intent = context
        .intents()
        .create(payee.clone(), amount("0.5"), "table 4")
        .await
        .unwrap();
    gateway
        .script_confirmation(payee.clone(), amount("0.5"), confirmed("sig-1", 1))
        .await;

    let tx_id = context.watch_intent(&intent.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let intent = context.intents().get(&intent.id).await.unwrap();
    assert_eq!(intent.status, IntentStatus::Completed);
    assert_eq!(intent.tx_id, Some(tx_id.clone()));

    let record = context
        .tracker()
        .get_transaction(&tx_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TxStatus::Finalized);
    assert!(record.authoritative);

    context.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_timeout_expires_intent_and_halts_polling() {
    let gateway = SimulatedGateway::new();
    let context = context_with(&gateway, ChronoDuration::milliseconds(700));
    let payee = Address::new("V1");

    let intent = context
        .intents()
        .create(payee.clone(), amount("0.5"), "table 4")
        .await
        .unwrap();
    let tx_id = context.watch_intent(&intent.id).await.unwrap();

    // No gateway match ever arrives.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let intent = context.intents().get(&intent.id).await.unwrap();
    assert_eq!(intent.status, IntentStatus::Expired);
    let record = context
        .tracker()
        .get_transaction(&tx_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TxStatus::Expired);

    // No gateway calls after expiry.
    let queries_after_expiry = gateway.query_count();
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(gateway.query_count(), queries_after_expiry);

    context.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_order_marked_paid_by_payment_completion() {
    let gateway = SimulatedGateway::new();
    let context = context_with(&gateway, ChronoDuration::minutes(15));
    let payee = Address::new("cafe-v1");

    let items = vec![
        LineItem::new("espresso", Amount::new(dec!(0.025)).unwrap(), 1, 4),
        LineItem::new("croissant", Amount::new(dec!(0.03)).unwrap(), 2, 10),
    ];
    let (order, intent, _tx_id) = context.place_order(payee.clone(), items).await.unwrap();
    assert_eq!(order.status, OrderStatus::Placed);
    assert_eq!(order.total, dec!(0.0867));

    gateway
        .script_confirmation(
            payee.clone(),
            Amount::new(order.total).unwrap(),
            confirmed("sig-9", 2),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(400)).await;

    let order = context.orders().get(&order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.intent_id, Some(intent.id.clone()));

    let intent = context.intents().get(&intent.id).await.unwrap();
    assert_eq!(intent.status, IntentStatus::Completed);

    // Placed + paid facts are in the persisted log.
    let unread = context.orders().list_unread(&payee).await.unwrap();
    assert_eq!(unread.len(), 2);
    assert_eq!(unread[0].kind, NotificationKind::OrderPlaced);
    assert_eq!(unread[1].kind, NotificationKind::OrderUpdated);

    context.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_send_payment_submits_then_finalizes() {
    let gateway = SimulatedGateway::new();
    let context = context_with(&gateway, ChronoDuration::minutes(15));
    let recipient = Address::new("landlord");

    gateway
        .script_confirmation(recipient.clone(), amount("1.5"), confirmed("sim-1", 3))
        .await;
    let tx_id = context
        .send_payment(recipient.clone(), amount("1.5"), "rent")
        .await
        .unwrap();

    // Submission attached the ledger receipt before the first poll.
    let record = context
        .tracker()
        .get_transaction(&tx_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.receipt, Some(payflow::domain::transaction::Receipt::new("sim-1")));

    tokio::time::sleep(Duration::from_millis(400)).await;
    let record = context
        .tracker()
        .get_transaction(&tx_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TxStatus::Finalized);
    assert_eq!(
        record.direction,
        payflow::domain::transaction::Direction::Outgoing
    );

    context.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_send_payment_gateway_rejection_marks_failed() {
    let gateway = SimulatedGateway::new();
    let context = context_with(&gateway, ChronoDuration::minutes(15));
    gateway.set_unavailable(true).await;

    let err = context
        .send_payment(Address::new("landlord"), amount("1.5"), "rent")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        payflow::error::PaymentError::GatewayUnavailable(_)
    ));

    // The failed attempt is still on record, and nothing is being polled.
    let view = context
        .merger()
        .all_transactions(&Address::new("landlord"))
        .await
        .unwrap();
    assert!(view.partial);
    assert_eq!(view.records.len(), 1);
    assert_eq!(view.records[0].status, TxStatus::Failed);

    context.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_merged_view_after_completion_has_single_entry() {
    let gateway = SimulatedGateway::new();
    let context = context_with(&gateway, ChronoDuration::minutes(15));
    let payee = Address::new("V1");

    let intent = context
        .intents()
        .create(payee.clone(), amount("0.5"), "table 4")
        .await
        .unwrap();
    gateway
        .script_confirmation(payee.clone(), amount("0.5"), confirmed("sig-1", 1))
        .await;
    gateway
        .push_transfer(payflow::domain::ports::LedgerTransfer {
            receipt: payflow::domain::transaction::Receipt::new("sig-1"),
            address: payee.clone(),
            amount: amount("0.5"),
            direction: payflow::domain::transaction::Direction::Incoming,
            timestamp: chrono::Utc::now(),
            memo: None,
        })
        .await;

    context.watch_intent(&intent.id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let view = context.merger().all_transactions(&payee).await.unwrap();
    let with_receipt: Vec<_> = view
        .records
        .iter()
        .filter(|rec| {
            rec.receipt == Some(payflow::domain::transaction::Receipt::new("sig-1"))
        })
        .collect();
    assert_eq!(with_receipt.len(), 1);
    assert!(with_receipt[0].authoritative);

    context.shutdown().await.unwrap();
}
