mod common;

use common::{amount, fast_config};
use payflow::application::context::{EngineContext, EngineStores};
use payflow::domain::intent::IntentStatus;
use payflow::domain::transaction::{Address, Receipt, TxStatus};
use payflow::infrastructure::simulated::SimulatedGateway;
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn context_at(dir: &std::path::Path) -> EngineContext {
    EngineContext::new(
        Arc::new(SimulatedGateway::new()),
        EngineStores::json_file(dir).unwrap(),
        fast_config(),
    )
}

#[tokio::test]
async fn test_completed_intent_survives_restart() {
    let dir = tempdir().unwrap();
    let payee = Address::new("V1");

    let intent_id = {
        let context = context_at(dir.path());
        let intent = context
            .intents()
            .create(payee.clone(), amount("0.5"), "table 4")
            .await
            .unwrap();
        context
            .intents()
            .complete(&intent.id, Receipt::new("sig-1"))
            .await
            .unwrap();
        let id = intent.id.clone();
        context.shutdown().await.unwrap();
        id
    };

    let context = context_at(dir.path());
    let intent = context.intents().get(&intent_id).await.unwrap();
    assert_eq!(intent.status, IntentStatus::Completed);

    let tx_id = intent.tx_id.unwrap();
    let record = context
        .tracker()
        .get_transaction(&tx_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, TxStatus::Finalized);
    assert_eq!(record.receipt, Some(Receipt::new("sig-1")));
    context.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_namespace_files_written() {
    let dir = tempdir().unwrap();
    let context = context_at(dir.path());
    let payee = Address::new("V1");

    let intent = context
        .intents()
        .create(payee.clone(), amount("1.0"), "x")
        .await
        .unwrap();
    context
        .intents()
        .complete(&intent.id, Receipt::new("sig-1"))
        .await
        .unwrap();
    context.shutdown().await.unwrap();

    assert!(dir.path().join("transactions.json").exists());
    assert!(dir.path().join("vendor_transactions.json").exists());

    // Amounts live on disk as exact strings, timestamps as ISO-8601.
    let raw = fs::read_to_string(dir.path().join("vendor_transactions.json")).unwrap();
    assert!(raw.contains("\"amount\": \"1.0\""));
    assert!(raw.contains("\"created_at\""));
}

#[tokio::test]
async fn test_corrupt_store_degrades_to_empty_not_crash() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("vendor_transactions.json"), b"\x00garbage").unwrap();
    fs::write(dir.path().join("transactions.json"), b"[{\"broken\": }").unwrap();

    let context = context_at(dir.path());
    assert!(context.intents().all().await.unwrap().is_empty());

    // The engine is fully usable after recovery.
    let intent = context
        .intents()
        .create(Address::new("V1"), amount("0.5"), "x")
        .await
        .unwrap();
    assert_eq!(
        context.intents().get(&intent.id).await.unwrap().status,
        IntentStatus::Active
    );
    context.shutdown().await.unwrap();
}
