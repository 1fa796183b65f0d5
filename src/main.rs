use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payflow::application::context::{EngineContext, EngineStores};
use payflow::application::hub::{StatusEvent, Topic};
use payflow::application::notify::payment_payload;
use payflow::application::tracker::PollConfig;
use payflow::domain::intent::IntentStatus;
use payflow::domain::money::Amount;
use payflow::domain::order::LineItem;
use payflow::domain::ports::ConfirmationStatus;
use payflow::domain::transaction::{Address, Receipt};
use payflow::infrastructure::simulated::SimulatedGateway;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Runs a simulated order-and-payment round trip against the durable
/// JSON-file store, then prints the reconciled history.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory for the persisted JSON namespaces.
    #[arg(long, default_value = ".payflow")]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let gateway = SimulatedGateway::new();
    let stores = EngineStores::json_file(&cli.data_dir).into_diagnostic()?;
    let config = PollConfig {
        initial_delay: Duration::from_millis(200),
        interval: Duration::from_millis(200),
        finality_depth: 1,
    };
    let context = EngineContext::new(Arc::new(gateway.clone()), stores, config);

    // Stand-in for the push transport: log the payloads we would deliver.
    let _push = context.hub().subscribe(
        Topic::All,
        Arc::new(|event: &StatusEvent| {
            if let Some(payload) = payment_payload(event) {
                info!(
                    title = %payload.title,
                    deep_link = %payload.deep_link,
                    "push notification"
                );
            }
        }),
    );

    let payee = Address::new("cafe-v1");
    let items = vec![
        LineItem::new("espresso", Amount::new(dec!(0.025)).into_diagnostic()?, 1, 4),
        LineItem::new("croissant", Amount::new(dec!(0.03)).into_diagnostic()?, 2, 10),
    ];
    let (order, intent, tx_id) = context
        .place_order(payee.clone(), items)
        .await
        .into_diagnostic()?;
    info!(order = %order.id, intent = %intent.id, watching = %tx_id, "order placed, awaiting payment");

    // Simulate the payer's transfer landing on the ledger.
    gateway
        .script_confirmation(
            payee.clone(),
            Amount::new(order.total).into_diagnostic()?,
            ConfirmationStatus {
                found: true,
                receipt: Some(Receipt::new("demo-transfer-1")),
                confirmations: 3,
                block_height: Some(128),
            },
        )
        .await;

    let mut completed = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let current = context.intents().get(&intent.id).await.into_diagnostic()?;
        if current.status == IntentStatus::Completed {
            completed = true;
            break;
        }
    }
    if !completed {
        eprintln!("payment was not confirmed before the demo timed out");
    }

    let view = context.merger().all_transactions(&payee).await.into_diagnostic()?;
    println!("reconciled history for {payee} (partial: {}):", view.partial);
    for record in &view.records {
        println!(
            "  {}  {}  {}  {}  receipt={}",
            record.created_at.to_rfc3339(),
            record.status,
            record.amount,
            record.description,
            record
                .receipt
                .as_ref()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }

    let unread = context.orders().list_unread(&payee).await.into_diagnostic()?;
    println!("unread notifications: {}", unread.len());
    for notification in &unread {
        println!("  [{}] {}", notification.created_at.to_rfc3339(), notification.message);
    }

    context.shutdown().await.into_diagnostic()?;
    Ok(())
}
