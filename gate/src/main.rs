//! `gatecheck`: line-oriented gate scanner.
//!
//! Reads one scan per line from stdin (a QR scanner in keyboard mode, an NFC
//! reader bridge, or a person typing) and prints the admission result.

use gatecheck_core::checkin::CheckInService;
use gatecheck_core::environment::SystemClock;
use gatecheck_core::store::TicketStore;
use gatecheck_gate::config::{Config, StoreBackend};
use gatecheck_gate::metrics::MetricsServer;
use gatecheck_gate::{AdmissionDesk, GateCommand, demo};
use gatecheck_postgres::PostgresTicketStore;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize tracing; stdout is reserved for admission results
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.telemetry.log_filter)
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        event_id = %config.gate.event_id,
        operator = %config.gate.operator_id,
        backend = ?config.store.backend,
        "Starting gatecheck"
    );

    let mut metrics_server = None;
    if let Some(addr) = config.telemetry.metrics_addr {
        let mut server = MetricsServer::new(addr);
        server.start()?;
        metrics_server = Some(server);
    }

    let store: Arc<dyn TicketStore> = match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory demo tickets");
            Arc::new(demo::demo_store(&config.gate.event_id)?)
        }
        StoreBackend::Postgres => {
            info!("Connecting to ticket database...");
            let store = PostgresTicketStore::connect(
                &config.store.database_url,
                config.store.max_connections,
            )
            .await?;
            store.migrate().await?;
            info!("Ticket database ready");
            Arc::new(store)
        }
    };

    let service = CheckInService::new(store, Arc::new(SystemClock), config.nfc.codec());
    let desk = AdmissionDesk::new(service, config.gate.event_gate(), config.gate.operator());

    println!("Gate open for {}", config.gate.event_id);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C signal, closing gate");
                None
            }
        };
        let Some(line) = line else {
            break;
        };
        let Some(command) = GateCommand::parse(&line) else {
            continue;
        };
        match desk.handle_command(command).await {
            Some(reply) => println!("{reply}"),
            None => break,
        }
    }

    if let Some(rendered) = metrics_server.as_ref().and_then(MetricsServer::render) {
        tracing::debug!(metrics = %rendered, "Final metrics");
    }
    info!("Gate closed");
    Ok(())
}
