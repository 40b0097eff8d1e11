//! # Tracker Sync
//!
//! Host-side dry run of the tracker's cloud synchronization loop.
//!
//! Every reporting interval the session encodes the pending config report,
//! telemetry, network telemetry and position batch and hands them to a
//! backend that logs each document. Lines typed on stdin are treated as
//! documents pushed by the remote service, e.g.
//!
//! ```text
//! {"cfg":{"gpst":30}}
//! {"state":{"cfg":{"act":false}}}
//! ```

use anyhow::Result;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{interval, Duration};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tracker_sync::backend::{CloudEvent, CloudMessage, Endpoint, LogBackend};
use tracker_sync::codec::clock::SystemClock;
use tracker_sync::config::Config;
use tracker_sync::session::SyncSession;

/// Main entry point for Tracker Sync
///
/// Usage: `tracker-sync [config.toml]`. Without a path the built-in defaults
/// are used. `RUST_LOG` overrides the configured log level.
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or the backend
/// fails to connect.
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.reporting.log_level)),
        )
        .init();

    info!("Tracker Sync v{} starting...", env!("CARGO_PKG_VERSION"));

    let backend = LogBackend::new(&config.backend.client_id);
    let mut session = SyncSession::new(&config, backend, SystemClock::new());
    session.connect().await?;
    session.pump_events().await?;

    let mut report_interval = interval(Duration::from_millis(config.reporting.interval_ms));
    let mut inbound = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!(
        "Reporting every {} ms, paste inbound documents on stdin",
        config.reporting.interval_ms
    );
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            _ = report_interval.tick() => {
                session.clock_mut().resync();
                let report = session.publish_cycle().await;
                debug!("{:?}", report);
                session.pump_events().await?;
            }

            line = inbound.next_line(), if stdin_open => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => {
                        let message = CloudMessage::new(
                            Bytes::from(line),
                            Endpoint::Config,
                            config.backend.qos,
                        );
                        if let Err(e) = session.handle_event(CloudEvent::DataReceived(message)) {
                            warn!("Rejected inbound document: {}", e);
                        }
                    }
                    None => {
                        debug!("stdin closed");
                        stdin_open = false;
                    }
                }
            }

            // Handle Ctrl+C for graceful shutdown
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    session.disconnect().await?;
    info!("Documents sent: {}", session.backend().sent_count());

    Ok(())
}
