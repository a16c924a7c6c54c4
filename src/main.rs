// =============================================================================
// Bullion Index Engine — Main Entry Point
// =============================================================================
//
// A signal-processing daemon: fetch spot quotes for four precious metals,
// run the index pipeline, publish the composite to the price oracle under
// the discovery-phase schedule. The engine is single-owner and synchronous;
// this file holds all the I/O around it.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod config;
mod engine;
mod history;
mod metal;
mod oracle;
mod publish;
mod quotes;
mod regime;
mod risk;
mod state;
mod volatility;
mod weights;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::{Engine, TickReport};
use crate::metal::Metal;
use crate::oracle::OracleClient;
use crate::publish::{to_micro_units, PublicationGate};
use crate::quotes::QuoteClient;
use crate::state::{EngineSnapshot, SharedState};

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║        Bullion Index Engine — Starting Up               ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration — refusing to start");
            std::process::exit(1);
        }
    };

    // ── 2. External clients ──────────────────────────────────────────────
    let quote_client = QuoteClient::new(&config.quote_api_key);
    let oracle_client = OracleClient::new(
        &config.rpc_url,
        &config.oracle_address,
        &config.private_key,
    );

    // ── 3. Oracle handshake ──────────────────────────────────────────────
    match oracle_client.min_update_interval().await {
        Ok(seconds) => {
            info!(min_update_interval_secs = seconds, "oracle handshake ok");
        }
        Err(e) => {
            error!(error = %e, "initial oracle handshake failed");
            std::process::exit(1);
        }
    }

    // ── 4. Status API ────────────────────────────────────────────────────
    let shared = SharedState::new();
    let api_state = shared.clone();
    let bind_addr = config.bind_addr.clone();
    tokio::spawn(async move {
        let app = api::router(api_state);
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .expect("Failed to bind status API");
        info!(addr = %bind_addr, "status API listening");
        axum::serve(listener, app)
            .await
            .expect("status API failed");
    });

    // ── 5. Engine ────────────────────────────────────────────────────────
    let gate = PublicationGate::new(config.publish_hours_utc.clone(), config.discovery_phase);
    let mut engine = Engine::new(gate);

    // ── 6. Shutdown watcher ──────────────────────────────────────────────
    // Ctrl+C only sets a flag: an in-flight tick always completes before
    // the loop observes it, so no tick is interrupted mid-mutation.
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_notify = Arc::new(Notify::new());
    {
        let flag = shutdown_flag.clone();
        let notify = shutdown_notify.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Shutdown signal received — draining current tick");
                flag.store(true, Ordering::SeqCst);
                notify.notify_waiters();
            }
        });
    }

    // ── 7. Tick loop ─────────────────────────────────────────────────────
    let mut interval =
        tokio::time::interval(std::time::Duration::from_millis(config.update_interval_ms));
    info!(
        update_interval_ms = config.update_interval_ms,
        "index engine running — press Ctrl+C to stop"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown_notify.notified() => break,
        }

        if let Err(e) = run_tick(&mut engine, &quote_client, &oracle_client, &shared).await {
            warn!(error = %e, "tick abandoned");
        }
        if shutdown_flag.load(Ordering::SeqCst) {
            break;
        }
    }

    info!("Bullion Index Engine shut down complete.");
    Ok(())
}

/// One full tick: fetch quotes, run the engine, publish if the gate opened.
///
/// Any error abandons the tick; engine state is only mutated inside
/// `Engine::tick`, which validates all four quotes before touching history.
async fn run_tick(
    engine: &mut Engine,
    quote_client: &QuoteClient,
    oracle_client: &OracleClient,
    shared: &Arc<SharedState>,
) -> Result<()> {
    let quotes = quote_client
        .fetch_all()
        .await
        .context("quote fetch failed")?;

    let report = engine.tick(Utc::now(), quotes)?;

    let published = if report.publish {
        publish_report(oracle_client, &report).await
    } else {
        false
    };

    shared.update(EngineSnapshot::from_report(&report, published));
    Ok(())
}

/// Push one tick's values to the oracle. Rejections and read-back failures
/// are logged and non-fatal; the smoothed weights converge next tick.
async fn publish_report(oracle_client: &OracleClient, report: &TickReport) -> bool {
    let index_e6 = to_micro_units(report.index_value);
    let xau_e6 = to_micro_units(report.prices_per_gram[Metal::Xau]);
    let xag_e6 = to_micro_units(report.prices_per_gram[Metal::Xag]);
    let xpt_e6 = to_micro_units(report.prices_per_gram[Metal::Xpt]);
    let xpd_e6 = to_micro_units(report.prices_per_gram[Metal::Xpd]);

    match oracle_client
        .set_price_with_metals(index_e6, xau_e6, xag_e6, xpt_e6, xpd_e6)
        .await
    {
        Ok(Some(tx_id)) => {
            info!(tx_id = %tx_id, index_e6, "index published");
            // Read back the stored value; a failure here is informational.
            match oracle_client.get_price_e6().await {
                Ok(stored) => debug!(stored_e6 = stored, "oracle read-back ok"),
                Err(e) => warn!(error = %e, "post-publish oracle read failed"),
            }
            true
        }
        Ok(None) => {
            warn!("oracle rejected update: price change too large");
            false
        }
        Err(e) => {
            warn!(error = %e, "oracle publish failed");
            false
        }
    }
}
