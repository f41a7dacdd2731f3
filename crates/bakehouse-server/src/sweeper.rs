use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use bakehouse_engine::BakeEngine;

/// Run the expiry sweep on a fixed interval until shutdown is signalled.
/// The sweep itself is stateless and idempotent, so a missed or doubled
/// tick is harmless.
pub async fn run(engine: Arc<BakeEngine>, interval: Duration, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let summary = engine.run_expiry_sweep(Utc::now()).await;
                if !summary.errors.is_empty() {
                    tracing::warn!(
                        errors = summary.errors.len(),
                        refunded = summary.refunded,
                        "sweep pass completed with per-bake errors"
                    );
                }
            }
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("sweeper shutting down");
                    break;
                }
            }
        }
    }
}
