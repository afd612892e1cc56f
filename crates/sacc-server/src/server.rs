use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use sacc_chaincode::Chaincode;
use sacc_store::WorldState;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;

/// HTTP host for one chaincode instance.
pub struct SaccServer {
    config: ServerConfig,
    chaincode: Arc<Chaincode>,
}

impl SaccServer {
    pub fn new(config: ServerConfig, store: Arc<dyn WorldState>) -> Self {
        let chaincode = Arc::new(Chaincode::with_default_handlers(
            store,
            config.chaincode.clone(),
        ));
        Self { config, chaincode }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn chaincode(&self) -> &Arc<Chaincode> {
        &self.chaincode
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState {
            chaincode: Arc::clone(&self.chaincode),
        })
    }

    /// Serve until ctrl-c, then flush whatever is still buffered.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "sacc server listening");

        let ticker = spawn_flush_ticker(Arc::clone(&self.chaincode), self.config.flush_tick());
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()));
        ticker.abort();

        let chaincode = Arc::clone(&self.chaincode);
        if let Err(e) = tokio::task::spawn_blocking(move || final_flush(&chaincode)).await {
            warn!(error = %e, "final flush task failed");
        }
        served
    }
}

/// Periodically fire time-based flush triggers, so buffered deltas are
/// committed even when no further invocations arrive.
///
/// Each check takes the buffer lock and may write to the store, so it runs
/// on the blocking pool like invocations do.
pub fn spawn_flush_ticker(chaincode: Arc<Chaincode>, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let cc = Arc::clone(&chaincode);
            match tokio::task::spawn_blocking(move || cc.flush_if_due()).await {
                Ok(Ok(Some(report))) if !report.is_complete() => warn!(
                    committed = report.committed.len(),
                    failed = report.failed.len(),
                    "timed flush left keys pending"
                ),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!(error = %e, "timed flush failed"),
                Err(e) => warn!(error = %e, "timed flush task failed"),
            }
        }
    })
}

fn final_flush(chaincode: &Chaincode) {
    match chaincode.flush() {
        Ok(report) if report.is_complete() => {
            info!(committed = report.committed.len(), "final flush complete")
        }
        Ok(report) => {
            for failure in &report.failed {
                warn!(key = %failure.key, error = %failure.error, "buffered delta lost at shutdown");
            }
        }
        Err(e) => warn!(error = %e, "final flush failed"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for ctrl-c; shutting down");
    }
    info!("shutdown requested");
}
