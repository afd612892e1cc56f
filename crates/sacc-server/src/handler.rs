use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};
use tracing::warn;

use sacc_chaincode::{Chaincode, Invocation, Response};

/// Shared state handed to every route.
#[derive(Clone)]
pub struct AppState {
    pub chaincode: Arc<Chaincode>,
}

/// Health check handler.
pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Info handler. Fails with 500 if the buffer counters cannot be read.
pub async fn info_handler(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let cc = &state.chaincode;
    let stats = match cc.buffer().stats() {
        Ok(stats) => stats,
        Err(e) => {
            warn!(error = %e, "cannot read update buffer counters");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            );
        }
    };
    let (pending_keys, pending_ops) = (stats.pending_keys, stats.pending_ops);
    (StatusCode::OK, Json(json!({
        "name": "sacc-server",
        "version": env!("CARGO_PKG_VERSION"),
        "doc_type": cc.config().doc_type,
        "operations": cc.operations().iter().map(|k| k.name()).collect::<Vec<_>>(),
        "pending_keys": pending_keys,
        "pending_ops": pending_ops,
        "flushes": cc.buffer().flush_count(),
    })))
}

/// Run one invocation. The chaincode is synchronous and may block on the
/// buffer lock, so it runs on the blocking pool.
pub async fn invoke_handler(
    State(state): State<AppState>,
    Json(invocation): Json<Invocation>,
) -> (StatusCode, Json<Value>) {
    let cc = Arc::clone(&state.chaincode);
    let response = tokio::task::spawn_blocking(move || cc.invoke(&invocation))
        .await
        .unwrap_or_else(|e| Response::error(500, format!("invocation task failed: {e}")));
    render(response)
}

fn render(response: Response) -> (StatusCode, Json<Value>) {
    let status =
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match (response.payload, response.message) {
        (Some(payload), _) if status.is_success() => payload,
        (_, Some(message)) => json!({ "error": message }),
        _ => Value::Null,
    };
    (status, Json(body))
}
