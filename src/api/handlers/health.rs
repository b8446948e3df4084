use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub storage: String,
    pub queue: String,
    pub processor: String,
    pub version: String,
}

fn connectivity(ok: bool) -> String {
    if ok { "connected" } else { "disconnected" }.to_string()
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (storage, queue, processor) = tokio::join!(
        state.storage.health_check(),
        state.queue.health_check(),
        state.processor.health_check(),
    );

    let status = if storage && queue && processor {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        storage: connectivity(storage),
        queue: connectivity(queue),
        processor: connectivity(processor),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
