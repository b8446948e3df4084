pub mod api;
pub mod config;
pub mod handlers;
pub mod infrastructure;
pub mod models;
pub mod services;

use crate::services::processor::DocumentProcessor;
use crate::services::queue::QueueService;
use crate::services::storage::BlobStorageService;
use axum::{Router, routing::get};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn BlobStorageService>,
    pub queue: Arc<dyn QueueService>,
    pub processor: Arc<dyn DocumentProcessor>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::handlers::health::health_check))
        .with_state(state)
}
