use std::sync::Arc;

use tokio::sync::Mutex;

use crate::services::RecommendationService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RecommendationService>,
    /// Serialises runs; the cache store supports a single writer
    pub run_lock: Arc<Mutex<()>>,
    pub store_url: String,
}

impl AppState {
    pub fn new(service: RecommendationService, store_url: String) -> Self {
        Self {
            service: Arc::new(service),
            run_lock: Arc::new(Mutex::new(())),
            store_url,
        }
    }
}
