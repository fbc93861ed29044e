use std::sync::Arc;

use crate::core::health::HealthCache;
use crate::core::queue::IngestBuffer;
use crate::core::recorder::TransactionRecorder;

/// Shared state reachable from every handler.
#[derive(Clone)]
pub struct AppState {
    pub buffer: Arc<IngestBuffer>,
    pub health_cache: Arc<HealthCache>,
    pub recorder: Arc<TransactionRecorder>,
    pub slow_threshold_ms: u64,
}
