use std::sync::Arc;

use crate::activity::ActivityRepository;
use crate::live::PushHub;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Pluggable activity store. Postgres when `DATABASE_URL` is set, in-memory otherwise.
    pub activity: Arc<dyn ActivityRepository>,
    /// Fan-out for live-update pushes to connected WebSocket clients.
    pub hub: PushHub,
}
