pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::activity::handlers as activity;
use crate::live::handlers as live;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Live updates
        .route("/ws/notifications", get(live::handle_socket_upgrade))
        .route("/api/v1/notifications/push", post(live::handle_publish))
        // Activity log
        .route(
            "/api/activity-log",
            post(activity::handle_append_activity).get(activity::handle_list_activity),
        )
        .with_state(state)
}
