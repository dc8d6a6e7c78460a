mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use crate::queue::FeatureQueue;

pub type AppState = FeatureQueue<Database>;

pub fn create_router(db: Database) -> Router {
    let api = Router::new()
        // Queue view
        .route("/snapshot", get(handlers::get_snapshot))
        .route("/queue/compact", post(handlers::compact_queue))
        // Features
        .route(
            "/features",
            get(handlers::list_features).post(handlers::create_feature),
        )
        .route("/features/bulk", post(handlers::import_features))
        .route(
            "/features/{id}",
            get(handlers::get_feature).delete(handlers::delete_feature),
        )
        // Operator transitions
        .route("/features/{id}/skip", post(handlers::skip_feature))
        .route("/features/{id}/retry", post(handlers::retry_feature))
        .route("/features/{id}/complete", post(handlers::complete_feature))
        .route("/features/{id}/requeue", post(handlers::requeue_feature))
        // Reordering
        .route("/features/{id}/top", post(handlers::move_feature_to_top))
        .route("/features/{id}/up", post(handlers::move_feature_up))
        // Worker
        .route("/worker/claim", post(handlers::claim_feature))
        .route("/features/{id}/succeed", post(handlers::succeed_feature))
        .route("/features/{id}/fail", post(handlers::fail_feature))
        // Engine control plane
        .route(
            "/config",
            get(handlers::get_config).put(handlers::update_config),
        )
        .route("/engine/status", get(handlers::get_engine_status))
        .route("/engine/pause", post(handlers::pause_engine))
        .route("/engine/resume", post(handlers::resume_engine))
        // Logs
        .route("/logs", get(handlers::list_logs).post(handlers::append_log))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(FeatureQueue::new(db))
}
