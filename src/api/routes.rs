//! Route definitions for the API.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::SharedState;

/// Create the main API router
pub fn create_router(state: SharedState) -> Router {
    let refresh_routes = Router::new()
        .route("/versions", put(handlers::refresh::refresh_all_projects))
        .route("/snapshots", put(handlers::refresh::refresh_snapshots))
        .route("/revisions", put(handlers::refresh::refresh_revisions))
        .route(
            "/missing-versions",
            put(handlers::refresh::refresh_missing_versions),
        )
        .route("/mismatches", put(handlers::refresh::refresh_mismatches))
        .route(
            "/:group/:artifact/versions",
            put(handlers::refresh::refresh_project),
        )
        .route(
            "/:group/:artifact/:version",
            put(handlers::refresh::refresh_version),
        );

    let eviction_routes = Router::new()
        .route("/unused", delete(handlers::purge::evict_unused))
        .route(
            "/:group/:artifact/oldest",
            delete(handlers::purge::evict_oldest),
        )
        .route(
            "/:group/:artifact/:version",
            delete(handlers::purge::evict_version),
        )
        .route(
            "/:group/:artifact/:version/hard",
            delete(handlers::purge::delete_version),
        )
        .route(
            "/:group/:artifact/:version/deprecate",
            post(handlers::purge::deprecate_version),
        );

    let notification_routes = Router::new()
        .route(
            "/",
            get(handlers::notifications::list).delete(handlers::notifications::delete_all),
        )
        .route(
            "/dead-letters",
            get(handlers::notifications::dead_letters),
        );

    let schedule_routes = Router::new()
        .route("/", get(handlers::schedules::list))
        .route("/:name/run", post(handlers::schedules::run));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest(
            "/api/v1",
            Router::new()
                .nest("/artifacts-refresh", refresh_routes)
                .nest("/artifact-eviction", eviction_routes)
                .nest("/notifications", notification_routes)
                .nest("/schedules", schedule_routes)
                .route(
                    "/versions/mismatch",
                    get(handlers::reconciliation::find_mismatches),
                )
                .route(
                    "/refresh-status/:group/:artifact/:version",
                    get(handlers::refresh_status::get_status),
                ),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
