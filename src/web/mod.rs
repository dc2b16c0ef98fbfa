//! HTTP surface: router, handlers, the response envelope and extractors
//! that report their rejections through it.

pub mod envelope;
pub mod extract;
pub mod handlers;
pub mod models;

use axum::{
    Router,
    http::Method,
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use envelope::ApiResponse;
pub use extract::{ApiJson, ApiPath, ApiQuery};

use crate::state::AppState;
use handlers::{
    create_creation_comment, create_life_comment, fallback, get_creation, healthcheck,
    life_status, like_creation, like_life, list_creation_comments, list_creations,
    list_life_comments, list_thoughts, list_tools,
};

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/creations", get(list_creations))
        .route("/creations/:id", get(get_creation))
        .route(
            "/creations/:id/comments",
            get(list_creation_comments).post(create_creation_comment),
        )
        .route("/creations/:id/like", post(like_creation))
        .route("/life/status", get(life_status))
        .route("/life/like", post(like_life))
        .route(
            "/life/comments",
            get(list_life_comments).post(create_life_comment),
        )
        .route("/thoughts", get(list_thoughts))
        .route("/tools", get(list_tools));

    Router::new()
        .route("/health", get(healthcheck))
        .nest("/api", api)
        .fallback(fallback)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
