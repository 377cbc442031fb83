use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    delete_user_urls_handler, expand_handler, ping_handler, shorten_batch_handler,
    shorten_json_handler, shorten_text_handler, user_urls_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    /// Routes plus the shared middleware stack: gzip in both directions,
    /// request tracing, and a panic boundary that answers 500.
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", post(shorten_text_handler))
            .route("/ping", get(ping_handler))
            .route("/{id}", get(expand_handler))
            .nest(
                "/api",
                Router::new()
                    .route("/shorten", post(shorten_json_handler))
                    .route("/shorten/batch", post(shorten_batch_handler))
                    .route(
                        "/user/urls",
                        get(user_urls_handler).delete(delete_user_urls_handler),
                    ),
            )
            .layer(RequestDecompressionLayer::new())
            .layer(CompressionLayer::new())
            .layer(TraceLayer::new_for_http())
            .layer(CatchPanicLayer::new())
            .with_state(state)
    }
}
