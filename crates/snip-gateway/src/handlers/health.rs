use crate::error::Result;
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;

/// Reports whether storage is reachable.
pub async fn ping_handler(State(state): State<AppState>) -> Result<StatusCode> {
    state.shortener().ping().await?;
    Ok(StatusCode::OK)
}
