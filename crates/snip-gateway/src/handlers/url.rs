use crate::error::{AppError, Result};
use crate::identity::Identity;
use crate::model::{
    BatchRequestItem, BatchResponseItem, ShortenRequest, ShortenResponse, UserUrlItem,
};
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use snip_core::{BatchItem, DeleteRequest, ShortCode, Shortened};
use tracing::debug;

fn status_for(shortened: &Shortened) -> StatusCode {
    match shortened {
        Shortened::Created(_) => StatusCode::CREATED,
        Shortened::Existing(_) => StatusCode::CONFLICT,
    }
}

/// `POST /` with the long URL as the raw body.
pub async fn shorten_text_handler(
    State(state): State<AppState>,
    identity: Identity,
    body: String,
) -> Result<Response> {
    let original_url = body.trim();
    if original_url.is_empty() {
        return Err(AppError::BadRequest("request body must contain a url".into()));
    }

    let shortened = state
        .shortener()
        .shorten(identity.user_id(), original_url)
        .await?;
    let short_url = state.short_url(shortened.short_code());

    Ok((status_for(&shortened), identity, short_url).into_response())
}

/// `POST /api/shorten` with `{"url": "..."}`.
pub async fn shorten_json_handler(
    State(state): State<AppState>,
    identity: Identity,
    body: Bytes,
) -> Result<Response> {
    let request: ShortenRequest = serde_json::from_slice(&body)?;
    if request.url.trim().is_empty() {
        return Err(AppError::BadRequest(
            "no key \"url\" or empty request".into(),
        ));
    }

    let shortened = state
        .shortener()
        .shorten(identity.user_id(), request.url.trim())
        .await?;
    let response = ShortenResponse {
        result: state.short_url(shortened.short_code()),
    };

    Ok((status_for(&shortened), identity, Json(response)).into_response())
}

/// `POST /api/shorten/batch`; stores every URL or none of them.
pub async fn shorten_batch_handler(
    State(state): State<AppState>,
    identity: Identity,
    body: Bytes,
) -> Result<Response> {
    let request: Vec<BatchRequestItem> = serde_json::from_slice(&body)?;
    let items = request
        .into_iter()
        .map(|item| BatchItem {
            correlation_id: item.correlation_id,
            original_url: item.original_url,
        })
        .collect();

    let stored = state
        .shortener()
        .shorten_batch(identity.user_id(), items)
        .await?;
    let response: Vec<BatchResponseItem> = stored
        .into_iter()
        .map(|item| BatchResponseItem {
            short_url: state.short_url(&item.short_code),
            correlation_id: item.correlation_id,
        })
        .collect();

    Ok((StatusCode::CREATED, identity, Json(response)).into_response())
}

/// `GET /{id}`: temporary redirect to the stored URL.
pub async fn expand_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect> {
    let original_url = state.shortener().expand(&id).await?;
    Ok(Redirect::temporary(&original_url))
}

/// `GET /api/user/urls`: everything the caller has shortened.
pub async fn user_urls_handler(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Response> {
    let mappings = state.shortener().history(identity.user_id()).await?;
    if mappings.is_empty() {
        return Ok((StatusCode::NO_CONTENT, identity, ()).into_response());
    }

    let items: Vec<UserUrlItem> = mappings
        .into_iter()
        .map(|mapping| UserUrlItem {
            short_url: state.short_url(&mapping.short_code),
            original_url: mapping.original_url,
        })
        .collect();

    Ok((identity, Json(items)).into_response())
}

/// `DELETE /api/user/urls` with a JSON array of short codes.
///
/// Deletion happens in the background; codes the caller does not own are
/// ignored there.
pub async fn delete_user_urls_handler(
    State(state): State<AppState>,
    identity: Identity,
    body: Bytes,
) -> Result<Response> {
    let ids: Vec<String> = serde_json::from_slice(&body)?;
    // An id that is not a well-formed code cannot name any row.
    let codes: Vec<ShortCode> = ids
        .into_iter()
        .filter_map(|id| match ShortCode::new(id.as_str()) {
            Ok(code) => Some(code),
            Err(_) => {
                debug!(id = %id, "skipping malformed id in delete request");
                None
            }
        })
        .collect();

    let count = codes.len();
    for short_code in codes {
        state
            .deletes()
            .submit(DeleteRequest {
                owner: *identity.user_id(),
                short_code,
            })
            .await?;
    }
    debug!(owner = %identity.user_id(), count, "queued soft deletes");

    Ok((StatusCode::ACCEPTED, identity, ()).into_response())
}
