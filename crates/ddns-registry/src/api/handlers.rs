//! Request handlers

use axum::extract::rejection::FormRejection;
use axum::extract::{Form, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::records::{self, NewProvider, ProviderRecord};
use crate::Error;

/// Query string of `GET /providers`
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Optional provider identifier; empty means no filter
    #[serde(default)]
    pub id: Option<String>,
}

/// Form body of `POST /providers`
#[derive(Debug, Default, Deserialize)]
pub struct CreateProviderForm {
    /// Display name
    #[serde(default)]
    pub provider: String,
    /// Provider address
    #[serde(default)]
    pub url: String,
}

#[derive(Serialize)]
struct IdentityBody<'a> {
    #[serde(rename = "UUID")]
    uuid: &'a str,
}

/// `GET /providers[?id=…]`
///
/// Served from the cache. Without a filter the whole map is returned; with one,
/// the matching record, or an all-empty record when nothing matches.
pub async fn list_providers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Response {
    match query.id.filter(|id| !id.is_empty()) {
        None => {
            let snapshot = state.cache.list().await;
            Json(&*snapshot).into_response()
        }
        Some(id) => match state.cache.get(&id).await {
            Some(record) => Json(record).into_response(),
            None => {
                debug!(provider_id = %id, "Provider not in cache");
                Json(ProviderRecord::default()).into_response()
            }
        },
    }
}

/// `GET /selectedProvider`
///
/// Reads the store directly. Each selected row is emitted once, as one JSON
/// object per line; no selected rows means an empty body.
pub async fn selected_provider(State(state): State<AppState>) -> Result<Response, ApiError> {
    let selected = records::load_selected(state.store.as_ref()).await?;
    if selected.is_empty() {
        return Ok(StatusCode::OK.into_response());
    }

    let mut body = String::new();
    for record in &selected {
        body.push_str(&serde_json::to_string(record).map_err(Error::from)?);
        body.push('\n');
    }

    Ok(([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response())
}

/// `POST /providers` with form fields `provider` and `url`
///
/// Inserts the provider, then rebuilds the cache before responding so the next
/// list sees it.
pub async fn create_provider(
    State(state): State<AppState>,
    form: Result<Form<CreateProviderForm>, FormRejection>,
) -> Result<StatusCode, ApiError> {
    let Form(form) = form.map_err(|e| Error::validation(e.body_text()))?;
    let provider = NewProvider::new(form.provider, form.url)?;

    let stored = provider.insert(state.store.as_ref()).await?;
    info!(provider_id = %stored.id, name = %stored.name, "Provider created");

    state.cache.rebuild().await?;

    Ok(StatusCode::OK)
}

/// `GET /osuuid`
///
/// Any query string is ignored.
pub async fn identity(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = serde_json::to_string_pretty(&IdentityBody {
        uuid: state.identity.as_str(),
    })
    .map_err(Error::from)?;

    Ok(([(header::CONTENT_TYPE, "application/json; charset=utf-8")], body).into_response())
}

/// `GET /openui`
///
/// Always 200; the launch runs in the background and failures are only logged.
pub async fn open_companion(State(state): State<AppState>) -> StatusCode {
    let companion = Arc::clone(&state.companion);
    tokio::spawn(async move {
        companion.launch_best_effort().await;
    });
    StatusCode::OK
}

/// Reserved routes
pub async fn not_implemented() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}
