use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use crate::content::ServedPage;
use crate::error::Result;
use crate::mode::Mode;
use crate::publisher::{PublishReceipt, PublishRequest, Publisher};
use crate::storage::ObjectStore;

/// Path parameters of the read routes. Extra segments are accepted and
/// ignored: a site is a single document.
#[derive(Debug, Deserialize)]
pub struct SiteParams {
    pub site: String,
}

/// Health check handler.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /api/publish`
pub async fn publish<S: ObjectStore>(
    State(publisher): State<Arc<Publisher<S>>>,
    body: Bytes,
) -> Result<Json<PublishReceipt>> {
    let request = PublishRequest::from_json(&body)?;
    let receipt = publisher.publish(&request).await?;
    Ok(Json(receipt))
}

/// `GET /s/{site}` and `GET /s/{site}/{*rest}`
pub async fn read_published<S: ObjectStore>(
    State(publisher): State<Arc<Publisher<S>>>,
    Path(params): Path<SiteParams>,
) -> Result<ServedPage> {
    publisher.serve(&params.site, Mode::Publish).await
}

/// `GET /preview/{site}`
pub async fn read_draft<S: ObjectStore>(
    State(publisher): State<Arc<Publisher<S>>>,
    Path(params): Path<SiteParams>,
) -> Result<ServedPage> {
    publisher.serve(&params.site, Mode::Draft).await
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "ok": false, "error": "not_found", "message": "no such route" })),
    )
}
