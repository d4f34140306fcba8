//! HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use levelog_http::{HandlerError, RequestContext};
use levelog_sql::QueryError;

use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub name: String,
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_item(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Path(id): Path<i64>,
) -> Result<Response, HandlerError> {
    let db = state.db.lock().await;
    let found = db.query_row(
        &ctx,
        "SELECT id, name FROM items WHERE id = ?1",
        [id],
        |row| {
            Ok(Item {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    );

    match found {
        Ok(item) => Ok(Json(item).into_response()),
        Err(QueryError::RecordNotFound) => Ok(StatusCode::NOT_FOUND.into_response()),
        Err(e) => Err(e.into()),
    }
}

pub async fn create_item(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(new_item): Json<NewItem>,
) -> Result<(StatusCode, Json<Item>), HandlerError> {
    if new_item.name.trim().is_empty() {
        return Err(HandlerError::new("item name is empty").with_status(StatusCode::BAD_REQUEST));
    }

    let db = state.db.lock().await;
    db.execute(&ctx, "INSERT INTO items (name) VALUES (?1)", [&new_item.name])?;
    let id = db.inner().last_insert_rowid();
    info!(item_id = id, "Created item");

    Ok((
        StatusCode::CREATED,
        Json(Item {
            id,
            name: new_item.name,
        }),
    ))
}

/// Always fails with two recorded errors.
pub async fn fail() -> HandlerError {
    HandlerError::new("upstream timed out").and("fallback cache empty")
}
