use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::db::{self, facades as store};
use crate::db::models::Facade;
use crate::state::AppState;
use crate::ws::{BroadcastMessage, FacadeId};

// --- Request types ---

#[derive(Debug, Deserialize)]
pub struct CreateFacadeRequest {
    pub name: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub width_cells: i64,
    #[serde(default)]
    pub height_cells: i64,
}

#[derive(Debug, Deserialize)]
pub struct ContentUpdateRequest {
    pub src: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentUpdateResponse {
    pub status: String,
}

// --- Handlers ---

/// GET /api/facades
pub async fn list_facades(
    State(state): State<AppState>,
) -> Result<Json<Vec<Facade>>, (StatusCode, String)> {
    let facades = db::blocking(&state.db, store::list_facades).await?;
    Ok(Json(facades))
}

/// GET /api/facades/{id}
pub async fn get_facade(
    State(state): State<AppState>,
    Path(facade_id): Path<FacadeId>,
) -> Result<Json<Facade>, (StatusCode, String)> {
    let facade = db::blocking(&state.db, move |conn| store::get_facade(conn, facade_id)).await?;
    facade
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("facade {} not found", facade_id)))
}

/// POST /api/facades
pub async fn create_facade(
    State(state): State<AppState>,
    Json(req): Json<CreateFacadeRequest>,
) -> Result<(StatusCode, Json<Facade>), (StatusCode, String)> {
    let name = req.name.trim().to_string();
    if name.is_empty() || name.len() > 128 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Facade name must be 1-128 characters".to_string(),
        ));
    }
    if req.width_cells < 0 || req.height_cells < 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "Facade dimensions cannot be negative".to_string(),
        ));
    }

    let created_at = Utc::now();
    let facade = db::blocking(&state.db, move |conn| {
        store::insert_facade(
            conn,
            &name,
            &req.city,
            &req.address,
            req.width_cells,
            req.height_cells,
            created_at,
        )
    })
    .await?;

    tracing::info!(facade_id = facade.id, name = %facade.name, "Facade registered");
    Ok((StatusCode::CREATED, Json(facade)))
}

/// POST /api/facades/{id}/content
/// Tell every display of the facade to switch to `src`, starting now.
pub async fn push_content(
    State(state): State<AppState>,
    Path(facade_id): Path<FacadeId>,
    Json(req): Json<ContentUpdateRequest>,
) -> Result<Json<ContentUpdateResponse>, (StatusCode, String)> {
    if req.src.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "src is required".to_string()));
    }

    let message = BroadcastMessage::content_update(req.src, Utc::now());
    state.hub.broadcast_to_facade(facade_id, &message).await;

    Ok(Json(ContentUpdateResponse {
        status: "broadcasted".to_string(),
    }))
}
