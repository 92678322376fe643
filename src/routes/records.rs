use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{DataPatch, DataRecord};
use crate::store::SharedStore;

// ---

pub fn router() -> Router<SharedStore> {
    // ---
    Router::new().route(
        "/data/record/{id}",
        get(get_record).put(update_record).delete(delete_record),
    )
}

#[derive(Debug, Serialize)]
struct RecordResponse {
    message: &'static str,
    data: DataRecord,
}

#[derive(Debug, Serialize)]
struct RecordDeleted {
    message: &'static str,
    data_id: i64,
}

fn record_not_found() -> AppError {
    AppError::not_found("Data record not found")
}

async fn get_record(
    State(store): State<SharedStore>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<RecordResponse>> {
    // ---
    let Path(id) = id?;
    let data = store.find_data(id).await?.ok_or_else(record_not_found)?;

    Ok(Json(RecordResponse {
        message: "Data record retrieved successfully",
        data,
    }))
}

/// Only the four sensor fields can change; `id`, `client_id` and
/// `created_at` in the body are ignored.
async fn update_record(
    State(store): State<SharedStore>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<DataPatch>, JsonRejection>,
) -> AppResult<Json<RecordResponse>> {
    // ---
    let Path(id) = id?;
    let Json(patch) = body?;

    if store.find_data(id).await?.is_none() {
        return Err(record_not_found());
    }
    if patch.is_empty() {
        return Err(AppError::validation("No valid fields to update"));
    }

    let data = store
        .update_data(id, &patch)
        .await?
        .ok_or_else(record_not_found)?;
    info!("PUT /data/record/{} - updated", id);

    Ok(Json(RecordResponse {
        message: "Data record updated successfully",
        data,
    }))
}

async fn delete_record(
    State(store): State<SharedStore>,
    id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<RecordDeleted>> {
    // ---
    let Path(id) = id?;

    if store.find_data(id).await?.is_none() {
        return Err(record_not_found());
    }
    store.delete_data(id).await?;
    info!("DELETE /data/record/{} - deleted", id);

    Ok(Json(RecordDeleted {
        message: "Data record deleted successfully",
        data_id: id,
    }))
}
