use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::{PublicUser, UserPatch};
use crate::store::SharedStore;

// ---

pub fn router() -> Router<SharedStore> {
    // ---
    Router::new().route(
        "/users/{user_id}",
        get(get_user).put(update_user).delete(delete_user),
    )
}

/// Every user-bearing response goes through [`PublicUser`], which has no password.
#[derive(Debug, Serialize)]
struct UserResponse {
    message: &'static str,
    user: PublicUser,
}

#[derive(Debug, Serialize)]
struct UserDeleted {
    message: &'static str,
    user_id: i64,
}

fn user_not_found() -> AppError {
    AppError::not_found("User not found")
}

async fn get_user(
    State(store): State<SharedStore>,
    user_id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<UserResponse>> {
    // ---
    let Path(user_id) = user_id?;
    let user = store.find_user(user_id).await?.ok_or_else(user_not_found)?;

    Ok(Json(UserResponse {
        message: "User retrieved successfully",
        user: user.into(),
    }))
}

async fn update_user(
    State(store): State<SharedStore>,
    user_id: Result<Path<i64>, PathRejection>,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> AppResult<Json<UserResponse>> {
    // ---
    let Path(user_id) = user_id?;
    let Json(patch) = body?;

    if store.find_user(user_id).await?.is_none() {
        return Err(user_not_found());
    }
    if patch.is_empty() {
        return Err(AppError::validation("No valid fields to update"));
    }

    let user = store
        .update_user(user_id, &patch)
        .await?
        .ok_or_else(user_not_found)?;
    info!("PUT /users/{} - updated", user_id);

    Ok(Json(UserResponse {
        message: "User updated successfully",
        user: user.into(),
    }))
}

/// The store removes the user's `data` rows along with the user.
async fn delete_user(
    State(store): State<SharedStore>,
    user_id: Result<Path<i64>, PathRejection>,
) -> AppResult<Json<UserDeleted>> {
    // ---
    let Path(user_id) = user_id?;

    if store.find_user(user_id).await?.is_none() {
        return Err(user_not_found());
    }
    store.delete_user(user_id).await?;
    info!("DELETE /users/{} - deleted", user_id);

    Ok(Json(UserDeleted {
        message: "User deleted successfully",
        user_id,
    }))
}
