use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::models::LoginRequest;
use crate::store::SharedStore;

// ---

pub fn router() -> Router<SharedStore> {
    // ---
    Router::new().route("/login", post(handler))
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    message: &'static str,
    user_id: i64,
    email: String,
}

/// One-shot credential check. No token or session is issued.
async fn handler(
    State(store): State<SharedStore>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<LoginResponse>> {
    // ---
    let Json(request) = body?;
    let (email, password) = request.credentials()?;

    // Same error whichever of the two fields was wrong
    let user = store
        .find_user_by_credentials(&email, &password)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid credentials".to_string()))?;

    info!("POST /login - user {} authenticated", user.user_id);

    Ok(Json(LoginResponse {
        message: "Login successful",
        user_id: user.user_id,
        email: user.email,
    }))
}
