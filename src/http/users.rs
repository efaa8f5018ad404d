use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::error::Result;
use crate::models::{LoginRequest, LoginResponse, RegisterRequest, UserProfile};
use crate::state::AppState;

use super::extract::CurrentUser;

const REGISTERED_MESSAGE: &str =
    "Registration successful! Please check your email to verify your account.";

pub async fn register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    state.auth.register(request, false).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": REGISTERED_MESSAGE })),
    ))
}

pub async fn register_admin(
    State(state): State<AppState>,
    payload: std::result::Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>)> {
    let Json(request) = payload?;
    state.auth.register(request, true).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "message": REGISTERED_MESSAGE })),
    ))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<Value>> {
    state.auth.verify_email(&token).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Email verified successfully! You can now log in.",
    })))
}

pub async fn login(
    State(state): State<AppState>,
    payload: std::result::Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>> {
    let Json(request) = payload?;
    Ok(Json(state.auth.login(request).await?))
}

pub async fn logout(State(state): State<AppState>, caller: CurrentUser) -> Result<Json<Value>> {
    state.auth.logout(&caller.token).await?;
    Ok(Json(json!({ "message": "Logged out" })))
}

pub async fn me(caller: CurrentUser) -> Json<UserProfile> {
    Json(UserProfile::from(&caller.user))
}
