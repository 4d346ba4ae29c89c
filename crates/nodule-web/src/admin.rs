//! 用户管理、统计和活动日志

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use chrono::{Duration, Utc};
use nodule_core::{NewActivityLog, NewUser, ProfileUpdate, UserStatus};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ========== 用户 ==========

pub async fn create_user(
    State(state): State<AppState>,
    Json(user): Json<NewUser>,
) -> ApiResult<Json<Value>> {
    user.validate()?;
    let id = state.queries().create_user(&user).await?;
    Ok(Json(json!({ "success": true, "id": id })))
}

pub async fn list_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users = state.queries().list_users().await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let user = state
        .queries()
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(Json(user))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: UserStatus,
}

pub async fn update_user_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<StatusRequest>,
) -> ApiResult<Json<Value>> {
    state.queries().update_user_status(id, request.status).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn update_user_profile(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(profile): Json<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    if profile.first_name.trim().is_empty() || profile.last_name.trim().is_empty() {
        return Err(ApiError::bad_request("first_name and last_name are required"));
    }
    if !profile.email.contains('@') {
        return Err(ApiError::bad_request(format!("Invalid email: {}", profile.email)));
    }

    let user = state.queries().update_user_profile(id, &profile).await?;
    info!("Profile updated for user {}", id);
    Ok(Json(json!({ "success": true, "user": user })))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if state.queries().delete_user(id).await? == 0 {
        return Err(ApiError::not_found("User not found"));
    }
    Ok(Json(json!({ "success": true })))
}

// ========== 统计 ==========

pub async fn dashboard_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state.queries().get_dashboard_stats().await?;
    Ok(Json(stats))
}

pub async fn user_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state.queries().get_user_stats().await?;
    Ok(Json(stats))
}

// ========== 活动日志 ==========

pub async fn create_activity_log(
    State(state): State<AppState>,
    Json(log): Json<NewActivityLog>,
) -> ApiResult<Json<Value>> {
    if log.action.trim().is_empty() || log.action_type.trim().is_empty() {
        return Err(ApiError::bad_request("action and action_type are required"));
    }
    let id = state.queries().create_activity_log(&log).await?;
    Ok(Json(json!({ "success": true, "id": id })))
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub async fn list_activity_logs(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<impl IntoResponse> {
    let limit = query.limit.unwrap_or(50).clamp(1, 1000);
    let logs = state.queries().list_activity_logs(limit).await?;
    Ok(Json(logs))
}

#[derive(Debug, Deserialize)]
pub struct HoursQuery {
    pub hours: Option<i64>,
}

pub async fn recent_activity_logs(
    State(state): State<AppState>,
    Query(query): Query<HoursQuery>,
) -> ApiResult<impl IntoResponse> {
    let hours = query.hours.unwrap_or(24);
    if hours <= 0 {
        return Err(ApiError::bad_request("hours must be positive"));
    }
    let since = Utc::now() - Duration::hours(hours.min(24 * 365));
    let logs = state.queries().list_activity_logs_since(since).await?;
    Ok(Json(logs))
}
