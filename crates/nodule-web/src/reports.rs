//! 诊断报告

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use nodule_workflow::{ReportBuilder, ReportRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 生成报告，计数和摘要由检查及其结节补全
pub async fn create_report(
    State(state): State<AppState>,
    Json(request): Json<ReportRequest>,
) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    let study = queries
        .get_study(&request.study_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Study not found"))?;
    let nodules = queries.get_nodules_by_study(&study.study_id).await?;

    let new_report = ReportBuilder::new(&study, &nodules).build(request)?;
    let report = queries.create_report(&new_report).await?;

    info!("Report {} generated for study {}", report.report_id, report.study_id);
    Ok(Json(json!({ "success": true, "report": report })))
}

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub user_id: Option<i64>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportListQuery>,
) -> ApiResult<impl IntoResponse> {
    let queries = state.queries();
    let reports = match query.user_id {
        Some(user_id) => queries.list_reports_by_user(user_id).await?,
        None => queries.list_reports().await?,
    };
    Ok(Json(reports))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let report = state
        .queries()
        .get_report(&report_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Report not found"))?;
    Ok(Json(report))
}

pub async fn delete_report(
    State(state): State<AppState>,
    Path(report_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.queries().delete_report(&report_id).await? == 0 {
        return Err(ApiError::not_found("Report not found"));
    }
    Ok(Json(json!({ "success": true })))
}
