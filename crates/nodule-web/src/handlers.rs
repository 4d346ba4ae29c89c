//! HTTP处理器：患者、检查、结节、DICOM文件和工作列表

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use nodule_core::utils::generate_patient_id;
use nodule_core::{NewNodule, NewPatient, NewStudy, NoduleError, NoduleUpdate, StudyStatus};
use nodule_dicom::{DicomHeader, WindowPreset, CT_PRESETS};
use nodule_workflow::{StudyStateMachine, WorkListFilter, WorkListManager};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 健康检查处理器
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "message": "Server is running"
    }))
}

// ========== 患者 ==========

/// 新建患者请求，未提供患者ID时自动生成
#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub patient_id: Option<String>,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

pub async fn create_patient(
    State(state): State<AppState>,
    Json(request): Json<CreatePatientRequest>,
) -> ApiResult<Json<Value>> {
    let patient = NewPatient {
        patient_id: request
            .patient_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(generate_patient_id),
        name: request.name,
        age: request.age,
        gender: request.gender,
    };
    patient.validate()?;

    let id = state.queries().create_patient(&patient).await?;
    Ok(Json(json!({ "success": true, "id": id, "patient_id": patient.patient_id })))
}

pub async fn list_patients(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let patients = state.queries().list_patients().await?;
    Ok(Json(patients))
}

pub async fn get_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let patient = state
        .queries()
        .get_patient(&patient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Patient not found"))?;
    Ok(Json(patient))
}

/// 删除患者：先删除数据库记录，再清理各检查的上传目录
pub async fn delete_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    if queries.get_patient(&patient_id).await?.is_none() {
        return Err(ApiError::not_found("Patient not found"));
    }

    let study_ids = queries.get_patient_study_ids(&patient_id).await?;
    if queries.delete_patient(&patient_id).await? == 0 {
        return Err(ApiError::not_found("Patient not found"));
    }

    for study_id in &study_ids {
        remove_study_folder(&state, study_id).await;
    }

    info!("Patient {} deleted with {} studies", patient_id, study_ids.len());
    Ok(Json(json!({ "success": true, "message": "Patient and all related data deleted" })))
}

async fn remove_study_folder(state: &AppState, study_id: &str) {
    if let Err(e) = state.store.remove_study_dir(study_id).await {
        warn!("Failed to remove uploads folder for study {}: {}", study_id, e);
    }
}

// ========== 检查 ==========

pub async fn create_study(
    State(state): State<AppState>,
    Json(study): Json<NewStudy>,
) -> ApiResult<Json<Value>> {
    study.validate()?;

    let queries = state.queries();
    if queries.get_patient(&study.patient_id).await?.is_none() {
        return Err(ApiError::not_found("Patient not found"));
    }

    let id = queries.create_study(&study).await?;
    Ok(Json(json!({ "success": true, "id": id })))
}

pub async fn list_studies(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let studies = state.queries().list_studies().await?;
    Ok(Json(studies))
}

/// 检查详情，附带DICOM文件和结节列表
pub async fn get_study(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    let study = queries
        .get_study(&study_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Study not found"))?;
    let dicom_files = queries.get_dicom_files_by_study(&study_id).await?;
    let nodules = queries.get_nodules_by_study(&study_id).await?;

    let mut body = serde_json::to_value(&study).map_err(NoduleError::from)?;
    if let Value::Object(map) = &mut body {
        map.insert("dicomFiles".to_string(), serde_json::to_value(&dicom_files).map_err(NoduleError::from)?);
        map.insert("nodules".to_string(), serde_json::to_value(&nodules).map_err(NoduleError::from)?);
    }
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdateRequest {
    pub status: String,
    pub nodule_count: Option<i32>,
}

/// 更新检查状态，转换规则由状态机决定
pub async fn update_study_status(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
    Json(request): Json<StatusUpdateRequest>,
) -> ApiResult<Json<Value>> {
    let requested: StudyStatus = request.status.parse()?;
    let queries = state.queries();
    let study = queries
        .get_study(&study_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Study not found"))?;

    let next = StudyStateMachine::new().apply_status_request(&study, requested)?;
    let nodule_count = request.nodule_count.unwrap_or(study.nodule_count);
    if nodule_count < 0 {
        return Err(ApiError::bad_request("noduleCount must not be negative"));
    }

    queries.update_study_status(&study_id, next, nodule_count).await?;
    Ok(Json(json!({ "success": true, "status": next })))
}

#[derive(Debug, Deserialize)]
pub struct ReviewedRequest {
    pub user_id: Option<i64>,
}

pub async fn mark_study_reviewed(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
    Json(request): Json<ReviewedRequest>,
) -> ApiResult<Json<Value>> {
    state.queries().mark_study_reviewed(&study_id, request.user_id).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn delete_study(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if state.queries().delete_study(&study_id).await? == 0 {
        return Err(ApiError::not_found("Study not found"));
    }
    remove_study_folder(&state, &study_id).await;

    Ok(Json(json!({ "success": true, "message": "Study and all related data deleted" })))
}

// ========== DICOM文件 ==========

pub async fn list_study_dicom_files(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let files = state.queries().get_dicom_files_by_study(&study_id).await?;
    Ok(Json(files))
}

/// 读取已上传文件的DICOM头部和默认窗宽窗位
pub async fn dicom_file_metadata(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let file = state
        .queries()
        .get_dicom_file(id)
        .await?
        .ok_or_else(|| ApiError::not_found("DICOM file not found"))?;

    let disk_path = state.store.resolve_url_path(&file.file_path)?;
    let header = tokio::task::spawn_blocking(move || DicomHeader::from_file(disk_path))
        .await
        .map_err(|e| NoduleError::Internal(format!("Header task failed: {}", e)))??;

    Ok(Json(json!({
        "file": file,
        "defaultWindow": preset_json(&header.default_window()),
        "patientAgeYears": header.age_years(),
        "header": header,
    })))
}

#[derive(Debug, Default, Deserialize)]
pub struct PresetQuery {
    pub name: Option<String>,
}

/// 预设及其显示范围
fn preset_json(preset: &WindowPreset) -> Value {
    let (min, max) = preset.range();
    json!({
        "name": preset.name,
        "center": preset.center,
        "width": preset.width,
        "min": min,
        "max": max,
    })
}

/// 窗宽窗位预设，`?name=` 时只返回指定预设
pub async fn viewer_presets(Query(query): Query<PresetQuery>) -> ApiResult<Json<Value>> {
    match query.name.as_deref() {
        Some(name) => {
            let preset = WindowPreset::by_name(name)
                .ok_or_else(|| ApiError::not_found("Window preset not found"))?;
            Ok(Json(preset_json(&preset)))
        }
        None => Ok(Json(Value::Array(CT_PRESETS.iter().map(preset_json).collect()))),
    }
}

// ========== 结节 ==========

pub async fn create_nodule(
    State(state): State<AppState>,
    Json(nodule): Json<NewNodule>,
) -> ApiResult<Json<Value>> {
    nodule.validate()?;

    let queries = state.queries();
    if queries.get_study(&nodule.study_id).await?.is_none() {
        return Err(ApiError::not_found("Study not found"));
    }

    let id = queries.save_nodule(&nodule).await?;
    Ok(Json(json!({ "success": true, "id": id })))
}

pub async fn list_study_nodules(
    State(state): State<AppState>,
    Path(study_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let nodules = state.queries().get_nodules_by_study(&study_id).await?;
    Ok(Json(nodules))
}

pub async fn get_nodule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let nodule = state
        .queries()
        .get_nodule(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Nodule not found"))?;
    Ok(Json(nodule))
}

pub async fn update_nodule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<NoduleUpdate>,
) -> ApiResult<Json<Value>> {
    update.validate()?;

    let queries = state.queries();
    queries.update_nodule(id, &update).await?;
    let nodule = queries
        .get_nodule(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Nodule not found"))?;

    Ok(Json(json!({ "success": true, "nodule": nodule })))
}

pub async fn delete_nodule(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
    if state.queries().delete_nodule(id).await? == 0 {
        return Err(ApiError::not_found("Nodule not found"));
    }
    Ok(Json(json!({ "success": true, "message": "Nodule deleted" })))
}

// ========== 工作列表 ==========

#[derive(Debug, Default, Deserialize)]
pub struct WorkListQuery {
    pub priority: Option<String>,
    pub date_range: Option<String>,
    pub only_ready: Option<bool>,
    pub search: Option<String>,
}

/// 工作列表：未出报告的检查
pub async fn worklist(
    State(state): State<AppState>,
    Query(query): Query<WorkListQuery>,
) -> ApiResult<impl IntoResponse> {
    let filter = WorkListFilter::parse(
        query.priority.as_deref(),
        query.date_range.as_deref(),
        query.only_ready,
        query.search.as_deref(),
    )?;

    let queries = state.queries();
    let studies = queries.list_studies().await?;
    let reported = queries.get_reported_study_ids().await?;

    let manager = WorkListManager::new(Utc::now().date_naive());
    Ok(Json(manager.build(studies, &reported, &filter)))
}

/// 历史检查：已出报告的检查
pub async fn past_studies(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let queries = state.queries();
    let studies = queries.list_studies().await?;
    let reports = queries.list_reports().await?;

    let manager = WorkListManager::new(Utc::now().date_naive());
    Ok(Json(manager.past_studies(studies, &reports)))
}
