//! DICOM上传与上传目录导入

use axum::{
    body::Bytes,
    extract::{Multipart, State},
    response::Json,
};
use chrono::Utc;
use nodule_core::utils::generate_patient_id;
use nodule_core::{NewDicomFile, NewPatient, NewStudy, Result};
use nodule_dicom::{is_dicom, DicomHeader};
use nodule_storage::storage::url_path;
use nodule_storage::upload_file_name;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// 种子目录无法从DICOM头部获得患者姓名时使用的名字
const FALLBACK_PATIENT_NAMES: [&str; 5] =
    ["John Smith", "Mary Johnson", "Robert Williams", "Sarah Brown", "Michael Davis"];

const SEED_STUDY_DESCRIPTION: &str = "CT Chest Study";

/// 在阻塞线程池中读取DICOM头部，失败时返回None
async fn read_header(path: PathBuf) -> Option<DicomHeader> {
    match tokio::task::spawn_blocking(move || DicomHeader::from_file(path)).await {
        Ok(Ok(header)) => Some(header),
        Ok(Err(e)) => {
            debug!("DICOM header unavailable: {}", e);
            None
        }
        Err(e) => {
            warn!("DICOM header task failed: {}", e);
            None
        }
    }
}

/// 上传DICOM文件：multipart字段 `study_id` 和若干 `dicomFiles`
pub async fn upload_dicom(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<Value>> {
    let max_files = state.settings.max_upload_files;
    let mut study_id: Option<String> = None;
    let mut files: Vec<(String, Bytes)> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "study_id" => study_id = Some(field.text().await?.trim().to_string()),
            "dicomFiles" => {
                if files.len() >= max_files {
                    warn!("Upload rejected: more than {} files", max_files);
                    return Err(ApiError::bad_request(format!(
                        "Too many files: at most {} per upload",
                        max_files
                    )));
                }
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("instance-{}.dcm", files.len() + 1));
                let data = field.bytes().await?;
                files.push((file_name, data));
            }
            other => debug!("Ignoring multipart field {}", other),
        }
    }

    if files.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }
    let study_id = study_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("study_id is required"))?;

    let queries = state.queries();
    if queries.get_study(&study_id).await?.is_none() {
        return Err(ApiError::not_found("Study not found"));
    }

    // 写入前先校验整批文件，任何一个不合格都不落盘；同名文件以最后一个为准
    let mut batch: Vec<(String, Bytes)> = Vec::with_capacity(files.len());
    for (file_name, data) in files {
        let file_name = upload_file_name(&file_name)?;
        if !is_dicom(&data) {
            warn!("Upload for study {} rejected: {} is not DICOM", study_id, file_name);
            return Err(ApiError::bad_request(format!("{} is not a DICOM file", file_name)));
        }
        match batch.iter_mut().find(|(name, _)| *name == file_name) {
            Some(entry) => entry.1 = data,
            None => batch.push((file_name, data)),
        }
    }

    let mut registered: HashSet<String> = queries
        .get_dicom_files_by_study(&study_id)
        .await?
        .into_iter()
        .map(|file| file.file_name)
        .collect();

    let mut saved = Vec::with_capacity(batch.len());
    for (index, (file_name, data)) in batch.iter().enumerate() {
        let stored = state.store.store_file(&study_id, file_name, data).await?;
        let header = read_header(stored.disk_path.clone()).await;

        let record = NewDicomFile {
            study_id: study_id.clone(),
            file_path: stored.url_path,
            file_name: stored.file_name,
            instance_number: Some(
                header
                    .and_then(|h| h.instance_number)
                    .unwrap_or(index as i32 + 1),
            ),
        };

        if registered.insert(record.file_name.clone()) {
            queries.save_dicom_file(&record).await?;
        } else {
            debug!("{} already registered for study {}, file replaced", record.file_name, study_id);
        }
        saved.push(record);
    }

    info!("Uploaded {} DICOM files for study {}", saved.len(), study_id);
    Ok(Json(json!({
        "success": true,
        "message": format!("{} DICOM files uploaded successfully", saved.len()),
        "files": saved,
    })))
}

/// 将上传目录中已有的检查目录登记到数据库，只添加新文件
pub async fn seed_dicoms(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let queries = state.queries();
    let folders = state.store.seed_folders(&state.settings.seed_prefix).await?;
    let mut results = Vec::with_capacity(folders.len());

    for (index, folder) in folders.iter().enumerate() {
        let files = state.store.list_dicom_files(folder).await?;

        if queries.get_study(folder).await?.is_none() {
            let first = match files.first() {
                Some(name) => read_header(state.store.study_dir(folder)?.join(name)).await,
                None => None,
            };
            create_seed_study(&state, folder, index, first).await?;
        }

        let existing = queries.get_dicom_files_by_study(folder).await?;
        let existing_names: HashSet<&str> = existing.iter().map(|file| file.file_name.as_str()).collect();

        let mut added = 0;
        for (position, file_name) in files.iter().enumerate() {
            if existing_names.contains(file_name.as_str()) {
                continue;
            }
            queries
                .save_dicom_file(&NewDicomFile {
                    study_id: folder.clone(),
                    file_path: url_path(folder, file_name),
                    file_name: file_name.clone(),
                    instance_number: Some(position as i32 + 1),
                })
                .await?;
            added += 1;
        }

        results.push(json!({
            "studyId": folder,
            "totalFiles": files.len(),
            "newFilesAdded": added,
            "existingFiles": existing.len(),
        }));
    }

    info!("Seeded {} study folders", folders.len());
    Ok(Json(json!({
        "success": true,
        "message": format!("Processed {} study folders", folders.len()),
        "results": results,
    })))
}

/// 为种子目录创建患者和检查，优先使用DICOM头部信息
async fn create_seed_study(
    state: &AppState,
    study_id: &str,
    index: usize,
    header: Option<DicomHeader>,
) -> Result<()> {
    let header = header.unwrap_or_default();
    let queries = state.queries();

    let patient = NewPatient {
        patient_id: generate_patient_id(),
        name: header
            .display_name()
            .unwrap_or_else(|| FALLBACK_PATIENT_NAMES[index % FALLBACK_PATIENT_NAMES.len()].to_string()),
        age: header.age_years(),
        gender: header.patient_sex.as_deref().and_then(gender_label),
    };
    queries.create_patient(&patient).await?;

    let study = NewStudy {
        study_id: study_id.to_string(),
        patient_id: patient.patient_id.clone(),
        study_date: Some(
            header
                .study_date
                .as_deref()
                .and_then(iso_date)
                .unwrap_or_else(|| Utc::now().date_naive().to_string()),
        ),
        description: Some(
            header
                .study_description
                .clone()
                .unwrap_or_else(|| SEED_STUDY_DESCRIPTION.to_string()),
        ),
        clinical_note: None,
        nodule_count: Some(0),
    };
    queries.create_study(&study).await?;

    info!("Registered seed study {} for patient {}", study_id, patient.name);
    Ok(())
}

fn gender_label(sex: &str) -> Option<String> {
    match sex.trim() {
        "M" => Some("Male".to_string()),
        "F" => Some("Female".to_string()),
        "O" => Some("Other".to_string()),
        _ => None,
    }
}

/// DICOM日期 `YYYYMMDD` 转为 `YYYY-MM-DD`
fn iso_date(value: &str) -> Option<String> {
    let value = value.trim();
    if value.len() == 8 && value.chars().all(|c| c.is_ascii_digit()) {
        Some(format!("{}-{}-{}", &value[..4], &value[4..6], &value[6..]))
    } else {
        None
    }
}
