//! 核心数据模型定义

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::NoduleError;

/// 患者基本信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: i64,
    pub patient_id: String, // 医院内部患者ID
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 新建患者请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub patient_id: String,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
}

impl NewPatient {
    pub fn validate(&self) -> crate::Result<()> {
        if self.patient_id.trim().is_empty() {
            return Err(NoduleError::Validation("patient_id is required".to_string()));
        }
        if self.name.trim().is_empty() {
            return Err(NoduleError::Validation("name is required".to_string()));
        }
        if let Some(age) = self.age {
            if !(0..=150).contains(&age) {
                return Err(NoduleError::Validation(format!("age out of range: {}", age)));
            }
        }
        Ok(())
    }
}

/// 检查状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StudyStatus {
    Pending,   // 等待AI分析
    Completed, // AI结果已就绪
}

impl StudyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyStatus::Pending => "pending",
            StudyStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for StudyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StudyStatus {
    type Err = NoduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(StudyStatus::Pending),
            "completed" => Ok(StudyStatus::Completed),
            other => Err(NoduleError::Validation(format!("Unknown study status: {}", other))),
        }
    }
}

/// 检查信息（含关联患者字段）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Study {
    pub id: i64,
    pub study_id: String,
    pub patient_id: String,
    pub study_date: Option<String>,
    pub description: Option<String>,
    pub clinical_note: Option<String>,
    pub nodule_count: i32,
    pub status: StudyStatus,
    pub reviewed: bool,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub patient_age: Option<i32>,
    pub patient_gender: Option<String>,
}

/// 新建检查请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudy {
    pub study_id: String,
    pub patient_id: String,
    pub study_date: Option<String>,
    pub description: Option<String>,
    pub clinical_note: Option<String>,
    #[serde(default)]
    pub nodule_count: Option<i32>,
}

impl NewStudy {
    pub fn validate(&self) -> crate::Result<()> {
        if !crate::utils::is_safe_path_segment(&self.study_id) {
            return Err(NoduleError::Validation(format!("Invalid study_id: {:?}", self.study_id)));
        }
        if self.patient_id.trim().is_empty() {
            return Err(NoduleError::Validation("patient_id is required".to_string()));
        }
        if matches!(self.nodule_count, Some(n) if n < 0) {
            return Err(NoduleError::Validation("nodule_count must not be negative".to_string()));
        }
        Ok(())
    }
}

/// DICOM文件记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DicomFile {
    pub id: i64,
    pub study_id: String,
    pub file_path: String, // 对外URL路径，例如 /uploads/STD-1/slice001.dcm
    pub file_name: String,
    pub instance_number: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

/// 新DICOM文件记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewDicomFile {
    pub study_id: String,
    pub file_path: String,
    pub file_name: String,
    pub instance_number: Option<i32>,
}

/// 结节信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nodule {
    pub id: i64,
    pub study_id: String,
    pub nodule_number: Option<i32>,
    pub location: Option<String>,
    pub size_mm: Option<f64>,
    pub risk_level: Option<String>,
    pub coordinates: Option<Value>,
    pub slice_index: Option<i32>,
    pub probability: Option<f64>,
    pub doctor_assessment: Option<String>,
    pub notes: Option<String>,
    pub include_in_report: bool,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
}

/// 新建结节请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewNodule {
    pub study_id: String,
    pub nodule_number: Option<i32>,
    pub location: Option<String>,
    pub size_mm: Option<f64>,
    pub risk_level: Option<String>,
    pub coordinates: Option<Value>,
    pub slice_index: Option<i32>,
    pub probability: Option<f64>,
    pub doctor_assessment: Option<String>,
    pub notes: Option<String>,
    pub include_in_report: Option<bool>,
    pub reviewed: Option<bool>,
}

impl NewNodule {
    pub fn validate(&self) -> crate::Result<()> {
        if self.study_id.trim().is_empty() {
            return Err(NoduleError::Validation("study_id is required".to_string()));
        }
        validate_measurements(self.size_mm, self.probability)
    }
}

/// 结节部分更新，未提供的字段保持不变
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NoduleUpdate {
    pub location: Option<String>,
    pub size_mm: Option<f64>,
    pub risk_level: Option<String>,
    pub slice_index: Option<i32>,
    pub probability: Option<f64>,
    pub doctor_assessment: Option<String>,
    pub notes: Option<String>,
    pub include_in_report: Option<bool>,
    pub reviewed: Option<bool>,
}

impl NoduleUpdate {
    pub fn validate(&self) -> crate::Result<()> {
        validate_measurements(self.size_mm, self.probability)
    }

    pub fn is_empty(&self) -> bool {
        self.location.is_none()
            && self.size_mm.is_none()
            && self.risk_level.is_none()
            && self.slice_index.is_none()
            && self.probability.is_none()
            && self.doctor_assessment.is_none()
            && self.notes.is_none()
            && self.include_in_report.is_none()
            && self.reviewed.is_none()
    }
}

fn validate_measurements(size_mm: Option<f64>, probability: Option<f64>) -> crate::Result<()> {
    if let Some(size) = size_mm {
        if !size.is_finite() || size < 0.0 {
            return Err(NoduleError::Validation(format!("Invalid size_mm: {}", size)));
        }
    }
    if let Some(p) = probability {
        if !(0.0..=1.0).contains(&p) {
            return Err(NoduleError::Validation(format!("probability must be within [0, 1]: {}", p)));
        }
    }
    Ok(())
}

/// 诊断报告
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Report {
    pub id: i64,
    pub report_id: String,
    pub study_id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub study_date: Option<String>,
    pub nodule_count: i32,
    pub included_nodule_count: i32,
    pub report_data: Value,
    pub generated_by: Option<String>,
    pub generated_by_id: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// 待写入的报告
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReport {
    pub report_id: String,
    pub study_id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub study_date: Option<String>,
    pub nodule_count: i32,
    pub included_nodule_count: i32,
    pub report_data: Value,
    pub generated_by: Option<String>,
    pub generated_by_id: Option<i64>,
}

/// 用户角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserRole {
    #[default]
    Doctor,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Doctor => "Doctor",
            UserRole::Admin => "Admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = NoduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Doctor" => Ok(UserRole::Doctor),
            "Admin" => Ok(UserRole::Admin),
            other => Err(NoduleError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

/// 用户状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum UserStatus {
    #[default]
    #[serde(alias = "Aktif")]
    Active,
    #[serde(alias = "Pasif")]
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "Active",
            UserStatus::Inactive => "Inactive",
        }
    }
}

impl FromStr for UserStatus {
    type Err = NoduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" | "Aktif" => Ok(UserStatus::Active),
            "Inactive" | "Pasif" => Ok(UserStatus::Inactive),
            other => Err(NoduleError::Validation(format!("Unknown user status: {}", other))),
        }
    }
}

/// 用户信息（不包含密码）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub specialization: Option<String>,
    pub department: Option<String>,
    pub hospital: Option<String>,
    pub license_number: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// 新建用户请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub role: UserRole,
}

impl NewUser {
    pub fn validate(&self) -> crate::Result<()> {
        for (field, value) in [
            ("username", &self.username),
            ("password", &self.password),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("email", &self.email),
        ] {
            if value.trim().is_empty() {
                return Err(NoduleError::Validation(format!("{} is required", field)));
            }
        }
        if !self.email.contains('@') {
            return Err(NoduleError::Validation(format!("Invalid email: {}", self.email)));
        }
        Ok(())
    }
}

/// 用户资料更新
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub specialization: Option<String>,
    pub department: Option<String>,
    pub hospital: Option<String>,
    pub license_number: Option<String>,
}

/// 登录校验所需的用户凭据
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password: String,
}

/// 活动日志
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub action_type: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

/// 新活动日志
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivityLog {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub action_type: String,
    pub details: Option<String>,
}

/// 管理员仪表盘统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub doctor_count: i64,
    pub admin_count: i64,
    pub total_patients: i64,
    pub total_studies: i64,
    pub completed_studies: i64,
    pub pending_studies: i64,
    #[serde(rename = "last24hLogins")]
    pub last_24h_logins: i64,
}

/// 用户统计
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStats {
    pub total: i64,
    pub doctors: i64,
    pub admins: i64,
    pub active: i64,
    pub inactive: i64,
}
