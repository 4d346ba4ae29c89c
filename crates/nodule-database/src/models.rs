//! 数据库模型

use chrono::{DateTime, Utc};
use nodule_core::models::*;
use serde_json::Value;
use sqlx::FromRow;

// 数据库表模型 - 使用FromRow trait用于SQL查询

/// 数据库患者表
#[derive(Debug, FromRow)]
pub struct DbPatient {
    pub id: i64,
    pub patient_id: String,
    pub name: String,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DbPatient> for Patient {
    fn from(db_patient: DbPatient) -> Self {
        Patient {
            id: db_patient.id,
            patient_id: db_patient.patient_id,
            name: db_patient.name,
            age: db_patient.age,
            gender: db_patient.gender,
            created_at: db_patient.created_at,
        }
    }
}

/// 数据库检查表（LEFT JOIN patients）
#[derive(Debug, FromRow)]
pub struct DbStudy {
    pub id: i64,
    pub study_id: String,
    pub patient_id: String,
    pub study_date: Option<String>,
    pub description: Option<String>,
    pub clinical_note: Option<String>,
    pub nodule_count: i32,
    pub status: String, // 存储为字符串，转换为StudyStatus枚举
    pub reviewed: bool,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub patient_name: Option<String>,
    pub patient_age: Option<i32>,
    pub patient_gender: Option<String>,
}

impl From<DbStudy> for Study {
    fn from(db_study: DbStudy) -> Self {
        Study {
            id: db_study.id,
            study_id: db_study.study_id,
            patient_id: db_study.patient_id,
            study_date: db_study.study_date,
            description: db_study.description,
            clinical_note: db_study.clinical_note,
            nodule_count: db_study.nodule_count,
            status: db_study.status.parse().unwrap_or(StudyStatus::Pending),
            reviewed: db_study.reviewed,
            reviewed_at: db_study.reviewed_at,
            reviewed_by: db_study.reviewed_by,
            created_at: db_study.created_at,
            patient_name: db_study.patient_name,
            patient_age: db_study.patient_age,
            patient_gender: db_study.patient_gender,
        }
    }
}

/// 数据库DICOM文件表
#[derive(Debug, FromRow)]
pub struct DbDicomFile {
    pub id: i64,
    pub study_id: String,
    pub file_path: String,
    pub file_name: String,
    pub instance_number: Option<i32>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<DbDicomFile> for DicomFile {
    fn from(db_file: DbDicomFile) -> Self {
        DicomFile {
            id: db_file.id,
            study_id: db_file.study_id,
            file_path: db_file.file_path,
            file_name: db_file.file_name,
            instance_number: db_file.instance_number,
            uploaded_at: db_file.uploaded_at,
        }
    }
}

/// 数据库结节表
#[derive(Debug, FromRow)]
pub struct DbNodule {
    pub id: i64,
    pub study_id: String,
    pub nodule_number: Option<i32>,
    pub location: Option<String>,
    pub size_mm: Option<f64>,
    pub risk_level: Option<String>,
    pub coordinates: Option<String>, // JSON文本
    pub slice_index: Option<i32>,
    pub probability: Option<f64>,
    pub doctor_assessment: Option<String>,
    pub notes: Option<String>,
    pub include_in_report: bool,
    pub reviewed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DbNodule> for Nodule {
    fn from(db_nodule: DbNodule) -> Self {
        Nodule {
            id: db_nodule.id,
            study_id: db_nodule.study_id,
            nodule_number: db_nodule.nodule_number,
            location: db_nodule.location,
            size_mm: db_nodule.size_mm,
            risk_level: db_nodule.risk_level,
            coordinates: db_nodule.coordinates.map(|text| parse_json_text(&text)),
            slice_index: db_nodule.slice_index,
            probability: db_nodule.probability,
            doctor_assessment: db_nodule.doctor_assessment,
            notes: db_nodule.notes,
            include_in_report: db_nodule.include_in_report,
            reviewed: db_nodule.reviewed,
            created_at: db_nodule.created_at,
        }
    }
}

/// 数据库报告表
#[derive(Debug, FromRow)]
pub struct DbReport {
    pub id: i64,
    pub report_id: String,
    pub study_id: String,
    pub patient_id: String,
    pub patient_name: Option<String>,
    pub study_date: Option<String>,
    pub nodule_count: i32,
    pub included_nodule_count: i32,
    pub report_data: String, // JSON文本
    pub generated_by: Option<String>,
    pub generated_by_id: Option<i64>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbReport> for Report {
    fn from(db_report: DbReport) -> Self {
        Report {
            id: db_report.id,
            report_id: db_report.report_id,
            study_id: db_report.study_id,
            patient_id: db_report.patient_id,
            patient_name: db_report.patient_name,
            study_date: db_report.study_date,
            nodule_count: db_report.nodule_count,
            included_nodule_count: db_report.included_nodule_count,
            report_data: parse_json_text(&db_report.report_data),
            generated_by: db_report.generated_by,
            generated_by_id: db_report.generated_by_id,
            status: db_report.status,
            created_at: db_report.created_at,
        }
    }
}

/// 数据库用户表（不含密码列）
#[derive(Debug, FromRow)]
pub struct DbUser {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub specialization: Option<String>,
    pub department: Option<String>,
    pub hospital: Option<String>,
    pub license_number: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<DbUser> for User {
    fn from(db_user: DbUser) -> Self {
        User {
            id: db_user.id,
            username: db_user.username,
            first_name: db_user.first_name,
            last_name: db_user.last_name,
            email: db_user.email,
            role: db_user.role.parse().unwrap_or_default(),
            status: db_user.status.parse().unwrap_or(UserStatus::Inactive),
            specialization: db_user.specialization,
            department: db_user.department,
            hospital: db_user.hospital,
            license_number: db_user.license_number,
            last_login: db_user.last_login,
            created_at: db_user.created_at,
        }
    }
}

/// 登录用：用户行加密码
#[derive(Debug, FromRow)]
pub struct DbUserCredentials {
    #[sqlx(flatten)]
    pub user: DbUser,
    pub password: String,
}

impl From<DbUserCredentials> for UserCredentials {
    fn from(row: DbUserCredentials) -> Self {
        UserCredentials {
            user: User::from(row.user),
            password: row.password,
        }
    }
}

/// 数据库活动日志表
#[derive(Debug, FromRow)]
pub struct DbActivityLog {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub action: String,
    pub action_type: String,
    pub details: String,
    pub created_at: DateTime<Utc>,
}

impl From<DbActivityLog> for ActivityLog {
    fn from(db_log: DbActivityLog) -> Self {
        ActivityLog {
            id: db_log.id,
            user_id: db_log.user_id,
            username: db_log.username,
            action: db_log.action,
            action_type: db_log.action_type,
            details: db_log.details,
            created_at: db_log.created_at,
        }
    }
}

/// 仪表盘统计查询结果
#[derive(Debug, FromRow)]
pub struct DbDashboardStats {
    pub total_users: i64,
    pub doctor_count: i64,
    pub admin_count: i64,
    pub total_patients: i64,
    pub total_studies: i64,
    pub completed_studies: i64,
    pub pending_studies: i64,
    pub last_24h_logins: i64,
}

impl From<DbDashboardStats> for DashboardStats {
    fn from(row: DbDashboardStats) -> Self {
        DashboardStats {
            total_users: row.total_users,
            doctor_count: row.doctor_count,
            admin_count: row.admin_count,
            total_patients: row.total_patients,
            total_studies: row.total_studies,
            completed_studies: row.completed_studies,
            pending_studies: row.pending_studies,
            last_24h_logins: row.last_24h_logins,
        }
    }
}

/// 用户统计查询结果
#[derive(Debug, FromRow)]
pub struct DbUserStats {
    pub total: i64,
    pub doctors: i64,
    pub admins: i64,
    pub active: i64,
    pub inactive: i64,
}

impl From<DbUserStats> for UserStats {
    fn from(row: DbUserStats) -> Self {
        UserStats {
            total: row.total,
            doctors: row.doctors,
            admins: row.admins,
            active: row.active,
            inactive: row.inactive,
        }
    }
}

/// 旧数据可能保存了非JSON文本，此时原样作为字符串返回
fn parse_json_text(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
