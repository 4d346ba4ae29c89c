//! 数据库查询操作

use crate::connection::DatabasePool;
use crate::models::*;
use chrono::{DateTime, Duration, Utc};
use nodule_core::{
    ActivityLog, DashboardStats, DicomFile, NewActivityLog, NewDicomFile, NewNodule, NewPatient,
    NewReport, NewStudy, NewUser, Nodule, NoduleError, NoduleUpdate, Patient, ProfileUpdate,
    Report, Result, Study, StudyStatus, User, UserCredentials, UserStats, UserStatus,
};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::HashSet;
use tracing::info;

const STUDY_SELECT: &str = r#"
    SELECT s.id, s.study_id, s.patient_id, s.study_date, s.description, s.clinical_note,
           s.nodule_count, s.status, s.reviewed, s.reviewed_at, s.reviewed_by, s.created_at,
           p.name AS patient_name, p.age AS patient_age, p.gender AS patient_gender
    FROM studies s
    LEFT JOIN patients p ON s.patient_id = p.patient_id
"#;

const USER_COLUMNS: &str = "id, username, first_name, last_name, email, role, status, \
     specialization, department, hospital, license_number, last_login, created_at";

/// 数据库查询操作接口
pub struct DatabaseQueries<'a> {
    pool: &'a DatabasePool,
}

impl<'a> DatabaseQueries<'a> {
    pub fn new(pool: &'a DatabasePool) -> Self {
        Self { pool }
    }

    // ========== 患者相关操作 ==========

    /// 创建新患者
    pub async fn create_patient(&self, patient: &NewPatient) -> Result<i64> {
        let pool = self.pool.pool();

        let id = sqlx::query(
            "INSERT INTO patients (patient_id, name, age, gender, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&patient.patient_id)
        .bind(&patient.name)
        .bind(patient.age)
        .bind(&patient.gender)
        .bind(Utc::now())
        .execute(pool)
        .await?
        .last_insert_rowid();

        info!("Created patient {} (id {})", patient.patient_id, id);
        Ok(id)
    }

    /// 根据患者ID查找患者
    pub async fn get_patient(&self, patient_id: &str) -> Result<Option<Patient>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbPatient>("SELECT * FROM patients WHERE patient_id = ?")
            .bind(patient_id)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(Patient::from))
    }

    /// 获取所有患者，最新创建的在前
    pub async fn list_patients(&self) -> Result<Vec<Patient>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbPatient>(
            "SELECT * FROM patients ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(Patient::from).collect())
    }

    /// 获取患者的所有检查ID
    pub async fn get_patient_study_ids(&self, patient_id: &str) -> Result<Vec<String>> {
        let pool = self.pool.pool();

        let ids = sqlx::query_scalar::<_, String>(
            "SELECT study_id FROM studies WHERE patient_id = ? ORDER BY id",
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    /// 删除患者及其所有关联数据，返回删除的患者行数
    pub async fn delete_patient(&self, patient_id: &str) -> Result<u64> {
        let mut tx = self.pool.pool().begin().await?;

        // 删除顺序: nodules -> dicom_files -> reports -> studies -> patient
        sqlx::query(
            "DELETE FROM nodules WHERE study_id IN (SELECT study_id FROM studies WHERE patient_id = ?)",
        )
        .bind(patient_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM dicom_files WHERE study_id IN (SELECT study_id FROM studies WHERE patient_id = ?)",
        )
        .bind(patient_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "DELETE FROM reports WHERE patient_id = ? \
             OR study_id IN (SELECT study_id FROM studies WHERE patient_id = ?)",
        )
        .bind(patient_id)
        .bind(patient_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM studies WHERE patient_id = ?")
            .bind(patient_id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM patients WHERE patient_id = ?")
            .bind(patient_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            info!("Deleted patient {} with all related records", patient_id);
        }
        Ok(deleted)
    }

    // ========== 检查相关操作 ==========

    /// 创建新检查，初始状态为pending
    pub async fn create_study(&self, study: &NewStudy) -> Result<i64> {
        let pool = self.pool.pool();

        let id = sqlx::query(
            r#"
            INSERT INTO studies (study_id, patient_id, study_date, description, clinical_note,
                                 nodule_count, status, reviewed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&study.study_id)
        .bind(&study.patient_id)
        .bind(&study.study_date)
        .bind(&study.description)
        .bind(&study.clinical_note)
        .bind(study.nodule_count.unwrap_or(0))
        .bind(StudyStatus::Pending.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await?
        .last_insert_rowid();

        info!("Created study {} for patient {}", study.study_id, study.patient_id);
        Ok(id)
    }

    /// 根据检查ID查找检查（附带患者信息）
    pub async fn get_study(&self, study_id: &str) -> Result<Option<Study>> {
        let pool = self.pool.pool();
        let sql = format!("{} WHERE s.study_id = ?", STUDY_SELECT);

        let result = sqlx::query_as::<_, DbStudy>(&sql)
            .bind(study_id)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(Study::from))
    }

    /// 获取所有检查，最新创建的在前
    pub async fn list_studies(&self) -> Result<Vec<Study>> {
        let pool = self.pool.pool();
        let sql = format!("{} ORDER BY s.created_at DESC, s.id DESC", STUDY_SELECT);

        let results = sqlx::query_as::<_, DbStudy>(&sql).fetch_all(pool).await?;

        Ok(results.into_iter().map(Study::from).collect())
    }

    /// 更新检查状态和结节数量，已审阅的检查不会被退回pending
    pub async fn update_study_status(
        &self,
        study_id: &str,
        status: StudyStatus,
        nodule_count: i32,
    ) -> Result<()> {
        let pool = self.pool.pool();

        let updated = sqlx::query(
            "UPDATE studies SET status = ?, nodule_count = ? \
             WHERE study_id = ? AND (? = 'completed' OR reviewed = 0)",
        )
        .bind(status.as_str())
        .bind(nodule_count)
        .bind(study_id)
        .bind(status.as_str())
        .execute(pool)
        .await?
        .rows_affected();

        if updated == 0 {
            let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM studies WHERE study_id = ?")
                .bind(study_id)
                .fetch_one(pool)
                .await?;
            if exists == 0 {
                return Err(NoduleError::NotFound("Study not found".to_string()));
            }
            return Err(NoduleError::InvalidStateTransition {
                from: "reviewed".to_string(),
                event: format!("set status {}", status),
            });
        }

        info!("Study {} status set to {} ({} nodules)", study_id, status, nodule_count);
        Ok(())
    }

    /// 标记检查为已审阅
    pub async fn mark_study_reviewed(&self, study_id: &str, reviewed_by: Option<i64>) -> Result<()> {
        let pool = self.pool.pool();

        let updated = sqlx::query(
            "UPDATE studies SET reviewed = 1, reviewed_at = ?, reviewed_by = ? WHERE study_id = ?",
        )
        .bind(Utc::now())
        .bind(reviewed_by)
        .bind(study_id)
        .execute(pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(NoduleError::NotFound("Study not found".to_string()));
        }

        info!("Study {} marked as reviewed by {:?}", study_id, reviewed_by);
        Ok(())
    }

    /// 删除检查及其结节、DICOM文件记录和报告，返回删除的检查行数
    pub async fn delete_study(&self, study_id: &str) -> Result<u64> {
        let mut tx = self.pool.pool().begin().await?;

        for sql in [
            "DELETE FROM nodules WHERE study_id = ?",
            "DELETE FROM dicom_files WHERE study_id = ?",
            "DELETE FROM reports WHERE study_id = ?",
        ] {
            sqlx::query(sql).bind(study_id).execute(&mut *tx).await?;
        }

        let deleted = sqlx::query("DELETE FROM studies WHERE study_id = ?")
            .bind(study_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            info!("Deleted study {} with all related records", study_id);
        }
        Ok(deleted)
    }

    // ========== DICOM文件相关操作 ==========

    /// 保存DICOM文件记录
    pub async fn save_dicom_file(&self, file: &NewDicomFile) -> Result<i64> {
        let pool = self.pool.pool();

        let id = sqlx::query(
            r#"
            INSERT INTO dicom_files (study_id, file_path, file_name, instance_number, uploaded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file.study_id)
        .bind(&file.file_path)
        .bind(&file.file_name)
        .bind(file.instance_number)
        .bind(Utc::now())
        .execute(pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// 获取检查的所有DICOM文件，按实例号排序
    pub async fn get_dicom_files_by_study(&self, study_id: &str) -> Result<Vec<DicomFile>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbDicomFile>(
            "SELECT * FROM dicom_files WHERE study_id = ? ORDER BY instance_number, id",
        )
        .bind(study_id)
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(DicomFile::from).collect())
    }

    /// 根据ID查找DICOM文件记录
    pub async fn get_dicom_file(&self, id: i64) -> Result<Option<DicomFile>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbDicomFile>("SELECT * FROM dicom_files WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(DicomFile::from))
    }

    // ========== 结节相关操作 ==========

    /// 保存结节
    pub async fn save_nodule(&self, nodule: &NewNodule) -> Result<i64> {
        let pool = self.pool.pool();

        let coordinates = match &nodule.coordinates {
            Some(serde_json::Value::String(text)) => Some(text.clone()),
            Some(value) => Some(serde_json::to_string(value)?),
            None => None,
        };

        let id = sqlx::query(
            r#"
            INSERT INTO nodules (study_id, nodule_number, location, size_mm, risk_level, coordinates,
                                 slice_index, probability, doctor_assessment, notes,
                                 include_in_report, reviewed, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&nodule.study_id)
        .bind(nodule.nodule_number)
        .bind(&nodule.location)
        .bind(nodule.size_mm)
        .bind(&nodule.risk_level)
        .bind(coordinates)
        .bind(nodule.slice_index)
        .bind(nodule.probability)
        .bind(&nodule.doctor_assessment)
        .bind(&nodule.notes)
        .bind(nodule.include_in_report.unwrap_or(true))
        .bind(nodule.reviewed.unwrap_or(false))
        .bind(Utc::now())
        .execute(pool)
        .await?
        .last_insert_rowid();

        info!("Saved nodule {} for study {}", id, nodule.study_id);
        Ok(id)
    }

    /// 获取检查的所有结节，按结节编号排序
    pub async fn get_nodules_by_study(&self, study_id: &str) -> Result<Vec<Nodule>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbNodule>(
            "SELECT * FROM nodules WHERE study_id = ? ORDER BY nodule_number, id",
        )
        .bind(study_id)
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(Nodule::from).collect())
    }

    /// 根据ID查找结节
    pub async fn get_nodule(&self, id: i64) -> Result<Option<Nodule>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbNodule>("SELECT * FROM nodules WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(Nodule::from))
    }

    /// 部分更新结节，只写入提供的字段
    pub async fn update_nodule(&self, id: i64, update: &NoduleUpdate) -> Result<()> {
        let pool = self.pool.pool();

        if update.is_empty() {
            return match self.get_nodule(id).await? {
                Some(_) => Ok(()),
                None => Err(NoduleError::NotFound("Nodule not found".to_string())),
            };
        }

        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE nodules SET ");
        {
            let mut fields = builder.separated(", ");
            if let Some(location) = &update.location {
                fields.push("location = ").push_bind_unseparated(location.clone());
            }
            if let Some(size_mm) = update.size_mm {
                fields.push("size_mm = ").push_bind_unseparated(size_mm);
            }
            if let Some(risk_level) = &update.risk_level {
                fields.push("risk_level = ").push_bind_unseparated(risk_level.clone());
            }
            if let Some(slice_index) = update.slice_index {
                fields.push("slice_index = ").push_bind_unseparated(slice_index);
            }
            if let Some(probability) = update.probability {
                fields.push("probability = ").push_bind_unseparated(probability);
            }
            if let Some(assessment) = &update.doctor_assessment {
                fields.push("doctor_assessment = ").push_bind_unseparated(assessment.clone());
            }
            if let Some(notes) = &update.notes {
                fields.push("notes = ").push_bind_unseparated(notes.clone());
            }
            if let Some(include) = update.include_in_report {
                fields.push("include_in_report = ").push_bind_unseparated(include);
            }
            if let Some(reviewed) = update.reviewed {
                fields.push("reviewed = ").push_bind_unseparated(reviewed);
            }
        }
        builder.push(" WHERE id = ").push_bind(id);

        let updated = builder.build().execute(pool).await?.rows_affected();
        if updated == 0 {
            return Err(NoduleError::NotFound("Nodule not found".to_string()));
        }

        info!("Updated nodule {}", id);
        Ok(())
    }

    /// 删除单个结节
    pub async fn delete_nodule(&self, id: i64) -> Result<u64> {
        let pool = self.pool.pool();

        let deleted = sqlx::query("DELETE FROM nodules WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    /// 删除检查的所有结节
    pub async fn delete_nodules_by_study(&self, study_id: &str) -> Result<u64> {
        let pool = self.pool.pool();

        let deleted = sqlx::query("DELETE FROM nodules WHERE study_id = ?")
            .bind(study_id)
            .execute(pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }

    // ========== 用户相关操作 ==========

    /// 创建用户，初始状态为Active
    pub async fn create_user(&self, user: &NewUser) -> Result<i64> {
        let pool = self.pool.pool();

        let id = sqlx::query(
            r#"
            INSERT INTO users (username, password, first_name, last_name, email, role, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(Utc::now())
        .execute(pool)
        .await?
        .last_insert_rowid();

        info!("Created user {} (id {})", user.username, id);
        Ok(id)
    }

    /// 根据ID查找用户
    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let pool = self.pool.pool();
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);

        let result = sqlx::query_as::<_, DbUser>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(User::from))
    }

    /// 根据用户名获取登录凭据
    pub async fn get_user_credentials(&self, username: &str) -> Result<Option<UserCredentials>> {
        let pool = self.pool.pool();
        let sql = format!("SELECT {}, password FROM users WHERE username = ?", USER_COLUMNS);

        let result = sqlx::query_as::<_, DbUserCredentials>(&sql)
            .bind(username)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(UserCredentials::from))
    }

    /// 获取所有用户
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let pool = self.pool.pool();
        let sql = format!("SELECT {} FROM users ORDER BY created_at DESC, id DESC", USER_COLUMNS);

        let results = sqlx::query_as::<_, DbUser>(&sql).fetch_all(pool).await?;

        Ok(results.into_iter().map(User::from).collect())
    }

    /// 更新用户状态
    pub async fn update_user_status(&self, id: i64, status: UserStatus) -> Result<()> {
        let pool = self.pool.pool();

        let updated = sqlx::query("UPDATE users SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(NoduleError::NotFound("User not found".to_string()));
        }

        info!("User {} status set to {}", id, status.as_str());
        Ok(())
    }

    /// 记录最后登录时间
    pub async fn update_user_last_login(&self, id: i64) -> Result<()> {
        let pool = self.pool.pool();

        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// 更新用户资料并返回更新后的用户
    pub async fn update_user_profile(&self, id: i64, profile: &ProfileUpdate) -> Result<User> {
        let pool = self.pool.pool();

        let updated = sqlx::query(
            r#"
            UPDATE users SET first_name = ?, last_name = ?, email = ?, specialization = ?,
                             department = ?, hospital = ?, license_number = ?
            WHERE id = ?
            "#,
        )
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.email)
        .bind(&profile.specialization)
        .bind(&profile.department)
        .bind(&profile.hospital)
        .bind(&profile.license_number)
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(NoduleError::NotFound("User not found".to_string()));
        }

        self.get_user(id)
            .await?
            .ok_or_else(|| NoduleError::NotFound("User not found".to_string()))
    }

    /// 删除用户（先删除其活动日志）
    pub async fn delete_user(&self, id: i64) -> Result<u64> {
        let mut tx = self.pool.pool().begin().await?;

        sqlx::query("DELETE FROM activity_logs WHERE user_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if deleted > 0 {
            info!("Deleted user {}", id);
        }
        Ok(deleted)
    }

    // ========== 统计相关操作 ==========

    /// 管理员仪表盘统计
    pub async fn get_dashboard_stats(&self) -> Result<DashboardStats> {
        let pool = self.pool.pool();
        let since = Utc::now() - Duration::hours(24);

        let row = sqlx::query_as::<_, DbDashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE role = 'Doctor') AS doctor_count,
                (SELECT COUNT(*) FROM users WHERE role = 'Admin') AS admin_count,
                (SELECT COUNT(*) FROM patients) AS total_patients,
                (SELECT COUNT(*) FROM studies) AS total_studies,
                (SELECT COUNT(*) FROM studies WHERE status = 'completed') AS completed_studies,
                (SELECT COUNT(*) FROM studies WHERE status = 'pending') AS pending_studies,
                (SELECT COUNT(*) FROM users WHERE last_login >= ?) AS last_24h_logins
            "#,
        )
        .bind(since)
        .fetch_one(pool)
        .await?;

        Ok(DashboardStats::from(row))
    }

    /// 用户统计
    pub async fn get_user_stats(&self) -> Result<UserStats> {
        let pool = self.pool.pool();

        let row = sqlx::query_as::<_, DbUserStats>(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN role = 'Doctor' THEN 1 ELSE 0 END), 0) AS doctors,
                COALESCE(SUM(CASE WHEN role = 'Admin' THEN 1 ELSE 0 END), 0) AS admins,
                COALESCE(SUM(CASE WHEN status IN ('Active', 'Aktif') THEN 1 ELSE 0 END), 0) AS active,
                COALESCE(SUM(CASE WHEN status IN ('Inactive', 'Pasif') THEN 1 ELSE 0 END), 0) AS inactive
            FROM users
            "#,
        )
        .fetch_one(pool)
        .await?;

        Ok(UserStats::from(row))
    }

    // ========== 活动日志相关操作 ==========

    /// 写入活动日志
    pub async fn create_activity_log(&self, log: &NewActivityLog) -> Result<i64> {
        let pool = self.pool.pool();

        let id = sqlx::query(
            r#"
            INSERT INTO activity_logs (user_id, username, action, action_type, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.user_id)
        .bind(&log.username)
        .bind(&log.action)
        .bind(&log.action_type)
        .bind(log.details.as_deref().unwrap_or(""))
        .bind(Utc::now())
        .execute(pool)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// 获取最新的活动日志
    pub async fn list_activity_logs(&self, limit: i64) -> Result<Vec<ActivityLog>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbActivityLog>(
            "SELECT * FROM activity_logs ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(ActivityLog::from).collect())
    }

    /// 获取指定时间点之后的活动日志
    pub async fn list_activity_logs_since(&self, since: DateTime<Utc>) -> Result<Vec<ActivityLog>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbActivityLog>(
            "SELECT * FROM activity_logs WHERE created_at >= ? ORDER BY created_at DESC, id DESC",
        )
        .bind(since)
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(ActivityLog::from).collect())
    }

    // ========== 报告相关操作 ==========

    /// 创建报告并返回写入的记录
    pub async fn create_report(&self, report: &NewReport) -> Result<Report> {
        let pool = self.pool.pool();

        sqlx::query(
            r#"
            INSERT INTO reports (report_id, study_id, patient_id, patient_name, study_date,
                                 nodule_count, included_nodule_count, report_data,
                                 generated_by, generated_by_id, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'completed', ?)
            "#,
        )
        .bind(&report.report_id)
        .bind(&report.study_id)
        .bind(&report.patient_id)
        .bind(&report.patient_name)
        .bind(&report.study_date)
        .bind(report.nodule_count)
        .bind(report.included_nodule_count)
        .bind(serde_json::to_string(&report.report_data)?)
        .bind(&report.generated_by)
        .bind(report.generated_by_id)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        info!("Created report {} for study {}", report.report_id, report.study_id);

        self.get_report(&report.report_id)
            .await?
            .ok_or_else(|| NoduleError::Internal("Report disappeared after insert".to_string()))
    }

    /// 根据报告ID查找报告
    pub async fn get_report(&self, report_id: &str) -> Result<Option<Report>> {
        let pool = self.pool.pool();

        let result = sqlx::query_as::<_, DbReport>("SELECT * FROM reports WHERE report_id = ?")
            .bind(report_id)
            .fetch_optional(pool)
            .await?;

        Ok(result.map(Report::from))
    }

    /// 获取所有报告
    pub async fn list_reports(&self) -> Result<Vec<Report>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbReport>(
            "SELECT * FROM reports ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(Report::from).collect())
    }

    /// 获取某个用户生成的报告
    pub async fn list_reports_by_user(&self, generated_by_id: i64) -> Result<Vec<Report>> {
        let pool = self.pool.pool();

        let results = sqlx::query_as::<_, DbReport>(
            "SELECT * FROM reports WHERE generated_by_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(generated_by_id)
        .fetch_all(pool)
        .await?;

        Ok(results.into_iter().map(Report::from).collect())
    }

    /// 已生成报告的检查ID集合
    pub async fn get_reported_study_ids(&self) -> Result<HashSet<String>> {
        let pool = self.pool.pool();

        let ids = sqlx::query_scalar::<_, String>("SELECT DISTINCT study_id FROM reports")
            .fetch_all(pool)
            .await?;

        Ok(ids.into_iter().collect())
    }

    /// 删除报告
    pub async fn delete_report(&self, report_id: &str) -> Result<u64> {
        let pool = self.pool.pool();

        let deleted = sqlx::query("DELETE FROM reports WHERE report_id = ?")
            .bind(report_id)
            .execute(pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}
