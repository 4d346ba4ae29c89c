//! 表结构初始化与默认数据

use chrono::Utc;
use nodule_core::Result;
use tracing::info;

use crate::connection::DatabasePool;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS patients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        patient_id TEXT UNIQUE NOT NULL,
        name TEXT NOT NULL,
        age INTEGER,
        gender TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS studies (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        study_id TEXT UNIQUE NOT NULL,
        patient_id TEXT NOT NULL REFERENCES patients(patient_id),
        study_date TEXT,
        description TEXT,
        clinical_note TEXT,
        nodule_count INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'pending',
        reviewed INTEGER NOT NULL DEFAULT 0,
        reviewed_at TEXT,
        reviewed_by INTEGER,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS dicom_files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        study_id TEXT NOT NULL REFERENCES studies(study_id),
        file_path TEXT NOT NULL,
        file_name TEXT NOT NULL,
        instance_number INTEGER,
        uploaded_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS nodules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        study_id TEXT NOT NULL REFERENCES studies(study_id),
        nodule_number INTEGER,
        location TEXT,
        size_mm REAL,
        risk_level TEXT,
        coordinates TEXT,
        slice_index INTEGER,
        probability REAL,
        doctor_assessment TEXT,
        notes TEXT,
        include_in_report INTEGER NOT NULL DEFAULT 1,
        reviewed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reports (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        report_id TEXT UNIQUE NOT NULL,
        study_id TEXT NOT NULL REFERENCES studies(study_id),
        patient_id TEXT NOT NULL,
        patient_name TEXT,
        study_date TEXT,
        nodule_count INTEGER NOT NULL DEFAULT 0,
        included_nodule_count INTEGER NOT NULL DEFAULT 0,
        report_data TEXT NOT NULL,
        generated_by TEXT,
        generated_by_id INTEGER,
        status TEXT NOT NULL DEFAULT 'completed',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT UNIQUE NOT NULL,
        password TEXT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT UNIQUE NOT NULL,
        role TEXT NOT NULL DEFAULT 'Doctor',
        status TEXT NOT NULL DEFAULT 'Active',
        specialization TEXT,
        department TEXT,
        hospital TEXT,
        license_number TEXT,
        last_login TEXT,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS activity_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER REFERENCES users(id),
        username TEXT,
        action TEXT NOT NULL,
        action_type TEXT NOT NULL,
        details TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_studies_patient_id ON studies(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_studies_created_at ON studies(created_at)",
    "CREATE INDEX IF NOT EXISTS idx_dicom_files_study_id ON dicom_files(study_id)",
    "CREATE INDEX IF NOT EXISTS idx_nodules_study_id ON nodules(study_id)",
    "CREATE INDEX IF NOT EXISTS idx_reports_study_id ON reports(study_id)",
    "CREATE INDEX IF NOT EXISTS idx_reports_generated_by_id ON reports(generated_by_id)",
    "CREATE INDEX IF NOT EXISTS idx_activity_logs_created_at ON activity_logs(created_at)",
];

/// 默认账户
struct DefaultUser {
    username: &'static str,
    password: &'static str,
    first_name: &'static str,
    last_name: &'static str,
    email: &'static str,
    role: &'static str,
    specialization: Option<&'static str>,
    department: &'static str,
    hospital: Option<&'static str>,
    license_number: Option<&'static str>,
}

const DEFAULT_USERS: &[DefaultUser] = &[
    DefaultUser {
        username: "admin",
        password: "admin123",
        first_name: "System",
        last_name: "Admin",
        email: "admin@hospital.com",
        role: "Admin",
        specialization: None,
        department: "IT Department",
        hospital: None,
        license_number: None,
    },
    DefaultUser {
        username: "doctor",
        password: "doctor123",
        first_name: "Demo",
        last_name: "Doctor",
        email: "doctor@hospital.com",
        role: "Doctor",
        specialization: Some("Radiology"),
        department: "Radiology Department",
        hospital: Some("Medical Center Hospital"),
        license_number: Some("MD-123456"),
    },
];

/// 创建所有数据库表和索引
pub async fn create_tables(db: &DatabasePool) -> Result<()> {
    let pool = db.pool();

    for table_sql in TABLES {
        sqlx::query(table_sql).execute(pool).await?;
    }

    for index_sql in INDEXES {
        sqlx::query(index_sql).execute(pool).await?;
    }

    info!("Database tables and indexes created successfully");
    Ok(())
}

/// 写入默认的管理员和医生账户（已存在则跳过）
pub async fn seed_default_users(db: &DatabasePool) -> Result<()> {
    let pool = db.pool();

    for user in DEFAULT_USERS {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (username, password, first_name, last_name, email, role, status,
                               specialization, department, hospital, license_number, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'Active', ?, ?, ?, ?, ?)
            ON CONFLICT(username) DO NOTHING
            "#,
        )
        .bind(user.username)
        .bind(user.password)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.email)
        .bind(user.role)
        .bind(user.specialization)
        .bind(user.department)
        .bind(user.hospital)
        .bind(user.license_number)
        .bind(Utc::now())
        .execute(pool)
        .await?
        .rows_affected();

        if inserted > 0 {
            info!("Created default user {}", user.username);
        }
    }

    Ok(())
}
