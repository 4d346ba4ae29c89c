//! 通用工具函数

use chrono::Utc;
use uuid::Uuid;

fn random_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..4].to_string()
}

/// 生成报告ID，格式 `RPT-<毫秒时间戳>-<随机后缀>`
pub fn generate_report_id() -> String {
    format!("RPT-{}-{}", Utc::now().timestamp_millis(), random_suffix())
}

/// 生成患者ID，格式 `P-<毫秒时间戳>-<随机后缀>`
pub fn generate_patient_id() -> String {
    format!("P-{}-{}", Utc::now().timestamp_millis(), random_suffix())
}

/// 判断字符串能否安全地作为单级目录或文件名
pub fn is_safe_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
        && !segment.contains("..")
}
