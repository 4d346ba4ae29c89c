//! 报告组装
//!
//! 根据检查、结节和客户端请求生成待写入的报告记录

use chrono::Utc;
use nodule_core::utils::generate_report_id;
use nodule_core::{NewReport, NoduleError, Nodule, Result, Study};
use serde::Deserialize;
use serde_json::{json, Value};

/// 生成报告请求
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportRequest {
    pub study_id: String,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub study_date: Option<String>,
    pub nodule_count: Option<i32>,
    pub included_nodule_count: Option<i32>,
    pub report_data: Option<Value>,
    pub generated_by: Option<String>,
    pub generated_by_id: Option<i64>,
}

/// 报告构建器
#[derive(Debug)]
pub struct ReportBuilder<'a> {
    study: &'a Study,
    nodules: &'a [Nodule],
}

impl<'a> ReportBuilder<'a> {
    pub fn new(study: &'a Study, nodules: &'a [Nodule]) -> Self {
        Self { study, nodules }
    }

    /// 结节总数，没有结节记录时使用检查上的计数
    pub fn nodule_count(&self) -> i32 {
        if self.nodules.is_empty() {
            self.study.nodule_count
        } else {
            self.nodules.len() as i32
        }
    }

    pub fn included_nodules(&self) -> Vec<&'a Nodule> {
        self.nodules.iter().filter(|nodule| nodule.include_in_report).collect()
    }

    /// 生成报告记录，请求中给出的数值优先
    pub fn build(&self, request: ReportRequest) -> Result<NewReport> {
        if request.study_id != self.study.study_id {
            return Err(NoduleError::Validation(format!(
                "Report study_id {} does not match study {}",
                request.study_id, self.study.study_id
            )));
        }
        for (field, value) in [
            ("nodule_count", request.nodule_count),
            ("included_nodule_count", request.included_nodule_count),
        ] {
            if matches!(value, Some(n) if n < 0) {
                return Err(NoduleError::Validation(format!("{} must not be negative", field)));
            }
        }

        let included = self.included_nodules();
        let report_data = match request.report_data {
            Some(Value::String(text)) => serde_json::from_str(&text).unwrap_or(Value::String(text)),
            Some(Value::Null) | None => self.summary(&included),
            Some(value) => value,
        };

        Ok(NewReport {
            report_id: generate_report_id(),
            study_id: self.study.study_id.clone(),
            patient_id: request.patient_id.unwrap_or_else(|| self.study.patient_id.clone()),
            patient_name: request.patient_name.or_else(|| self.study.patient_name.clone()),
            study_date: request.study_date.or_else(|| self.study.study_date.clone()),
            nodule_count: request.nodule_count.unwrap_or_else(|| self.nodule_count()),
            included_nodule_count: request.included_nodule_count.unwrap_or(included.len() as i32),
            report_data,
            generated_by: request.generated_by,
            generated_by_id: request.generated_by_id,
        })
    }

    fn summary(&self, included: &[&Nodule]) -> Value {
        let findings: Vec<Value> = included
            .iter()
            .map(|nodule| {
                json!({
                    "nodule_number": nodule.nodule_number,
                    "location": nodule.location,
                    "size_mm": nodule.size_mm,
                    "risk_level": nodule.risk_level,
                    "probability": nodule.probability,
                    "doctor_assessment": nodule.doctor_assessment,
                    "notes": nodule.notes,
                })
            })
            .collect();

        let largest_mm = included
            .iter()
            .filter_map(|nodule| nodule.size_mm)
            .fold(None, |acc: Option<f64>, size| Some(acc.map_or(size, |max| max.max(size))));

        let impression = if included.is_empty() {
            "No nodules included in this report.".to_string()
        } else {
            format!("{} of {} detected nodules included.", included.len(), self.nodule_count())
        };

        json!({
            "impression": impression,
            "findings": findings,
            "largest_nodule_mm": largest_mm,
            "clinical_note": self.study.clinical_note,
            "generated_at": Utc::now(),
        })
    }
}
