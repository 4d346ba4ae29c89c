//! 工作列表管理
//!
//! 从检查记录生成阅片工作列表：尚未出报告的检查按优先级排列，
//! 已出报告的检查归入历史检查。

use chrono::{Duration, NaiveDate};
use nodule_core::{NoduleError, Report, Result, Study, StudyStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

/// 工作项显示状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisplayStatus {
    #[serde(rename = "Pending")]
    Pending, // 等待AI分析
    #[serde(rename = "AI Results Ready")]
    AiResultsReady, // AI结果待医生审阅
    #[serde(rename = "Reviewed")]
    Reviewed, // 医生已审阅
}

impl DisplayStatus {
    pub fn of(study: &Study) -> Self {
        if study.reviewed {
            DisplayStatus::Reviewed
        } else if study.status == StudyStatus::Completed {
            DisplayStatus::AiResultsReady
        } else {
            DisplayStatus::Pending
        }
    }
}

/// 工作项优先级（由结节数量决定）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkItemPriority {
    High,   // 3个及以上结节
    Medium, // 2个结节
    Low,    // 其他
}

impl WorkItemPriority {
    pub fn from_nodule_count(count: i32) -> Self {
        match count {
            n if n >= 3 => WorkItemPriority::High,
            2 => WorkItemPriority::Medium,
            _ => WorkItemPriority::Low,
        }
    }
}

impl FromStr for WorkItemPriority {
    type Err = NoduleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Ok(WorkItemPriority::High),
            "medium" => Ok(WorkItemPriority::Medium),
            "low" => Ok(WorkItemPriority::Low),
            other => Err(NoduleError::Validation(format!("Unknown priority: {}", other))),
        }
    }
}

/// 检查日期范围
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DateRange {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
}

impl DateRange {
    /// 判断检查日期是否落在范围内，无法解析的日期只在 All 下通过
    pub fn contains(&self, study_date: Option<&str>, today: NaiveDate) -> bool {
        let days = match self {
            DateRange::All => return true,
            DateRange::Today => 0,
            DateRange::Last7Days => 7,
            DateRange::Last30Days => 30,
        };
        match study_date.and_then(parse_study_date) {
            Some(date) => date <= today && date >= today - Duration::days(days),
            None => false,
        }
    }
}

impl FromStr for DateRange {
    type Err = NoduleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "all" => Ok(DateRange::All),
            "today" => Ok(DateRange::Today),
            "7d" => Ok(DateRange::Last7Days),
            "30d" => Ok(DateRange::Last30Days),
            other => Err(NoduleError::Validation(format!("Unknown date range: {}", other))),
        }
    }
}

/// 支持 `YYYY-MM-DD`、DICOM的 `YYYYMMDD` 以及带时间的ISO字符串
fn parse_study_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))
        .ok()
        .or_else(|| value.get(..10).and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()))
}

/// 工作列表过滤器
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkListFilter {
    pub priority: Option<WorkItemPriority>,
    pub date_range: DateRange,
    pub only_ready: bool,
    pub search: Option<String>,
}

impl WorkListFilter {
    /// 从查询参数构造，"all" 和空值表示不过滤
    pub fn parse(
        priority: Option<&str>,
        date_range: Option<&str>,
        only_ready: Option<bool>,
        search: Option<&str>,
    ) -> Result<Self> {
        let priority = match priority.map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(value) => Some(value.parse()?),
        };
        let date_range = match date_range {
            Some(value) => value.parse()?,
            None => DateRange::All,
        };
        let search = search
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_string);

        Ok(Self { priority, date_range, only_ready: only_ready.unwrap_or(false), search })
    }

    fn matches(&self, item: &WorkItem, today: NaiveDate) -> bool {
        if let Some(priority) = self.priority {
            if item.priority != priority {
                return false;
            }
        }
        if self.only_ready && item.display_status != DisplayStatus::AiResultsReady {
            return false;
        }
        if !self.date_range.contains(item.study.study_date.as_deref(), today) {
            return false;
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let name_hit = item
                .study
                .patient_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&term));
            let id_hit = item.study.patient_id.to_lowercase().contains(&term);
            if !name_hit && !id_hit {
                return false;
            }
        }
        true
    }
}

/// 工作项
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkItem {
    #[serde(flatten)]
    pub study: Study,
    pub display_status: DisplayStatus,
    pub priority: WorkItemPriority,
}

impl WorkItem {
    pub fn from_study(study: Study) -> Self {
        Self {
            display_status: DisplayStatus::of(&study),
            priority: WorkItemPriority::from_nodule_count(study.nodule_count),
            study,
        }
    }
}

/// 工作列表统计（过滤前的全部未出报告检查）
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct WorkListStats {
    pub total: usize,
    pub pending: usize,
    pub ai_results_ready: usize,
    pub reviewed: usize,
    pub by_priority: BTreeMap<WorkItemPriority, usize>,
}

/// 工作列表查询结果
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkList {
    pub items: Vec<WorkItem>,
    pub stats: WorkListStats,
}

/// 已出报告的历史检查
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PastStudy {
    #[serde(flatten)]
    pub study: Study,
    pub display_status: DisplayStatus,
    pub report_ids: Vec<String>,
}

/// 工作列表管理器
#[derive(Debug, Clone)]
pub struct WorkListManager {
    today: NaiveDate,
}

impl WorkListManager {
    /// `today` 作为日期范围过滤的基准
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    /// 生成工作列表：排除已出报告的检查，按优先级和创建时间排序
    pub fn build(&self, studies: Vec<Study>, reported: &HashSet<String>, filter: &WorkListFilter) -> WorkList {
        let open: Vec<WorkItem> = studies
            .into_iter()
            .filter(|study| !reported.contains(&study.study_id))
            .map(WorkItem::from_study)
            .collect();

        let stats = Self::stats(&open);

        let mut items: Vec<WorkItem> = open
            .into_iter()
            .filter(|item| filter.matches(item, self.today))
            .collect();

        items.sort_by(|a, b| match a.priority.cmp(&b.priority) {
            std::cmp::Ordering::Equal => b.study.created_at.cmp(&a.study.created_at),
            other => other,
        });

        tracing::debug!("Worklist built: {} of {} open studies match", items.len(), stats.total);
        WorkList { items, stats }
    }

    fn stats(items: &[WorkItem]) -> WorkListStats {
        let mut stats = WorkListStats { total: items.len(), ..Default::default() };

        for item in items {
            match item.display_status {
                DisplayStatus::Pending => stats.pending += 1,
                DisplayStatus::AiResultsReady => stats.ai_results_ready += 1,
                DisplayStatus::Reviewed => stats.reviewed += 1,
            }
            *stats.by_priority.entry(item.priority).or_insert(0) += 1;
        }

        stats
    }

    /// 历史检查：至少有一份报告的检查，附带报告编号（最新在前）
    pub fn past_studies(&self, studies: Vec<Study>, reports: &[Report]) -> Vec<PastStudy> {
        studies
            .into_iter()
            .filter_map(|study| {
                let mut matching: Vec<&Report> =
                    reports.iter().filter(|report| report.study_id == study.study_id).collect();
                if matching.is_empty() {
                    return None;
                }
                matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

                Some(PastStudy {
                    display_status: DisplayStatus::of(&study),
                    report_ids: matching.iter().map(|report| report.report_id.clone()).collect(),
                    study,
                })
            })
            .collect()
    }
}
