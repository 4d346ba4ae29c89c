//! 检查状态机
//!
//! 管理检查在AI分析前后的状态转换

use nodule_core::{NoduleError, Result, Study, StudyStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 检查状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StudyEvent {
    AnalysisCompleted, // AI分析完成（可重复分析）
    Reopened,          // 退回待分析
}

impl fmt::Display for StudyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StudyEvent::AnalysisCompleted => f.write_str("AnalysisCompleted"),
            StudyEvent::Reopened => f.write_str("Reopened"),
        }
    }
}

/// 检查状态机
#[derive(Debug)]
pub struct StudyStateMachine {
    transitions: HashMap<(StudyStatus, StudyEvent), StudyStatus>,
}

impl StudyStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        transitions.insert((StudyStatus::Pending, StudyEvent::AnalysisCompleted), StudyStatus::Completed);
        transitions.insert((StudyStatus::Completed, StudyEvent::AnalysisCompleted), StudyStatus::Completed);
        transitions.insert((StudyStatus::Completed, StudyEvent::Reopened), StudyStatus::Pending);

        Self { transitions }
    }

    /// 执行状态转换
    pub fn transition(&self, from: StudyStatus, event: StudyEvent) -> Result<StudyStatus> {
        self.transitions
            .get(&(from, event))
            .copied()
            .ok_or_else(|| NoduleError::InvalidStateTransition {
                from: from.to_string(),
                event: event.to_string(),
            })
    }

    /// 对具体检查执行事件，已审阅的检查不能退回
    pub fn apply(&self, study: &Study, event: StudyEvent) -> Result<StudyStatus> {
        if study.reviewed && event == StudyEvent::Reopened {
            return Err(NoduleError::InvalidStateTransition {
                from: format!("{} (reviewed)", study.status),
                event: event.to_string(),
            });
        }
        self.transition(study.status, event)
    }

    /// 将客户端请求的目标状态映射为事件并执行
    pub fn apply_status_request(&self, study: &Study, requested: StudyStatus) -> Result<StudyStatus> {
        let event = match requested {
            StudyStatus::Completed => StudyEvent::AnalysisCompleted,
            StudyStatus::Pending => StudyEvent::Reopened,
        };
        let next = self.apply(study, event)?;
        tracing::info!("Study {} transition {} --{}--> {}", study.study_id, study.status, event, next);
        Ok(next)
    }
}

impl Default for StudyStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn study(status: StudyStatus, reviewed: bool) -> Study {
        Study {
            id: 1,
            study_id: "STD-1".to_string(),
            patient_id: "P-1".to_string(),
            study_date: None,
            description: None,
            clinical_note: None,
            nodule_count: 0,
            status,
            reviewed,
            reviewed_at: None,
            reviewed_by: None,
            created_at: Utc::now(),
            patient_name: None,
            patient_age: None,
            patient_gender: None,
        }
    }

    #[test]
    fn test_valid_transitions() {
        let sm = StudyStateMachine::new();

        assert_eq!(
            sm.transition(StudyStatus::Pending, StudyEvent::AnalysisCompleted).unwrap(),
            StudyStatus::Completed
        );
        assert_eq!(
            sm.transition(StudyStatus::Completed, StudyEvent::AnalysisCompleted).unwrap(),
            StudyStatus::Completed
        );
        assert_eq!(
            sm.transition(StudyStatus::Completed, StudyEvent::Reopened).unwrap(),
            StudyStatus::Pending
        );
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = StudyStateMachine::new();

        let err = sm.transition(StudyStatus::Pending, StudyEvent::Reopened);
        assert!(matches!(err, Err(NoduleError::InvalidStateTransition { .. })));
    }

    #[test]
    fn test_status_requests() {
        let sm = StudyStateMachine::new();

        let next = sm.apply_status_request(&study(StudyStatus::Pending, false), StudyStatus::Completed);
        assert_eq!(next.unwrap(), StudyStatus::Completed);

        let next = sm.apply_status_request(&study(StudyStatus::Completed, false), StudyStatus::Pending);
        assert_eq!(next.unwrap(), StudyStatus::Pending);

        // 重新分析已完成的检查
        let next = sm.apply_status_request(&study(StudyStatus::Completed, true), StudyStatus::Completed);
        assert_eq!(next.unwrap(), StudyStatus::Completed);
    }

    #[test]
    fn test_reviewed_study_cannot_be_reopened() {
        let sm = StudyStateMachine::new();
        let err = sm.apply_status_request(&study(StudyStatus::Completed, true), StudyStatus::Pending);
        assert!(matches!(err, Err(NoduleError::InvalidStateTransition { .. })));
    }
}
