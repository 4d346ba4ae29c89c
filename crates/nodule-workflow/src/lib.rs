//! # 工作流模块
//!
//! 提供检查生命周期和阅片流程相关的业务规则，包括：
//! - 检查状态机：pending/completed 状态转换与审阅约束
//! - 工作列表：未出报告检查的优先级、过滤和统计
//! - 历史检查：已出报告的检查及其报告编号
//! - 报告组装：根据检查和结节生成报告记录

pub mod report;
pub mod state_machine;
pub mod worklist;

// 重新导出主要类型
pub use report::{ReportBuilder, ReportRequest};
pub use state_machine::{StudyEvent, StudyStateMachine};
pub use worklist::{
    DateRange, DisplayStatus, PastStudy, WorkItem, WorkItemPriority, WorkList, WorkListFilter,
    WorkListManager, WorkListStats,
};
