//! 轮询 / 控制接口的请求与响应结构
//!
//! 每次调用都返回完整快照，不做增量。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::identity::Identity;
use crate::models::result::ResultRecord;
use crate::models::run::{Run, RunId, RunScope, RunStatus};
use crate::models::target::LinkId;

/// 启动请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// 所有者（来自外部会话层）
    pub owner: String,
    pub scope: RunScope,
    #[serde(default)]
    pub selection_ids: Vec<LinkId>,
    pub identity: Identity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub run_id: RunId,
    pub total: usize,
    pub already_running: bool,
}

/// 状态快照中的运行信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunView {
    pub id: RunId,
    pub status: RunStatus,
    pub in_progress: bool,
    pub progress_percent: u8,
    pub total_links: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub partial_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub stalled: bool,
}

impl RunView {
    pub fn from_run(run: &Run, stalled: bool) -> Self {
        Self {
            id: run.id,
            status: run.status,
            in_progress: run.in_progress(),
            progress_percent: run.progress_percent(),
            total_links: run.total_links,
            processed_count: run.processed_count,
            success_count: run.success_count,
            partial_count: run.partial_count,
            failed_count: run.failed_count,
            skipped_count: run.skipped_count,
            started_at: run.started_at,
            finished_at: run.finished_at,
            notes: run.notes.clone(),
            stalled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub run: RunView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub finished: bool,
    pub forced: bool,
    pub cancel_requested: bool,
    pub already_finished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub items: Vec<ResultRecord>,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_response_uses_camel_case() {
        let value = serde_json::to_value(StartResponse {
            run_id: 7,
            total: 3,
            already_running: true,
        })
        .unwrap();
        assert_eq!(value["runId"], 7);
        assert_eq!(value["alreadyRunning"], true);
    }

    #[test]
    fn test_status_response_shape() {
        let run = Run::new(3, "o", RunScope::All, Utc::now());
        let value = serde_json::to_value(StatusResponse {
            run: RunView::from_run(&run, false),
        })
        .unwrap();
        assert_eq!(value["run"]["status"], "queued");
        assert_eq!(value["run"]["in_progress"], true);
        assert_eq!(value["run"]["progress_percent"], 0);
        assert_eq!(value["run"]["stalled"], false);
    }

    #[test]
    fn test_cancel_response_uses_camel_case() {
        let value = serde_json::to_value(CancelResponse {
            finished: false,
            forced: false,
            cancel_requested: true,
            already_finished: false,
        })
        .unwrap();
        assert_eq!(value["cancelRequested"], true);
        assert_eq!(value["alreadyFinished"], false);
    }
}
