//! 运行（Run）及其状态机
//!
//! 状态迁移：`queued → running → {completed, cancelled, failed}`，三个终态不可再迁出。
//! 计数器只通过 [`Run::record_outcome`] 修改，保证
//! `processed_count == success + partial + failed + skipped`。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppResult, CrowdError};
use crate::models::result::ResultStatus;

/// 运行编号
pub type RunId = u64;

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Cancelled,
    Failed,
    Completed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
            RunStatus::Completed => "completed",
        }
    }

    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(RunStatus::Queued),
            "running" => Some(RunStatus::Running),
            "cancelled" => Some(RunStatus::Cancelled),
            "failed" => Some(RunStatus::Failed),
            "completed" => Some(RunStatus::Completed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunStatus::Cancelled | RunStatus::Failed | RunStatus::Completed
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 运行范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunScope {
    /// 所有者名下的全部链接
    All,
    /// 只处理选中的链接
    Selection,
}

impl RunScope {
    pub fn as_str(self) -> &'static str {
        match self {
            RunScope::All => "all",
            RunScope::Selection => "selection",
        }
    }
}

/// 运行汇总行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub owner: String,
    pub scope: RunScope,
    pub status: RunStatus,
    pub total_links: usize,
    pub processed_count: usize,
    pub success_count: usize,
    pub partial_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub cancel_requested: bool,
    pub last_progress_at: DateTime<Utc>,
}

impl Run {
    /// 新建一个排队中的运行
    pub fn new(id: RunId, owner: impl Into<String>, scope: RunScope, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner: owner.into(),
            scope,
            status: RunStatus::Queued,
            total_links: 0,
            processed_count: 0,
            success_count: 0,
            partial_count: 0,
            failed_count: 0,
            skipped_count: 0,
            created_at: now,
            started_at: None,
            finished_at: None,
            notes: None,
            cancel_requested: false,
            last_progress_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn in_progress(&self) -> bool {
        self.status.is_active()
    }

    /// queued → running，同时固定 total_links
    pub fn mark_running(&mut self, total_links: usize, now: DateTime<Utc>) -> AppResult<()> {
        if self.status != RunStatus::Queued {
            return Err(CrowdError::Orchestration(format!(
                "运行 {} 无法从 {} 进入 running",
                self.id, self.status
            )));
        }
        self.status = RunStatus::Running;
        self.total_links = total_links;
        self.started_at = Some(now);
        self.last_progress_at = now;
        Ok(())
    }

    /// 记录一条链接的处理结果
    pub fn record_outcome(&mut self, status: ResultStatus, now: DateTime<Utc>) {
        match status {
            ResultStatus::Success => self.success_count += 1,
            ResultStatus::Partial => self.partial_count += 1,
            ResultStatus::Failed => self.failed_count += 1,
            ResultStatus::Skipped => self.skipped_count += 1,
        }
        self.processed_count += 1;
        self.last_progress_at = now;
    }

    /// 请求取消。一旦置位就不会再复位。
    pub fn request_cancel(&mut self) {
        self.cancel_requested = true;
    }

    /// 进入终态
    pub fn finish(
        &mut self,
        status: RunStatus,
        now: DateTime<Utc>,
        note: Option<String>,
    ) -> AppResult<()> {
        if !status.is_terminal() {
            return Err(CrowdError::Orchestration(format!(
                "{} 不是终态",
                status
            )));
        }
        if self.is_terminal() {
            return Err(CrowdError::Orchestration(format!(
                "运行 {} 已处于终态 {}",
                self.id, self.status
            )));
        }
        self.status = status;
        self.finished_at = Some(now);
        if let Some(note) = note {
            self.append_note(note);
        }
        Ok(())
    }

    /// 追加一条说明
    pub fn append_note(&mut self, note: impl AsRef<str>) {
        let note = note.as_ref();
        match &mut self.notes {
            Some(existing) if !existing.is_empty() => {
                existing.push_str("; ");
                existing.push_str(note);
            }
            _ => self.notes = Some(note.to_string()),
        }
    }

    /// 进度百分比（向下取整，total 为 0 时为 0）
    pub fn progress_percent(&self) -> u8 {
        if self.total_links == 0 {
            return 0;
        }
        let percent = self.processed_count.saturating_mul(100) / self.total_links;
        percent.min(100) as u8
    }

    /// 运行中且超过阈值无进展
    pub fn is_stalled(&self, now: DateTime<Utc>, threshold_ms: u64) -> bool {
        self.status == RunStatus::Running && self.idle_ms(now) > threshold_ms
    }

    /// 距离上一次进展的毫秒数
    pub fn idle_ms(&self, now: DateTime<Utc>) -> u64 {
        (now - self.last_progress_at).num_milliseconds().max(0) as u64
    }

    /// 计数器是否自洽
    pub fn counters_consistent(&self) -> bool {
        self.processed_count
            == self.success_count + self.partial_count + self.failed_count + self.skipped_count
    }
}
