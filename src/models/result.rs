use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::run::RunId;
use crate::models::target::LinkId;

/// 单条链接的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// 已提交且未发现拒绝信号
    Success,
    /// 已提交但结果不明确，或需要未执行的二次确认
    Partial,
    /// 网络错误 / 超时 / 明确被拒绝
    Failed,
    /// 没有可用表单，或在发起网络请求前就被跳过
    Skipped,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Partial => "partial",
            ResultStatus::Failed => "failed",
            ResultStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 执行器返回的提交结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub status: ResultStatus,
    pub http_status: Option<u16>,
    /// 提交后最终落地的 URL
    pub evidence_url: Option<String>,
    /// 去标签后的响应摘录
    pub excerpt: String,
    pub error: Option<String>,
}

/// 追加写入的结果记录（每条链接每次处理一条）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub run_id: RunId,
    pub link_id: LinkId,
    pub created_at: DateTime<Utc>,
    pub status: ResultStatus,
    pub url: String,
    pub evidence_url: Option<String>,
    pub message_excerpt: String,
    pub error: Option<String>,
    pub http_status: Option<u16>,
}

impl ResultRecord {
    /// 不带网络信息的记录（跳过 / 抓取失败等）
    pub fn bare(
        run_id: RunId,
        link_id: LinkId,
        url: impl Into<String>,
        status: ResultStatus,
        error: Option<String>,
    ) -> Self {
        Self {
            run_id,
            link_id,
            created_at: Utc::now(),
            status,
            url: url.into(),
            evidence_url: None,
            message_excerpt: String::new(),
            error,
            http_status: None,
        }
    }

    /// 由执行器结果构建记录
    pub fn from_outcome(
        run_id: RunId,
        link_id: LinkId,
        url: impl Into<String>,
        outcome: SubmissionOutcome,
    ) -> Self {
        Self {
            run_id,
            link_id,
            created_at: Utc::now(),
            status: outcome.status,
            url: url.into(),
            evidence_url: outcome.evidence_url,
            message_excerpt: outcome.excerpt,
            error: outcome.error,
            http_status: outcome.http_status,
        }
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.message_excerpt = excerpt.into();
        self
    }
}
