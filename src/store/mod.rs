//! 存储层
//!
//! 核心只要求两件事：
//! - 运行汇总行支持原子的"读-改-写"
//! - 结果记录只追加、不修改
//!
//! 目标链接由外部的项目数据提供，这里以 [`TargetSource`] 抽象。

pub mod jsonl;
pub mod memory;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::result::ResultRecord;
use crate::models::run::{Run, RunId, RunScope};
use crate::models::target::{LinkId, LinkTarget};

pub use jsonl::JsonlResultStore;
pub use memory::MemoryStore;

/// 对运行汇总行的一次原子修改。返回错误时修改整体丢弃
pub type RunUpdate = Box<dyn FnOnce(&mut Run) -> AppResult<()> + Send>;

/// 申请启动运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunClaim {
    /// 新建了一个排队中的运行
    Created(Run),
    /// 该所有者已有活动运行，原样返回
    Existing(Run),
}

/// 运行汇总行存储
#[async_trait]
pub trait RunStore: Send + Sync {
    /// 检查并占用：所有者没有活动运行时新建一个，否则返回已有的那个
    async fn claim_run(&self, owner: &str, scope: RunScope) -> AppResult<RunClaim>;

    async fn get_run(&self, run_id: RunId) -> AppResult<Option<Run>>;

    /// 原子地修改运行并返回修改后的快照
    async fn update_run(&self, run_id: RunId, update: RunUpdate) -> AppResult<Run>;
}

/// 结果记录存储（只追加）
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn append(&self, record: ResultRecord) -> AppResult<()>;

    /// 最新的 `limit` 条记录（新的在前）以及总条数
    async fn list(&self, run_id: RunId, limit: usize) -> AppResult<(Vec<ResultRecord>, usize)>;
}

/// 目标链接来源
#[async_trait]
pub trait TargetSource: Send + Sync {
    /// 枚举所有者在某个范围内的链接；`Selection` 范围只保留选中的编号
    async fn targets_for(
        &self,
        owner: &str,
        scope: RunScope,
        selection: &[LinkId],
    ) -> AppResult<Vec<LinkTarget>>;
}
