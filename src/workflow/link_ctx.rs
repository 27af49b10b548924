//! 链接处理上下文
//!
//! 封装"我正在处理哪次运行的第几条链接"这一信息

use std::fmt::Display;

use crate::models::run::RunId;
use crate::models::target::LinkTarget;

/// 链接处理上下文
#[derive(Debug, Clone)]
pub struct LinkCtx {
    /// 所属运行
    pub run_id: RunId,

    /// 链接在本次运行中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次运行的链接总数
    pub total: usize,

    pub target: LinkTarget,
}

impl LinkCtx {
    /// 创建新的链接上下文
    pub fn new(run_id: RunId, index: usize, total: usize, target: LinkTarget) -> Self {
        Self {
            run_id,
            index,
            total,
            target,
        }
    }
}

impl Display for LinkCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[链接 {}/{} #{}]",
            self.index, self.total, self.target.id
        )
    }
}
