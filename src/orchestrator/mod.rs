//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责运行的生命周期和并发调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `run_orchestrator` - 运行编排器
//! - 启动运行（每个所有者同时只有一个活动运行）
//! - 进程级工作池（Semaphore）限制并发链接数
//! - 唯一的计数器写入者
//! - 优雅 / 强制取消，停滞检测
//!
//! ### `poller` - 状态轮询
//! - 按间隔拉取完整快照，出错时指数退避
//!
//! ## 层次关系
//!
//! ```text
//! run_orchestrator (处理 Vec<LinkTarget>)
//!     ↓
//! workflow::LinkProcessor (超时 + 写结果)
//!     ↓
//! providers::Provider (提交能力)
//!     ↓
//! workflow::LinkFlow (抓取 → 定位 → 提交)
//!     ↓
//! services / infrastructure
//! ```

pub mod poller;
pub mod run_orchestrator;

pub use poller::{Poller, StatusSource};
pub use run_orchestrator::RunOrchestrator;
