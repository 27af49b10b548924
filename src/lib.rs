//! # Crowd Check
//!
//! 一个批量向留言簿、博客评论、联系表单提交留言的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 页面抓取能力（HTTP / Chromium），只暴露 `PageFetcher`
//! - `browser/` - 连接或启动浏览器
//! - `store/` - 运行汇总行、结果记录、目标链接的存储抽象
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个页面
//! - `FormLocator` - 找到可提交的表单并生成提交计划
//! - `SubmissionExecutor` - 发送提交并判定结果
//! - `field_dictionary` - 多语言字段词典
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一条链接"的完整处理流程
//! - `LinkCtx` - 上下文封装（run_id + 链接序号）
//! - `LinkFlow` - 流程编排（抓取 → 定位 → 提交）
//! - `LinkProcessor` - 单条链接的超时与结果写入
//! - `providers/` - 提交能力注册表
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/run_orchestrator` - 运行生命周期、工作池、取消
//! - `orchestrator/poller` - 状态轮询
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod services;
pub mod store;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::{Config, FetchMode};
pub use error::{AppResult, CrowdError};
pub use infrastructure::{BrowserFetcher, HttpFetcher, PageFetcher};
pub use models::{Identity, LinkTarget, ResultRecord, ResultStatus, Run, RunStatus};
pub use orchestrator::{Poller, RunOrchestrator};
pub use providers::{find_provider, registry, Provider};
pub use services::{FormLocator, SubmissionExecutor};
pub use store::{JsonlResultStore, MemoryStore};
pub use workflow::{LinkCtx, LinkFlow, LinkProcessor};
