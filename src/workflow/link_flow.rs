//! 链接处理流程 - 流程层
//!
//! 核心职责：定义"一条链接"的完整处理流程
//!
//! 流程顺序：
//! 1. 校验目标地址（不合法 → skipped）
//! 2. 抓取页面（失败 → failed）
//! 3. 定位表单（没有 → skipped）
//! 4. 提交并判定结果
//! 5. 追加结果记录，把结果状态交回编排层
//!
//! 单条链接的任何错误都在这里转换为结果记录，不会向上传播。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::CrowdError;
use crate::infrastructure::PageFetcher;
use crate::models::identity::Identity;
use crate::models::result::{ResultRecord, ResultStatus};
use crate::providers::{Provider, PublishContext};
use crate::services::{FormLocator, SubmissionExecutor};
use crate::store::ResultStore;
use crate::utils::logging::truncate_text;
use crate::workflow::link_ctx::LinkCtx;

/// 找到表单之后做什么
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitMode {
    /// 真正提交
    Submit,
    /// 只定位表单、生成计划，不提交
    Probe,
}

/// 链接处理流程
///
/// - 编排抓取 → 定位 → 提交
/// - 不持有运行状态，不写存储
pub struct LinkFlow {
    fetcher: Arc<dyn PageFetcher>,
    executor: SubmissionExecutor,
}

impl LinkFlow {
    /// 创建新的链接处理流程
    pub fn new(fetcher: Arc<dyn PageFetcher>, executor: SubmissionExecutor) -> Self {
        Self { fetcher, executor }
    }

    pub async fn run(&self, ctx: &LinkCtx, identity: &Identity, mode: SubmitMode) -> ResultRecord {
        let target = &ctx.target;

        // ========== 步骤 1: 校验地址 ==========
        let url = match target.parsed_url() {
            Ok(url) => url,
            Err(e) => {
                warn!("{} ⏭️ 地址不合法，跳过: {}", ctx, e);
                return ResultRecord::bare(
                    ctx.run_id,
                    target.id,
                    &target.url,
                    ResultStatus::Skipped,
                    Some(e.to_string()),
                )
                .with_excerpt(e.to_string());
            }
        };

        // ========== 步骤 2: 抓取页面 ==========
        info!("{} 🌐 抓取 {}", ctx, url);
        let page = match self.fetcher.fetch(url.as_str()).await {
            Ok(page) => page,
            Err(e) => {
                warn!("{} ❌ {}", ctx, e);
                return ResultRecord::bare(
                    ctx.run_id,
                    target.id,
                    &target.url,
                    ResultStatus::Failed,
                    Some(e.to_string()),
                );
            }
        };

        // ========== 步骤 3: 定位表单 ==========
        let Some(plan) = FormLocator::new(identity).locate(&page.html, &page.final_url) else {
            let reason = CrowdError::NoSuitableForm.to_string();
            info!("{} ⏭️ {}", ctx, reason);
            return ResultRecord::bare(
                ctx.run_id,
                target.id,
                &target.url,
                ResultStatus::Skipped,
                Some(reason.clone()),
            )
            .with_excerpt(reason);
        };
        debug!("{} 📝 {}", ctx, plan.summary());

        if mode == SubmitMode::Probe {
            info!("{} 🔎 探测到可用表单: {} {}", ctx, plan.method.as_str(), plan.action);
            let mut record = ResultRecord::bare(
                ctx.run_id,
                target.id,
                &target.url,
                ResultStatus::Partial,
                None,
            )
            .with_excerpt(truncate_text(&plan.summary(), 200));
            record.evidence_url = Some(plan.action.clone());
            return record;
        }

        // ========== 步骤 4: 提交 ==========
        let outcome = self.executor.submit(&plan, &page.final_url).await;
        ResultRecord::from_outcome(ctx.run_id, target.id, &target.url, outcome)
    }
}

/// 链接任务处理器
///
/// 职责：
/// - 给单条链接套上独立的超时
/// - 追加结果记录（存储失败只影响这一条）
/// - 只返回结果状态，计数由编排层统一更新
///
/// `process` 只产出记录，`persist` 才写存储；编排层在同一处先写记录再计数，
/// 被中止的任务不会留下半写的记录。
pub struct LinkProcessor {
    provider: Arc<dyn Provider>,
    results: Arc<dyn ResultStore>,
    link_timeout: Duration,
}

impl LinkProcessor {
    pub fn new(
        provider: Arc<dyn Provider>,
        results: Arc<dyn ResultStore>,
        link_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            results,
            link_timeout,
        }
    }

    pub async fn process(&self, ctx: &LinkCtx, identity: Arc<Identity>) -> ResultRecord {
        let publish = self.provider.publish(PublishContext {
            link: ctx.clone(),
            identity,
        });

        match timeout(self.link_timeout, publish).await {
            Ok(record) => record,
            Err(_) => {
                let reason = format!("处理超时（{} 秒）", self.link_timeout.as_secs());
                warn!("{} ⏱️ {}", ctx, reason);
                ResultRecord::bare(
                    ctx.run_id,
                    ctx.target.id,
                    &ctx.target.url,
                    ResultStatus::Failed,
                    Some(reason),
                )
            }
        }
    }

    /// 不经过提交能力的结果记录（被放弃或处理崩溃）
    pub fn record(ctx: &LinkCtx, status: ResultStatus, reason: &str) -> ResultRecord {
        ResultRecord::bare(
            ctx.run_id,
            ctx.target.id,
            &ctx.target.url,
            status,
            Some(reason.to_string()),
        )
        .with_excerpt(reason)
    }

    /// 追加结果记录，返回应计入的状态
    pub async fn persist(&self, ctx: &LinkCtx, record: ResultRecord) -> ResultStatus {
        let status = record.status;
        match self.results.append(record).await {
            Ok(()) => {
                info!("{} ✓ 结果: {}", ctx, status);
                status
            }
            Err(e) => {
                error!("{} ❌ 结果写入失败，按失败计: {}", ctx, e);
                ResultStatus::Failed
            }
        }
    }
}
