//! 运行编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **启动**：校验身份、按所有者占用运行、枚举目标链接、固定 total
//! 2. **调度**：进程级工作池（Semaphore）限制并发，每条链接一个任务
//! 3. **计数**：调度器是计数器的唯一写入者，每完成一条链接原子更新一次
//! 4. **取消**：优雅取消只停止派发；强制取消中止进行中的任务，剩余链接记为跳过
//! 5. **监督**：调度器异常退出或长时间无进展时，运行判定为失败
//!
//! 结果记录只由调度器写入，写记录和计数在结算锁内一起完成；
//! 从外部结束运行（判定失败、强制取消超时）也要先拿到结算锁，
//! 之后调度器看到运行已结束就不再写记录，结果日志和计数器始终一致。
//!
//! ## 取消流程
//!
//! ```text
//! cancel(force=false) → cancel_requested = true → 停止派发 → 等进行中的链接结束 → cancelled / completed
//! cancel(force=true)  → 同上 + 中止进行中的任务 → 未完成的链接记为 skipped → cancelled
//! ```

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, CrowdError};
use crate::models::control::{
    CancelResponse, ResultsResponse, RunView, StartRequest, StartResponse, StatusResponse,
};
use crate::models::identity::Identity;
use crate::models::result::{ResultRecord, ResultStatus};
use crate::models::run::{Run, RunId, RunStatus};
use crate::models::target::LinkTarget;
use crate::providers::Provider;
use crate::store::{ResultStore, RunClaim, RunStore, TargetSource};
use crate::workflow::{LinkCtx, LinkProcessor};

/// 一个活动运行的控制信号
#[derive(Clone)]
struct RunSignals {
    /// 停止派发新链接
    graceful: CancellationToken,
    /// 中止进行中的链接
    force: CancellationToken,
    /// 调度器已退出
    finished: CancellationToken,
    /// 结算锁：写结果记录 + 计数
    settle: Arc<Mutex<()>>,
}

impl RunSignals {
    fn new() -> Self {
        Self {
            graceful: CancellationToken::new(),
            force: CancellationToken::new(),
            finished: CancellationToken::new(),
            settle: Arc::new(Mutex::new(())),
        }
    }
}

type SignalTable = Arc<Mutex<HashMap<RunId, RunSignals>>>;

/// 运行编排器
pub struct RunOrchestrator {
    runs: Arc<dyn RunStore>,
    results: Arc<dyn ResultStore>,
    targets: Arc<dyn TargetSource>,
    processor: Arc<LinkProcessor>,
    /// 进程级工作池，所有运行共享
    pool: Arc<Semaphore>,
    signals: SignalTable,
    stall_after_ms: u64,
    stall_fail_after_ms: u64,
    force_cancel_grace: Duration,
}

impl RunOrchestrator {
    pub fn new(
        config: &Config,
        runs: Arc<dyn RunStore>,
        results: Arc<dyn ResultStore>,
        targets: Arc<dyn TargetSource>,
        provider: Arc<dyn Provider>,
    ) -> Self {
        let processor = LinkProcessor::new(provider, results.clone(), config.link_timeout());
        Self {
            runs,
            results,
            targets,
            processor: Arc::new(processor),
            pool: Arc::new(Semaphore::new(config.max_concurrent_links.max(1))),
            signals: Arc::new(Mutex::new(HashMap::new())),
            stall_after_ms: config.stall_after_ms,
            stall_fail_after_ms: config.stall_fail_after_ms,
            force_cancel_grace: config.force_cancel_grace(),
        }
    }

    /// 启动一次运行
    ///
    /// 所有者已有活动运行时原样返回（`already_running = true`），不会新建。
    /// 只有运行级错误（身份不合法、无法枚举链接、存储故障）会返回 `Err`。
    pub async fn start(&self, request: StartRequest) -> AppResult<StartResponse> {
        request.identity.validate()?;

        let run = match self.runs.claim_run(&request.owner, request.scope).await? {
            RunClaim::Existing(run) => {
                info!(
                    "[运行 {}] 所有者 {} 已有活动运行（{}），直接返回",
                    run.id, run.owner, run.status
                );
                return Ok(StartResponse {
                    run_id: run.id,
                    total: run.total_links,
                    already_running: true,
                });
            }
            RunClaim::Created(run) => run,
        };
        let run_id = run.id;
        info!(
            "[运行 {}] 🆕 已创建 | 所有者: {} | 范围: {}",
            run_id,
            run.owner,
            run.scope.as_str()
        );

        let targets = match self
            .targets
            .targets_for(&request.owner, request.scope, &request.selection_ids)
            .await
        {
            Ok(targets) => targets,
            Err(e) => {
                error!("[运行 {}] ❌ 无法枚举目标链接: {}", run_id, e);
                finish_run(
                    self.runs.as_ref(),
                    run_id,
                    RunStatus::Failed,
                    Some(format!("无法枚举目标链接: {}", e)),
                )
                .await;
                return Err(e);
            }
        };
        let total = targets.len();

        let signals = RunSignals::new();
        self.signals.lock().await.insert(run_id, signals.clone());

        let run = match self
            .runs
            .update_run(
                run_id,
                Box::new(move |r: &mut Run| r.mark_running(total, Utc::now())),
            )
            .await
        {
            Ok(run) => run,
            Err(e) => {
                self.signals.lock().await.remove(&run_id);
                error!("[运行 {}] ❌ 无法进入运行状态: {}", run_id, e);
                finish_run(
                    self.runs.as_ref(),
                    run_id,
                    RunStatus::Failed,
                    Some(format!("无法进入运行状态: {}", e)),
                )
                .await;
                return Err(e);
            }
        };

        // 排队期间就收到了取消请求
        if run.cancel_requested {
            signals.graceful.cancel();
        }

        info!("[运行 {}] ▶️ 开始处理 {} 条链接", run_id, total);
        self.spawn_dispatcher(run_id, targets, Arc::new(request.identity), signals);

        Ok(StartResponse {
            run_id,
            total,
            already_running: false,
        })
    }

    /// 当前状态快照
    ///
    /// 运行中的运行如果调度器已经退出，或超过 `stall_fail_after_ms` 没有进展，会在这里被判定为失败。
    pub async fn status(&self, run_id: RunId) -> AppResult<StatusResponse> {
        let mut run = self.load_run(run_id).await?;
        let now = Utc::now();

        if run.status == RunStatus::Running {
            let signals = self.signals.lock().await.get(&run_id).cloned();
            let alive = signals
                .as_ref()
                .is_some_and(|s| !s.finished.is_cancelled());

            let verdict = if !alive {
                Some("调度器已退出，运行判定失败".to_string())
            } else if run.idle_ms(now) > self.stall_fail_after_ms {
                Some(format!(
                    "超过 {} 毫秒没有进展，运行判定失败",
                    self.stall_fail_after_ms
                ))
            } else {
                None
            };

            if let Some(note) = verdict {
                let settling = signals
                    .as_ref()
                    .map(|s| s.settle.clone().try_lock_owned());
                match &settling {
                    // 正在写结果就说明还有进展，交给下一次轮询判断
                    Some(Err(_)) => debug!("[运行 {}] 正在写入结果，暂不判定", run_id),
                    _ => {
                        warn!("[运行 {}] ⚠️ {}", run_id, note);
                        if let Some(signals) = &signals {
                            signals.graceful.cancel();
                            signals.force.cancel();
                        }
                        finish_run(self.runs.as_ref(), run_id, RunStatus::Failed, Some(note))
                            .await;
                        run = self.load_run(run_id).await?;
                    }
                }
            }
        }

        let stalled = run.is_stalled(now, self.stall_after_ms);
        if stalled {
            debug!("[运行 {}] 已 {} 毫秒没有进展", run_id, run.idle_ms(now));
        }
        Ok(StatusResponse {
            run: RunView::from_run(&run, stalled),
        })
    }

    /// 请求取消
    ///
    /// 第一次调用置位 `cancel_requested` 并停止派发；`force = true` 时同时中止进行中的链接，
    /// 最多等待 `force_cancel_grace`，之后运行一定处于 cancelled。
    pub async fn cancel(&self, run_id: RunId, force: bool) -> AppResult<CancelResponse> {
        let run = self.load_run(run_id).await?;
        if run.is_terminal() {
            info!("[运行 {}] 已结束（{}），忽略取消请求", run_id, run.status);
            return Ok(already_finished(&run));
        }

        let run = match self
            .runs
            .update_run(
                run_id,
                Box::new(|r: &mut Run| {
                    if r.is_terminal() {
                        return Err(CrowdError::Orchestration(format!(
                            "运行 {} 已结束",
                            r.id
                        )));
                    }
                    r.request_cancel();
                    Ok(())
                }),
            )
            .await
        {
            Ok(run) => run,
            Err(CrowdError::Orchestration(_)) => {
                let run = self.load_run(run_id).await?;
                return Ok(already_finished(&run));
            }
            Err(e) => return Err(e),
        };
        info!(
            "[运行 {}] 🛑 收到{}取消请求",
            run_id,
            if force { "强制" } else { "" }
        );

        let signals = self.signals.lock().await.get(&run_id).cloned();
        let Some(signals) = signals else {
            // 没有调度器：要么 start 还没走完，要么调度器已经退出
            if force || run.status == RunStatus::Running {
                let finished = finish_run(
                    self.runs.as_ref(),
                    run_id,
                    RunStatus::Cancelled,
                    Some("取消时调度器不在运行".to_string()),
                )
                .await
                .is_some();
                return Ok(CancelResponse {
                    finished,
                    forced: force,
                    cancel_requested: true,
                    already_finished: false,
                });
            }
            return Ok(CancelResponse {
                finished: false,
                forced: false,
                cancel_requested: true,
                already_finished: false,
            });
        };

        signals.graceful.cancel();
        if !force {
            return Ok(CancelResponse {
                finished: signals.finished.is_cancelled(),
                forced: false,
                cancel_requested: true,
                already_finished: false,
            });
        }

        signals.force.cancel();
        if timeout(self.force_cancel_grace, signals.finished.cancelled())
            .await
            .is_err()
        {
            warn!(
                "[运行 {}] 调度器未在 {} 毫秒内退出，直接结束运行",
                run_id,
                self.force_cancel_grace.as_millis()
            );
            // 存储卡住时拿不到结算锁，照样结束
            let _settling = timeout(self.force_cancel_grace, signals.settle.clone().lock_owned())
                .await
                .ok();
            finish_run(
                self.runs.as_ref(),
                run_id,
                RunStatus::Cancelled,
                Some("强制取消：调度器未在宽限期内退出".to_string()),
            )
            .await;
        }

        let run = self.load_run(run_id).await?;
        Ok(CancelResponse {
            finished: run.is_terminal(),
            forced: true,
            cancel_requested: true,
            already_finished: false,
        })
    }

    /// 最新的 `limit` 条结果（新的在前）以及总条数
    pub async fn results(&self, run_id: RunId, limit: usize) -> AppResult<ResultsResponse> {
        let (items, total) = self.results.list(run_id, limit).await?;
        Ok(ResultsResponse { items, total })
    }

    async fn load_run(&self, run_id: RunId) -> AppResult<Run> {
        self.runs
            .get_run(run_id)
            .await?
            .ok_or_else(|| CrowdError::validation(format!("运行 {} 不存在", run_id)))
    }

    /// 启动调度器，并用一个监督任务等待它退出
    fn spawn_dispatcher(
        &self,
        run_id: RunId,
        targets: Vec<LinkTarget>,
        identity: Arc<Identity>,
        signals: RunSignals,
    ) {
        let dispatcher = Dispatcher {
            run_id,
            runs: self.runs.clone(),
            processor: self.processor.clone(),
            pool: self.pool.clone(),
            identity,
            graceful: signals.graceful.clone(),
            force: signals.force.clone(),
            settle: signals.settle.clone(),
        };
        let handle = tokio::spawn(dispatcher.run(targets));

        let runs = self.runs.clone();
        let table = self.signals.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.await {
                error!("[运行 {}] 💥 调度器异常退出: {}", run_id, e);
                finish_run(
                    runs.as_ref(),
                    run_id,
                    RunStatus::Failed,
                    Some(format!("调度器异常退出: {}", e)),
                )
                .await;
            }
            signals.finished.cancel();
            table.lock().await.remove(&run_id);
        });
    }
}

/// 单个运行的调度器
///
/// 按顺序派发链接，每条链接先拿到工作池许可再启动任务。
/// 每次派发前检查取消信号。
struct Dispatcher {
    run_id: RunId,
    runs: Arc<dyn RunStore>,
    processor: Arc<LinkProcessor>,
    pool: Arc<Semaphore>,
    identity: Arc<Identity>,
    graceful: CancellationToken,
    force: CancellationToken,
    settle: Arc<Mutex<()>>,
}

impl Dispatcher {
    async fn run(self, targets: Vec<LinkTarget>) {
        let total = targets.len();
        let run_id = self.run_id;
        let mut queue = targets
            .into_iter()
            .enumerate()
            .map(|(i, target)| LinkCtx::new(run_id, i + 1, total, target));
        let mut next = queue.next();

        let mut tasks: JoinSet<(usize, ResultRecord)> = JoinSet::new();
        let mut in_flight: HashMap<usize, LinkCtx> = HashMap::new();
        let mut forced = false;
        let mut fault: Option<String> = None;

        loop {
            let dispatching = next.is_some() && !self.graceful.is_cancelled();
            if tasks.is_empty() && !dispatching {
                break;
            }

            tokio::select! {
                biased;

                _ = self.force.cancelled() => {
                    forced = true;
                    break;
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    match joined {
                        Ok((index, record)) => {
                            if let Some(ctx) = in_flight.remove(&index) {
                                self.settle(&ctx, record).await;
                            }
                        }
                        Err(e) => error!("[运行 {}] 链接任务异常结束: {}", run_id, e),
                    }
                }

                permit = self.pool.clone().acquire_owned(), if dispatching => {
                    let permit = match permit {
                        Ok(permit) => permit,
                        Err(e) => {
                            fault = Some(format!("工作池已关闭: {}", e));
                            break;
                        }
                    };
                    if let Some(ctx) = next.take() {
                        in_flight.insert(ctx.index, ctx.clone());
                        self.spawn_link(&mut tasks, ctx, permit);
                    }
                    next = queue.next();
                }

                _ = self.graceful.cancelled(), if dispatching => {
                    info!(
                        "[运行 {}] ⏸️ 停止派发新链接，等待 {} 条进行中的链接",
                        run_id,
                        tasks.len()
                    );
                }
            }
        }

        if forced {
            info!("[运行 {}] ⛔ 强制取消，中止 {} 条进行中的链接", run_id, tasks.len());
            tasks.abort_all();
            while let Some(joined) = tasks.join_next().await {
                if let Ok((index, record)) = joined {
                    if let Some(ctx) = in_flight.remove(&index) {
                        self.settle(&ctx, record).await;
                    }
                }
            }
        }

        // 剩下的是被中止或崩溃的任务
        let mut abandoned: Vec<LinkCtx> = in_flight.into_values().collect();
        abandoned.sort_by_key(|ctx| ctx.index);
        let (abandoned_status, abandoned_reason) = if forced {
            (ResultStatus::Skipped, "强制取消，处理被中止")
        } else {
            (ResultStatus::Failed, "链接任务异常结束")
        };
        for ctx in &abandoned {
            let record = LinkProcessor::record(ctx, abandoned_status, abandoned_reason);
            self.settle(ctx, record).await;
        }

        let unstarted: Vec<LinkCtx> = next.into_iter().chain(queue).collect();
        if forced {
            for ctx in &unstarted {
                let record = LinkProcessor::record(ctx, ResultStatus::Skipped, "强制取消，未处理");
                self.settle(ctx, record).await;
            }
        }

        let (status, note) = if let Some(fault) = fault {
            (RunStatus::Failed, Some(fault))
        } else if forced {
            (
                RunStatus::Cancelled,
                Some(format!(
                    "强制取消：{} 条链接记为跳过",
                    abandoned.len() + unstarted.len()
                )),
            )
        } else if !unstarted.is_empty() {
            (
                RunStatus::Cancelled,
                Some(format!("已取消：{} 条链接未处理", unstarted.len())),
            )
        } else {
            (RunStatus::Completed, None)
        };
        finish_run(self.runs.as_ref(), run_id, status, note).await;
    }

    fn spawn_link(
        &self,
        tasks: &mut JoinSet<(usize, ResultRecord)>,
        ctx: LinkCtx,
        permit: OwnedSemaphorePermit,
    ) {
        let processor = self.processor.clone();
        let identity = self.identity.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let index = ctx.index;
            let outcome = AssertUnwindSafe(processor.process(&ctx, identity))
                .catch_unwind()
                .await;
            let record = match outcome {
                Ok(record) => record,
                Err(_) => {
                    error!("{} 💥 处理过程中崩溃", ctx);
                    LinkProcessor::record(&ctx, ResultStatus::Failed, "处理过程中崩溃")
                }
            };
            (index, record)
        });
    }

    /// 写结果记录并计数；运行已经被外部结束时整条丢弃
    async fn settle(&self, ctx: &LinkCtx, record: ResultRecord) {
        let _guard = self.settle.lock().await;
        match self.runs.get_run(self.run_id).await {
            Ok(Some(run)) if run.is_terminal() => {
                debug!("{} 运行已结束（{}），丢弃结果: {}", ctx, run.status, record.status);
                return;
            }
            Ok(_) => {}
            Err(e) => warn!("{} 读取运行状态失败，照常写入结果: {}", ctx, e),
        }
        let status = self.processor.persist(ctx, record).await;
        self.record_outcome(status).await;
    }

    /// 计数器只在这里更新；运行已结束时丢弃
    async fn record_outcome(&self, status: ResultStatus) {
        let result = self
            .runs
            .update_run(
                self.run_id,
                Box::new(move |r: &mut Run| {
                    if r.is_terminal() {
                        return Err(CrowdError::Orchestration(format!(
                            "运行 {} 已结束",
                            r.id
                        )));
                    }
                    r.record_outcome(status, Utc::now());
                    Ok(())
                }),
            )
            .await;

        match result {
            Ok(run) => debug!(
                "[运行 {}] 进度 {}/{} ({}%)",
                run.id,
                run.processed_count,
                run.total_links,
                run.progress_percent()
            ),
            Err(e) => warn!("[运行 {}] 计数未更新: {}", self.run_id, e),
        }
    }
}

/// 让运行进入终态；已经是终态时只记调试日志
async fn finish_run(
    runs: &dyn RunStore,
    run_id: RunId,
    status: RunStatus,
    note: Option<String>,
) -> Option<Run> {
    let result = runs
        .update_run(
            run_id,
            Box::new(move |r: &mut Run| r.finish(status, Utc::now(), note)),
        )
        .await;
    match result {
        Ok(run) => {
            info!(
                "[运行 {}] 🏁 结束: {} | 已处理 {}/{}",
                run_id, run.status, run.processed_count, run.total_links
            );
            Some(run)
        }
        Err(e) => {
            debug!("[运行 {}] 未能结束为 {}: {}", run_id, status, e);
            None
        }
    }
}

fn already_finished(run: &Run) -> CancelResponse {
    CancelResponse {
        finished: true,
        forced: false,
        cancel_requested: run.cancel_requested,
        already_finished: true,
    }
}
