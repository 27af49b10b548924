//! 状态轮询
//!
//! 按固定间隔拉取完整状态快照，直到运行进入终态。
//! 拉取出错时指数退避（上限 `poll_max_backoff`），连续出错过多则放弃。

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::control::{RunView, StatusResponse};
use crate::models::run::RunId;
use crate::orchestrator::RunOrchestrator;

/// 连续出错多少次后放弃轮询
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// 状态来源
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, run_id: RunId) -> AppResult<StatusResponse>;
}

#[async_trait]
impl StatusSource for RunOrchestrator {
    async fn fetch_status(&self, run_id: RunId) -> AppResult<StatusResponse> {
        self.status(run_id).await
    }
}

/// 状态轮询器
pub struct Poller {
    interval: Duration,
    max_backoff: Duration,
}

impl Poller {
    pub fn new(interval: Duration, max_backoff: Duration) -> Self {
        Self {
            interval,
            max_backoff: max_backoff.max(interval),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.poll_interval(), config.poll_max_backoff())
    }

    /// 轮询直到运行结束，返回最后一次快照
    ///
    /// 每拿到一次快照调用一次 `on_update`。
    pub async fn poll_until_finished<F>(
        &self,
        source: &dyn StatusSource,
        run_id: RunId,
        mut on_update: F,
    ) -> AppResult<RunView>
    where
        F: FnMut(&RunView) + Send,
    {
        let mut delay = self.interval;
        let mut consecutive_errors = 0;

        loop {
            match source.fetch_status(run_id).await {
                Ok(response) => {
                    consecutive_errors = 0;
                    delay = self.interval;
                    on_update(&response.run);
                    if !response.run.in_progress {
                        debug!("[运行 {}] 轮询结束: {}", run_id, response.run.status);
                        return Ok(response.run);
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        warn!("[运行 {}] 连续 {} 次拉取状态失败，停止轮询", run_id, consecutive_errors);
                        return Err(e);
                    }
                    delay = (delay * 2).min(self.max_backoff);
                    warn!(
                        "[运行 {}] 拉取状态失败（第 {} 次），{} 毫秒后重试: {}",
                        run_id,
                        consecutive_errors,
                        delay.as_millis(),
                        e
                    );
                }
            }
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrowdError;
    use crate::models::run::{Run, RunScope, RunStatus};
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// 前几次返回错误，之后按调用次数推进状态
    struct FlakySource {
        calls: AtomicU32,
        failures: u32,
        finish_after: u32,
    }

    #[async_trait]
    impl StatusSource for FlakySource {
        async fn fetch_status(&self, run_id: RunId) -> AppResult<StatusResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                return Err(CrowdError::store_failed("暂时不可用"));
            }
            let now = Utc::now();
            let mut run = Run::new(run_id, "o", RunScope::All, now);
            run.mark_running(2, now).unwrap();
            if call >= self.finish_after {
                run.finish(RunStatus::Completed, now, None).unwrap();
            }
            Ok(StatusResponse {
                run: RunView::from_run(&run, false),
            })
        }
    }

    fn poller() -> Poller {
        Poller::new(Duration::from_millis(1), Duration::from_millis(4))
    }

    #[tokio::test]
    async fn test_polls_until_terminal() {
        let source = FlakySource {
            calls: AtomicU32::new(0),
            failures: 0,
            finish_after: 3,
        };
        let mut seen = Vec::new();
        let view = poller()
            .poll_until_finished(&source, 5, |v| seen.push(v.status))
            .await
            .unwrap();
        assert_eq!(view.status, RunStatus::Completed);
        assert_eq!(
            seen,
            vec![RunStatus::Running, RunStatus::Running, RunStatus::Completed]
        );
    }

    #[tokio::test]
    async fn test_recovers_from_transient_errors() {
        let source = FlakySource {
            calls: AtomicU32::new(0),
            failures: 3,
            finish_after: 4,
        };
        let view = poller()
            .poll_until_finished(&source, 5, |_| {})
            .await
            .unwrap();
        assert_eq!(view.status, RunStatus::Completed);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_gives_up_after_repeated_errors() {
        let source = FlakySource {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
            finish_after: u32::MAX,
        };
        let err = poller()
            .poll_until_finished(&source, 5, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, CrowdError::Store(_)));
        assert_eq!(source.calls.load(Ordering::SeqCst), MAX_CONSECUTIVE_ERRORS);
    }
}
