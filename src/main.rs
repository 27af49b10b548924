use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};

use crowd_check::config::{Config, FetchMode};
use crowd_check::infrastructure::{build_http_client, BrowserFetcher, HttpFetcher, PageFetcher};
use crowd_check::models::{load_job_file, RunId, RunView};
use crowd_check::orchestrator::{Poller, RunOrchestrator};
use crowd_check::providers::{find_provider, registry};
use crowd_check::services::SubmissionExecutor;
use crowd_check::store::{JsonlResultStore, MemoryStore, ResultStore};
use crowd_check::utils::logging::{self, truncate_text};
use crowd_check::workflow::LinkFlow;

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(config.verbose_logging);
    logging::log_startup(config.max_concurrent_links, &config.provider);

    // 加载任务文件
    let job = load_job_file(Path::new(&config.job_file)).await?;

    let store = Arc::new(MemoryStore::new());
    store.add_targets(&job.owner, job.targets.clone()).await;
    logging::log_targets_loaded(&job.owner, job.targets.len());

    let results: Arc<dyn ResultStore> = if config.results_file.is_empty() {
        store.clone()
    } else {
        Arc::new(JsonlResultStore::new(store.clone(), &config.results_file))
    };

    // 抓取与提交共用一个客户端（共享 cookie）
    let client = build_http_client(&config)?;
    let fetcher: Arc<dyn PageFetcher> = match config.fetch_mode {
        FetchMode::Http => Arc::new(HttpFetcher::new(client.clone())),
        FetchMode::Browser => Arc::new(BrowserFetcher::from_config(&config).await?),
    };
    let executor = SubmissionExecutor::new(client, config.submit_retry_backoff());
    let flow = Arc::new(LinkFlow::new(fetcher, executor));

    let provider = find_provider(&registry(flow), &config.provider)?;
    info!("🔌 提交能力: {} ({})", provider.display_name(), provider.id());

    let orchestrator = Arc::new(RunOrchestrator::new(
        &config,
        store.clone(),
        results,
        store,
        provider,
    ));

    let started = orchestrator.start(job.start_request()).await?;
    if started.already_running {
        warn!("⚠️ 所有者 {} 已有活动运行 {}，改为跟踪该运行", job.owner, started.run_id);
    }

    let ctrl_c = tokio::spawn(watch_ctrl_c(orchestrator.clone(), started.run_id));

    let poller = Poller::from_config(&config);
    let mut last_seen: Option<(usize, bool)> = None;
    let view = poller
        .poll_until_finished(orchestrator.as_ref(), started.run_id, |view| {
            let seen = (view.processed_count, view.stalled);
            if last_seen != Some(seen) {
                last_seen = Some(seen);
                log_progress(view);
            }
        })
        .await?;
    ctrl_c.abort();

    logging::print_final_stats(&view, &config.results_file);

    let listed = orchestrator
        .results(started.run_id, config.max_results_listed)
        .await?;
    info!("📋 最近 {} 条结果（共 {} 条）:", listed.items.len(), listed.total);
    for record in &listed.items {
        info!(
            "  {} | {} | {}",
            record.status,
            record.url,
            truncate_text(
                record.error.as_deref().unwrap_or(&record.message_excerpt),
                80
            )
        );
    }

    Ok(())
}

/// 第一次 Ctrl-C 优雅取消，第二次强制取消
async fn watch_ctrl_c(orchestrator: Arc<RunOrchestrator>, run_id: RunId) {
    let mut force = false;
    loop {
        if let Err(e) = signal::ctrl_c().await {
            error!("无法监听 Ctrl-C: {}", e);
            return;
        }
        match orchestrator.cancel(run_id, force).await {
            Ok(response) if response.already_finished => {
                info!("运行 {} 已经结束", run_id);
                return;
            }
            Ok(response) => info!(
                "🛑 已请求{}取消运行 {}（已结束: {}）",
                if response.forced { "强制" } else { "" },
                run_id,
                response.finished
            ),
            Err(e) => error!("取消运行 {} 失败: {}", run_id, e),
        }
        if force {
            return;
        }
        force = true;
        info!("💡 再按一次 Ctrl-C 强制取消");
    }
}

fn log_progress(view: &RunView) {
    info!(
        "📈 进度 {}/{} ({}%) | ✅ {} 🟡 {} ❌ {} ⏭️ {}",
        view.processed_count,
        view.total_links,
        view.progress_percent,
        view.success_count,
        view.partial_count,
        view.failed_count,
        view.skipped_count
    );
    if view.stalled {
        warn!("⏳ 运行 {} 已有一段时间没有进展", view.id);
    }
}
