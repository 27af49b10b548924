use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::{AppResult, CrowdError};

/// 启动无头浏览器（自动查找本机的 Chrome / Chromium）
pub async fn launch_headless_browser(user_agent: &str) -> AppResult<Browser> {
    info!("🚀 启动无头浏览器...");

    let user_agent_arg = format!("--user-agent={}", user_agent);
    let config = BrowserConfig::builder()
        .new_headless_mode()
        .args(vec![
            "--disable-gpu",
            "--no-sandbox",
            "--disable-dev-shm-usage",
            user_agent_arg.as_str(),
        ])
        .build()
        .map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            CrowdError::Browser(format!("配置无头浏览器失败: {}", e))
        })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        CrowdError::Browser(format!("启动无头浏览器失败: {}", e))
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    info!("✅ 无头浏览器已就绪");
    Ok(browser)
}
