//! 浏览器页面抓取 - 基础设施层
//!
//! 持有唯一的 Browser 资源，每次抓取开一个新标签页，读完即关。
//! 抓取可能被单链接超时或强制取消中途丢弃，标签页由 [`TabGuard`] 兜底关闭。

use async_trait::async_trait;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, Page};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::browser::{connect_to_browser, launch_headless_browser};
use crate::config::Config;
use crate::error::{AppResult, CrowdError};
use crate::infrastructure::fetcher::{FetchedPage, PageFetcher};

/// 可以关闭的标签页
#[async_trait]
trait Tab: Clone + Send + 'static {
    async fn close_tab(self) -> Result<(), CdpError>;
}

#[async_trait]
impl Tab for Page {
    async fn close_tab(self) -> Result<(), CdpError> {
        self.close().await
    }
}

/// 标签页守卫：没有正常关闭就被丢弃时，在后台关闭标签页
struct TabGuard<T: Tab> {
    tab: Option<T>,
}

impl<T: Tab> TabGuard<T> {
    fn new(tab: T) -> Self {
        Self { tab: Some(tab) }
    }

    async fn close(mut self) {
        let Some(tab) = self.tab.clone() else {
            return;
        };
        let result = tab.close_tab().await;
        self.tab = None;
        if let Err(e) = result {
            warn!("关闭标签页失败: {}", e);
        }
    }
}

impl<T: Tab> Drop for TabGuard<T> {
    fn drop(&mut self) {
        let Some(tab) = self.tab.take() else {
            return;
        };
        match Handle::try_current() {
            Ok(handle) => {
                debug!("抓取被中途丢弃，后台关闭标签页");
                handle.spawn(async move {
                    if let Err(e) = tab.close_tab().await {
                        warn!("关闭标签页失败: {}", e);
                    }
                });
            }
            Err(_) => warn!("运行时已退出，标签页未关闭"),
        }
    }
}

/// 通过 Chromium 加载页面（执行页面脚本后再取 HTML）
pub struct BrowserFetcher {
    browser: Browser,
}

impl BrowserFetcher {
    pub fn new(browser: Browser) -> Self {
        Self { browser }
    }

    /// 按配置连接调试端口，或在端口为 0 时启动无头浏览器
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let browser = if config.browser_debug_port == 0 {
            launch_headless_browser(&config.user_agent).await?
        } else {
            connect_to_browser(config.browser_debug_port).await?
        };
        Ok(Self::new(browser))
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str) -> AppResult<FetchedPage> {
        let page = self
            .browser
            .new_page(url)
            .await
            .map_err(|e| CrowdError::fetch_failed(url, e))?;
        let guard = TabGuard::new(page.clone());

        let loaded = async {
            page.wait_for_navigation().await?;
            let html = page.content().await?;
            let final_url = page.url().await?.unwrap_or_else(|| url.to_string());
            Ok::<_, CdpError>((final_url, html))
        }
        .await;
        guard.close().await;

        let (final_url, html) = loaded.map_err(|e| CrowdError::fetch_failed(url, e))?;
        debug!("浏览器抓取完成: {} ({} 字节)", final_url, html.len());

        // 浏览器不暴露主文档状态码，能拿到内容即视为 200
        Ok(FetchedPage {
            final_url,
            status: 200,
            html,
        })
    }
}
