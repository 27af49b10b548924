//! 页面抓取 - 基础设施层
//!
//! 只暴露"给一个 URL，拿回 HTML"的能力，不认识表单和运行。

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppResult, CrowdError};

/// 抓取到的页面
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// 跟随重定向后的最终地址（用作解析相对 action 的基准）
    pub final_url: String,
    pub status: u16,
    pub html: String,
}

/// 页面抓取能力
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> AppResult<FetchedPage>;
}

/// 创建抓取和提交共用的 HTTP 客户端（共享 cookie）
pub fn build_http_client(config: &Config) -> AppResult<Client> {
    Client::builder()
        .timeout(config.request_timeout())
        .user_agent(config.user_agent.as_str())
        .cookie_store(true)
        .build()
        .map_err(|e| CrowdError::Config(format!("HTTP 客户端创建失败: {}", e)))
}

/// 直接通过 HTTP 抓取页面
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> AppResult<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CrowdError::fetch_failed(url, e))?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(CrowdError::fetch_failed(
                url,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        // 响应头声明的字符集优先，缺省按 UTF-8 解码
        let html = response
            .text_with_charset("utf-8")
            .await
            .map_err(|e| CrowdError::fetch_failed(url, e))?;
        debug!("抓取完成: {} ({} 字节)", final_url, html.len());

        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            html,
        })
    }
}
