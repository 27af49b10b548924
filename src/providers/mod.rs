//! 提交能力注册表
//!
//! 每种能力实现统一的 {标识, 显示名, publish(上下文) → 结果} 接口。
//! 注册表是显式列出的，新增能力需要在 [`registry`] 中登记。

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppResult, CrowdError};
use crate::models::identity::Identity;
use crate::models::result::ResultRecord;
use crate::workflow::link_ctx::LinkCtx;
use crate::workflow::link_flow::{LinkFlow, SubmitMode};

/// 一次发布调用的上下文
#[derive(Debug, Clone)]
pub struct PublishContext {
    pub link: LinkCtx,
    pub identity: Arc<Identity>,
}

/// 提交能力
#[async_trait]
pub trait Provider: Send + Sync {
    /// 配置中使用的标识
    fn id(&self) -> &'static str;

    fn display_name(&self) -> &'static str;

    /// 处理一条链接。错误必须转换为结果记录，不能向上抛出
    async fn publish(&self, ctx: PublishContext) -> ResultRecord;
}

/// 留言簿 / 博客评论 / 联系表单提交
pub struct CrowdFormProvider {
    flow: Arc<LinkFlow>,
}

impl CrowdFormProvider {
    pub fn new(flow: Arc<LinkFlow>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl Provider for CrowdFormProvider {
    fn id(&self) -> &'static str {
        "crowd_form"
    }

    fn display_name(&self) -> &'static str {
        "表单群发"
    }

    async fn publish(&self, ctx: PublishContext) -> ResultRecord {
        self.flow
            .run(&ctx.link, &ctx.identity, SubmitMode::Submit)
            .await
    }
}

/// 只探测表单、不提交（演练）
pub struct CrowdProbeProvider {
    flow: Arc<LinkFlow>,
}

impl CrowdProbeProvider {
    pub fn new(flow: Arc<LinkFlow>) -> Self {
        Self { flow }
    }
}

#[async_trait]
impl Provider for CrowdProbeProvider {
    fn id(&self) -> &'static str {
        "crowd_probe"
    }

    fn display_name(&self) -> &'static str {
        "表单探测（不提交）"
    }

    async fn publish(&self, ctx: PublishContext) -> ResultRecord {
        self.flow
            .run(&ctx.link, &ctx.identity, SubmitMode::Probe)
            .await
    }
}

/// 所有可用的提交能力
pub fn registry(flow: Arc<LinkFlow>) -> Vec<Arc<dyn Provider>> {
    vec![
        Arc::new(CrowdFormProvider::new(flow.clone())),
        Arc::new(CrowdProbeProvider::new(flow)),
    ]
}

/// 按标识查找能力
pub fn find_provider(providers: &[Arc<dyn Provider>], id: &str) -> AppResult<Arc<dyn Provider>> {
    providers
        .iter()
        .find(|p| p.id() == id.trim())
        .cloned()
        .ok_or_else(|| {
            let known: Vec<&str> = providers.iter().map(|p| p.id()).collect();
            CrowdError::Config(format!(
                "未知的提交能力 '{}'，可选: {}",
                id,
                known.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::HttpFetcher;
    use crate::services::SubmissionExecutor;
    use std::time::Duration;

    fn providers() -> Vec<Arc<dyn Provider>> {
        let client = reqwest::Client::new();
        let flow = LinkFlow::new(
            Arc::new(HttpFetcher::new(client.clone())),
            SubmissionExecutor::new(client, Duration::from_millis(1)),
        );
        registry(Arc::new(flow))
    }

    #[test]
    fn test_registry_lists_both_providers() {
        let ids: Vec<&str> = providers().iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["crowd_form", "crowd_probe"]);
    }

    #[test]
    fn test_find_provider() {
        let providers = providers();
        assert_eq!(find_provider(&providers, "crowd_probe").unwrap().id(), "crowd_probe");
        let err = find_provider(&providers, "blogger").err().unwrap();
        assert!(err.to_string().contains("crowd_form"));
    }
}
