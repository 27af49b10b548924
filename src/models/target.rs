use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppResult, CrowdError};

/// 外部数据存储中链接的主键
pub type LinkId = i64;

/// 一次运行中要尝试提交的目标链接
///
/// 运行开始时枚举一次，之后集合冻结。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTarget {
    pub id: LinkId,
    pub url: String,
    /// 锚文本（上下文信息）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_text: Option<String>,
    /// 所属项目
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
}

impl LinkTarget {
    pub fn new(id: LinkId, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
            anchor_text: None,
            project: None,
        }
    }

    /// 校验并解析目标 URL（只接受 http / https）
    pub fn parsed_url(&self) -> AppResult<Url> {
        let trimmed = self.url.trim();
        let url = Url::parse(trimmed)
            .map_err(|e| CrowdError::validation(format!("无效的链接 {}: {}", trimmed, e)))?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(url),
            _ => Err(CrowdError::validation(format!(
                "不支持的链接协议: {}",
                trimmed
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_url_accepts_http_and_https() {
        assert!(LinkTarget::new(1, "https://example.com/a").parsed_url().is_ok());
        assert!(LinkTarget::new(2, " http://example.com ").parsed_url().is_ok());
    }

    #[test]
    fn test_parsed_url_rejects_other_schemes() {
        assert!(LinkTarget::new(1, "ftp://example.com").parsed_url().is_err());
        assert!(LinkTarget::new(2, "not a url").parsed_url().is_err());
        assert!(LinkTarget::new(3, "mailto:a@b.c").parsed_url().is_err());
    }
}
