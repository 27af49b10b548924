use thiserror::Error;

/// 应用程序错误类型
///
/// 单条链接的错误（抓取、提交、校验）在链接处理器边界被转换为结果记录，
/// 只有运行级别的错误才会返回给 `start()` 的调用方。
#[derive(Debug, Error)]
pub enum CrowdError {
    /// 页面中没有可提交的表单（预期内的分类结果，不是故障）
    #[error("未找到可提交的表单")]
    NoSuitableForm,

    /// 抓取目标页面失败（网络错误 / 超时 / 非 2xx）
    #[error("抓取页面失败 ({url}): {reason}")]
    Fetch { url: String, reason: String },

    /// 提交表单失败（网络错误 / 超时 / 被拒绝）
    #[error("表单提交失败 ({action}): {reason}")]
    Submission { action: String, reason: String },

    /// 目标 URL 不合法，或身份信息缺少必要字段
    #[error("校验失败: {0}")]
    Validation(String),

    /// 运行状态冲突（例如从终态再次迁移）
    #[error("运行状态冲突: {0}")]
    Orchestration(String),

    /// 持久化失败
    #[error("存储错误: {0}")]
    Store(String),

    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 文件操作错误
    #[error("文件错误 ({path}): {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// TOML 解析失败
    #[error("TOML解析失败: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON 序列化失败
    #[error("JSON序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

// ========== 便捷构造函数 ==========

impl CrowdError {
    /// 创建页面抓取错误
    pub fn fetch_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        CrowdError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// 创建表单提交错误
    pub fn submission_failed(action: impl Into<String>, reason: impl ToString) -> Self {
        CrowdError::Submission {
            action: action.into(),
            reason: reason.to_string(),
        }
    }

    /// 创建校验错误
    pub fn validation(msg: impl Into<String>) -> Self {
        CrowdError::Validation(msg.into())
    }

    /// 创建存储错误
    pub fn store_failed(msg: impl Into<String>) -> Self {
        CrowdError::Store(msg.into())
    }

    /// 创建文件读写错误
    pub fn file_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        CrowdError::File {
            path: path.into(),
            source,
        }
    }
}

impl From<chromiumoxide::error::CdpError> for CrowdError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        CrowdError::Browser(err.to_string())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, CrowdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_contains_context() {
        let err = CrowdError::submission_failed("https://a.test/post", "http 403");
        let text = err.to_string();
        assert!(text.contains("https://a.test/post"));
        assert!(text.contains("http 403"));
    }
}
