use std::time::Duration;

/// 页面抓取方式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// 直接 HTTP 请求
    Http,
    /// 通过 Chromium 加载页面
    Browser,
}

impl FetchMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "http" => Some(FetchMode::Http),
            "browser" | "chrome" | "chromium" => Some(FetchMode::Browser),
            _ => None,
        }
    }
}

/// 程序配置
///
/// 工作池大小等参数在进程级别固定，不随单次运行变化。
#[derive(Clone, Debug)]
pub struct Config {
    /// 同时处理的链接数量（工作池大小）
    pub max_concurrent_links: usize,
    /// 单条链接的处理时间上限
    pub link_timeout_ms: u64,
    /// 单次 HTTP 请求超时
    pub request_timeout_ms: u64,
    /// 提交失败后重试前的等待时间（最多重试一次）
    pub submit_retry_backoff_ms: u64,
    /// 超过该时长无进展即标记为停滞
    pub stall_after_ms: u64,
    /// 超过该时长无进展直接判定运行失败
    pub stall_fail_after_ms: u64,
    /// 强制取消时等待调度器收尾的时间
    pub force_cancel_grace_ms: u64,
    /// 轮询状态的间隔
    pub poll_interval_ms: u64,
    /// 轮询出错时退避的上限
    pub poll_max_backoff_ms: u64,
    /// 请求使用的 User-Agent
    pub user_agent: String,
    /// 任务文件（身份信息 + 目标链接）
    pub job_file: String,
    /// 结果日志文件（JSONL，空字符串表示不写文件）
    pub results_file: String,
    /// 使用的提交能力（crowd_form / crowd_probe）
    pub provider: String,
    /// 页面抓取方式
    pub fetch_mode: FetchMode,
    /// 浏览器调试端口（0 表示启动无头浏览器）
    pub browser_debug_port: u16,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行结束后最多列出的结果条数
    pub max_results_listed: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_concurrent_links: 4,
            link_timeout_ms: 60_000,
            request_timeout_ms: 20_000,
            submit_retry_backoff_ms: 1_500,
            stall_after_ms: 90_000,
            stall_fail_after_ms: 900_000,
            force_cancel_grace_ms: 2_000,
            poll_interval_ms: 2_000,
            poll_max_backoff_ms: 30_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36".to_string(),
            job_file: "crowd_job.toml".to_string(),
            results_file: "results.jsonl".to_string(),
            provider: "crowd_form".to_string(),
            fetch_mode: FetchMode::Http,
            browser_debug_port: 0,
            verbose_logging: false,
            max_results_listed: 20,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            max_concurrent_links: std::env::var("MAX_CONCURRENT_LINKS").ok().and_then(|v| v.parse().ok()).filter(|v| *v > 0).unwrap_or(default.max_concurrent_links),
            link_timeout_ms: std::env::var("LINK_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.link_timeout_ms),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.request_timeout_ms),
            submit_retry_backoff_ms: std::env::var("SUBMIT_RETRY_BACKOFF_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.submit_retry_backoff_ms),
            stall_after_ms: std::env::var("STALL_AFTER_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.stall_after_ms),
            stall_fail_after_ms: std::env::var("STALL_FAIL_AFTER_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.stall_fail_after_ms),
            force_cancel_grace_ms: std::env::var("FORCE_CANCEL_GRACE_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.force_cancel_grace_ms),
            poll_interval_ms: std::env::var("POLL_INTERVAL_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_ms),
            poll_max_backoff_ms: std::env::var("POLL_MAX_BACKOFF_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_max_backoff_ms),
            user_agent: std::env::var("USER_AGENT").unwrap_or(default.user_agent),
            job_file: std::env::var("JOB_FILE").unwrap_or(default.job_file),
            results_file: std::env::var("RESULTS_FILE").unwrap_or(default.results_file),
            provider: std::env::var("PROVIDER").unwrap_or(default.provider),
            fetch_mode: std::env::var("FETCH_MODE").ok().and_then(|v| FetchMode::parse(&v)).unwrap_or(default.fetch_mode),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(default.browser_debug_port),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
            max_results_listed: std::env::var("MAX_RESULTS_LISTED").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_results_listed),
        }
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.link_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn submit_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.submit_retry_backoff_ms)
    }

    pub fn force_cancel_grace(&self) -> Duration {
        Duration::from_millis(self.force_cancel_grace_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_max_backoff(&self) -> Duration {
        Duration::from_millis(self.poll_max_backoff_ms)
    }
}
