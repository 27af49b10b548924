use crate::error::{AppResult, CrowdError};
use crate::models::control::StartRequest;
use crate::models::identity::Identity;
use crate::models::run::RunScope;
use crate::models::target::{LinkId, LinkTarget};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 任务文件内容
///
/// ```toml
/// owner = "team-a"
/// scope = "all"
/// selection = []
///
/// [identity]
/// name = "Anna"
/// email = "anna@example.org"
/// message = "Nice article! {token}"
///
/// [[targets]]
/// id = 1
/// url = "https://example.com/guestbook"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct CrowdJob {
    #[serde(default = "default_owner")]
    pub owner: String,
    #[serde(default = "default_scope")]
    pub scope: RunScope,
    #[serde(default)]
    pub selection: Vec<LinkId>,
    pub identity: Identity,
    #[serde(default)]
    pub targets: Vec<LinkTarget>,
}

fn default_owner() -> String {
    "default".to_string()
}

fn default_scope() -> RunScope {
    RunScope::All
}

impl CrowdJob {
    /// 转换为启动请求
    pub fn start_request(&self) -> StartRequest {
        StartRequest {
            owner: self.owner.clone(),
            scope: self.scope,
            selection_ids: self.selection.clone(),
            identity: self.identity.clone(),
        }
    }
}

/// 从 TOML 字符串解析任务
pub fn parse_job(content: &str) -> AppResult<CrowdJob> {
    let job: CrowdJob = toml::from_str(content)?;
    Ok(job)
}

/// 从 TOML 文件加载任务
pub async fn load_job_file(toml_file_path: &Path) -> AppResult<CrowdJob> {
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| CrowdError::file_failed(toml_file_path.display().to_string(), e))?;

    let job = parse_job(&content)?;

    tracing::info!(
        "成功加载任务 {}: {} 个目标链接",
        toml_file_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy(),
        job.targets.len()
    );

    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JOB: &str = r#"
owner = "team-a"
scope = "selection"
selection = [2]

[identity]
name = "Anna"
email = "anna@example.org"
website = "https://anna.example.org"
message = "Nice article! {token}"
token = "T1"
fallbackName = "Guest"

[[targets]]
id = 1
url = "https://example.com/guestbook"

[[targets]]
id = 2
url = "https://example.org/blog/post"
anchor_text = "anna's site"
"#;

    #[test]
    fn test_parse_job() {
        let job = parse_job(JOB).unwrap();
        assert_eq!(job.owner, "team-a");
        assert_eq!(job.scope, RunScope::Selection);
        assert_eq!(job.selection, vec![2]);
        assert_eq!(job.identity.fallback_name, "Guest");
        assert_eq!(job.targets.len(), 2);
        assert_eq!(job.targets[1].anchor_text.as_deref(), Some("anna's site"));
    }

    #[test]
    fn test_parse_job_defaults() {
        let job = parse_job("[identity]\nname = \"A\"\n").unwrap();
        assert_eq!(job.owner, "default");
        assert_eq!(job.scope, RunScope::All);
        assert!(job.targets.is_empty());
        let request = job.start_request();
        assert_eq!(request.identity.name, "A");
    }

    #[test]
    fn test_parse_job_rejects_unknown_scope() {
        let err = parse_job("scope = \"everything\"\n[identity]\n").unwrap_err();
        assert!(matches!(err, CrowdError::Toml(_)));
        assert!(err.to_string().starts_with("TOML解析失败"));
    }

    #[tokio::test]
    async fn test_load_job_file_missing() {
        let result = load_job_file(Path::new("/definitely/not/here.toml")).await;
        match result {
            Err(CrowdError::File { path, .. }) => assert!(path.contains("here.toml")),
            other => panic!("unexpected: {:?}", other.map(|job| job.owner)),
        }
    }
}
