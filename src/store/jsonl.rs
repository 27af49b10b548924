//! JSONL 结果日志
//!
//! 装饰另一个 [`ResultStore`]：每条追加的记录先以一行 JSON 写入文件，再交给内层存储。
//! 文件只追加，不改写。

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppResult, CrowdError};
use crate::models::result::ResultRecord;
use crate::models::run::RunId;
use crate::store::ResultStore;

/// 结果日志写入器
///
/// 职责：
/// - 将每条结果追加写入 JSONL 文件
/// - 查询委托给内层存储
pub struct JsonlResultStore {
    inner: Arc<dyn ResultStore>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlResultStore {
    pub fn new(inner: Arc<dyn ResultStore>, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn write_line(&self, record: &ResultRecord) -> AppResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let path = self.path.display().to_string();
        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CrowdError::file_failed(&path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| CrowdError::file_failed(&path, e))?;
        file.flush()
            .await
            .map_err(|e| CrowdError::file_failed(&path, e))?;

        debug!(
            "写入结果: 运行 {} | 链接 {} | {}",
            record.run_id, record.link_id, record.status
        );
        Ok(())
    }
}

#[async_trait]
impl ResultStore for JsonlResultStore {
    async fn append(&self, record: ResultRecord) -> AppResult<()> {
        self.write_line(&record)
            .await
            .map_err(|e| CrowdError::store_failed(e.to_string()))?;
        self.inner.append(record).await
    }

    async fn list(&self, run_id: RunId, limit: usize) -> AppResult<(Vec<ResultRecord>, usize)> {
        self.inner.list(run_id, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::result::ResultStatus;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_records_are_appended_as_json_lines() {
        let path = std::env::temp_dir().join(format!("crowd_check_{}.jsonl", std::process::id()));
        let _ = tokio::fs::remove_file(&path).await;

        let store = JsonlResultStore::new(Arc::new(MemoryStore::new()), &path);
        for link_id in [3, 4] {
            store
                .append(ResultRecord::bare(
                    7,
                    link_id,
                    "https://example.com/",
                    ResultStatus::Skipped,
                    Some("没有表单".into()),
                ))
                .await
                .unwrap();
        }

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: ResultRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.link_id, 3);
        assert_eq!(first.status, ResultStatus::Skipped);

        let (_, total) = store.list(7, 10).await.unwrap();
        assert_eq!(total, 2);

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_unwritable_path_is_store_error() {
        let inner = Arc::new(MemoryStore::new());
        let store = JsonlResultStore::new(inner.clone(), "/nonexistent-dir/crowd/results.jsonl");
        let err = store
            .append(ResultRecord::bare(1, 1, "https://x.example/", ResultStatus::Success, None))
            .await
            .unwrap_err();
        assert!(matches!(err, CrowdError::Store(_)));
        assert_eq!(inner.list(1, 10).await.unwrap().1, 0);
    }
}
