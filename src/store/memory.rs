//! 内存存储
//!
//! 同时实现 [`RunStore`]、[`ResultStore`] 和 [`TargetSource`]。
//! 每张"表"各用一把锁，单次操作在锁内完成，保证原子性。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{AppResult, CrowdError};
use crate::models::result::ResultRecord;
use crate::models::run::{Run, RunId, RunScope};
use crate::models::target::{LinkId, LinkTarget};
use crate::store::{ResultStore, RunClaim, RunStore, RunUpdate, TargetSource};

#[derive(Default)]
struct RunTable {
    next_id: RunId,
    runs: HashMap<RunId, Run>,
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    runs: Mutex<RunTable>,
    results: Mutex<Vec<ResultRecord>>,
    targets: Mutex<HashMap<String, Vec<LinkTarget>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记所有者名下的链接（追加，编号重复时以先登记的为准）
    pub async fn add_targets(&self, owner: &str, targets: Vec<LinkTarget>) {
        let mut table = self.targets.lock().await;
        let owned = table.entry(owner.to_string()).or_default();
        for target in targets {
            if owned.iter().any(|t| t.id == target.id) {
                debug!("链接编号 {} 重复，忽略", target.id);
                continue;
            }
            owned.push(target);
        }
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn claim_run(&self, owner: &str, scope: RunScope) -> AppResult<RunClaim> {
        let mut table = self.runs.lock().await;
        if let Some(active) = table
            .runs
            .values()
            .filter(|r| r.owner == owner && r.in_progress())
            .min_by_key(|r| r.id)
        {
            return Ok(RunClaim::Existing(active.clone()));
        }

        table.next_id += 1;
        let run = Run::new(table.next_id, owner, scope, Utc::now());
        table.runs.insert(run.id, run.clone());
        Ok(RunClaim::Created(run))
    }

    async fn get_run(&self, run_id: RunId) -> AppResult<Option<Run>> {
        Ok(self.runs.lock().await.runs.get(&run_id).cloned())
    }

    async fn update_run(&self, run_id: RunId, update: RunUpdate) -> AppResult<Run> {
        let mut table = self.runs.lock().await;
        let run = table
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| CrowdError::store_failed(format!("运行 {} 不存在", run_id)))?;

        let mut draft = run.clone();
        update(&mut draft)?;
        *run = draft.clone();
        Ok(draft)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn append(&self, record: ResultRecord) -> AppResult<()> {
        self.results.lock().await.push(record);
        Ok(())
    }

    async fn list(&self, run_id: RunId, limit: usize) -> AppResult<(Vec<ResultRecord>, usize)> {
        let results = self.results.lock().await;
        let matching: Vec<&ResultRecord> = results.iter().filter(|r| r.run_id == run_id).collect();
        let total = matching.len();
        let items = matching.into_iter().rev().take(limit).cloned().collect();
        Ok((items, total))
    }
}

#[async_trait]
impl TargetSource for MemoryStore {
    async fn targets_for(
        &self,
        owner: &str,
        scope: RunScope,
        selection: &[LinkId],
    ) -> AppResult<Vec<LinkTarget>> {
        let table = self.targets.lock().await;
        let owned = table.get(owner).cloned().unwrap_or_default();
        Ok(match scope {
            RunScope::All => owned,
            RunScope::Selection => owned
                .into_iter()
                .filter(|t| selection.contains(&t.id))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::result::ResultStatus;
    use crate::models::run::RunStatus;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_claim_is_unique_per_owner() {
        let store = MemoryStore::new();
        let first = store.claim_run("alice", RunScope::All).await.unwrap();
        let RunClaim::Created(run) = first else {
            panic!("expected a new run");
        };

        let second = store.claim_run("alice", RunScope::Selection).await.unwrap();
        assert_eq!(second, RunClaim::Existing(run.clone()));

        let other = store.claim_run("bob", RunScope::All).await.unwrap();
        assert!(matches!(other, RunClaim::Created(r) if r.id != run.id));
    }

    #[tokio::test]
    async fn test_finished_run_frees_the_owner() {
        let store = MemoryStore::new();
        let RunClaim::Created(run) = store.claim_run("alice", RunScope::All).await.unwrap() else {
            panic!("expected a new run");
        };
        assert_ok!(
            store
                .update_run(
                    run.id,
                    Box::new(|r: &mut Run| r.finish(RunStatus::Failed, Utc::now(), None))
                )
                .await
        );
        let next = store.claim_run("alice", RunScope::All).await.unwrap();
        assert!(matches!(next, RunClaim::Created(r) if r.id == run.id + 1));
    }

    #[tokio::test]
    async fn test_failed_update_is_discarded() {
        let store = MemoryStore::new();
        let RunClaim::Created(run) = store.claim_run("alice", RunScope::All).await.unwrap() else {
            panic!("expected a new run");
        };
        assert_err!(
            store
                .update_run(
                    run.id,
                    Box::new(|r: &mut Run| {
                        r.append_note("half-way");
                        r.finish(RunStatus::Running, Utc::now(), None)
                    })
                )
                .await
        );
        let stored = store.get_run(run.id).await.unwrap().unwrap();
        assert_eq!(stored.notes, None);
        assert_err!(store.update_run(999, Box::new(|_: &mut Run| Ok(()))).await);
    }

    #[tokio::test]
    async fn test_list_returns_newest_first_with_total() {
        let store = MemoryStore::new();
        for link_id in 1..=5 {
            store
                .append(ResultRecord::bare(1, link_id, "https://a.example/", ResultStatus::Success, None))
                .await
                .unwrap();
        }
        store
            .append(ResultRecord::bare(2, 9, "https://b.example/", ResultStatus::Failed, None))
            .await
            .unwrap();

        let (items, total) = store.list(1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(items.iter().map(|r| r.link_id).collect::<Vec<_>>(), vec![5, 4]);
    }

    #[tokio::test]
    async fn test_targets_for_scope() {
        let store = MemoryStore::new();
        store
            .add_targets(
                "alice",
                vec![
                    LinkTarget::new(1, "https://a.example/"),
                    LinkTarget::new(2, "https://b.example/"),
                    LinkTarget::new(2, "https://dup.example/"),
                    LinkTarget::new(3, "https://c.example/"),
                ],
            )
            .await;

        let all = store.targets_for("alice", RunScope::All, &[]).await.unwrap();
        assert_eq!(all.len(), 3);

        let picked = store
            .targets_for("alice", RunScope::Selection, &[3, 1, 42])
            .await
            .unwrap();
        assert_eq!(picked.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3]);

        assert!(store.targets_for("bob", RunScope::All, &[]).await.unwrap().is_empty());
    }
}
