//! Extraction statistics.
//!
//! Counters are per setting and updated atomically, so the same setting can be
//! evaluated against many documents at once without losing increments. The
//! store is injected into the engine; batch runs can share one or use their own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use settings_core::{ExtractionResult, ExtractionStatistics, StrategyKind};

/// Error types for statistics stores.
#[derive(Debug, thiserror::Error)]
pub enum StatsError {
    /// Write could not be applied
    #[error("Statistics write failed: {0}")]
    WriteFailed(String),

    /// Backing store is not reachable
    #[error("Statistics store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of one cascade evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success {
        strategy: StrategyKind,
        confidence: f32,
        trace: String,
    },
    Failure {
        document_kind: String,
    },
}

impl ExtractionOutcome {
    pub fn from_result(result: &ExtractionResult, document_kind: &str) -> Self {
        if result.is_found() {
            Self::Success {
                strategy: result.strategy,
                confidence: result.confidence,
                trace: result.trace.clone(),
            }
        } else {
            Self::Failure {
                document_kind: document_kind.to_string(),
            }
        }
    }
}

/// Store for per-setting extraction statistics.
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Record one outcome.
    async fn record(&self, setting_id: &str, outcome: &ExtractionOutcome) -> Result<(), StatsError>;

    /// Statistics for one setting.
    async fn get(&self, setting_id: &str) -> Option<ExtractionStatistics>;

    /// Statistics for every setting seen, ordered by setting id.
    async fn snapshot(&self) -> Vec<ExtractionStatistics>;
}

#[derive(Debug, Default)]
struct Detail {
    last_strategy: Option<StrategyKind>,
    last_success_at: Option<DateTime<Utc>>,
    last_failure_at: Option<DateTime<Utc>>,
    recent: VecDeque<Value>,
    failures_by_kind: BTreeMap<String, u64>,
}

#[derive(Debug, Default)]
struct SettingCounters {
    successes: AtomicU64,
    failures: AtomicU64,
    detail: Mutex<Detail>,
}

/// In-memory statistics store.
pub struct InMemoryStatisticsStore {
    settings: DashMap<String, Arc<SettingCounters>>,
    recent_limit: usize,
}

impl InMemoryStatisticsStore {
    /// Create a store keeping the last 10 outcomes per setting.
    pub fn new() -> Self {
        Self::with_recent_limit(10)
    }

    pub fn with_recent_limit(recent_limit: usize) -> Self {
        Self {
            settings: DashMap::new(),
            recent_limit,
        }
    }

    fn counters(&self, setting_id: &str) -> Arc<SettingCounters> {
        self.settings
            .entry(setting_id.to_string())
            .or_default()
            .clone()
    }

    fn to_statistics(setting_id: &str, counters: &SettingCounters) -> ExtractionStatistics {
        let mut statistics = ExtractionStatistics {
            setting_id: setting_id.to_string(),
            successful_attempts: counters.successes.load(Ordering::SeqCst),
            failed_attempts: counters.failures.load(Ordering::SeqCst),
            ..Default::default()
        };
        if let Ok(detail) = counters.detail.lock() {
            statistics.last_strategy = detail.last_strategy;
            statistics.last_success_at = detail.last_success_at;
            statistics.last_failure_at = detail.last_failure_at;
            statistics.hints = json!({
                "recent": detail.recent,
                "failures_by_kind": detail.failures_by_kind,
            });
        }
        statistics
    }
}

impl Default for InMemoryStatisticsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatisticsStore for InMemoryStatisticsStore {
    async fn record(&self, setting_id: &str, outcome: &ExtractionOutcome) -> Result<(), StatsError> {
        let counters = self.counters(setting_id);
        let now = Utc::now();

        match outcome {
            ExtractionOutcome::Success { .. } => counters.successes.fetch_add(1, Ordering::SeqCst),
            ExtractionOutcome::Failure { .. } => counters.failures.fetch_add(1, Ordering::SeqCst),
        };

        let mut detail = counters
            .detail
            .lock()
            .map_err(|e| StatsError::WriteFailed(e.to_string()))?;

        let recent = match outcome {
            ExtractionOutcome::Success { strategy, confidence, trace } => {
                detail.last_strategy = Some(*strategy);
                detail.last_success_at = Some(now);
                json!({ "at": now, "strategy": strategy, "confidence": confidence, "trace": trace })
            }
            ExtractionOutcome::Failure { document_kind } => {
                detail.last_failure_at = Some(now);
                let count = detail.failures_by_kind.entry(document_kind.clone()).or_insert(0);
                *count += 1;
                let running = *count;
                json!({ "at": now, "failed": true, "document_kind": document_kind, "failures_for_kind": running })
            }
        };

        detail.recent.push_back(recent);
        while detail.recent.len() > self.recent_limit {
            detail.recent.pop_front();
        }
        Ok(())
    }

    async fn get(&self, setting_id: &str) -> Option<ExtractionStatistics> {
        let counters = self.settings.get(setting_id)?.clone();
        Some(Self::to_statistics(setting_id, &counters))
    }

    async fn snapshot(&self) -> Vec<ExtractionStatistics> {
        let all: Vec<(String, Arc<SettingCounters>)> = self
            .settings
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut snapshot: Vec<ExtractionStatistics> = all
            .iter()
            .map(|(id, counters)| Self::to_statistics(id, counters))
            .collect();
        snapshot.sort_by(|a, b| a.setting_id.cmp(&b.setting_id));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success() -> ExtractionOutcome {
        ExtractionOutcome::Success {
            strategy: StrategyKind::SettingsCatalog,
            confidence: 0.8,
            trace: "t".to_string(),
        }
    }

    #[tokio::test]
    async fn test_counts_and_detail() {
        let store = InMemoryStatisticsStore::new();
        store.record("s1", &success()).await.unwrap();
        store
            .record("s1", &ExtractionOutcome::Failure { document_kind: "compliancePolicy".to_string() })
            .await
            .unwrap();
        store
            .record("s1", &ExtractionOutcome::Failure { document_kind: "compliancePolicy".to_string() })
            .await
            .unwrap();

        let stats = store.get("s1").await.unwrap();
        assert_eq!(stats.successful_attempts, 1);
        assert_eq!(stats.failed_attempts, 2);
        assert_eq!(stats.last_strategy, Some(StrategyKind::SettingsCatalog));
        assert!(stats.last_failure_at.is_some());
        assert_eq!(stats.hints["failures_by_kind"]["compliancePolicy"], 2);
        assert_eq!(stats.hints["recent"][2]["failures_for_kind"], 2);
        assert!(store.get("unknown").await.is_none());
    }

    #[tokio::test]
    async fn test_recent_outcomes_are_bounded() {
        let store = InMemoryStatisticsStore::with_recent_limit(3);
        for _ in 0..5 {
            store.record("s1", &success()).await.unwrap();
        }
        let stats = store.get("s1").await.unwrap();
        assert_eq!(stats.hints["recent"].as_array().unwrap().len(), 3);
        assert_eq!(stats.successful_attempts, 5);
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryStatisticsStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let outcome = if i % 5 == 0 {
                    ExtractionOutcome::Failure { document_kind: "k".to_string() }
                } else {
                    success()
                };
                store.record("shared", &outcome).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = store.get("shared").await.unwrap();
        assert_eq!(stats.successful_attempts, 40);
        assert_eq!(stats.failed_attempts, 10);
    }

    #[test]
    fn test_snapshot_is_ordered() {
        let store = InMemoryStatisticsStore::new();
        tokio_test::assert_ok!(tokio_test::block_on(store.record("b", &success())));
        tokio_test::assert_ok!(tokio_test::block_on(store.record("a", &success())));
        let ids: Vec<String> = tokio_test::block_on(store.snapshot())
            .into_iter()
            .map(|s| s.setting_id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
