//! Bounded-concurrency batch evaluation.
//!
//! Pairs are independent, so they run through `buffer_unordered`; results are
//! sorted by (document id, setting id) afterwards so reports are stable.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use settings_core::{PolicyDocument, SettingDefinition};

use crate::engine::ExtractionEngine;
use crate::types::Evaluation;

/// Cooperative cancellation, checked between pairs.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Summary of one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Completed evaluations ordered by (document id, setting id)
    pub evaluations: Vec<Evaluation>,
    pub evaluated: usize,
    pub compliant: usize,
    /// Genuine non-compliance; configuration errors are counted in `errors` only
    pub non_compliant: usize,
    /// Evaluations whose expectation itself could not be applied
    pub errors: usize,
    /// Pairs skipped because the setting does not apply to the document
    pub skipped: usize,
    pub cancelled: bool,
}

impl BatchReport {
    fn assemble(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        mut evaluations: Vec<Evaluation>,
        skipped: usize,
        cancelled: bool,
    ) -> Self {
        evaluations.sort_by(|a, b| {
            a.document_id()
                .cmp(b.document_id())
                .then_with(|| a.setting_id().cmp(b.setting_id()))
        });
        let compliant = evaluations.iter().filter(|e| e.is_compliant()).count();
        let errors = evaluations
            .iter()
            .filter(|e| e.verdict.is_configuration_error())
            .count();
        let non_compliant = evaluations
            .iter()
            .filter(|e| !e.is_compliant() && !e.verdict.is_configuration_error())
            .count();

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            evaluated: evaluations.len(),
            compliant,
            non_compliant,
            errors,
            skipped,
            cancelled,
            evaluations,
        }
    }
}

/// Runs the engine over many (document, setting) pairs.
pub struct BatchEvaluator {
    engine: Arc<ExtractionEngine>,
    max_concurrency: usize,
}

impl BatchEvaluator {
    pub fn new(engine: Arc<ExtractionEngine>, max_concurrency: usize) -> Self {
        Self {
            engine,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Evaluate every applicable setting against one document.
    pub async fn evaluate_document(
        &self,
        document: &PolicyDocument,
        settings: &[SettingDefinition],
        cancel: &CancellationFlag,
    ) -> BatchReport {
        self.evaluate_all(std::slice::from_ref(document), settings, cancel)
            .await
    }

    /// Evaluate the cross product of documents and settings.
    pub async fn evaluate_all(
        &self,
        documents: &[PolicyDocument],
        settings: &[SettingDefinition],
        cancel: &CancellationFlag,
    ) -> BatchReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let mut pairs = Vec::new();
        let mut skipped = 0;
        for document in documents {
            for setting in settings {
                if setting.applies_to(document) {
                    pairs.push((document, setting));
                } else {
                    skipped += 1;
                }
            }
        }

        info!(
            run_id = %run_id,
            documents = documents.len(),
            settings = settings.len(),
            pairs = pairs.len(),
            skipped,
            max_concurrency = self.max_concurrency,
            "Starting batch evaluation"
        );

        let engine = &self.engine;
        let evaluations: Vec<Evaluation> = stream::iter(pairs)
            .map(|(document, setting)| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(engine.evaluate(document, setting).await)
            })
            .buffer_unordered(self.max_concurrency)
            .filter_map(|evaluation| async move { evaluation })
            .collect()
            .await;

        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!(run_id = %run_id, completed = evaluations.len(), "Batch evaluation cancelled");
        }

        let report = BatchReport::assemble(run_id, started_at, evaluations, skipped, cancelled);
        info!(
            run_id = %run_id,
            evaluated = report.evaluated,
            compliant = report.compliant,
            non_compliant = report.non_compliant,
            errors = report.errors,
            "Batch evaluation finished"
        );
        report
    }
}
