//! Backfill stage.
//!
//! Re-drives the detail/enrichment stage over the validation stage's
//! worklist. Entities are partitioned across a bounded worker pool; no
//! two workers ever hold the same natural key, so the only shared
//! resource is the database behind its own transaction isolation.
//! Concurrency is tunable down to 1 to degrade to strictly sequential
//! behavior under rate-limit pressure.

use std::sync::Arc;

use futures::{StreamExt, stream};
use tracing::info;

use super::bill_detail::{BillDetailStage, DetailStats};
use super::validation::{MissingCategory, ValidationStage};
use crate::constants::MAX_BACKFILL_WORKERS;
use crate::types::Result;

#[derive(Debug, Clone)]
pub struct BackfillOptions {
    pub category: MissingCategory,
    pub batch_size: usize,
    /// Worker pool size, clamped to [1, MAX_BACKFILL_WORKERS].
    pub workers: usize,
    /// Report the worklist without fetching or writing anything.
    pub dry_run: bool,
}

/// Result of a backfill run.
#[derive(Debug, Clone, Default)]
pub struct BackfillOutcome {
    pub worklist_size: usize,
    pub modern: usize,
    pub historical: usize,
    pub stats: DetailStats,
    pub dry_run: bool,
}

pub struct BackfillStage {
    validation: ValidationStage,
    detail: Arc<BillDetailStage>,
}

impl BackfillStage {
    pub fn new(validation: ValidationStage, detail: Arc<BillDetailStage>) -> Self {
        Self { validation, detail }
    }

    pub async fn run(&self, options: &BackfillOptions) -> Result<BackfillOutcome> {
        let findings = self.validation.scan(options.category, None)?;
        let mut outcome = BackfillOutcome {
            worklist_size: findings.total().min(options.batch_size),
            modern: findings.modern.len(),
            historical: findings.historical.len(),
            dry_run: options.dry_run,
            ..BackfillOutcome::default()
        };

        if options.dry_run {
            info!(
                category = %options.category,
                modern = outcome.modern,
                historical = outcome.historical,
                batch = outcome.worklist_size,
                "Dry run, no fetches performed"
            );
            return Ok(outcome);
        }

        let mut worklist = findings.modern;
        worklist.extend(findings.historical);
        worklist.truncate(options.batch_size);

        let workers = options.workers.clamp(1, MAX_BACKFILL_WORKERS);
        info!(
            category = %options.category,
            count = worklist.len(),
            workers,
            "Backfill starting"
        );

        let detail = Arc::clone(&self.detail);
        let reports: Vec<_> = stream::iter(worklist)
            .map(|key| {
                let detail = Arc::clone(&detail);
                async move { detail.process_bill(&key).await }
            })
            .buffer_unordered(workers)
            .collect()
            .await;

        for report in &reports {
            if report.success {
                outcome.stats.processed += 1;
            } else {
                outcome.stats.failed += 1;
            }
        }
        info!(
            processed = outcome.stats.processed,
            failed = outcome.stats.failed,
            "Backfill complete"
        );
        Ok(outcome)
    }
}
