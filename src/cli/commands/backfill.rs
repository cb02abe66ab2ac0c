//! Backfill Command
//!
//! Re-drives enrichment over the validation worklist.

use console::style;

use crate::cli::util::AppContext;
use crate::pipeline::BackfillOptions;
use crate::pipeline::validation::MissingCategory;
use crate::types::{Result, SyncError};

pub async fn run(
    ctx: &AppContext,
    category: &str,
    batch_size: Option<usize>,
    workers: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let category = MissingCategory::parse(category).ok_or_else(|| {
        SyncError::Config(format!(
            "unknown category '{category}' (expected one of: {})",
            MissingCategory::ALL
                .iter()
                .map(|c| c.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let options = BackfillOptions {
        category,
        batch_size: batch_size.unwrap_or(ctx.config.backfill.batch_size),
        workers: workers.unwrap_or(ctx.config.backfill.workers),
        dry_run,
    };

    let outcome = ctx.backfill_stage().run(&options).await?;
    if outcome.dry_run {
        println!(
            "{}: {} entities missing {} ({} modern, {} historical); batch would process {}",
            style("Dry run").yellow().bold(),
            outcome.modern + outcome.historical,
            category,
            outcome.modern,
            outcome.historical,
            outcome.worklist_size,
        );
    } else {
        println!(
            "{}: {} processed, {} failed",
            style("Backfill complete").green().bold(),
            outcome.stats.processed,
            outcome.stats.failed,
        );
    }
    Ok(())
}
