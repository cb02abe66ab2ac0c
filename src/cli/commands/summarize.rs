//! Summarize Command
//!
//! Drains bills lacking a summary through the AI pipeline.

use console::style;

use crate::cli::util::AppContext;
use crate::constants::SUMMARY_ENDPOINT;
use crate::storage::SyncStatus;
use crate::summary::SummaryState;
use crate::types::{BillKey, Result};

pub async fn run(
    ctx: &AppContext,
    bill: Option<String>,
    congress: Option<u16>,
    limit: usize,
) -> Result<()> {
    let pipeline = ctx.summary_pipeline()?;
    let tracker = ctx.tracker();
    tracker.set_status(SUMMARY_ENDPOINT, SyncStatus::InProgress, 0, None)?;

    let result = match (bill, congress) {
        (Some(bill), Some(congress)) => {
            let key = BillKey::parse(congress, &bill)?;
            let outcome = pipeline.process_bill(&key).await;
            match outcome.state {
                SummaryState::Committed => {
                    println!("{} {}", style("Summarized").green().bold(), key);
                }
                _ => {
                    println!(
                        "{} {} at {}: {}",
                        style("Failed").red().bold(),
                        key,
                        outcome
                            .failed_at
                            .map(|s| s.to_string())
                            .unwrap_or_default(),
                        outcome.error.unwrap_or_default(),
                    );
                }
            }
            Ok(())
        }
        _ => match pipeline.process_pending(limit).await {
            Ok(stats) => {
                println!(
                    "{}: {} processed, {} committed, {} failed",
                    style("Summarization complete").green().bold(),
                    stats.processed,
                    stats.committed,
                    stats.failed,
                );
                Ok(())
            }
            Err(e) => Err(e),
        },
    };

    match &result {
        Ok(()) => tracker.set_status(SUMMARY_ENDPOINT, SyncStatus::Success, 0, None)?,
        Err(e) => tracker.set_status(SUMMARY_ENDPOINT, SyncStatus::Failed, 0, Some(&e.to_string()))?,
    }
    result
}
