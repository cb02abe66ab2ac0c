//! Enrich Commands
//!
//! Detail/enrichment passes over bills and members.

use console::style;

use crate::cli::util::AppContext;
use crate::types::{BillKey, Result};

pub struct EnrichBillsArgs {
    /// Specific bill (combined form, e.g. HR1234) with its congress.
    pub bill: Option<String>,
    pub congress: Option<u16>,
    pub limit: usize,
    /// Target bills with missing data instead of recently updated ones.
    pub all: bool,
}

pub async fn run_bills(ctx: &AppContext, args: EnrichBillsArgs) -> Result<()> {
    let stage = ctx.bill_detail_stage();

    let worklist = match (&args.bill, args.congress) {
        (Some(bill), Some(congress)) => vec![BillKey::parse(congress, bill)?],
        _ => {
            if args.all {
                stage.missing_worklist(args.limit)?
            } else {
                stage.recent_worklist(args.limit)?
            }
        }
    };
    println!("Enriching {} bills", worklist.len());

    let stats = stage.process_batch(&worklist).await?;
    println!(
        "{}: {} processed, {} failed",
        style("Enrichment complete").green().bold(),
        stats.processed,
        stats.failed,
    );
    Ok(())
}

pub async fn run_members(ctx: &AppContext, member: Option<String>, limit: usize) -> Result<()> {
    let stage = ctx.member_enrich_stage();
    let worklist = match member {
        Some(id) => vec![id],
        None => stage.worklist(limit)?,
    };
    println!("Enriching {} members", worklist.len());

    let stats = stage.process_batch(&worklist).await?;
    println!(
        "{}: {} processed, {} failed",
        style("Enrichment complete").green().bold(),
        stats.processed,
        stats.failed,
    );
    Ok(())
}
