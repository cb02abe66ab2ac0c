//! Fetch Commands
//!
//! List-stage sync for bills, members, and committees.

use console::style;

use crate::cli::util::AppContext;
use crate::pipeline::{FetchOptions, FetchStats};
use crate::types::{Chamber, Result, SyncError};

fn print_stats(entity: &str, stats: &FetchStats) {
    println!(
        "{} {}: {} inserted, {} updated, {} skipped, {} errors{}",
        style("Synced").green().bold(),
        entity,
        stats.inserted,
        stats.updated,
        stats.skipped,
        if stats.errors > 0 {
            style(stats.errors).red().to_string()
        } else {
            stats.errors.to_string()
        },
        if stats.historical > 0 {
            format!(" ({} historical)", stats.historical)
        } else {
            String::new()
        },
    );
}

pub async fn run_bills(ctx: &AppContext, options: FetchOptions) -> Result<()> {
    let stage = ctx.bill_fetch_stage();
    let stats = stage.run(&options).await?;
    print_stats("bills", &stats);
    Ok(())
}

pub async fn run_members(ctx: &AppContext, options: FetchOptions) -> Result<()> {
    let stage = ctx.member_fetch_stage();
    let stats = stage.run(&options).await?;
    print_stats("members", &stats);
    Ok(())
}

pub async fn run_committees(
    ctx: &AppContext,
    options: FetchOptions,
    chamber: Option<String>,
) -> Result<()> {
    let chamber = match chamber.as_deref() {
        Some(raw) => Some(Chamber::parse(raw).ok_or_else(|| {
            SyncError::Config(format!("invalid chamber '{raw}' (house or senate)"))
        })?),
        None => None,
    };
    let stage = ctx.committee_fetch_stage();
    let stats = stage.run(&options, chamber).await?;
    print_stats("committees", &stats);
    Ok(())
}
