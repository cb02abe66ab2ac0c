//! Status Command
//!
//! Display per-endpoint sync state and store counts.

use console::style;
use serde_json::json;

use crate::cli::util::AppContext;
use crate::types::Result;

pub fn run(ctx: &AppContext, format: &str) -> Result<()> {
    let rows = ctx.tracker().all()?;
    let conn = ctx.db.connection()?;
    let count = |table: &str| -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap_or(0)
    };
    let bills = count("bills");
    let members = count("members");
    let committees = count("committees");
    let review_queue = count("tag_review_queue");

    if format == "json" {
        let value = json!({
            "store": {
                "bills": bills,
                "members": members,
                "committees": committees,
                "tag_review_queue": review_queue,
            },
            "endpoints": rows.iter().map(|row| json!({
                "endpoint": row.endpoint,
                "status": row.status,
                "last_sync": row.last_sync_timestamp,
                "last_success": row.last_success_timestamp,
                "offset": row.last_successful_offset,
                "error": row.last_error,
            })).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", style("LegiSync Status").bold());
    println!("══════════════════════════════════════");
    println!("Store: {bills} bills, {members} members, {committees} committees");
    if review_queue > 0 {
        println!(
            "{}: {review_queue} tags awaiting operator review",
            style("Review queue").yellow()
        );
    }
    println!();

    if rows.is_empty() {
        println!("No sync runs recorded yet.");
        return Ok(());
    }

    println!("Endpoints:");
    for row in rows {
        let status = match row.status.as_str() {
            "success" => style(row.status.clone()).green(),
            "failed" => style(row.status.clone()).red(),
            _ => style(row.status.clone()).yellow(),
        };
        print!(
            "  {:<16} {:<12} last success: {}",
            row.endpoint,
            status,
            row.last_success_timestamp.as_deref().unwrap_or("never"),
        );
        if let Some(error) = row.last_error {
            print!("  ({error})");
        }
        println!();
    }
    Ok(())
}
