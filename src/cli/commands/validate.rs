//! Validate Command
//!
//! Data-quality report over the relational store.

use console::style;
use serde_json::json;

use crate::cli::util::AppContext;
use crate::types::Result;

pub fn run(ctx: &AppContext, format: &str) -> Result<()> {
    let report = ctx.validation_stage().validate()?;

    if format == "json" {
        let value = json!({
            "categories": report
                .findings
                .iter()
                .map(|(category, findings)| {
                    json!({
                        "category": category.as_str(),
                        "modern": findings.modern.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
                        "historical": findings.historical.iter().map(|k| k.to_string()).collect::<Vec<_>>(),
                    })
                })
                .collect::<Vec<_>>(),
            "modern_total": report.modern_total(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{}", style("Data Quality Report").bold());
    println!("══════════════════════════════════════");
    for (category, findings) in &report.findings {
        let modern = findings.modern.len();
        let historical = findings.historical.len();
        let count = if modern > 0 {
            style(modern.to_string()).red().to_string()
        } else {
            style(modern.to_string()).green().to_string()
        };
        print!("  missing {:<16} {count} modern", category.as_str());
        if historical > 0 {
            print!("  ({historical} historical, expected)");
        }
        println!();
    }
    println!();
    println!(
        "True gaps: {} (historical-range gaps are excluded)",
        report.modern_total()
    );
    Ok(())
}
