use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use legisync::cli::commands;
use legisync::cli::util::AppContext;
use legisync::pipeline::FetchOptions;

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

#[derive(Parser)]
#[command(name = "legisync")]
#[command(
    version,
    about = "Incremental synchronization and AI enrichment pipeline for legislative records"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    verbose: bool,

    #[arg(long, short)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and database in the current directory
    Init {
        #[arg(long, short, help = "Overwrite existing config")]
        force: bool,
    },

    /// Fetch entity lists from the upstream API
    Fetch {
        #[command(subcommand)]
        entity: FetchEntity,
    },

    /// Fetch per-entity detail and sub-resources
    Enrich {
        #[command(subcommand)]
        entity: EnrichEntity,
    },

    /// Report entities with missing sub-resources
    Validate {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Re-drive enrichment over a missing-data category
    Backfill {
        #[arg(long, help = "Missing-data category (e.g. actions, summary)")]
        category: String,
        #[arg(long, help = "Entities per batch")]
        batch_size: Option<usize>,
        #[arg(long, help = "Worker pool size (1 = sequential)")]
        parallel: Option<usize>,
        #[arg(long = "dry-run", help = "Report the worklist without fetching")]
        dry_run: bool,
    },

    /// Generate AI summaries for bills lacking one
    Summarize {
        #[arg(long, help = "Specific bill (format: HR1234)")]
        bill: Option<String>,
        #[arg(long, help = "Congress number for --bill")]
        congress: Option<u16>,
        #[arg(long, default_value = "10", help = "Maximum bills to process")]
        limit: usize,
    },

    /// Show sync state and store counts
    Status {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
}

#[derive(clap::Args)]
struct FetchArgs {
    #[arg(long, help = "Ignore the stored watermark and fetch everything")]
    force_full: bool,
    #[arg(long, value_parser = parse_date, help = "Start date (YYYY-MM-DD)")]
    start_date: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date, help = "End date (YYYY-MM-DD)")]
    end_date: Option<NaiveDate>,
    #[arg(long, help = "Restrict to a single congress")]
    congress: Option<u16>,
    #[arg(long, help = "Maximum records to process")]
    limit: Option<usize>,
}

impl From<FetchArgs> for FetchOptions {
    fn from(args: FetchArgs) -> Self {
        Self {
            force_full: args.force_full,
            start_date: args.start_date,
            end_date: args.end_date,
            congress: args.congress,
            limit: args.limit,
        }
    }
}

#[derive(Subcommand)]
enum FetchEntity {
    /// Legislative items
    Bills {
        #[command(flatten)]
        args: FetchArgs,
    },
    /// Members of Congress
    Members {
        #[command(flatten)]
        args: FetchArgs,
    },
    /// Committees and subcommittees
    Committees {
        #[command(flatten)]
        args: FetchArgs,
        #[arg(long, help = "Restrict to one chamber (house, senate)")]
        chamber: Option<String>,
    },
}

#[derive(Subcommand)]
enum EnrichEntity {
    /// Bill details, actions, cosponsors, subjects, text versions
    Bills {
        #[arg(long, help = "Specific bill (format: HR1234)")]
        bill: Option<String>,
        #[arg(long, help = "Congress number for --bill")]
        congress: Option<u16>,
        #[arg(long, default_value = "100", help = "Maximum bills to process")]
        limit: usize,
        #[arg(long, help = "Target bills with missing data instead of recent ones")]
        all: bool,
    },
    /// Member sponsored/cosponsored legislation
    Members {
        #[arg(long, help = "Specific member (bioguide id)")]
        member: Option<String>,
        #[arg(long, default_value = "100", help = "Maximum members to process")]
        limit: usize,
    },
}

fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\nlegisync encountered an unexpected error:");
        eprintln!("  {}", message);
        if let Some(location) = panic_info.location() {
            eprintln!(
                "Location: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }

        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Commands::Init { force } = &cli.command {
        commands::init::run(*force)?;
        return Ok(());
    }

    let ctx = AppContext::init()?;
    let rt = Runtime::new()?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled above"),
        Commands::Fetch { entity } => match entity {
            FetchEntity::Bills { args } => {
                rt.block_on(commands::fetch::run_bills(&ctx, args.into()))?;
            }
            FetchEntity::Members { args } => {
                rt.block_on(commands::fetch::run_members(&ctx, args.into()))?;
            }
            FetchEntity::Committees { args, chamber } => {
                rt.block_on(commands::fetch::run_committees(&ctx, args.into(), chamber))?;
            }
        },
        Commands::Enrich { entity } => match entity {
            EnrichEntity::Bills {
                bill,
                congress,
                limit,
                all,
            } => {
                rt.block_on(commands::enrich::run_bills(
                    &ctx,
                    commands::enrich::EnrichBillsArgs {
                        bill,
                        congress,
                        limit,
                        all,
                    },
                ))?;
            }
            EnrichEntity::Members { member, limit } => {
                rt.block_on(commands::enrich::run_members(&ctx, member, limit))?;
            }
        },
        Commands::Validate { format } => {
            commands::validate::run(&ctx, &format)?;
        }
        Commands::Backfill {
            category,
            batch_size,
            parallel,
            dry_run,
        } => {
            rt.block_on(commands::backfill::run(
                &ctx, &category, batch_size, parallel, dry_run,
            ))?;
        }
        Commands::Summarize {
            bill,
            congress,
            limit,
        } => {
            rt.block_on(commands::summarize::run(&ctx, bill, congress, limit))?;
        }
        Commands::Status { format } => {
            commands::status::run(&ctx, &format)?;
        }
    }

    Ok(())
}
