//! Fetch, enrichment, and validation stages.
//!
//! Each stage is an independently invoked batch process wired with
//! injected dependencies (database, raw store, API client, sync
//! tracker). Entity-level errors are caught, logged, and counted; only
//! run-level errors propagate.

pub mod backfill;
pub mod bill_detail;
pub mod bill_fetch;
pub mod committee_fetch;
pub mod member_detail;
pub mod member_fetch;
pub mod validation;

pub use backfill::{BackfillOptions, BackfillStage};
pub use bill_detail::{BillDetailStage, DetailReport, DetailStats};
pub use bill_fetch::BillFetchStage;
pub use committee_fetch::CommitteeFetchStage;
pub use member_detail::MemberEnrichStage;
pub use member_fetch::MemberFetchStage;
pub use validation::{MissingCategory, ValidationReport, ValidationStage};

use chrono::NaiveDate;

/// Options shared by the list-fetch stages.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Ignore the stored watermark and fetch everything.
    pub force_full: bool,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Restrict to a single congress.
    pub congress: Option<u16>,
    /// Cap on records processed this run.
    pub limit: Option<usize>,
}

/// Per-run upsert counters reported by every fetch stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Records from the legacy congress range, counted separately so
    /// expected gaps do not read as data-quality failures.
    pub historical: usize,
}

impl FetchStats {
    pub fn total(&self) -> usize {
        self.inserted + self.updated + self.skipped + self.errors
    }
}

impl std::fmt::Display for FetchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} skipped, {} errors, {} historical",
            self.inserted, self.updated, self.skipped, self.errors, self.historical
        )
    }
}
