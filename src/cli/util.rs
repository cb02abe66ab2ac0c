//! Shared command wiring.
//!
//! Builds the stage graph from configuration once per invocation. A
//! database that cannot be opened or an upstream key rejection is a
//! run-level error and aborts immediately.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::config::{Config, ConfigLoader};
use crate::pipeline::{
    BackfillStage, BillDetailStage, BillFetchStage, CommitteeFetchStage, MemberEnrichStage,
    MemberFetchStage, ValidationStage,
};
use crate::storage::{Database, RawStore, SharedDatabase, SyncTracker};
use crate::summary::{SummaryPipeline, create_processor};
use crate::types::Result;

pub struct AppContext {
    pub config: Config,
    pub db: SharedDatabase,
    pub api: Arc<ApiClient>,
}

impl AppContext {
    /// Load config and open shared resources.
    pub fn init() -> Result<Self> {
        let config = ConfigLoader::load()?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        let db: SharedDatabase = Arc::new(Database::open(&config.storage.db_path)?);
        let api = Arc::new(ApiClient::new(&config.api)?);
        Ok(Self { config, db, api })
    }

    pub fn raw_store(&self) -> RawStore {
        RawStore::new(&self.config.storage.raw_dir)
    }

    pub fn tracker(&self) -> SyncTracker {
        SyncTracker::new(Arc::clone(&self.db))
    }

    pub fn bill_fetch_stage(&self) -> BillFetchStage {
        BillFetchStage::new(
            Arc::clone(&self.db),
            self.raw_store(),
            Arc::clone(&self.api),
            self.tracker(),
            self.config.sync.lookback_days,
            self.config.sync.selection_policy,
        )
    }

    pub fn bill_detail_stage(&self) -> Arc<BillDetailStage> {
        Arc::new(BillDetailStage::new(
            Arc::clone(&self.db),
            self.raw_store(),
            Arc::clone(&self.api),
            self.tracker(),
            self.config.sync.selection_policy,
        ))
    }

    pub fn member_fetch_stage(&self) -> MemberFetchStage {
        MemberFetchStage::new(
            Arc::clone(&self.db),
            self.raw_store(),
            Arc::clone(&self.api),
            self.tracker(),
            self.config.sync.lookback_days,
        )
    }

    pub fn member_enrich_stage(&self) -> MemberEnrichStage {
        MemberEnrichStage::new(
            Arc::clone(&self.db),
            self.raw_store(),
            Arc::clone(&self.api),
            self.tracker(),
        )
    }

    pub fn committee_fetch_stage(&self) -> CommitteeFetchStage {
        CommitteeFetchStage::new(
            Arc::clone(&self.db),
            self.raw_store(),
            Arc::clone(&self.api),
            self.tracker(),
        )
    }

    pub fn validation_stage(&self) -> ValidationStage {
        ValidationStage::new(Arc::clone(&self.db))
    }

    pub fn backfill_stage(&self) -> BackfillStage {
        BackfillStage::new(self.validation_stage(), self.bill_detail_stage())
    }

    pub fn summary_pipeline(&self) -> Result<SummaryPipeline> {
        let processor = create_processor(&self.config.ai)?;
        Ok(SummaryPipeline::new(
            Arc::clone(&self.db),
            self.raw_store(),
            Arc::clone(&self.api),
            processor,
            self.config.ai.unknown_tag_policy,
        ))
    }
}
