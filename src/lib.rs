//! LegiSync - Legislative Record Synchronization and Enrichment
//!
//! An incremental synchronization pipeline for legislative records:
//! bills, members, and committees are fetched from a paginated upstream
//! API, staged to a durable raw-file store, normalized into SQLite, and
//! enriched by a pluggable AI summarization pipeline with schema-enforced
//! structured output.
//!
//! ## Core Features
//!
//! - **Incremental Sync**: per-endpoint watermarks with a safety
//!   look-back window; crashed runs resume from the last success
//! - **File-First Staging**: every upstream response lands in a
//!   replayable raw hierarchy with backup-before-overwrite
//! - **Idempotent Upserts**: natural-key writes in per-entity
//!   transactions; repeat runs are no-ops
//! - **Shape Reconciliation**: legacy array-of-entries detail payloads
//!   resolve to one auditable record
//! - **AI Enrichment**: provider-agnostic summarization with structured
//!   output and vocabulary-validated tags
//!
//! ## Modules
//!
//! - [`api`]: retrying paginated API client
//! - [`storage`]: SQLite persistence, raw store, sync tracker
//! - [`pipeline`]: fetch, enrichment, validation, and backfill stages
//! - [`summary`]: AI summarization pipeline and providers
//! - [`config`]: layered configuration

pub mod api;
pub mod cli;
pub mod config;
pub mod constants;
pub mod pipeline;
pub mod storage;
pub mod summary;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

pub use config::{Config, ConfigLoader};
pub use types::error::{ErrorCategory, Result, ResultExt, SyncError};

pub use api::{ApiClient, ApiClientConfig};
pub use storage::{Database, RawStore, SharedDatabase, SyncStatus, SyncTracker};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use pipeline::{
    BackfillStage, BillDetailStage, BillFetchStage, CommitteeFetchStage, MemberEnrichStage,
    MemberFetchStage, ValidationStage,
};

pub use summary::{
    AiProcessor, AiProviderConfig, SummaryPipeline, SummaryState, TagValidator, UnknownTagPolicy,
    create_processor,
};
