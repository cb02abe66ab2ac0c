pub mod backfill;
pub mod enrich;
pub mod fetch;
pub mod init;
pub mod status;
pub mod summarize;
pub mod validate;
