//! Trait seams of the risk-analysis pipeline.
//!
//! - CandidateSelector: which census entries need analysis this cycle
//! - AnalysisStore: upsert, lookup and archival of analysis rows

use chrono::NaiveDateTime;
use rusqlite::Connection;

use super::error::AnalysisError;
use super::types::*;

/// Reads the census and the analysis store. Never writes.
pub trait CandidateSelector: Send + Sync {
    /// Ordered candidates, at most `policy.batch_size` of them.
    fn select(
        &self,
        conn: &Connection,
        policy: &SelectionPolicy,
        now: NaiveDateTime,
    ) -> Result<Vec<Candidate>, AnalysisError>;
}

/// Persistence for analysis records.
pub trait AnalysisStore: Send + Sync {
    /// Insert or update in place the single record of an encounter, forcing it active.
    fn upsert(
        &self,
        conn: &Connection,
        analysis: &NewAnalysis,
        now: NaiveDateTime,
    ) -> Result<(), AnalysisError>;

    /// Active record of an encounter, if any.
    fn get_active(
        &self,
        conn: &Connection,
        encounter_id: i64,
    ) -> Result<Option<AnalysisRecord>, AnalysisError>;

    /// Record of an encounter regardless of its active flag.
    fn get(
        &self,
        conn: &Connection,
        encounter_id: i64,
    ) -> Result<Option<AnalysisRecord>, AnalysisError>;

    /// Deactivate records of encounters that left the census and are older
    /// than `validity_window`. Returns the number of rows archived.
    fn archive_stale(
        &self,
        conn: &Connection,
        validity_window: chrono::Duration,
        now: NaiveDateTime,
    ) -> Result<usize, AnalysisError>;

    /// Analysis rows whose encounter is absent from the census.
    fn orphan_stats(&self, conn: &Connection) -> Result<OrphanStats, AnalysisError>;

    /// (total, active) row counts.
    fn count_records(&self, conn: &Connection) -> Result<(u64, u64), AnalysisError>;
}
