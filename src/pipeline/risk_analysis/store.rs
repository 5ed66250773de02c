//! Analysis store: single-statement upsert, lookups and the archival sweep
//! over the `clinical_analysis` table.
//!
//! One row per encounter. Rows are never deleted; the sweep only flips
//! `active` off and stamps `archived_at`.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::error::AnalysisError;
use super::traits::AnalysisStore;
use super::types::*;
use crate::db::{format_timestamp, parse_timestamp, DatabaseError};

const SELECT_COLUMNS: &str = "encounter_id, patient_name, bed, sector, criticality, score,
    raw_response, attention_points, recommendations, fingerprint, backend, model,
    processing_ms, active, created_at, updated_at, archived_at";

/// SQLite-backed analysis store.
pub struct SqliteAnalysisStore;

impl SqliteAnalysisStore {
    pub fn new() -> Self {
        Self
    }

    fn query_one(
        &self,
        conn: &Connection,
        sql: &str,
        encounter_id: i64,
    ) -> Result<Option<AnalysisRecord>, AnalysisError> {
        let row = conn
            .query_row(sql, [encounter_id], AnalysisRow::from_row)
            .optional()?;
        row.map(record_from_row).transpose()
    }
}

impl Default for SqliteAnalysisStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisStore for SqliteAnalysisStore {
    fn upsert(
        &self,
        conn: &Connection,
        analysis: &NewAnalysis,
        now: NaiveDateTime,
    ) -> Result<(), AnalysisError> {
        let now = format_timestamp(&now);
        let c = &analysis.classification;
        let processing_ms = i64::try_from(analysis.processing_ms).unwrap_or(i64::MAX);

        conn.execute(
            "INSERT INTO clinical_analysis (
                encounter_id, patient_name, bed, sector, criticality, score,
                raw_response, attention_points, recommendations, fingerprint,
                backend, model, processing_ms, active, created_at, updated_at, archived_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 1, ?14, ?14, NULL)
             ON CONFLICT (encounter_id) DO UPDATE SET
                patient_name = excluded.patient_name,
                bed = excluded.bed,
                sector = excluded.sector,
                criticality = excluded.criticality,
                score = excluded.score,
                raw_response = excluded.raw_response,
                attention_points = excluded.attention_points,
                recommendations = excluded.recommendations,
                fingerprint = excluded.fingerprint,
                backend = excluded.backend,
                model = excluded.model,
                processing_ms = excluded.processing_ms,
                active = 1,
                updated_at = excluded.updated_at,
                archived_at = NULL",
            params![
                analysis.encounter_id,
                analysis.patient_name,
                analysis.bed,
                analysis.sector,
                c.criticality.as_str(),
                c.score,
                analysis.raw_response,
                c.attention_points,
                c.recommendations,
                analysis.fingerprint,
                analysis.backend.as_str(),
                analysis.model,
                processing_ms,
                now,
            ],
        )?;

        Ok(())
    }

    fn get_active(
        &self,
        conn: &Connection,
        encounter_id: i64,
    ) -> Result<Option<AnalysisRecord>, AnalysisError> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM clinical_analysis WHERE encounter_id = ?1 AND active = 1"
        );
        self.query_one(conn, &sql, encounter_id)
    }

    fn get(
        &self,
        conn: &Connection,
        encounter_id: i64,
    ) -> Result<Option<AnalysisRecord>, AnalysisError> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM clinical_analysis WHERE encounter_id = ?1");
        self.query_one(conn, &sql, encounter_id)
    }

    fn archive_stale(
        &self,
        conn: &Connection,
        validity_window: chrono::Duration,
        now: NaiveDateTime,
    ) -> Result<usize, AnalysisError> {
        let cutoff = format_timestamp(&(now - validity_window));
        let now = format_timestamp(&now);

        let archived = conn.execute(
            "UPDATE clinical_analysis
             SET active = 0, archived_at = ?1
             WHERE active = 1
               AND updated_at < ?2
               AND NOT EXISTS (
                   SELECT 1 FROM census_entries c
                   WHERE c.encounter_id = clinical_analysis.encounter_id
                     AND c.active_in_unit = 1
               )",
            params![now, cutoff],
        )?;

        Ok(archived)
    }

    fn orphan_stats(&self, conn: &Connection) -> Result<OrphanStats, AnalysisError> {
        let (total, active): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(a.active), 0)
             FROM clinical_analysis a
             WHERE NOT EXISTS (
                 SELECT 1 FROM census_entries c WHERE c.encounter_id = a.encounter_id
             )",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(OrphanStats {
            total: total.max(0) as u64,
            still_active: active.max(0) as u64,
        })
    }

    fn count_records(&self, conn: &Connection) -> Result<(u64, u64), AnalysisError> {
        let (total, active): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(active), 0) FROM clinical_analysis",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((total.max(0) as u64, active.max(0) as u64))
    }
}

/// Raw row before enum and timestamp parsing.
struct AnalysisRow {
    encounter_id: i64,
    patient_name: Option<String>,
    bed: Option<String>,
    sector: Option<String>,
    criticality: String,
    score: u32,
    raw_response: String,
    attention_points: Option<String>,
    recommendations: Option<String>,
    fingerprint: String,
    backend: String,
    model: String,
    processing_ms: i64,
    active: bool,
    created_at: String,
    updated_at: String,
    archived_at: Option<String>,
}

impl AnalysisRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            encounter_id: row.get("encounter_id")?,
            patient_name: row.get("patient_name")?,
            bed: row.get("bed")?,
            sector: row.get("sector")?,
            criticality: row.get("criticality")?,
            score: row.get("score")?,
            raw_response: row.get("raw_response")?,
            attention_points: row.get("attention_points")?,
            recommendations: row.get("recommendations")?,
            fingerprint: row.get("fingerprint")?,
            backend: row.get("backend")?,
            model: row.get("model")?,
            processing_ms: row.get("processing_ms")?,
            active: row.get("active")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            archived_at: row.get("archived_at")?,
        })
    }
}

fn record_from_row(row: AnalysisRow) -> Result<AnalysisRecord, AnalysisError> {
    let criticality = Criticality::from_str(&row.criticality).ok_or_else(|| {
        DatabaseError::InvalidEnum {
            field: "criticality".into(),
            value: row.criticality.clone(),
        }
    })?;

    Ok(AnalysisRecord {
        encounter_id: row.encounter_id,
        patient_name: row.patient_name,
        bed: row.bed,
        sector: row.sector,
        criticality,
        score: row.score,
        raw_response: row.raw_response,
        attention_points: row.attention_points,
        recommendations: row.recommendations,
        fingerprint: row.fingerprint,
        backend: row.backend,
        model: row.model,
        processing_ms: row.processing_ms.max(0) as u64,
        active: row.active,
        created_at: parse_timestamp(&row.created_at)?,
        updated_at: parse_timestamp(&row.updated_at)?,
        archived_at: row.archived_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::pipeline::risk_analysis::fixtures::*;

    const HIGH_REPLY: &str = "CRITICALITY: HIGH\nATTENTION POINTS:\n- Tachycardia\nRECOMMENDATIONS:\n- Fluids";
    const LOW_REPLY: &str = "CRITICALITY: LOW\nRECOMMENDATIONS:\n- Routine care";

    fn setup() -> (Connection, SqliteAnalysisStore) {
        (open_memory_database().unwrap(), SqliteAnalysisStore::new())
    }

    #[test]
    fn first_upsert_creates_active_record() {
        let (conn, store) = setup();
        store.upsert(&conn, &analysis(1, "fp1", HIGH_REPLY), now()).unwrap();

        let record = store.get_active(&conn, 1).unwrap().unwrap();
        assert!(record.active);
        assert_eq!(record.criticality, Criticality::High);
        assert_eq!(record.score, 70);
        assert_eq!(record.attention_points.as_deref(), Some("- Tachycardia"));
        assert_eq!(record.recommendations.as_deref(), Some("- Fluids"));
        assert_eq!(record.raw_response, HIGH_REPLY);
        assert_eq!(record.fingerprint, "fp1");
        assert_eq!(record.backend, "groq");
        assert_eq!(record.model, "llama-3.3-70b-versatile");
        assert_eq!(record.processing_ms, 1200);
        assert_eq!(record.created_at, now());
        assert_eq!(record.updated_at, now());
        assert_eq!(record.archived_at, None);
    }

    #[test]
    fn second_upsert_updates_in_place() {
        let (conn, store) = setup();
        store.upsert(&conn, &analysis(1, "fp1", HIGH_REPLY), at(2026, 3, 9, 8, 0)).unwrap();

        let mut next = analysis(1, "fp2", LOW_REPLY);
        next.backend = crate::pipeline::reasoning::Provider::OpenAi;
        next.model = "gpt-4o-mini".into();
        store.upsert(&conn, &next, now()).unwrap();

        assert_eq!(store.count_records(&conn).unwrap(), (1, 1));
        let record = store.get_active(&conn, 1).unwrap().unwrap();
        assert_eq!(record.fingerprint, "fp2");
        assert_eq!(record.criticality, Criticality::Low);
        assert_eq!(record.attention_points, None);
        assert_eq!(record.backend, "openai");
        assert_eq!(record.model, "gpt-4o-mini");
        assert_eq!(record.created_at, at(2026, 3, 9, 8, 0));
        assert_eq!(record.updated_at, now());
    }

    #[test]
    fn upsert_reactivates_archived_record() {
        let (conn, store) = setup();
        store.upsert(&conn, &analysis(1, "fp1", HIGH_REPLY), at(2026, 3, 8, 8, 0)).unwrap();
        assert_eq!(store.archive_stale(&conn, chrono::Duration::hours(24), now()).unwrap(), 1);
        assert!(store.get_active(&conn, 1).unwrap().is_none());

        store.upsert(&conn, &analysis(1, "fp1", HIGH_REPLY), now()).unwrap();
        let record = store.get_active(&conn, 1).unwrap().unwrap();
        assert!(record.active);
        assert_eq!(record.archived_at, None);
    }

    #[test]
    fn departed_patient_archived_after_window() {
        let (conn, store) = setup();
        // Analysed two days ago, no longer in the census.
        store.upsert(&conn, &analysis(3, "fpc", HIGH_REPLY), at(2026, 3, 8, 12, 0)).unwrap();

        let archived = store.archive_stale(&conn, chrono::Duration::hours(24), now()).unwrap();
        assert_eq!(archived, 1);

        assert!(store.get_active(&conn, 3).unwrap().is_none());
        let record = store.get(&conn, 3).unwrap().unwrap();
        assert!(!record.active);
        assert_eq!(record.archived_at, Some(now()));
        // Analysis time survives archival.
        assert_eq!(record.updated_at, at(2026, 3, 8, 12, 0));
        assert_eq!(record.raw_response, HIGH_REPLY);
        assert_eq!(store.count_records(&conn).unwrap(), (1, 0));
    }

    #[test]
    fn departed_patient_within_window_is_kept() {
        let (conn, store) = setup();
        store.upsert(&conn, &analysis(3, "fpc", HIGH_REPLY), at(2026, 3, 10, 1, 0)).unwrap();
        let archived = store.archive_stale(&conn, chrono::Duration::hours(24), now()).unwrap();
        assert_eq!(archived, 0);
        assert!(store.get_active(&conn, 3).unwrap().is_some());
    }

    #[test]
    fn present_patient_never_archived() {
        let (conn, store) = setup();
        insert_census(&conn, &patient(4, at(2026, 3, 10, 11, 0)));
        store.upsert(&conn, &analysis(4, "fp4", LOW_REPLY), at(2026, 3, 1, 0, 0)).unwrap();

        let archived = store.archive_stale(&conn, chrono::Duration::hours(24), now()).unwrap();
        assert_eq!(archived, 0);
        assert!(store.get_active(&conn, 4).unwrap().is_some());
    }

    #[test]
    fn inactive_census_entry_counts_as_departed() {
        let (conn, store) = setup();
        let mut entry = patient(5, at(2026, 3, 9, 0, 0));
        entry.active_in_unit = false;
        insert_census(&conn, &entry);
        store.upsert(&conn, &analysis(5, "fp5", LOW_REPLY), at(2026, 3, 8, 0, 0)).unwrap();

        assert_eq!(store.archive_stale(&conn, chrono::Duration::hours(24), now()).unwrap(), 1);
    }

    #[test]
    fn sweep_is_idempotent() {
        let (conn, store) = setup();
        store.upsert(&conn, &analysis(3, "fpc", HIGH_REPLY), at(2026, 3, 1, 0, 0)).unwrap();
        assert_eq!(store.archive_stale(&conn, chrono::Duration::hours(24), now()).unwrap(), 1);
        assert_eq!(store.archive_stale(&conn, chrono::Duration::hours(24), now()).unwrap(), 0);
        assert_eq!(store.count_records(&conn).unwrap(), (1, 0));
    }

    #[test]
    fn orphan_stats_count_absent_encounters() {
        let (conn, store) = setup();
        insert_census(&conn, &patient(1, now()));
        store.upsert(&conn, &analysis(1, "a", LOW_REPLY), now()).unwrap();
        store.upsert(&conn, &analysis(2, "b", LOW_REPLY), at(2026, 3, 1, 0, 0)).unwrap();
        store.upsert(&conn, &analysis(3, "c", LOW_REPLY), now()).unwrap();
        store.archive_stale(&conn, chrono::Duration::hours(24), now()).unwrap();

        let stats = store.orphan_stats(&conn).unwrap();
        assert_eq!(stats, OrphanStats { total: 2, still_active: 1 });
    }

    #[test]
    fn orphan_stats_empty_store() {
        let (conn, store) = setup();
        assert_eq!(store.orphan_stats(&conn).unwrap(), OrphanStats::default());
        assert_eq!(store.count_records(&conn).unwrap(), (0, 0));
    }

    #[test]
    fn unknown_stored_level_is_reported() {
        let (conn, store) = setup();
        store.upsert(&conn, &analysis(1, "a", LOW_REPLY), now()).unwrap();
        // Bypass the CHECK constraint to simulate a foreign writer.
        conn.execute_batch("PRAGMA ignore_check_constraints = ON;").unwrap();
        conn.execute("UPDATE clinical_analysis SET criticality = 'severe'", []).unwrap();

        let err = store.get(&conn, 1).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Database(DatabaseError::InvalidEnum { .. })
        ));
    }
}
