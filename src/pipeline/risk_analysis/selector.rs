//! Candidate selection: which census entries need (re-)analysis this cycle.
//!
//! Eligibility:
//! - Census entry active in the unit
//! - No active analysis, or the active analysis is older than the validity
//!   window, or (with fingerprint staleness on) its fingerprint no longer
//!   matches the census data
//!
//! Entries without an active analysis come first, then most recently
//! refreshed. Capped at `batch_size`.
//!
//! The census is written by an external process, so rows are read leniently:
//! a non-numeric clinical value reads as missing, and a row that still cannot
//! be read is skipped rather than failing the cycle.

use std::cmp::Reverse;

use chrono::NaiveDateTime;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};

use super::error::AnalysisError;
use super::fingerprint::compute_fingerprint;
use super::traits::CandidateSelector;
use super::types::*;
use crate::db::{parse_optional_date, parse_timestamp};

/// SQLite-backed selector.
pub struct SqliteCandidateSelector;

impl SqliteCandidateSelector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SqliteCandidateSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl CandidateSelector for SqliteCandidateSelector {
    fn select(
        &self,
        conn: &Connection,
        policy: &SelectionPolicy,
        now: NaiveDateTime,
    ) -> Result<Vec<Candidate>, AnalysisError> {
        let mut stmt = conn.prepare(
            "SELECT c.encounter_id, c.patient_name, c.sex, c.birth_date, c.sector, c.bed,
                    c.length_of_stay_days,
                    c.systolic_bp, c.diastolic_bp, c.mean_arterial_pressure, c.heart_rate,
                    c.respiratory_rate, c.temperature, c.spo2, c.capillary_glucose, c.pain_score,
                    c.creatinine, c.urea, c.sodium, c.potassium, c.lactate_arterial,
                    c.lactate_venous, c.troponin, c.d_dimer, c.leukocytes, c.hemoglobin,
                    c.hematocrit, c.platelets,
                    c.ph_arterial, c.pco2_arterial, c.po2_arterial, c.hco3_arterial,
                    c.base_excess_arterial,
                    c.active_in_unit, c.refreshed_at,
                    a.fingerprint AS analysis_fingerprint,
                    a.updated_at AS analysis_updated_at
             FROM census_entries c
             LEFT JOIN clinical_analysis a
                    ON a.encounter_id = c.encounter_id AND a.active = 1
             WHERE c.active_in_unit = 1",
        )?;

        let rows = stmt.query_map([], CensusRow::from_row)?;
        let mut candidates = Vec::new();

        for row in rows {
            let mut row = match row {
                Ok(row) => row,
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping unreadable census row");
                    continue;
                }
            };
            let encounter_id = row.encounter_id;
            let existing = row.existing.take();

            let entry = match row.into_entry() {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(encounter_id, error = %e, "Skipping unreadable census entry");
                    continue;
                }
            };
            let fingerprint = compute_fingerprint(&entry);

            let reason = match existing {
                None => Some(SelectionReason::NoActiveAnalysis),
                Some(existing) => staleness(&existing, &fingerprint, policy, now),
            };

            if let Some(reason) = reason {
                candidates.push(Candidate {
                    entry,
                    fingerprint,
                    reason,
                });
            }
        }

        // Ordered on parsed timestamps: stored text may mix ' ' and 'T' separators.
        candidates.sort_by_key(|c| {
            (
                c.reason != SelectionReason::NoActiveAnalysis,
                Reverse(c.entry.refreshed_at),
                c.entry.encounter_id,
            )
        });
        candidates.truncate(policy.batch_size as usize);

        tracing::debug!(
            selected = candidates.len(),
            new = candidates
                .iter()
                .filter(|c| c.reason == SelectionReason::NoActiveAnalysis)
                .count(),
            "Candidate selection complete"
        );

        Ok(candidates)
    }
}

/// Stored state of the active analysis joined to a census row.
struct ExistingAnalysis {
    fingerprint: String,
    updated_at: String,
}

/// Why an entry with an active analysis is stale, if it is.
///
/// An unreadable `updated_at` counts as expired so the next analysis
/// rewrites it.
fn staleness(
    existing: &ExistingAnalysis,
    fingerprint: &str,
    policy: &SelectionPolicy,
    now: NaiveDateTime,
) -> Option<SelectionReason> {
    let expired = match parse_timestamp(&existing.updated_at) {
        Ok(updated_at) => now - updated_at > policy.validity_window,
        Err(_) => true,
    };

    if expired {
        Some(SelectionReason::Expired)
    } else if policy.fingerprint_staleness && existing.fingerprint != fingerprint {
        Some(SelectionReason::DataChanged)
    } else {
        None
    }
}

fn existing_from_row(row: &Row<'_>) -> rusqlite::Result<Option<ExistingAnalysis>> {
    let fingerprint: Option<String> = row.get("analysis_fingerprint")?;
    let updated_at: Option<String> = row.get("analysis_updated_at")?;
    Ok(fingerprint
        .zip(updated_at)
        .map(|(fingerprint, updated_at)| ExistingAnalysis {
            fingerprint,
            updated_at,
        }))
}

/// Numeric census value. Placeholders such as `NA` read as missing and
/// numeric text is parsed.
fn clinical_value(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<f64>> {
    let value = match row.get_ref(column)? {
        ValueRef::Integer(i) => Some(i as f64),
        ValueRef::Real(f) => Some(f),
        ValueRef::Text(raw) => std::str::from_utf8(raw)
            .ok()
            .and_then(|text| text.trim().parse::<f64>().ok()),
        ValueRef::Null | ValueRef::Blob(_) => None,
    };
    Ok(value.filter(|v| v.is_finite()))
}

fn whole_days(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<i64>> {
    Ok(clinical_value(row, column)?.map(|days| days.trunc() as i64))
}

/// Raw census row plus the joined analysis columns.
struct CensusRow {
    encounter_id: i64,
    patient_name: Option<String>,
    sex: Option<String>,
    birth_date: Option<String>,
    sector: Option<String>,
    bed: Option<String>,
    length_of_stay_days: Option<i64>,
    vitals: VitalSigns,
    labs: LabPanel,
    blood_gas: BloodGas,
    active_in_unit: bool,
    refreshed_at: String,
    existing: Option<ExistingAnalysis>,
}

impl CensusRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            encounter_id: row.get("encounter_id")?,
            patient_name: row.get("patient_name")?,
            sex: row.get("sex")?,
            birth_date: row.get("birth_date")?,
            sector: row.get("sector")?,
            bed: row.get("bed")?,
            length_of_stay_days: whole_days(row, "length_of_stay_days")?,
            vitals: VitalSigns {
                systolic_bp: clinical_value(row, "systolic_bp")?,
                diastolic_bp: clinical_value(row, "diastolic_bp")?,
                mean_arterial_pressure: clinical_value(row, "mean_arterial_pressure")?,
                heart_rate: clinical_value(row, "heart_rate")?,
                respiratory_rate: clinical_value(row, "respiratory_rate")?,
                temperature: clinical_value(row, "temperature")?,
                spo2: clinical_value(row, "spo2")?,
                capillary_glucose: clinical_value(row, "capillary_glucose")?,
                pain_score: clinical_value(row, "pain_score")?,
            },
            labs: LabPanel {
                creatinine: clinical_value(row, "creatinine")?,
                urea: clinical_value(row, "urea")?,
                sodium: clinical_value(row, "sodium")?,
                potassium: clinical_value(row, "potassium")?,
                lactate_arterial: clinical_value(row, "lactate_arterial")?,
                lactate_venous: clinical_value(row, "lactate_venous")?,
                troponin: clinical_value(row, "troponin")?,
                d_dimer: clinical_value(row, "d_dimer")?,
                leukocytes: clinical_value(row, "leukocytes")?,
                hemoglobin: clinical_value(row, "hemoglobin")?,
                hematocrit: clinical_value(row, "hematocrit")?,
                platelets: clinical_value(row, "platelets")?,
            },
            blood_gas: BloodGas {
                ph: clinical_value(row, "ph_arterial")?,
                pco2: clinical_value(row, "pco2_arterial")?,
                po2: clinical_value(row, "po2_arterial")?,
                hco3: clinical_value(row, "hco3_arterial")?,
                base_excess: clinical_value(row, "base_excess_arterial")?,
            },
            active_in_unit: row.get("active_in_unit")?,
            refreshed_at: row.get("refreshed_at")?,
            existing: existing_from_row(row)?,
        })
    }

    fn into_entry(self) -> Result<CensusEntry, AnalysisError> {
        Ok(CensusEntry {
            encounter_id: self.encounter_id,
            patient_name: self.patient_name,
            sex: self.sex,
            birth_date: parse_optional_date(self.birth_date),
            sector: self.sector,
            bed: self.bed,
            length_of_stay_days: self.length_of_stay_days,
            vitals: self.vitals,
            labs: self.labs,
            blood_gas: self.blood_gas,
            active_in_unit: self.active_in_unit,
            refreshed_at: parse_timestamp(&self.refreshed_at)?,
        })
    }
}
