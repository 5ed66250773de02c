//! Shared test fixtures: census rows and clock helpers.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection};

use super::classifier::classify;
use super::types::*;
use crate::db::format_timestamp;
use crate::pipeline::reasoning::Provider;

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

/// Reference "now" used across pipeline tests.
pub fn now() -> NaiveDateTime {
    at(2026, 3, 10, 12, 0)
}

pub fn patient(encounter_id: i64, refreshed_at: NaiveDateTime) -> CensusEntry {
    CensusEntry {
        encounter_id,
        patient_name: Some(format!("Patient {encounter_id}")),
        sex: Some("M".into()),
        birth_date: NaiveDate::from_ymd_opt(1961, 2, 3),
        sector: Some("ICU".into()),
        bed: Some(format!("ICU-{encounter_id:02}")),
        length_of_stay_days: Some(2),
        vitals: VitalSigns {
            systolic_bp: Some(118.0),
            diastolic_bp: Some(76.0),
            heart_rate: Some(92.0),
            respiratory_rate: Some(20.0),
            temperature: Some(37.4),
            spo2: Some(95.0),
            ..Default::default()
        },
        labs: LabPanel {
            creatinine: Some(1.0),
            potassium: Some(4.1),
            hemoglobin: Some(12.3),
            ..Default::default()
        },
        blood_gas: BloodGas::default(),
        active_in_unit: true,
        refreshed_at,
    }
}

/// Write a census row the way the ingestion process would.
pub fn insert_census(conn: &Connection, e: &CensusEntry) {
    conn.execute(
        "INSERT OR REPLACE INTO census_entries (
            encounter_id, patient_name, sex, birth_date, sector, bed, length_of_stay_days,
            systolic_bp, diastolic_bp, mean_arterial_pressure, heart_rate, respiratory_rate,
            temperature, spo2, capillary_glucose, pain_score,
            creatinine, urea, sodium, potassium, lactate_arterial, lactate_venous, troponin,
            d_dimer, leukocytes, hemoglobin, hematocrit, platelets,
            ph_arterial, pco2_arterial, po2_arterial, hco3_arterial, base_excess_arterial,
            active_in_unit, refreshed_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                   ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32,
                   ?33, ?34, ?35)",
        params![
            e.encounter_id,
            e.patient_name,
            e.sex,
            e.birth_date.map(|d| d.format("%Y-%m-%d").to_string()),
            e.sector,
            e.bed,
            e.length_of_stay_days,
            e.vitals.systolic_bp,
            e.vitals.diastolic_bp,
            e.vitals.mean_arterial_pressure,
            e.vitals.heart_rate,
            e.vitals.respiratory_rate,
            e.vitals.temperature,
            e.vitals.spo2,
            e.vitals.capillary_glucose,
            e.vitals.pain_score,
            e.labs.creatinine,
            e.labs.urea,
            e.labs.sodium,
            e.labs.potassium,
            e.labs.lactate_arterial,
            e.labs.lactate_venous,
            e.labs.troponin,
            e.labs.d_dimer,
            e.labs.leukocytes,
            e.labs.hemoglobin,
            e.labs.hematocrit,
            e.labs.platelets,
            e.blood_gas.ph,
            e.blood_gas.pco2,
            e.blood_gas.po2,
            e.blood_gas.hco3,
            e.blood_gas.base_excess,
            e.active_in_unit,
            format_timestamp(&e.refreshed_at),
        ],
    )
    .unwrap();
}

pub fn remove_census(conn: &Connection, encounter_id: i64) {
    conn.execute("DELETE FROM census_entries WHERE encounter_id = ?1", [encounter_id])
        .unwrap();
}

pub fn analysis(encounter_id: i64, fingerprint: &str, reply: &str) -> NewAnalysis {
    NewAnalysis {
        encounter_id,
        patient_name: Some(format!("Patient {encounter_id}")),
        bed: Some(format!("ICU-{encounter_id:02}")),
        sector: Some("ICU".into()),
        classification: classify(reply),
        raw_response: reply.to_string(),
        fingerprint: fingerprint.to_string(),
        backend: Provider::Groq,
        model: "llama-3.3-70b-versatile".into(),
        processing_ms: 1200,
    }
}
