//! Plain-text case summary sent to the reasoning backend.
//!
//! The section layout is fixed: every field is rendered whether or not the
//! census has a value for it, so two summaries differ only in their values.

use chrono::NaiveDate;

use super::types::CensusEntry;

/// Rendered in place of a missing value.
pub const NOT_AVAILABLE: &str = "not available";

/// Upper bound on free-text identity fields (name, sector, bed).
pub const MAX_IDENTITY_CHARS: usize = 80;

/// Render one numeric field with its unit, or the sentinel.
fn value(v: Option<f64>, unit: &str) -> String {
    match v {
        Some(n) if n.is_finite() => format!("{n} {unit}").trim_end().to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Render one free-text field, truncated to the identity bound.
fn text(v: Option<&str>) -> String {
    match v.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.chars().take(MAX_IDENTITY_CHARS).collect(),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Completed years between `birth` and `today`. `None` for a birth date in the future.
pub fn age_in_years(birth: NaiveDate, today: NaiveDate) -> Option<u32> {
    today.years_since(birth)
}

/// Build the case summary for `entry` as of `today`.
pub fn format_case_summary(entry: &CensusEntry, today: NaiveDate) -> String {
    let age = entry
        .birth_date
        .and_then(|birth| age_in_years(birth, today))
        .map(|years| format!("{years} years"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let stay = entry
        .length_of_stay_days
        .map(|days| format!("{days} days"))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());

    let v = &entry.vitals;
    let l = &entry.labs;
    let g = &entry.blood_gas;

    let mut out = String::with_capacity(1536);

    out.push_str("IDENTITY:\n");
    out.push_str(&format!("- Patient: {}\n", text(entry.patient_name.as_deref())));
    out.push_str(&format!("- Encounter: {}\n", entry.encounter_id));
    out.push_str(&format!("- Sex: {}\n", text(entry.sex.as_deref())));
    out.push_str(&format!("- Age: {age}\n"));
    out.push_str(&format!("- Sector: {}\n", text(entry.sector.as_deref())));
    out.push_str(&format!("- Bed: {}\n", text(entry.bed.as_deref())));
    out.push_str(&format!("- Length of stay: {stay}\n"));

    out.push_str("\nVITAL SIGNS:\n");
    out.push_str(&format!("- Systolic BP: {}\n", value(v.systolic_bp, "mmHg")));
    out.push_str(&format!("- Diastolic BP: {}\n", value(v.diastolic_bp, "mmHg")));
    out.push_str(&format!("- Mean arterial pressure: {}\n", value(v.mean_arterial_pressure, "mmHg")));
    out.push_str(&format!("- Heart rate: {}\n", value(v.heart_rate, "bpm")));
    out.push_str(&format!("- Respiratory rate: {}\n", value(v.respiratory_rate, "breaths/min")));
    out.push_str(&format!("- Temperature: {}\n", value(v.temperature, "°C")));
    out.push_str(&format!("- SpO2: {}\n", value(v.spo2, "%")));
    out.push_str(&format!("- Capillary glucose: {}\n", value(v.capillary_glucose, "mg/dL")));
    out.push_str(&format!("- Pain score: {}\n", value(v.pain_score, "/10")));

    out.push_str("\nLABORATORY:\n");
    out.push_str(&format!("- Creatinine: {}\n", value(l.creatinine, "mg/dL")));
    out.push_str(&format!("- Urea: {}\n", value(l.urea, "mg/dL")));
    out.push_str(&format!("- Sodium: {}\n", value(l.sodium, "mEq/L")));
    out.push_str(&format!("- Potassium: {}\n", value(l.potassium, "mEq/L")));
    out.push_str(&format!("- Arterial lactate: {}\n", value(l.lactate_arterial, "mmol/L")));
    out.push_str(&format!("- Venous lactate: {}\n", value(l.lactate_venous, "mmol/L")));
    out.push_str(&format!("- Troponin: {}\n", value(l.troponin, "ng/mL")));
    out.push_str(&format!("- D-dimer: {}\n", value(l.d_dimer, "ng/mL")));
    out.push_str(&format!("- Leukocytes: {}\n", value(l.leukocytes, "/mm³")));
    out.push_str(&format!("- Hemoglobin: {}\n", value(l.hemoglobin, "g/dL")));
    out.push_str(&format!("- Hematocrit: {}\n", value(l.hematocrit, "%")));
    out.push_str(&format!("- Platelets: {}\n", value(l.platelets, "/mm³")));

    out.push_str("\nARTERIAL BLOOD GAS:\n");
    out.push_str(&format!("- pH: {}\n", value(g.ph, "")));
    out.push_str(&format!("- pCO2: {}\n", value(g.pco2, "mmHg")));
    out.push_str(&format!("- pO2: {}\n", value(g.po2, "mmHg")));
    out.push_str(&format!("- HCO3: {}\n", value(g.hco3, "mEq/L")));
    out.push_str(&format!("- Base excess: {}\n", value(g.base_excess, "mEq/L")));

    out
}
