//! Content fingerprint over the clinical fields that drive re-analysis.
//!
//! Used only to detect change between two census snapshots, never for
//! integrity or authentication.

use sha2::{Digest, Sha256};

use super::types::CensusEntry;

/// Separator between rendered fields.
const FIELD_SEPARATOR: &str = "|";

/// Tracked fields, in digest order.
pub const TRACKED_FIELDS: [&str; 15] = [
    "systolic_bp",
    "diastolic_bp",
    "heart_rate",
    "respiratory_rate",
    "temperature",
    "spo2",
    "creatinine",
    "urea",
    "sodium",
    "potassium",
    "lactate_arterial",
    "lactate_venous",
    "troponin",
    "leukocytes",
    "hemoglobin",
];

fn tracked_values(entry: &CensusEntry) -> [Option<f64>; 15] {
    let v = &entry.vitals;
    let l = &entry.labs;
    [
        v.systolic_bp,
        v.diastolic_bp,
        v.heart_rate,
        v.respiratory_rate,
        v.temperature,
        v.spo2,
        l.creatinine,
        l.urea,
        l.sodium,
        l.potassium,
        l.lactate_arterial,
        l.lactate_venous,
        l.troponin,
        l.leukocytes,
        l.hemoglobin,
    ]
}

/// Canonical text the digest is taken over. Missing values render empty.
pub fn canonical_form(entry: &CensusEntry) -> String {
    tracked_values(entry)
        .iter()
        .map(|value| value.map(|n| n.to_string()).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
}

/// SHA-256 of the canonical form, lower-case hex (64 chars).
pub fn compute_fingerprint(entry: &CensusEntry) -> String {
    let digest = Sha256::digest(canonical_form(entry).as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::risk_analysis::types::{LabPanel, VitalSigns};

    fn entry() -> CensusEntry {
        CensusEntry {
            encounter_id: 1001,
            vitals: VitalSigns {
                systolic_bp: Some(120.0),
                diastolic_bp: Some(80.0),
                heart_rate: Some(88.0),
                respiratory_rate: Some(18.0),
                temperature: Some(37.2),
                spo2: Some(97.0),
                ..Default::default()
            },
            labs: LabPanel {
                creatinine: Some(1.1),
                lactate_arterial: Some(1.8),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn digest_is_64_lowercase_hex() {
        let fp = compute_fingerprint(&entry());
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn identical_inputs_identical_digest() {
        assert_eq!(compute_fingerprint(&entry()), compute_fingerprint(&entry()));
    }

    #[test]
    fn every_tracked_field_changes_digest() {
        let base = compute_fingerprint(&entry());
        let mutations: [fn(&mut CensusEntry); 15] = [
            |e| e.vitals.systolic_bp = Some(90.0),
            |e| e.vitals.diastolic_bp = Some(50.0),
            |e| e.vitals.heart_rate = Some(130.0),
            |e| e.vitals.respiratory_rate = Some(28.0),
            |e| e.vitals.temperature = Some(39.1),
            |e| e.vitals.spo2 = Some(88.0),
            |e| e.labs.creatinine = Some(2.4),
            |e| e.labs.urea = Some(80.0),
            |e| e.labs.sodium = Some(128.0),
            |e| e.labs.potassium = Some(6.1),
            |e| e.labs.lactate_arterial = Some(4.2),
            |e| e.labs.lactate_venous = Some(3.0),
            |e| e.labs.troponin = Some(0.5),
            |e| e.labs.leukocytes = Some(18000.0),
            |e| e.labs.hemoglobin = Some(7.2),
        ];
        for (i, mutate) in mutations.iter().enumerate() {
            let mut changed = entry();
            mutate(&mut changed);
            assert_ne!(compute_fingerprint(&changed), base, "field {} not tracked", TRACKED_FIELDS[i]);
        }
    }

    #[test]
    fn untracked_fields_do_not_change_digest() {
        let base = compute_fingerprint(&entry());
        let mut changed = entry();
        changed.patient_name = Some("Someone Else".into());
        changed.bed = Some("UTI-07".into());
        changed.vitals.capillary_glucose = Some(250.0);
        changed.labs.platelets = Some(90000.0);
        changed.blood_gas.ph = Some(7.21);
        assert_eq!(compute_fingerprint(&changed), base);
    }

    #[test]
    fn missing_values_render_empty() {
        let canonical = canonical_form(&CensusEntry::default());
        assert_eq!(canonical, "|".repeat(14));
    }

    #[test]
    fn missing_differs_from_zero() {
        let mut zero = CensusEntry::default();
        zero.vitals.heart_rate = Some(0.0);
        assert_ne!(compute_fingerprint(&zero), compute_fingerprint(&CensusEntry::default()));
    }

    #[test]
    fn canonical_form_orders_fields() {
        let canonical = canonical_form(&entry());
        assert!(canonical.starts_with("120|80|88|18|37.2|97|1.1|"));
    }
}
