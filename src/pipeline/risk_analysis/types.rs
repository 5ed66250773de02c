use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::pipeline::reasoning::Provider;

// ═══════════════════════════════════════════
// Census
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub systolic_bp: Option<f64>,
    pub diastolic_bp: Option<f64>,
    pub mean_arterial_pressure: Option<f64>,
    pub heart_rate: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub temperature: Option<f64>,
    pub spo2: Option<f64>,
    pub capillary_glucose: Option<f64>,
    pub pain_score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabPanel {
    pub creatinine: Option<f64>,
    pub urea: Option<f64>,
    pub sodium: Option<f64>,
    pub potassium: Option<f64>,
    pub lactate_arterial: Option<f64>,
    pub lactate_venous: Option<f64>,
    pub troponin: Option<f64>,
    pub d_dimer: Option<f64>,
    pub leukocytes: Option<f64>,
    pub hemoglobin: Option<f64>,
    pub hematocrit: Option<f64>,
    pub platelets: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BloodGas {
    pub ph: Option<f64>,
    pub pco2: Option<f64>,
    pub po2: Option<f64>,
    pub hco3: Option<f64>,
    pub base_excess: Option<f64>,
}

/// One row of the census. Read-only for the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CensusEntry {
    /// Unique per hospitalization episode.
    pub encounter_id: i64,
    pub patient_name: Option<String>,
    pub sex: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub sector: Option<String>,
    pub bed: Option<String>,
    pub length_of_stay_days: Option<i64>,
    pub vitals: VitalSigns,
    pub labs: LabPanel,
    pub blood_gas: BloodGas,
    pub active_in_unit: bool,
    pub refreshed_at: NaiveDateTime,
}

// ═══════════════════════════════════════════
// Classification
// ═══════════════════════════════════════════

/// Risk level. Ordered so that `Critical > High > Moderate > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    Low,
    Moderate,
    High,
    Critical,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "moderate" => Some(Self::Moderate),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Keyword the classifier looks for in a reply.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    pub fn score(&self) -> u32 {
        match self {
            Self::Critical => 90,
            Self::High => 70,
            Self::Moderate => 50,
            Self::Low => 30,
        }
    }

    /// Highest severity first. This is the classifier's precedence order.
    pub fn by_precedence() -> &'static [Criticality] {
        &[Self::Critical, Self::High, Self::Moderate, Self::Low]
    }
}

impl std::fmt::Display for Criticality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured reading of a free-text reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub criticality: Criticality,
    pub score: u32,
    pub attention_points: Option<String>,
    pub recommendations: Option<String>,
}

// ═══════════════════════════════════════════
// Selection
// ═══════════════════════════════════════════

/// Why a census entry needs (re-)analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionReason {
    NoActiveAnalysis,
    Expired,
    DataChanged,
}

impl SelectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoActiveAnalysis => "no_active_analysis",
            Self::Expired => "expired",
            Self::DataChanged => "data_changed",
        }
    }
}

impl std::fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A census entry selected for analysis this cycle.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub entry: CensusEntry,
    pub fingerprint: String,
    pub reason: SelectionReason,
}

/// Knobs the selector needs, split from the full worker config.
#[derive(Debug, Clone, Copy)]
pub struct SelectionPolicy {
    pub batch_size: u32,
    pub validity_window: chrono::Duration,
    pub fingerprint_staleness: bool,
}

// ═══════════════════════════════════════════
// Persistence
// ═══════════════════════════════════════════

/// A stored analysis row.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRecord {
    pub encounter_id: i64,
    pub patient_name: Option<String>,
    pub bed: Option<String>,
    pub sector: Option<String>,
    pub criticality: Criticality,
    pub score: u32,
    pub raw_response: String,
    pub attention_points: Option<String>,
    pub recommendations: Option<String>,
    pub fingerprint: String,
    pub backend: String,
    pub model: String,
    pub processing_ms: u64,
    pub active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub archived_at: Option<NaiveDateTime>,
}

/// Everything a successful analysis writes.
#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub encounter_id: i64,
    pub patient_name: Option<String>,
    pub bed: Option<String>,
    pub sector: Option<String>,
    pub classification: Classification,
    pub raw_response: String,
    pub fingerprint: String,
    pub backend: Provider,
    pub model: String,
    pub processing_ms: u64,
}

/// Analysis rows whose encounter is no longer in the census.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrphanStats {
    pub total: u64,
    pub still_active: u64,
}

// ═══════════════════════════════════════════
// Cycle
// ═══════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Selecting,
    Processing,
    Archiving,
    Sleeping,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selecting => "selecting",
            Self::Processing => "processing",
            Self::Archiving => "archiving",
            Self::Sleeping => "sleeping",
        }
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u32,
    pub selected: usize,
    pub analyzed: usize,
    pub failed: usize,
    pub archived: usize,
    pub orphans: OrphanStats,
    /// True when shutdown was requested before every candidate was processed.
    pub interrupted: bool,
    pub duration: Duration,
}
