//! Cycle orchestration: Selector → Context → Fallback chain → Classifier → Store,
//! then the archival sweep.
//!
//! Candidates run one at a time. A candidate that fails is logged and left
//! untouched; only selection and archival failures abort the cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use rusqlite::Connection;

use super::classifier::classify;
use super::context::format_case_summary;
use super::error::AnalysisError;
use super::fallback::{FallbackChain, Pacer};
use super::prompt::{build_assessment_prompt, SYSTEM_PROMPT};
use super::selector::SqliteCandidateSelector;
use super::store::SqliteAnalysisStore;
use super::traits::*;
use super::types::*;
use crate::config::{GenerationParams, WorkerConfig};
use crate::pipeline::reasoning::{build_backend, ReasoningRequest};

/// Source of "now" for staleness, archival and timestamps.
pub type Clock = fn() -> NaiveDateTime;

/// Wall clock in UTC. Census `refreshed_at` values are expected in UTC too.
pub fn system_clock() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Everything a cycle needs, built once by the entry point.
pub struct PipelineContext {
    pub selector: Box<dyn CandidateSelector>,
    pub store: Box<dyn AnalysisStore>,
    pub chain: FallbackChain,
    pub policy: SelectionPolicy,
    pub generation: GenerationParams,
    pub clock: Clock,
    pub shutdown: Arc<AtomicBool>,
}

impl PipelineContext {
    /// Wire the SQLite selector and store to the configured backend chain.
    pub fn from_config(config: &WorkerConfig, shutdown: Arc<AtomicBool>) -> Result<Self, AnalysisError> {
        let backends = config
            .backends
            .iter()
            .map(|spec| {
                build_backend(spec, config.call_timeout)
                    .map_err(|e| AnalysisError::Config(format!("{}: {e}", spec.label())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if backends.is_empty() {
            return Err(AnalysisError::Config("no reasoning backends configured".into()));
        }

        Ok(Self {
            selector: Box::new(SqliteCandidateSelector::new()),
            store: Box::new(SqliteAnalysisStore::new()),
            chain: FallbackChain::new(backends, Pacer::new(config.pacing_delay)),
            policy: SelectionPolicy {
                batch_size: config.batch_size,
                validity_window: config.validity_window,
                fingerprint_staleness: config.fingerprint_staleness,
            },
            generation: config.generation,
            clock: system_clock,
            shutdown,
        })
    }

    pub fn now(&self) -> NaiveDateTime {
        (self.clock)()
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn enter(cycle: u32, phase: CyclePhase) {
    tracing::debug!(cycle, phase = phase.as_str(), "Cycle phase");
}

/// Analyse one candidate and persist the result.
///
/// Nothing is written unless a backend produced a reply.
pub fn process_candidate(
    conn: &Connection,
    ctx: &PipelineContext,
    candidate: &Candidate,
) -> Result<Criticality, AnalysisError> {
    let entry = &candidate.entry;
    let encounter_id = entry.encounter_id;

    let summary = format_case_summary(entry, ctx.now().date());
    let prompt = build_assessment_prompt(&summary);
    let request = ReasoningRequest {
        system: SYSTEM_PROMPT,
        prompt: &prompt,
        temperature: ctx.generation.temperature,
        max_tokens: ctx.generation.max_tokens,
    };

    let reply = ctx.chain.generate(&request).map_err(|failures| {
        AnalysisError::BackendsExhausted {
            encounter_id,
            attempts: failures.iter().map(ToString::to_string).collect(),
        }
    })?;

    let classification = classify(&reply.text);
    let criticality = classification.criticality;
    let processing_ms = reply.elapsed.as_millis() as u64;

    let analysis = NewAnalysis {
        encounter_id,
        patient_name: entry.patient_name.clone(),
        bed: entry.bed.clone(),
        sector: entry.sector.clone(),
        classification,
        raw_response: reply.text,
        fingerprint: candidate.fingerprint.clone(),
        backend: reply.provider,
        model: reply.model,
        processing_ms,
    };
    ctx.store.upsert(conn, &analysis, ctx.now())?;

    tracing::info!(
        encounter_id,
        criticality = criticality.as_str(),
        score = criticality.score(),
        provider = analysis.backend.as_str(),
        model = %analysis.model,
        elapsed_ms = processing_ms,
        "Analysis saved"
    );

    Ok(criticality)
}

/// Run one full cycle against an open connection.
pub fn run_cycle(conn: &Connection, ctx: &PipelineContext, cycle: u32) -> Result<CycleReport, AnalysisError> {
    let start = Instant::now();
    let mut report = CycleReport {
        cycle,
        ..Default::default()
    };

    enter(cycle, CyclePhase::Selecting);
    let candidates = ctx.selector.select(conn, &ctx.policy, ctx.now())?;
    report.selected = candidates.len();
    tracing::info!(cycle, selected = report.selected, "Cycle started");

    enter(cycle, CyclePhase::Processing);
    let total = candidates.len();
    for (i, candidate) in candidates.iter().enumerate() {
        if ctx.shutdown_requested() {
            tracing::info!(cycle, remaining = total - i, "Shutdown requested, leaving remaining candidates");
            report.interrupted = true;
            break;
        }

        tracing::debug!(
            encounter_id = candidate.entry.encounter_id,
            reason = candidate.reason.as_str(),
            position = i + 1,
            total,
            "Analysing candidate"
        );

        match process_candidate(conn, ctx, candidate) {
            Ok(_) => report.analyzed += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    encounter_id = candidate.entry.encounter_id,
                    error = %e,
                    "Candidate skipped"
                );
            }
        }
    }

    enter(cycle, CyclePhase::Archiving);
    report.archived = ctx
        .store
        .archive_stale(conn, ctx.policy.validity_window, ctx.now())?;
    if report.archived > 0 {
        tracing::info!(cycle, archived = report.archived, "Archived analyses of departed patients");
    }

    match ctx.store.orphan_stats(conn) {
        Ok(stats) => {
            report.orphans = stats;
            if stats.total > 0 {
                tracing::info!(
                    cycle,
                    total = stats.total,
                    still_active = stats.still_active,
                    "Analyses without a census entry"
                );
            }
        }
        Err(e) => tracing::warn!(cycle, error = %e, "Orphan check failed"),
    }

    report.duration = start.elapsed();
    tracing::info!(
        cycle,
        selected = report.selected,
        analyzed = report.analyzed,
        failed = report.failed,
        archived = report.archived,
        interrupted = report.interrupted,
        duration_ms = report.duration.as_millis() as u64,
        "Cycle complete"
    );

    Ok(report)
}
