//! Clinical risk analysis worker.
//!
//! Periodically picks census entries that need a fresh assessment, asks a
//! reasoning backend for a criticality rating, and keeps exactly one active
//! analysis per encounter.
//!
//! ```text
//! Selector -> Context -> Prompt -> Fallback chain -> Classifier -> Store
//! ```
//!
//! After each batch, analyses whose encounter left the census are archived
//! once they are older than the validity window.

pub mod error;
pub mod types;
pub mod traits;
pub mod fingerprint;
pub mod context;
pub mod prompt;
pub mod classifier;
pub mod selector;
pub mod store;
pub mod fallback;
pub mod runner;
pub mod background;
#[cfg(test)]
pub mod fixtures;

pub use error::AnalysisError;
pub use types::*;
pub use traits::*;
pub use fingerprint::compute_fingerprint;
pub use context::format_case_summary;
pub use prompt::{build_assessment_prompt, SYSTEM_PROMPT};
pub use classifier::{classify, detect_criticality};
pub use selector::SqliteCandidateSelector;
pub use store::SqliteAnalysisStore;
pub use fallback::{FailedAttempt, FallbackChain, Pacer};
pub use runner::{process_candidate, run_cycle, system_clock, Clock, PipelineContext};
pub use background::{run_worker, spawn_worker, WorkerHandle, WorkerSummary};
