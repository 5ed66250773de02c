//! Error types for the risk-analysis pipeline.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("All {} reasoning backends failed for encounter {encounter_id}: {}", attempts.len(), attempts.join("; "))]
    BackendsExhausted {
        encounter_id: i64,
        attempts: Vec<String>,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for AnalysisError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(e))
    }
}
