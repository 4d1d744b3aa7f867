//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from the `clients` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbClient {
    pub id: i64,
    pub name: String,
    pub email_hash: Option<String>,
    pub phone_hash: Option<String>,
}

/// A row from the `meetings` table. `meeting_date` is kept in its canonical
/// string form so lexicographic comparisons stay chronological.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbMeeting {
    pub id: i64,
    pub client_id: i64,
    pub assigned_seller: Option<String>,
    pub meeting_date: Option<String>,
    pub closed: bool,
    pub transcript: String,
}

/// A row from the `classifications` table, list columns decoded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbClassification {
    pub id: i64,
    pub meeting_id: i64,
    pub sentiment: i32,
    pub urgency: i32,
    pub budget_tier: Option<String>,
    pub buyer_role: Option<String>,
    pub use_case: Option<String>,
    pub origin: Option<String>,
    pub automatization: Option<bool>,
    pub pains: Vec<String>,
    pub objections: Vec<String>,
    pub competitors: Vec<String>,
    pub risks: Vec<String>,
    pub next_step_clarity: Option<i32>,
    pub fit_score: f64,
    pub close_probability: f64,
    pub summary: Option<String>,
}

/// One meeting joined with its (optional) classification — the read shape
/// the aggregation engine works from.
#[derive(Debug, Clone)]
pub struct MeetingFacts {
    pub meeting: DbMeeting,
    pub classification: Option<DbClassification>,
}

/// Decode a JSON-array text column, treating NULL or malformed data as empty.
pub(crate) fn decode_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

/// Encode a list for a JSON-array text column.
pub(crate) fn encode_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}
