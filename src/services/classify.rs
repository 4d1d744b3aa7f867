//! Classification orchestrator.
//!
//! Guarantees at most one external call per meeting under normal operation
//! via an existing-row check. The check is check-then-act without a lock:
//! two concurrent callers can both miss and both call the external model,
//! in which case the UNIQUE(meeting_id) upsert makes the last commit win.

use serde::Serialize;

use crate::classifier::{prompts, response_schema, Provider, RetryPolicy};
use crate::db::{DbClassification, DbError, SalesDb};
use crate::error::PipelineError;
use crate::types::ClassificationPayload;

/// Result of classifying one meeting. `created` is true only when an
/// external call actually happened — a cache hit returns false.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyOutcome {
    pub meeting_id: i64,
    pub created: bool,
    pub classification: DbClassification,
}

/// Classify one meeting, calling the external model only if the meeting
/// does not already own a classification.
pub fn classify_meeting(
    db: &SalesDb,
    provider: &dyn Provider,
    retry: &RetryPolicy,
    meeting_id: i64,
) -> Result<ClassifyOutcome, PipelineError> {
    let meeting = db
        .get_meeting(meeting_id)?
        .ok_or(PipelineError::NotFound(meeting_id))?;

    if let Some(existing) = db.get_classification_for_meeting(meeting_id)? {
        return Ok(ClassifyOutcome {
            meeting_id,
            created: false,
            classification: existing,
        });
    }

    // The pain taxonomy is read fresh at call time so labels the model has
    // already produced are offered back to it on subsequent calls.
    let known_pains = db.distinct_pains()?;
    let prompt = prompts::build_prompt(&meeting.transcript, &known_pains);
    let schema = response_schema();

    let mut attempts: u32 = 0;
    let raw = loop {
        match provider.classify(&prompt, &schema) {
            Ok(value) => break value,
            Err(err) if err.is_rate_limit() => {
                attempts += 1;
                if attempts >= retry.max_attempts {
                    return Err(PipelineError::RateLimitExceeded { attempts });
                }
                log::warn!(
                    "Classifier rate limited ({}/{}); waiting {:?} before retrying",
                    attempts,
                    retry.max_attempts,
                    retry.backoff
                );
                std::thread::sleep(retry.backoff);
            }
            Err(err) if err.is_invalid_output() => {
                return Err(PipelineError::InvalidClassifierOutput(err.to_string()))
            }
            Err(err) => return Err(PipelineError::Classifier(err.to_string())),
        }
    };

    let payload: ClassificationPayload = serde_json::from_value(raw)
        .map_err(|e| PipelineError::InvalidClassifierOutput(e.to_string()))?;
    payload
        .validate()
        .map_err(PipelineError::InvalidClassifierOutput)?;

    let classification = db.upsert_classification(meeting_id, &payload)?;
    log::info!(
        "Classified meeting {} (fit {:.2}, close {:.2})",
        meeting_id,
        payload.fit_score,
        payload.close_probability
    );

    Ok(ClassifyOutcome {
        meeting_id,
        created: true,
        classification,
    })
}

/// Classify a batch of meetings.
///
/// Missing meetings are skipped; any other failure aborts the remaining
/// batch — already-classified ids keep their persisted results.
pub fn classify_many(
    db: &SalesDb,
    provider: &dyn Provider,
    retry: &RetryPolicy,
    ids: &[i64],
) -> Result<Vec<ClassifyOutcome>, PipelineError> {
    let mut outcomes = Vec::with_capacity(ids.len());
    for &id in ids {
        match classify_meeting(db, provider, retry, id) {
            Ok(outcome) => outcomes.push(outcome),
            Err(err) if err.is_skippable() => {
                log::warn!("Skipping meeting {id}: {err}");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(outcomes)
}

/// Paged listing with a total count.
pub fn list_classifications(
    db: &SalesDb,
    skip: i64,
    limit: i64,
) -> Result<(Vec<DbClassification>, i64), DbError> {
    let total = db.count_classifications()?;
    let items = db.list_classifications(skip, limit)?;
    Ok((items, total))
}
