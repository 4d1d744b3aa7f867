//! Shared domain types for the pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical storage format for meeting dates. Lexicographic order on this
/// format is chronological, which the latest-meeting and monthly-series
/// queries rely on.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a meeting date in the canonical storage format.
pub fn format_meeting_date(date: &NaiveDateTime) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Parse a canonical stored meeting date back into a timestamp.
pub fn parse_meeting_date(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, DATE_FORMAT).ok()
}

/// Incoming meeting fields for the upsert resolver. `None` means "not
/// provided" — the merge never erases stored data with a null.
#[derive(Debug, Clone, Default)]
pub struct MeetingFields {
    pub assigned_seller: Option<String>,
    pub meeting_date: Option<NaiveDateTime>,
    pub closed: Option<bool>,
    pub transcript: Option<String>,
}

impl MeetingFields {
    /// The canonical string form of the incoming date, if any.
    pub fn meeting_date_str(&self) -> Option<String> {
        self.meeting_date.as_ref().map(format_meeting_date)
    }
}

/// Accepted budget tier labels.
pub const BUDGET_TIERS: &[&str] = &["Low", "Medium", "High"];

/// Structured judgment returned by the external classifier.
///
/// Field ranges are enforced by [`ClassificationPayload::validate`] after
/// decoding; the JSON-schema constraint sent with the prompt asks the model
/// for the same shape, but the response is never trusted unchecked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationPayload {
    pub sentiment: i32,
    pub urgency: i32,
    #[serde(default)]
    pub budget_tier: Option<String>,
    #[serde(default)]
    pub buyer_role: Option<String>,
    #[serde(default)]
    pub use_case: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub automatization: Option<bool>,
    #[serde(default)]
    pub pains: Vec<String>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub competitors: Vec<String>,
    #[serde(default)]
    pub risks: Vec<String>,
    #[serde(default)]
    pub next_step_clarity: Option<i32>,
    pub fit_score: f64,
    pub close_probability: f64,
    #[serde(default)]
    pub summary: Option<String>,
}

impl ClassificationPayload {
    /// Check every range/enum constraint. Returns the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if !(-2..=2).contains(&self.sentiment) {
            return Err(format!("sentiment {} outside [-2, 2]", self.sentiment));
        }
        if !(0..=3).contains(&self.urgency) {
            return Err(format!("urgency {} outside [0, 3]", self.urgency));
        }
        if let Some(ref tier) = self.budget_tier {
            if !BUDGET_TIERS.contains(&tier.as_str()) {
                return Err(format!("budget_tier {tier:?} not one of Low/Medium/High"));
            }
        }
        if let Some(clarity) = self.next_step_clarity {
            if !(0..=3).contains(&clarity) {
                return Err(format!("next_step_clarity {clarity} outside [0, 3]"));
            }
        }
        if !(0.0..=1.0).contains(&self.fit_score) {
            return Err(format!("fit_score {} outside [0, 1]", self.fit_score));
        }
        if !(0.0..=1.0).contains(&self.close_probability) {
            return Err(format!(
                "close_probability {} outside [0, 1]",
                self.close_probability
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn payload() -> ClassificationPayload {
        ClassificationPayload {
            sentiment: 1,
            urgency: 2,
            budget_tier: Some("High".to_string()),
            buyer_role: Some("Decisor".to_string()),
            use_case: Some("Soporte".to_string()),
            origin: Some("Referido".to_string()),
            automatization: Some(true),
            pains: vec!["onboarding lento".to_string()],
            objections: vec![],
            competitors: vec![],
            risks: vec![],
            next_step_clarity: Some(2),
            fit_score: 0.8,
            close_probability: 0.6,
            summary: Some("Reunión positiva".to_string()),
        }
    }

    #[test]
    fn test_valid_payload_passes() {
        assert!(payload().validate().is_ok());
    }

    #[test]
    fn test_sentiment_out_of_range_rejected() {
        let mut p = payload();
        p.sentiment = 3;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_unknown_budget_tier_rejected() {
        let mut p = payload();
        p.budget_tier = Some("Enterprise".to_string());
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_fit_score_out_of_range_rejected() {
        let mut p = payload();
        p.fit_score = 1.2;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_null_budget_tier_accepted() {
        let mut p = payload();
        p.budget_tier = None;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_payload_decodes_with_missing_optional_fields() {
        let json = r#"{
            "sentiment": 0,
            "urgency": 1,
            "fit_score": 0.4,
            "close_probability": 0.2
        }"#;
        let p: ClassificationPayload = serde_json::from_str(json).unwrap();
        assert!(p.pains.is_empty());
        assert!(p.budget_tier.is_none());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_date_format_round_trip() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        let rendered = format_meeting_date(&date);
        assert_eq!(rendered, "2024-03-01 10:30:00");
        assert_eq!(parse_meeting_date(&rendered), Some(date));
    }
}
