//! CSV ingestion pipeline.
//!
//! Streams delimited rows through the full pipeline: client resolution,
//! meeting upsert, classification. Parse irregularities never skip a row —
//! unreadable fields resolve to null/default. Each row commits
//! independently; a fatal classification error aborts the rest of the file
//! but leaves already-committed rows in place.

use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::classifier::{Provider, RetryPolicy};
use crate::db::SalesDb;
use crate::error::PipelineError;
use crate::services::{classify, clients, meetings};
use crate::types::MeetingFields;

/// Name stored for rows that carry no client name column.
pub const FALLBACK_CLIENT_NAME: &str = "Cliente sin nombre";

/// Date formats tried in order; first successful parse wins.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d", "%d/%m/%Y"];

/// Tokens accepted as true (case-insensitive). Anything else is false.
const TRUTHY_TOKENS: &[&str] = &["1", "true", "yes", "y", "si"];

/// Ordered lists of accepted column names per logical field — the header
/// vocabularies differ between exports, so each field accepts several
/// spellings and the first present non-empty column wins.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub name: Vec<String>,
    pub email: Vec<String>,
    pub phone: Vec<String>,
    pub seller: Vec<String>,
    pub meeting_date: Vec<String>,
    pub transcript: Vec<String>,
    pub closed: Vec<String>,
}

impl Default for ColumnMap {
    fn default() -> Self {
        fn list(names: &[&str]) -> Vec<String> {
            names.iter().map(|n| n.to_string()).collect()
        }
        Self {
            name: list(&["Nombre", "name"]),
            email: list(&["Correo Electronico", "email", "Email"]),
            phone: list(&["Numero de Telefono", "telefono", "phone"]),
            seller: list(&["Vendedor asignado", "assigned_seller"]),
            meeting_date: list(&["Fecha de la Reunion", "meeting_date"]),
            transcript: list(&["Transcripcion", "transcript"]),
            closed: list(&["closed", "Cerrado"]),
        }
    }
}

/// Counters accumulated over one ingested file. `classified` only counts
/// genuinely new external calls, not cache hits on re-uploaded rows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub processed: u64,
    pub inserted_clients: u64,
    pub inserted_meetings: u64,
    pub classified: u64,
}

/// Parse a date value against the accepted format chain.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Parse a boolean value against the truthy token set.
pub fn parse_bool(value: &str) -> bool {
    TRUTHY_TOKENS.contains(&value.trim().to_lowercase().as_str())
}

/// The first present non-empty value among the accepted columns, trimmed.
fn value_from_row(
    headers: &csv::StringRecord,
    record: &csv::StringRecord,
    keys: &[String],
) -> Option<String> {
    for key in keys {
        let Some(index) = headers.iter().position(|h| h == key) else {
            continue;
        };
        if let Some(raw) = record.get(index) {
            let cleaned = raw.trim();
            if !cleaned.is_empty() {
                return Some(cleaned.to_string());
            }
        }
    }
    None
}

/// Ingest a CSV byte stream using the default column vocabulary.
pub fn ingest<R: Read>(
    db: &SalesDb,
    provider: &dyn Provider,
    retry: &RetryPolicy,
    reader: R,
) -> Result<IngestReport, PipelineError> {
    ingest_with_columns(db, provider, retry, reader, &ColumnMap::default())
}

/// Ingest a CSV byte stream with an explicit column vocabulary.
pub fn ingest_with_columns<R: Read>(
    db: &SalesDb,
    provider: &dyn Provider,
    retry: &RetryPolicy,
    reader: R,
    columns: &ColumnMap,
) -> Result<IngestReport, PipelineError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let mut report = IngestReport::default();
    for record in csv_reader.records() {
        let record = record?;
        report.processed += 1;

        let name = value_from_row(&headers, &record, &columns.name)
            .unwrap_or_else(|| FALLBACK_CLIENT_NAME.to_string());
        let email = value_from_row(&headers, &record, &columns.email);
        let phone = value_from_row(&headers, &record, &columns.phone);

        let fields = MeetingFields {
            assigned_seller: value_from_row(&headers, &record, &columns.seller),
            meeting_date: value_from_row(&headers, &record, &columns.meeting_date)
                .and_then(|v| parse_date(&v)),
            closed: value_from_row(&headers, &record, &columns.closed)
                .map(|v| parse_bool(&v)),
            transcript: value_from_row(&headers, &record, &columns.transcript),
        };

        let (client, client_created) =
            clients::upsert_client(db, &name, email.as_deref(), phone.as_deref())?;
        let (meeting, meeting_created) = meetings::upsert_meeting(db, client.id, &fields)?;
        if client_created {
            report.inserted_clients += 1;
        }
        if meeting_created {
            report.inserted_meetings += 1;
        }

        let outcome = classify::classify_meeting(db, provider, retry, meeting.id)?;
        if outcome.created {
            report.classified += 1;
        }
    }

    log::info!(
        "Ingest finished: {} rows processed, {} new clients, {} new meetings, {} classified",
        report.processed,
        report.inserted_clients,
        report.inserted_meetings,
        report.classified
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::testing::MockProvider;
    use crate::classifier::ProviderError;
    use std::time::Duration;

    fn zero_backoff() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        }
    }

    fn run(db: &SalesDb, provider: &MockProvider, csv_text: &str) -> IngestReport {
        ingest(db, provider, &zero_backoff(), csv_text.as_bytes()).unwrap()
    }

    #[test]
    fn test_reupload_merges_and_overwrites_closed() {
        let db = SalesDb::open_in_memory().unwrap();
        let provider = MockProvider::new();
        provider.push_ok(MockProvider::valid_payload());

        let csv_text = "\
name,email,meeting_date,transcript,closed
Ana,a@x.com,2024-03-01,hola,false
Ana,a@x.com,2024-03-01,hola,true
";
        let report = run(&db, &provider, csv_text);

        assert_eq!(report.processed, 2);
        assert_eq!(report.inserted_clients, 1);
        assert_eq!(report.inserted_meetings, 1);
        assert_eq!(report.classified, 1);
        assert_eq!(provider.calls.get(), 1);

        assert_eq!(db.count_clients().unwrap(), 1);
        let facts = db.list_meeting_facts().unwrap();
        assert_eq!(facts.len(), 1);
        assert!(facts[0].meeting.closed);
    }

    #[test]
    fn test_spanish_headers_resolve() {
        let db = SalesDb::open_in_memory().unwrap();
        let provider = MockProvider::new();
        provider.push_ok(MockProvider::valid_payload());

        let csv_text = "\
Nombre,Correo Electronico,Numero de Telefono,Vendedor asignado,Fecha de la Reunion,Transcripcion,Cerrado
Ana,a@x.com,+56911111111,Carla,15/01/2024,hola mundo,si
";
        let report = run(&db, &provider, csv_text);
        assert_eq!(report.inserted_clients, 1);

        let facts = db.list_meeting_facts().unwrap();
        let meeting = &facts[0].meeting;
        assert_eq!(meeting.assigned_seller.as_deref(), Some("Carla"));
        assert_eq!(meeting.meeting_date.as_deref(), Some("2024-01-15 00:00:00"));
        assert!(meeting.closed);
        assert_eq!(meeting.transcript, "hola mundo");

        let client = db.get_client(meeting.client_id).unwrap().unwrap();
        assert_eq!(client.name, "Ana");
        assert!(client.email_hash.is_some());
        assert!(client.phone_hash.is_some());
    }

    #[test]
    fn test_first_present_nonempty_column_wins() {
        let db = SalesDb::open_in_memory().unwrap();
        let provider = MockProvider::new();
        provider.push_ok(MockProvider::valid_payload());
        provider.push_ok(MockProvider::valid_payload());

        // Row 1: "Nombre" wins over "name". Row 2: empty "Nombre" falls back.
        let csv_text = "\
Nombre,name,transcript
Ana,Anita,t1
,Luis,t2
";
        run(&db, &provider, csv_text);
        let clients = db.list_all_clients().unwrap();
        let names: Vec<&str> = clients.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ana", "Luis"]);
    }

    #[test]
    fn test_missing_name_falls_back_to_placeholder() {
        let db = SalesDb::open_in_memory().unwrap();
        let provider = MockProvider::new();
        provider.push_ok(MockProvider::valid_payload());

        let report = run(&db, &provider, "transcript\nhola\n");
        assert_eq!(report.processed, 1);
        let clients = db.list_all_clients().unwrap();
        assert_eq!(clients[0].name, FALLBACK_CLIENT_NAME);
    }

    #[test]
    fn test_unparseable_date_resolves_to_null_without_skipping() {
        let db = SalesDb::open_in_memory().unwrap();
        let provider = MockProvider::new();
        provider.push_ok(MockProvider::valid_payload());

        let csv_text = "name,meeting_date,transcript\nAna,sometime next week,hola\n";
        let report = run(&db, &provider, csv_text);
        assert_eq!(report.processed, 1);
        assert_eq!(report.inserted_meetings, 1);

        let facts = db.list_meeting_facts().unwrap();
        assert!(facts[0].meeting.meeting_date.is_none());
    }

    #[test]
    fn test_fatal_classifier_error_aborts_but_keeps_committed_rows() {
        let db = SalesDb::open_in_memory().unwrap();
        let provider = MockProvider::new();
        provider.push_ok(MockProvider::valid_payload());
        provider.push_err(ProviderError::EmptyResponse);

        let csv_text = "\
name,email,transcript
Ana,a@x.com,t1
Luis,l@x.com,t2
Marta,m@x.com,t3
";
        let err = ingest(&db, &provider, &zero_backoff(), csv_text.as_bytes()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidClassifierOutput(_)));

        // Rows 1 and 2 were committed before the abort; row 3 never ran
        assert_eq!(db.count_clients().unwrap(), 2);
        assert_eq!(db.count_meetings().unwrap(), 2);
        assert_eq!(db.count_classifications().unwrap(), 1);
    }

    #[test]
    fn test_parse_date_format_chain() {
        assert_eq!(
            parse_date("2024-03-01 10:30:00").map(|d| d.to_string()),
            Some("2024-03-01 10:30:00".to_string())
        );
        assert_eq!(
            parse_date("2024-03-01").map(|d| d.to_string()),
            Some("2024-03-01 00:00:00".to_string())
        );
        assert_eq!(
            parse_date(" 01/03/2024 ").map(|d| d.to_string()),
            Some("2024-03-01 00:00:00".to_string())
        );
        assert_eq!(parse_date("03/01/2024 10:30"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_bool_truthy_tokens() {
        for token in ["1", "true", "yes", "y", "si", "SI", " True "] {
            assert!(parse_bool(token), "{token} should be truthy");
        }
        for token in ["0", "false", "no", "cerrado", ""] {
            assert!(!parse_bool(token), "{token} should be false");
        }
    }
}
