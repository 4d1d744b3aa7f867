//! Client identity resolution and filtered listings.

use chrono::Duration;
use serde::Serialize;

use crate::db::{DbClassification, DbClient, DbError, DbMeeting, SalesDb};
use crate::identity::hash_identifier;
use crate::types::parse_meeting_date;

/// Find-or-create a client from a name plus optional raw contact
/// identifiers.
///
/// The identity key is (name, email_hash); phone is hashed and stored but
/// deliberately not part of the lookup key. On a match, hashes that were
/// previously absent are backfilled — a stored hash is never overwritten
/// with a conflicting value. Rows with no identifiers at all always create
/// a new client. Never fails on bad input; an empty name is accepted as-is.
pub fn upsert_client(
    db: &SalesDb,
    name: &str,
    email: Option<&str>,
    phone: Option<&str>,
) -> Result<(DbClient, bool), DbError> {
    let email_hash = hash_identifier(email);
    let phone_hash = hash_identifier(phone);

    let existing = if email_hash.is_some() || phone_hash.is_some() {
        db.find_client_by_identity(name, email_hash.as_deref())?
    } else {
        None
    };

    match existing {
        None => {
            let client = db.insert_client(name, email_hash, phone_hash)?;
            Ok((client, true))
        }
        Some(mut client) => {
            let merged_email = client.email_hash.clone().or(email_hash);
            let merged_phone = client.phone_hash.clone().or(phone_hash);
            if merged_email != client.email_hash || merged_phone != client.phone_hash {
                db.update_client_hashes(
                    client.id,
                    merged_email.as_deref(),
                    merged_phone.as_deref(),
                )?;
                client.email_hash = merged_email;
                client.phone_hash = merged_phone;
            }
            Ok((client, false))
        }
    }
}

/// Look up a single client by id.
pub fn get_client(db: &SalesDb, id: i64) -> Result<Option<DbClient>, DbError> {
    db.get_client(id)
}

// =============================================================================
// Filtered listing
// =============================================================================

/// Relative date window for client listings, anchored to the maximum
/// meeting date present in the data (not wall-clock time) so results are
/// reproducible whenever the query runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateWindow {
    Days(i64),
    All,
}

impl DateWindow {
    /// Parse the accepted window tokens: `7d`, `30d`, `90d`, `all`.
    pub fn parse(value: &str) -> Option<DateWindow> {
        match value {
            "7d" => Some(DateWindow::Days(7)),
            "30d" => Some(DateWindow::Days(30)),
            "90d" => Some(DateWindow::Days(90)),
            "all" => Some(DateWindow::All),
            _ => None,
        }
    }
}

/// Filters for the client listing.
#[derive(Debug, Clone)]
pub struct ClientFilters {
    /// Matched against the assigned seller of each client's latest meeting.
    pub seller: Option<String>,
    pub window: DateWindow,
}

impl Default for ClientFilters {
    fn default() -> Self {
        Self {
            seller: None,
            window: DateWindow::All,
        }
    }
}

/// One meeting in a client listing, with its classification attached.
#[derive(Debug, Clone, Serialize)]
pub struct MeetingRecord {
    #[serde(flatten)]
    pub meeting: DbMeeting,
    pub classification: Option<DbClassification>,
}

/// One client in a listing, meetings nested in date order.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRecord {
    pub id: i64,
    pub name: String,
    pub email_hash: Option<String>,
    pub phone_hash: Option<String>,
    pub meetings: Vec<MeetingRecord>,
}

impl ClientRecord {
    /// The client's latest meeting by date. Dateless meetings sort
    /// earliest, so a client with any dated meeting resolves to the most
    /// recent dated one; ties break toward the higher row id.
    pub fn latest_meeting(&self) -> Option<&MeetingRecord> {
        self.meetings.iter().max_by_key(|record| {
            (
                record.meeting.meeting_date.clone().unwrap_or_default(),
                record.meeting.id,
            )
        })
    }
}

/// List clients with their meetings and classifications, applying seller
/// and date-window filters. Returns `(items, total)` where total counts the
/// filtered set.
pub fn list_clients(
    db: &SalesDb,
    filters: &ClientFilters,
) -> Result<(Vec<ClientRecord>, usize), DbError> {
    let bound = window_cutoff(db, filters.window)?;

    let mut records = Vec::new();
    for client in db.list_all_clients()? {
        let mut meetings = Vec::new();
        for meeting in db.meetings_for_client(client.id)? {
            let classification = db.get_classification_for_meeting(meeting.id)?;
            meetings.push(MeetingRecord {
                meeting,
                classification,
            });
        }
        let record = ClientRecord {
            id: client.id,
            name: client.name,
            email_hash: client.email_hash,
            phone_hash: client.phone_hash,
            meetings,
        };

        if !matches_filters(&record, filters, &bound) {
            continue;
        }
        records.push(record);
    }

    let total = records.len();
    Ok((records, total))
}

/// The resolved lower bound of a date window.
enum WindowBound {
    /// `All`: every client passes.
    Unbounded,
    /// Latest meeting date must be >= this canonical date string.
    Cutoff(String),
    /// A day-window with nothing to anchor on (no dated meetings in the
    /// data): matches no client.
    Unsatisfiable,
}

fn window_cutoff(db: &SalesDb, window: DateWindow) -> Result<WindowBound, DbError> {
    let days = match window {
        DateWindow::All => return Ok(WindowBound::Unbounded),
        DateWindow::Days(days) => days,
    };
    let bound = db
        .max_meeting_date()?
        .as_deref()
        .and_then(parse_meeting_date)
        .map(|ts| crate::types::format_meeting_date(&(ts - Duration::days(days))))
        .map(WindowBound::Cutoff)
        .unwrap_or(WindowBound::Unsatisfiable);
    Ok(bound)
}

fn matches_filters(record: &ClientRecord, filters: &ClientFilters, bound: &WindowBound) -> bool {
    let latest = record.latest_meeting();

    if let Some(ref seller) = filters.seller {
        match latest {
            Some(m) if m.meeting.assigned_seller.as_deref() == Some(seller.as_str()) => {}
            _ => return false,
        }
    }

    match bound {
        WindowBound::Unbounded => true,
        WindowBound::Unsatisfiable => false,
        WindowBound::Cutoff(cutoff) => {
            matches!(
                latest.and_then(|m| m.meeting.meeting_date.as_deref()),
                Some(date) if date >= cutoff.as_str()
            )
        }
    }
}
