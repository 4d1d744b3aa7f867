//! Meeting upsert and listings.

use crate::db::{DbError, DbMeeting, SalesDb};
use crate::types::MeetingFields;

/// Find-or-create a meeting for a client, merging incoming fields.
///
/// Resolution order, first match wins:
/// 1. a meeting with the identical `meeting_date`,
/// 2. a meeting whose transcript is byte-identical,
/// 3. otherwise a new meeting is created.
///
/// On a match, every non-null incoming field overwrites the stored value —
/// nulls never erase data, so re-uploading the same CSV cannot lose a
/// `closed` flag set in between. On create, `closed` defaults to false.
pub fn upsert_meeting(
    db: &SalesDb,
    client_id: i64,
    fields: &MeetingFields,
) -> Result<(DbMeeting, bool), DbError> {
    let date_str = fields.meeting_date_str();

    let mut existing = match date_str.as_deref() {
        Some(date) => db.find_meeting_by_date(client_id, date)?,
        None => None,
    };
    if existing.is_none() {
        if let Some(transcript) = fields.transcript.as_deref().filter(|t| !t.is_empty()) {
            existing = db.find_meeting_by_transcript(client_id, transcript)?;
        }
    }

    match existing {
        Some(mut meeting) => {
            if let Some(seller) = fields.assigned_seller.clone() {
                meeting.assigned_seller = Some(seller);
            }
            if let Some(date) = date_str {
                meeting.meeting_date = Some(date);
            }
            if let Some(closed) = fields.closed {
                meeting.closed = closed;
            }
            if let Some(transcript) = fields.transcript.clone() {
                meeting.transcript = transcript;
            }
            db.update_meeting(&meeting)?;
            Ok((meeting, false))
        }
        None => {
            let meeting = db.insert_meeting(
                client_id,
                fields.assigned_seller.as_deref(),
                date_str.as_deref(),
                fields.closed.unwrap_or(false),
                fields.transcript.as_deref().unwrap_or_default(),
            )?;
            Ok((meeting, true))
        }
    }
}

/// Look up a single meeting by id.
pub fn get_meeting(db: &SalesDb, id: i64) -> Result<Option<DbMeeting>, DbError> {
    db.get_meeting(id)
}

/// Paged listing with a total count.
pub fn list_meetings(
    db: &SalesDb,
    skip: i64,
    limit: i64,
) -> Result<(Vec<DbMeeting>, i64), DbError> {
    let total = db.count_meetings()?;
    let items = db.list_meetings(skip, limit)?;
    Ok((items, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn db_with_client() -> (SalesDb, i64) {
        let db = SalesDb::open_in_memory().unwrap();
        let client = db.insert_client("Ana", None, None).unwrap();
        (db, client.id)
    }

    #[test]
    fn test_same_date_merges_into_one_meeting() {
        let (db, client_id) = db_with_client();
        let first = MeetingFields {
            meeting_date: Some(date(2024, 3, 1)),
            transcript: Some("primera versión".to_string()),
            closed: Some(false),
            ..Default::default()
        };
        let second = MeetingFields {
            meeting_date: Some(date(2024, 3, 1)),
            closed: Some(true),
            ..Default::default()
        };

        let (m1, created1) = upsert_meeting(&db, client_id, &first).unwrap();
        let (m2, created2) = upsert_meeting(&db, client_id, &second).unwrap();

        assert!(created1);
        assert!(!created2);
        assert_eq!(m1.id, m2.id);
        assert!(m2.closed);
        // Null transcript in the second row did not erase the first
        assert_eq!(m2.transcript, "primera versión");
        assert_eq!(db.count_meetings().unwrap(), 1);
    }

    #[test]
    fn test_identical_transcript_matches_without_date() {
        let (db, client_id) = db_with_client();
        let first = MeetingFields {
            transcript: Some("hola mundo".to_string()),
            ..Default::default()
        };
        let (m1, _) = upsert_meeting(&db, client_id, &first).unwrap();

        let second = MeetingFields {
            transcript: Some("hola mundo".to_string()),
            assigned_seller: Some("Carla".to_string()),
            ..Default::default()
        };
        let (m2, created) = upsert_meeting(&db, client_id, &second).unwrap();

        assert!(!created);
        assert_eq!(m1.id, m2.id);
        assert_eq!(m2.assigned_seller.as_deref(), Some("Carla"));
    }

    #[test]
    fn test_date_match_takes_priority_over_transcript() {
        let (db, client_id) = db_with_client();
        let dated = MeetingFields {
            meeting_date: Some(date(2024, 3, 1)),
            transcript: Some("a".to_string()),
            ..Default::default()
        };
        let undated = MeetingFields {
            transcript: Some("b".to_string()),
            ..Default::default()
        };
        let (m1, _) = upsert_meeting(&db, client_id, &dated).unwrap();
        let (m2, _) = upsert_meeting(&db, client_id, &undated).unwrap();
        assert_ne!(m1.id, m2.id);

        // Same date, different transcript: resolves to the dated meeting
        let incoming = MeetingFields {
            meeting_date: Some(date(2024, 3, 1)),
            transcript: Some("b".to_string()),
            ..Default::default()
        };
        let (m3, created) = upsert_meeting(&db, client_id, &incoming).unwrap();
        assert!(!created);
        assert_eq!(m3.id, m1.id);
        assert_eq!(m3.transcript, "b");
    }

    #[test]
    fn test_no_identifiers_always_creates_with_defaults() {
        let (db, client_id) = db_with_client();
        let (m1, created1) = upsert_meeting(&db, client_id, &MeetingFields::default()).unwrap();
        let (m2, created2) = upsert_meeting(&db, client_id, &MeetingFields::default()).unwrap();
        assert!(created1);
        assert!(created2);
        assert_ne!(m1.id, m2.id);
        assert!(!m1.closed);
        assert_eq!(m1.transcript, "");
    }

    #[test]
    fn test_list_meetings_pages_with_total() {
        let (db, client_id) = db_with_client();
        for i in 0..5 {
            let fields = MeetingFields {
                transcript: Some(format!("t{i}")),
                ..Default::default()
            };
            upsert_meeting(&db, client_id, &fields).unwrap();
        }

        let (page, total) = list_meetings(&db, 2, 2).unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].transcript, "t2");

        let first = get_meeting(&db, page[0].id).unwrap().unwrap();
        assert_eq!(first.transcript, "t2");
        assert!(get_meeting(&db, 999).unwrap().is_none());
    }

    #[test]
    fn test_matching_is_scoped_to_the_client() {
        let db = SalesDb::open_in_memory().unwrap();
        let ana = db.insert_client("Ana", None, None).unwrap();
        let luis = db.insert_client("Luis", None, None).unwrap();

        let fields = MeetingFields {
            meeting_date: Some(date(2024, 3, 1)),
            transcript: Some("t".to_string()),
            ..Default::default()
        };
        let (m1, _) = upsert_meeting(&db, ana.id, &fields).unwrap();
        let (m2, created) = upsert_meeting(&db, luis.id, &fields).unwrap();
        assert!(created);
        assert_ne!(m1.id, m2.id);
    }
}
