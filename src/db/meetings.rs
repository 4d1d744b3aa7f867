use rusqlite::params;

use super::*;

impl SalesDb {
    // =========================================================================
    // Meetings
    // =========================================================================

    /// Insert a new meeting row.
    pub fn insert_meeting(
        &self,
        client_id: i64,
        assigned_seller: Option<&str>,
        meeting_date: Option<&str>,
        closed: bool,
        transcript: &str,
    ) -> Result<DbMeeting, DbError> {
        self.conn.execute(
            "INSERT INTO meetings (client_id, assigned_seller, meeting_date, closed, transcript)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![client_id, assigned_seller, meeting_date, closed, transcript],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(DbMeeting {
            id,
            client_id,
            assigned_seller: assigned_seller.map(str::to_string),
            meeting_date: meeting_date.map(str::to_string),
            closed,
            transcript: transcript.to_string(),
        })
    }

    /// Find a client's meeting with this exact canonical date.
    pub fn find_meeting_by_date(
        &self,
        client_id: i64,
        meeting_date: &str,
    ) -> Result<Option<DbMeeting>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, assigned_seller, meeting_date, closed, transcript
             FROM meetings WHERE client_id = ?1 AND meeting_date = ?2",
        )?;
        let mut rows = stmt.query_map(params![client_id, meeting_date], map_meeting)?;
        first_row(&mut rows)
    }

    /// Find a client's meeting whose transcript is byte-identical.
    pub fn find_meeting_by_transcript(
        &self,
        client_id: i64,
        transcript: &str,
    ) -> Result<Option<DbMeeting>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, assigned_seller, meeting_date, closed, transcript
             FROM meetings WHERE client_id = ?1 AND transcript = ?2",
        )?;
        let mut rows = stmt.query_map(params![client_id, transcript], map_meeting)?;
        first_row(&mut rows)
    }

    /// Write back every mutable field of a merged meeting.
    pub fn update_meeting(&self, meeting: &DbMeeting) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE meetings
             SET assigned_seller = ?2, meeting_date = ?3, closed = ?4, transcript = ?5
             WHERE id = ?1",
            params![
                meeting.id,
                meeting.assigned_seller,
                meeting.meeting_date,
                meeting.closed,
                meeting.transcript
            ],
        )?;
        Ok(())
    }

    /// Look up a single meeting by id.
    pub fn get_meeting(&self, id: i64) -> Result<Option<DbMeeting>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, assigned_seller, meeting_date, closed, transcript
             FROM meetings WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], map_meeting)?;
        first_row(&mut rows)
    }

    /// A client's meetings, date order (dateless meetings first).
    pub fn meetings_for_client(&self, client_id: i64) -> Result<Vec<DbMeeting>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, assigned_seller, meeting_date, closed, transcript
             FROM meetings WHERE client_id = ?1 ORDER BY meeting_date, id",
        )?;
        let rows = stmt.query_map(params![client_id], map_meeting)?;
        collect_rows(rows)
    }

    /// Paged listing of all meetings, id order.
    pub fn list_meetings(&self, skip: i64, limit: i64) -> Result<Vec<DbMeeting>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, assigned_seller, meeting_date, closed, transcript
             FROM meetings ORDER BY id LIMIT ?1 OFFSET ?2",
        )?;
        let rows = stmt.query_map(params![limit, skip], map_meeting)?;
        collect_rows(rows)
    }

    /// Total number of meetings.
    pub fn count_meetings(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM meetings", [], |row| row.get(0))?)
    }

    /// The maximum meeting date present in the data, if any. Date-window
    /// filters anchor here rather than on wall-clock time so results are
    /// reproducible whenever the query runs.
    pub fn max_meeting_date(&self) -> Result<Option<String>, DbError> {
        Ok(self.conn.query_row(
            "SELECT MAX(meeting_date) FROM meetings WHERE meeting_date IS NOT NULL",
            [],
            |row| row.get(0),
        )?)
    }

    /// Every meeting joined with its classification (if any) — the full
    /// read shape the aggregation engine computes from.
    pub fn list_meeting_facts(&self) -> Result<Vec<MeetingFacts>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT m.id, m.client_id, m.assigned_seller, m.meeting_date, m.closed, m.transcript,
                    c.id, c.meeting_id, c.sentiment, c.urgency, c.budget_tier, c.buyer_role,
                    c.use_case, c.origin, c.automatization, c.pains, c.objections, c.competitors,
                    c.risks, c.next_step_clarity, c.fit_score, c.close_probability, c.summary
             FROM meetings m
             LEFT JOIN classifications c ON c.meeting_id = m.id
             ORDER BY m.id",
        )?;
        let rows = stmt.query_map([], |row| {
            let meeting = map_meeting(row)?;
            let classification = match row.get::<_, Option<i64>>(6)? {
                None => None,
                Some(id) => Some(DbClassification {
                    id,
                    meeting_id: row.get(7)?,
                    sentiment: row.get(8)?,
                    urgency: row.get(9)?,
                    budget_tier: row.get(10)?,
                    buyer_role: row.get(11)?,
                    use_case: row.get(12)?,
                    origin: row.get(13)?,
                    automatization: row.get(14)?,
                    pains: decode_list(row.get(15)?),
                    objections: decode_list(row.get(16)?),
                    competitors: decode_list(row.get(17)?),
                    risks: decode_list(row.get(18)?),
                    next_step_clarity: row.get(19)?,
                    fit_score: row.get(20)?,
                    close_probability: row.get(21)?,
                    summary: row.get(22)?,
                }),
            };
            Ok(MeetingFacts {
                meeting,
                classification,
            })
        })?;
        let mut facts = Vec::new();
        for row in rows {
            facts.push(row?);
        }
        Ok(facts)
    }
}

fn map_meeting(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbMeeting> {
    Ok(DbMeeting {
        id: row.get(0)?,
        client_id: row.get(1)?,
        assigned_seller: row.get(2)?,
        meeting_date: row.get(3)?,
        closed: row.get(4)?,
        transcript: row.get(5)?,
    })
}

fn first_row(
    rows: &mut dyn Iterator<Item = rusqlite::Result<DbMeeting>>,
) -> Result<Option<DbMeeting>, DbError> {
    match rows.next() {
        Some(Ok(meeting)) => Ok(Some(meeting)),
        Some(Err(e)) => Err(DbError::Sqlite(e)),
        None => Ok(None),
    }
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<DbMeeting>>,
) -> Result<Vec<DbMeeting>, DbError> {
    let mut meetings = Vec::new();
    for row in rows {
        meetings.push(row?);
    }
    Ok(meetings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_with_client() -> (SalesDb, i64) {
        let db = SalesDb::open_in_memory().unwrap();
        let client = db.insert_client("Ana", None, None).unwrap();
        (db, client.id)
    }

    #[test]
    fn test_find_by_date_is_scoped_to_client() {
        let (db, client_id) = db_with_client();
        let other = db.insert_client("Luis", None, None).unwrap();
        db.insert_meeting(other.id, None, Some("2024-01-15 00:00:00"), false, "a")
            .unwrap();

        assert!(db
            .find_meeting_by_date(client_id, "2024-01-15 00:00:00")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_find_by_transcript_is_exact() {
        let (db, client_id) = db_with_client();
        db.insert_meeting(client_id, None, None, false, "hola mundo")
            .unwrap();

        assert!(db
            .find_meeting_by_transcript(client_id, "hola mundo")
            .unwrap()
            .is_some());
        assert!(db
            .find_meeting_by_transcript(client_id, "Hola mundo")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_max_meeting_date_ignores_nulls() {
        let (db, client_id) = db_with_client();
        assert_eq!(db.max_meeting_date().unwrap(), None);

        db.insert_meeting(client_id, None, None, false, "a").unwrap();
        db.insert_meeting(client_id, None, Some("2024-03-01 10:00:00"), false, "b")
            .unwrap();
        db.insert_meeting(client_id, None, Some("2024-01-15 09:00:00"), false, "c")
            .unwrap();

        assert_eq!(
            db.max_meeting_date().unwrap().as_deref(),
            Some("2024-03-01 10:00:00")
        );
    }

    #[test]
    fn test_meeting_facts_join_includes_unclassified() {
        let (db, client_id) = db_with_client();
        db.insert_meeting(client_id, None, None, false, "a").unwrap();
        let facts = db.list_meeting_facts().unwrap();
        assert_eq!(facts.len(), 1);
        assert!(facts[0].classification.is_none());
    }
}
