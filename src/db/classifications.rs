use std::collections::BTreeSet;

use rusqlite::params;

use super::*;
use crate::types::ClassificationPayload;

impl SalesDb {
    // =========================================================================
    // Classifications
    // =========================================================================

    /// The classification owned by a meeting, if one exists.
    pub fn get_classification_for_meeting(
        &self,
        meeting_id: i64,
    ) -> Result<Option<DbClassification>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_CLASSIFICATION} WHERE meeting_id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![meeting_id], map_classification)?;
        match rows.next() {
            Some(Ok(c)) => Ok(Some(c)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    /// Create-or-overwrite the classification for a meeting.
    ///
    /// The UNIQUE(meeting_id) constraint resolves concurrent writers: the
    /// conflict path field-copies over the existing row, so the last commit
    /// wins and no duplicate is ever created.
    pub fn upsert_classification(
        &self,
        meeting_id: i64,
        payload: &ClassificationPayload,
    ) -> Result<DbClassification, DbError> {
        self.conn.execute(
            "INSERT INTO classifications (
                 meeting_id, sentiment, urgency, budget_tier, buyer_role, use_case,
                 origin, automatization, pains, objections, competitors, risks,
                 next_step_clarity, fit_score, close_probability, summary
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
             ON CONFLICT (meeting_id) DO UPDATE SET
                 sentiment = excluded.sentiment,
                 urgency = excluded.urgency,
                 budget_tier = excluded.budget_tier,
                 buyer_role = excluded.buyer_role,
                 use_case = excluded.use_case,
                 origin = excluded.origin,
                 automatization = excluded.automatization,
                 pains = excluded.pains,
                 objections = excluded.objections,
                 competitors = excluded.competitors,
                 risks = excluded.risks,
                 next_step_clarity = excluded.next_step_clarity,
                 fit_score = excluded.fit_score,
                 close_probability = excluded.close_probability,
                 summary = excluded.summary",
            params![
                meeting_id,
                payload.sentiment,
                payload.urgency,
                payload.budget_tier,
                payload.buyer_role,
                payload.use_case,
                payload.origin,
                payload.automatization,
                encode_list(&payload.pains),
                encode_list(&payload.objections),
                encode_list(&payload.competitors),
                encode_list(&payload.risks),
                payload.next_step_clarity,
                payload.fit_score,
                payload.close_probability,
                payload.summary,
            ],
        )?;
        self.get_classification_for_meeting(meeting_id)?
            .ok_or_else(|| {
                DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows)
            })
    }

    /// Paged listing of all classifications, id order.
    pub fn list_classifications(
        &self,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<DbClassification>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "{SELECT_CLASSIFICATION} ORDER BY id LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![limit, skip], map_classification)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    /// Total number of classifications.
    pub fn count_classifications(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM classifications", [], |row| row.get(0))?)
    }

    /// The sorted distinct set of non-empty pain labels across all
    /// classifications. Fed back into the classifier prompt so the label
    /// taxonomy self-reinforces over successive calls.
    pub fn distinct_pains(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare("SELECT pains FROM classifications")?;
        let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;
        let mut labels = BTreeSet::new();
        for row in rows {
            for pain in decode_list(row?) {
                if !pain.is_empty() {
                    labels.insert(pain);
                }
            }
        }
        Ok(labels.into_iter().collect())
    }
}

const SELECT_CLASSIFICATION: &str =
    "SELECT id, meeting_id, sentiment, urgency, budget_tier, buyer_role, use_case,
            origin, automatization, pains, objections, competitors, risks,
            next_step_clarity, fit_score, close_probability, summary
     FROM classifications";

fn map_classification(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbClassification> {
    Ok(DbClassification {
        id: row.get(0)?,
        meeting_id: row.get(1)?,
        sentiment: row.get(2)?,
        urgency: row.get(3)?,
        budget_tier: row.get(4)?,
        buyer_role: row.get(5)?,
        use_case: row.get(6)?,
        origin: row.get(7)?,
        automatization: row.get(8)?,
        pains: decode_list(row.get(9)?),
        objections: decode_list(row.get(10)?),
        competitors: decode_list(row.get(11)?),
        risks: decode_list(row.get(12)?),
        next_step_clarity: row.get(13)?,
        fit_score: row.get(14)?,
        close_probability: row.get(15)?,
        summary: row.get(16)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(pains: &[&str]) -> ClassificationPayload {
        ClassificationPayload {
            sentiment: 1,
            urgency: 2,
            budget_tier: Some("Medium".to_string()),
            buyer_role: None,
            use_case: Some("Ventas".to_string()),
            origin: Some("Web".to_string()),
            automatization: Some(false),
            pains: pains.iter().map(|p| p.to_string()).collect(),
            objections: vec![],
            competitors: vec![],
            risks: vec![],
            next_step_clarity: Some(1),
            fit_score: 0.7,
            close_probability: 0.4,
            summary: None,
        }
    }

    fn db_with_meeting() -> (SalesDb, i64) {
        let db = SalesDb::open_in_memory().unwrap();
        let client = db.insert_client("Ana", None, None).unwrap();
        let meeting = db.insert_meeting(client.id, None, None, false, "t").unwrap();
        (db, meeting.id)
    }

    #[test]
    fn test_upsert_overwrites_instead_of_duplicating() {
        let (db, meeting_id) = db_with_meeting();
        let first = db.upsert_classification(meeting_id, &payload(&["a"])).unwrap();

        let mut second_payload = payload(&["b"]);
        second_payload.sentiment = -1;
        let second = db.upsert_classification(meeting_id, &second_payload).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.sentiment, -1);
        assert_eq!(second.pains, vec!["b".to_string()]);
        assert_eq!(db.count_classifications().unwrap(), 1);
    }

    #[test]
    fn test_distinct_pains_sorted_and_deduped() {
        let db = SalesDb::open_in_memory().unwrap();
        let client = db.insert_client("Ana", None, None).unwrap();
        for (i, pains) in [&["b", "a"][..], &["a", ""][..]].iter().enumerate() {
            let meeting = db
                .insert_meeting(client.id, None, None, false, &format!("t{i}"))
                .unwrap();
            db.upsert_classification(meeting.id, &payload(pains)).unwrap();
        }

        assert_eq!(
            db.distinct_pains().unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
