use rusqlite::params;

use super::*;

impl SalesDb {
    // =========================================================================
    // Clients
    // =========================================================================

    /// Insert a new client row.
    pub fn insert_client(
        &self,
        name: &str,
        email_hash: Option<String>,
        phone_hash: Option<String>,
    ) -> Result<DbClient, DbError> {
        self.conn.execute(
            "INSERT INTO clients (name, email_hash, phone_hash) VALUES (?1, ?2, ?3)",
            params![name, email_hash, phone_hash],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(DbClient {
            id,
            name: name.to_string(),
            email_hash,
            phone_hash,
        })
    }

    /// Look up a client by its identity key (name, email_hash).
    ///
    /// `IS` instead of `=` so an absent email hash matches stored NULL.
    /// Phone hash is deliberately not part of the key.
    pub fn find_client_by_identity(
        &self,
        name: &str,
        email_hash: Option<&str>,
    ) -> Result<Option<DbClient>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email_hash, phone_hash FROM clients
             WHERE name = ?1 AND email_hash IS ?2",
        )?;
        let mut rows = stmt.query_map(params![name, email_hash], map_client)?;
        match rows.next() {
            Some(Ok(client)) => Ok(Some(client)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    /// Overwrite a client's stored hashes. The resolver only calls this to
    /// backfill hashes that were previously absent.
    pub fn update_client_hashes(
        &self,
        id: i64,
        email_hash: Option<&str>,
        phone_hash: Option<&str>,
    ) -> Result<(), DbError> {
        self.conn.execute(
            "UPDATE clients SET email_hash = ?2, phone_hash = ?3 WHERE id = ?1",
            params![id, email_hash, phone_hash],
        )?;
        Ok(())
    }

    /// Look up a single client by id.
    pub fn get_client(&self, id: i64) -> Result<Option<DbClient>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email_hash, phone_hash FROM clients WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], map_client)?;
        match rows.next() {
            Some(Ok(client)) => Ok(Some(client)),
            Some(Err(e)) => Err(DbError::Sqlite(e)),
            None => Ok(None),
        }
    }

    /// All clients, ordered by id.
    pub fn list_all_clients(&self) -> Result<Vec<DbClient>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, email_hash, phone_hash FROM clients ORDER BY id",
        )?;
        let rows = stmt.query_map([], map_client)?;
        let mut clients = Vec::new();
        for row in rows {
            clients.push(row?);
        }
        Ok(clients)
    }

    /// Total number of clients.
    pub fn count_clients(&self) -> Result<i64, DbError> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))?)
    }
}

fn map_client(row: &rusqlite::Row<'_>) -> rusqlite::Result<DbClient> {
    Ok(DbClient {
        id: row.get(0)?,
        name: row.get(1)?,
        email_hash: row.get(2)?,
        phone_hash: row.get(3)?,
    })
}
