//! Repository for the `transforms` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

/// A raw transform row. `file_uris` and `status` hold JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformRow {
    pub hash: String,
    pub request_id: String,
    pub title: Option<String>,
    pub codegen: String,
    pub data_dir: String,
    pub file_uris: String,
    pub status: String,
    pub created_at: String,
}

impl TransformRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            hash: row.get("hash")?,
            request_id: row.get("request_id")?,
            title: row.get("title")?,
            codegen: row.get("codegen")?,
            data_dir: row.get("data_dir")?,
            file_uris: row.get("file_uris")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Writes a row, replacing any existing row with the same hash.
pub fn insert_or_replace(db: &Database, row: &TransformRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO transforms
             (hash, request_id, title, codegen, data_dir, file_uris, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.hash,
                row.request_id,
                row.title,
                row.codegen,
                row.data_dir,
                row.file_uris,
                row.status,
                row.created_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_hash(db: &Database, hash: &str) -> Result<Option<TransformRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM transforms WHERE hash = ?1")?;
        let mut rows = stmt.query_map(params![hash], TransformRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// All rows, newest first.
pub fn list_all(db: &Database) -> Result<Vec<TransformRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM transforms ORDER BY created_at DESC, hash")?;
        let rows = stmt
            .query_map([], TransformRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes every row, returning how many were removed.
pub fn delete_all(db: &Database) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| Ok(conn.execute("DELETE FROM transforms", [])?))
}
