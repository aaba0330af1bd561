//! SQLite-backed server store.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::params_from_iter;
use serde_json::Map;
use tokio_rusqlite::Connection;
use tracing::debug;

use horizon_protocols::record::ID_FIELD;
use horizon_protocols::{ServerRecord, ServerStore, SnapshotProvider, StoreError};

use crate::schema::{init_schema, quote_ident, table_columns};
use crate::value::{to_json, to_sql};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Server dataset persisted in a SQLite `Servers` table.
pub struct SqliteServerStore {
    conn: Connection,
}

impl SqliteServerStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::init(conn).await
    }

    /// Open (or create) a file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        debug!("Opening server store at {}", path.display());
        let conn = Connection::open(path)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.call(|conn| Ok(init_schema(conn)?))
            .await
            .map_err(map_call_error)?;
        Ok(Self { conn })
    }

    /// Close the underlying connection.
    pub async fn close(self) -> Result<(), StoreError> {
        self.conn
            .close()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

/// A closed connection means the store is gone; anything else is a failed statement.
fn map_call_error(err: tokio_rusqlite::Error) -> StoreError {
    match err {
        tokio_rusqlite::Error::ConnectionClosed => {
            StoreError::Unavailable("connection closed".to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

#[async_trait]
impl SnapshotProvider for SqliteServerStore {
    async fn fetch_snapshot(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let rows = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(r#"SELECT * FROM "Servers" ORDER BY "Id""#)?;
                let names: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();

                let rows = stmt
                    .query_map([], |row| {
                        let mut fields = Map::with_capacity(names.len());
                        for (idx, name) in names.iter().enumerate() {
                            fields.insert(name.clone(), to_json(row.get_ref(idx)?));
                        }
                        Ok(ServerRecord::from(fields))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(map_call_error)?;

        debug!("Fetched {} server rows", rows.len());
        Ok(rows)
    }
}

#[async_trait]
impl ServerStore for SqliteServerStore {
    async fn upsert(&self, record: &ServerRecord) -> Result<(), StoreError> {
        let id = match record.get(ID_FIELD) {
            Some(value) if value.is_string() => value.clone(),
            Some(_) => {
                return Err(StoreError::InvalidRecord(format!(
                    "field '{}' must be a string",
                    ID_FIELD
                )));
            }
            None => {
                return Err(StoreError::InvalidRecord(format!(
                    "missing field '{}'",
                    ID_FIELD
                )));
            }
        };

        let mut columns = vec![ID_FIELD.to_string()];
        let mut values = vec![to_sql(&id)];
        for (field, value) in record.fields().filter(|(field, _)| *field != ID_FIELD) {
            columns.push(field.clone());
            values.push(to_sql(value));
        }

        self.conn
            .call(move |conn| {
                let known = table_columns(conn)?;
                if let Some(unknown) = columns.iter().find(|c| !known.contains(c.as_str())) {
                    return Ok(Err(StoreError::InvalidRecord(format!(
                        "unknown column '{}'",
                        unknown
                    ))));
                }

                conn.execute(&upsert_sql(&columns), params_from_iter(values.iter()))?;
                Ok(Ok(()))
            })
            .await
            .map_err(map_call_error)?
    }

    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let deleted = self
            .conn
            .call(move |conn| {
                let changes = conn.execute(r#"DELETE FROM "Servers" WHERE "Id" = ?1"#, [&id])?;
                Ok(changes > 0)
            })
            .await
            .map_err(map_call_error)?;

        Ok(deleted)
    }
}

/// Build the `INSERT ... ON CONFLICT` statement for the given columns.
///
/// `columns[0]` is the key column.
fn upsert_sql(columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

    let on_conflict = if quoted.len() > 1 {
        let updates: Vec<String> = quoted[1..]
            .iter()
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        format!("DO UPDATE SET {}", updates.join(", "))
    } else {
        "DO NOTHING".to_string()
    };

    format!(
        r#"INSERT INTO "Servers" ({}) VALUES ({}) ON CONFLICT({}) {}"#,
        quoted.join(", "),
        placeholders.join(", "),
        quoted[0],
        on_conflict
    )
}
