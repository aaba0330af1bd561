//! Database schema management.

use std::collections::HashSet;

use rusqlite::Connection;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "Servers" (
    "Id" TEXT PRIMARY KEY,
    "Name" TEXT,
    "Address" TEXT,
    "Port" INTEGER,
    "Status" TEXT,
    "UpdatedAt" TEXT
);

CREATE INDEX IF NOT EXISTS idx_servers_status ON "Servers"("Status");
"#;

/// Column names of the server table, as currently defined in the database.
pub fn table_columns(conn: &Connection) -> rusqlite::Result<HashSet<String>> {
    let mut stmt = conn.prepare(r#"SELECT name FROM pragma_table_info('Servers')"#)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(columns)
}

/// Quote an identifier for SQLite.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_table_columns() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let columns = table_columns(&conn).unwrap();
        for name in ["Id", "Name", "Address", "Port", "Status", "UpdatedAt"] {
            assert!(columns.contains(name), "missing column {}", name);
        }
        assert_eq!(columns.len(), 6);
    }

    #[test]
    fn test_table_columns_sees_added_columns() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(r#"ALTER TABLE "Servers" ADD COLUMN "Region" TEXT"#)
            .unwrap();

        assert!(table_columns(&conn).unwrap().contains("Region"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("Name"), "\"Name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
