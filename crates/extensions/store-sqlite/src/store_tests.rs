use super::*;
use serde_json::{Value, json};

fn server(id: &str, name: &str, port: i64) -> ServerRecord {
    ServerRecord::new()
        .with("Id", json!(id))
        .with("Name", json!(name))
        .with("Address", json!("10.0.0.1"))
        .with("Port", json!(port))
        .with("Status", json!("online"))
}

#[tokio::test]
async fn test_empty_snapshot() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    let rows = store.fetch_snapshot().await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_upsert_and_snapshot() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    store.upsert(&server("srv-2", "beta", 8080)).await.unwrap();
    store.upsert(&server("srv-1", "alpha", 25565)).await.unwrap();

    let rows = store.fetch_snapshot().await.unwrap();
    assert_eq!(rows.len(), 2);

    // Ordered by Id, every column present
    assert_eq!(rows[0].id(), Some("srv-1"));
    assert_eq!(rows[0].get("Name"), Some(&json!("alpha")));
    assert_eq!(rows[0].get("Port"), Some(&json!(25565)));
    assert_eq!(rows[0].get("UpdatedAt"), Some(&Value::Null));
    assert_eq!(rows[0].len(), 6);
    assert_eq!(rows[1].id(), Some("srv-2"));
}

#[tokio::test]
async fn test_upsert_updates_existing_row() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    store.upsert(&server("srv-1", "alpha", 25565)).await.unwrap();

    let partial = ServerRecord::new()
        .with("Id", json!("srv-1"))
        .with("Status", json!("offline"));
    store.upsert(&partial).await.unwrap();

    let rows = store.fetch_snapshot().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Status"), Some(&json!("offline")));
    // Columns not named in the update keep their values
    assert_eq!(rows[0].get("Name"), Some(&json!("alpha")));
}

#[tokio::test]
async fn test_upsert_id_only() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    let bare = ServerRecord::new().with("Id", json!("srv-1"));
    store.upsert(&bare).await.unwrap();
    store.upsert(&bare).await.unwrap();

    let rows = store.fetch_snapshot().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Name"), Some(&Value::Null));
}

#[tokio::test]
async fn test_upsert_missing_id() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    let record = ServerRecord::new().with("Name", json!("alpha"));

    let err = store.upsert(&record).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord(_)));
}

#[tokio::test]
async fn test_upsert_non_string_id() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    let record = ServerRecord::new().with("Id", json!(7));

    let err = store.upsert(&record).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidRecord(_)));
}

#[tokio::test]
async fn test_upsert_unknown_column() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    let record = server("srv-1", "alpha", 1).with("Region", json!("eu"));

    let err = store.upsert(&record).await.unwrap_err();
    match err {
        StoreError::InvalidRecord(msg) => assert!(msg.contains("Region")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(store.fetch_snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    store.upsert(&server("srv-1", "alpha", 1)).await.unwrap();

    assert!(store.remove("srv-1").await.unwrap());
    assert!(!store.remove("srv-1").await.unwrap());
    assert!(store.fetch_snapshot().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_maps_column_types() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    store
        .conn
        .call(|conn| {
            conn.execute_batch(
                r#"ALTER TABLE "Servers" ADD COLUMN "Load" REAL;
                   ALTER TABLE "Servers" ADD COLUMN "Icon" BLOB;
                   INSERT INTO "Servers" ("Id", "Load", "Icon") VALUES ('srv-1', 0.75, x'0102');"#,
            )?;
            Ok(())
        })
        .await
        .unwrap();

    let rows = store.fetch_snapshot().await.unwrap();
    assert_eq!(rows[0].get("Load"), Some(&json!(0.75)));
    assert_eq!(rows[0].get("Icon"), Some(&json!([1, 2])));
}

#[tokio::test]
async fn test_added_column_accepted_by_upsert() {
    let store = SqliteServerStore::in_memory().await.unwrap();
    store
        .conn
        .call(|conn| {
            conn.execute_batch(r#"ALTER TABLE "Servers" ADD COLUMN "Region" TEXT"#)?;
            Ok(())
        })
        .await
        .unwrap();

    let record = server("srv-1", "alpha", 1).with("Region", json!("eu"));
    store.upsert(&record).await.unwrap();

    let rows = store.fetch_snapshot().await.unwrap();
    assert_eq!(rows[0].get("Region"), Some(&json!("eu")));
}

#[tokio::test]
async fn test_file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("servers.db");

    let store = SqliteServerStore::open(&path).await.unwrap();
    store.upsert(&server("srv-1", "alpha", 1)).await.unwrap();
    store.close().await.unwrap();

    let reopened = SqliteServerStore::open(&path).await.unwrap();
    let rows = reopened.fetch_snapshot().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Name"), Some(&json!("alpha")));
}

#[tokio::test]
async fn test_open_unreachable_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("servers.db");

    let result = SqliteServerStore::open(&path).await;
    assert!(matches!(result, Err(StoreError::Unavailable(_))));
}

#[test]
fn test_upsert_sql() {
    let columns = vec!["Id".to_string(), "Name".to_string()];
    assert_eq!(
        upsert_sql(&columns),
        r#"INSERT INTO "Servers" ("Id", "Name") VALUES (?1, ?2) ON CONFLICT("Id") DO UPDATE SET "Name" = excluded."Name""#
    );

    let id_only = vec!["Id".to_string()];
    assert!(upsert_sql(&id_only).ends_with("DO NOTHING"));
}
