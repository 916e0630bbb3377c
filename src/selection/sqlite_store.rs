use log::info;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::store::SelectionBackend;
use crate::catalog::{builtin, CatalogEntry, CatalogKind, SelectionEntry};

/// SQLite-backed catalog and selection store.
pub struct SqliteSelectionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSelectionStore {
    /// Initialize store at ~/.qrpay/qrpay.db
    pub fn new() -> Result<Self, String> {
        let home = dirs::home_dir()
            .ok_or("Could not find home directory")?;
        Self::open(&home.join(".qrpay").join("qrpay.db"))
    }

    /// Open (creating if needed) the database at `db_path`.
    ///
    /// Creates the schema and seeds the built-in catalogs on first open.
    pub fn open(db_path: &Path) -> Result<Self, String> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| format!("Failed to create database directory: {}", e))?;
            }
        }

        let conn = Connection::open(db_path)
            .map_err(|e| format!("Failed to open database: {}", e))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize in-memory store for testing
    #[cfg(test)]
    pub fn new_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory()
            .map_err(|e| format!("Failed to open in-memory database: {}", e))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Drop a catalog entry, leaving any selections that reference it in place.
    #[cfg(test)]
    pub fn retire_entry(&self, kind: CatalogKind, id: &str) -> Result<(), String> {
        let conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;
        conn.execute(
            "DELETE FROM catalog_entries WHERE catalog = ?1 AND id = ?2",
            params![kind.as_str(), id],
        ).map_err(|e| format!("Failed to retire entry: {}", e))?;
        Ok(())
    }

    fn initialize_schema(&self) -> Result<(), String> {
        let conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;

        // No foreign key from selections to the catalog: a retired entry leaves
        // its selection rows behind and readers skip them.
        conn.execute_batch("
            CREATE TABLE IF NOT EXISTS catalog_entries (
                catalog TEXT NOT NULL,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                logo_ref TEXT,
                web_url TEXT NOT NULL,
                ios_scheme TEXT,
                android_scheme TEXT,
                ios_store_url TEXT,
                android_store_url TEXT,
                api_available INTEGER NOT NULL DEFAULT 0,
                position INTEGER NOT NULL,
                PRIMARY KEY (catalog, id)
            );

            CREATE TABLE IF NOT EXISTS user_selections (
                user_id TEXT NOT NULL,
                catalog TEXT NOT NULL,
                entry_id TEXT NOT NULL,
                priority INTEGER,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, catalog, entry_id)
            );

            CREATE INDEX IF NOT EXISTS idx_user_selections_user ON user_selections(user_id, catalog);
        ").map_err(|e| format!("Failed to create selection tables: {}", e))?;

        for kind in [CatalogKind::Payment, CatalogKind::Point] {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM catalog_entries WHERE catalog = ?1",
                params![kind.as_str()],
                |row| row.get(0),
            ).map_err(|e| format!("Failed to count catalog entries: {}", e))?;

            if count > 0 {
                continue;
            }

            for (position, entry) in builtin::entries(kind).iter().enumerate() {
                conn.execute(
                    "INSERT OR IGNORE INTO catalog_entries
                        (catalog, id, name, logo_ref, web_url, ios_scheme, android_scheme,
                         ios_store_url, android_store_url, api_available, position)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        kind.as_str(),
                        entry.id,
                        entry.name,
                        entry.logo_ref,
                        entry.web_url,
                        entry.ios_scheme,
                        entry.android_scheme,
                        entry.ios_store_url,
                        entry.android_store_url,
                        entry.api_available,
                        position as i64,
                    ],
                ).map_err(|e| format!("Failed to seed catalog: {}", e))?;
            }
            info!("Selection: seeded {} catalog", kind.as_str());
        }

        Ok(())
    }

    fn row_to_selection(row: &rusqlite::Row) -> rusqlite::Result<SelectionEntry> {
        let catalog: String = row.get(1)?;
        let catalog = CatalogKind::parse(&catalog).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, e.into())
        })?;
        Ok(SelectionEntry {
            user_id: row.get(0)?,
            catalog,
            entry_id: row.get(2)?,
            priority: row.get(3)?,
            is_active: row.get(4)?,
        })
    }
}

#[async_trait::async_trait]
impl SelectionBackend for SqliteSelectionStore {
    async fn list_catalog(&self, kind: CatalogKind) -> Result<Vec<CatalogEntry>, String> {
        let conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT id, name, logo_ref, web_url, ios_scheme, android_scheme,
                    ios_store_url, android_store_url, api_available
             FROM catalog_entries
             WHERE catalog = ?1
             ORDER BY position ASC"
        ).map_err(|e| format!("Failed to prepare catalog query: {}", e))?;

        let entries = stmt.query_map(params![kind.as_str()], |row| {
            Ok(CatalogEntry {
                id: row.get(0)?,
                name: row.get(1)?,
                logo_ref: row.get(2)?,
                web_url: row.get(3)?,
                ios_scheme: row.get(4)?,
                android_scheme: row.get(5)?,
                ios_store_url: row.get(6)?,
                android_store_url: row.get(7)?,
                api_available: row.get(8)?,
            })
        })
        .map_err(|e| format!("Failed to query catalog: {}", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("Failed to collect catalog: {}", e))?;

        Ok(entries)
    }

    async fn list_selections(
        &self,
        user_id: &str,
        kind: CatalogKind,
    ) -> Result<Vec<SelectionEntry>, String> {
        let conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT user_id, catalog, entry_id, priority, is_active
             FROM user_selections
             WHERE user_id = ?1 AND catalog = ?2
             ORDER BY rowid ASC"
        ).map_err(|e| format!("Failed to prepare selections query: {}", e))?;

        let rows = stmt.query_map(params![user_id, kind.as_str()], Self::row_to_selection)
            .map_err(|e| format!("Failed to query selections: {}", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("Failed to collect selections: {}", e))?;

        Ok(rows)
    }

    async fn upsert_selections(&self, rows: &[SelectionEntry]) -> Result<usize, String> {
        let mut conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;
        let now = chrono::Utc::now().to_rfc3339();

        let tx = conn.transaction()
            .map_err(|e| format!("Failed to begin transaction: {}", e))?;
        for row in rows {
            tx.execute(
                "INSERT INTO user_selections
                    (user_id, catalog, entry_id, priority, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(user_id, catalog, entry_id) DO UPDATE SET
                    priority = excluded.priority,
                    is_active = excluded.is_active,
                    updated_at = excluded.updated_at",
                params![
                    row.user_id,
                    row.catalog.as_str(),
                    row.entry_id,
                    row.priority,
                    row.is_active,
                    now,
                ],
            ).map_err(|e| format!("Failed to upsert selection: {}", e))?;
        }
        tx.commit()
            .map_err(|e| format!("Failed to commit selections: {}", e))?;

        Ok(rows.len())
    }

    async fn delete_selections(
        &self,
        user_id: &str,
        kind: CatalogKind,
        entry_ids: &[String],
    ) -> Result<usize, String> {
        let mut conn = self.conn.lock()
            .map_err(|e| format!("Failed to acquire lock: {}", e))?;

        let tx = conn.transaction()
            .map_err(|e| format!("Failed to begin transaction: {}", e))?;
        let mut removed = 0;
        for entry_id in entry_ids {
            removed += tx.execute(
                "DELETE FROM user_selections
                 WHERE user_id = ?1 AND catalog = ?2 AND entry_id = ?3",
                params![user_id, kind.as_str(), entry_id],
            ).map_err(|e| format!("Failed to delete selection: {}", e))?;
        }
        tx.commit()
            .map_err(|e| format!("Failed to commit deletions: {}", e))?;

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(user: &str, id: &str, priority: Option<i64>) -> SelectionEntry {
        SelectionEntry {
            user_id: user.to_string(),
            catalog: CatalogKind::Payment,
            entry_id: id.to_string(),
            priority,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_seeds_builtin_catalogs() {
        let store = SqliteSelectionStore::new_in_memory().unwrap();
        let payment = store.list_catalog(CatalogKind::Payment).await.unwrap();
        let point = store.list_catalog(CatalogKind::Point).await.unwrap();

        assert_eq!(payment, builtin::entries(CatalogKind::Payment));
        assert_eq!(point, builtin::entries(CatalogKind::Point));
    }

    #[tokio::test]
    async fn test_reopen_does_not_reseed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qrpay.db");

        let store = SqliteSelectionStore::open(&path).unwrap();
        store.retire_entry(CatalogKind::Payment, "6").unwrap();
        drop(store);

        let reopened = SqliteSelectionStore::open(&path).unwrap();
        let payment = reopened.list_catalog(CatalogKind::Payment).await.unwrap();
        assert_eq!(payment.len(), 5);
        assert!(payment.iter().all(|e| e.id != "6"));
    }

    #[tokio::test]
    async fn test_upsert_is_keyed_by_user_and_entry() {
        let store = SqliteSelectionStore::new_in_memory().unwrap();

        store.upsert_selections(&[row("u1", "1", Some(1)), row("u1", "2", Some(2))]).await.unwrap();
        store.upsert_selections(&[row("u1", "1", Some(2)), row("u1", "2", Some(1))]).await.unwrap();

        let rows = store.list_selections("u1", CatalogKind::Payment).await.unwrap();
        assert_eq!(rows.len(), 2, "upsert must not duplicate rows");
        let p1 = rows.iter().find(|r| r.entry_id == "1").unwrap().priority;
        let p2 = rows.iter().find(|r| r.entry_id == "2").unwrap().priority;
        assert_eq!((p1, p2), (Some(2), Some(1)));
    }

    #[tokio::test]
    async fn test_list_selections_keeps_fetch_order_and_nulls() {
        let store = SqliteSelectionStore::new_in_memory().unwrap();
        store.upsert_selections(&[
            row("u1", "3", None),
            row("u1", "1", Some(5)),
            row("u1", "2", None),
        ]).await.unwrap();

        let rows = store.list_selections("u1", CatalogKind::Payment).await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.entry_id.as_str()).collect();
        assert_eq!(ids, vec!["3", "1", "2"]);
        assert_eq!(rows[0].priority, None);
    }

    #[tokio::test]
    async fn test_selections_are_scoped_by_user_and_catalog() {
        let store = SqliteSelectionStore::new_in_memory().unwrap();
        let mut point_row = row("u1", "1", Some(1));
        point_row.catalog = CatalogKind::Point;

        store.upsert_selections(&[row("u1", "1", Some(1)), row("u2", "2", Some(1)), point_row])
            .await
            .unwrap();

        let u1 = store.list_selections("u1", CatalogKind::Payment).await.unwrap();
        assert_eq!(u1.len(), 1);
        assert_eq!(u1[0].entry_id, "1");
        let u1_points = store.list_selections("u1", CatalogKind::Point).await.unwrap();
        assert_eq!(u1_points.len(), 1);
        assert_eq!(u1_points[0].catalog, CatalogKind::Point);
    }

    #[tokio::test]
    async fn test_delete_selections_ignores_missing_rows() {
        let store = SqliteSelectionStore::new_in_memory().unwrap();
        store.upsert_selections(&[row("u1", "1", Some(1)), row("u1", "2", Some(2))]).await.unwrap();

        let removed = store
            .delete_selections("u1", CatalogKind::Payment, &["2".to_string(), "9".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let rows = store.list_selections("u1", CatalogKind::Payment).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entry_id, "1");
    }
}
