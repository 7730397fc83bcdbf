// 📒 Category Ledger - append-only, tamper-evident history of screenings
//
// Every stored category gets a per-address revision (1, 2, 3, ...) and a
// SHA-256 link to the previous row of the same address. Rows are never
// updated or deleted; triggers reject both.

use crate::address::Address;
use crate::categories::RiskCategory;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// `prev_hash` of the first row for an address.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

// ============================================================================
// LEDGER CONTRACT
// ============================================================================

/// History-capable key/value store keyed by wallet address.
#[async_trait]
pub trait CategoryLedger: Send + Sync {
    /// Append all categories for `address` atomically: all rows or none.
    async fn write_batch(&self, address: &Address, categories: &[RiskCategory]) -> Result<(), StoreError>;

    /// All stored values with their revisions, oldest first. Both vectors
    /// have the same length.
    async fn read_history(&self, address: &Address) -> Result<(Vec<String>, Vec<u64>), StoreError>;
}

#[async_trait]
impl<L: CategoryLedger + ?Sized> CategoryLedger for Arc<L> {
    async fn write_batch(&self, address: &Address, categories: &[RiskCategory]) -> Result<(), StoreError> {
        (**self).write_batch(address, categories).await
    }

    async fn read_history(&self, address: &Address) -> Result<(Vec<String>, Vec<u64>), StoreError> {
        (**self).read_history(address).await
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// One row of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCategoryRecord {
    pub address: String,
    pub category: String,
    pub revision: u64,
    pub recorded_at: DateTime<Utc>,
    pub batch_id: String,
    pub prev_hash: String,
    pub entry_hash: String,
}

/// Audit event written once per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub address: String,
    pub data: serde_json::Value,
}

/// Outcome of re-computing the hash chain for an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChainVerification {
    Intact { entries: usize },
    Broken { revision: u64 },
}

/// Hash of one row, chained to the previous row of the same address.
pub fn compute_entry_hash(
    prev_hash: &str,
    address: &str,
    revision: u64,
    category: &str,
    recorded_at: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{prev_hash}|{address}|{revision}|{category}|{recorded_at}"));
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_ledger(conn: &Connection) -> Result<(), StoreError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS risk_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            address TEXT NOT NULL,
            revision INTEGER NOT NULL,
            category TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            prev_hash TEXT NOT NULL,
            entry_hash TEXT NOT NULL,
            UNIQUE (address, revision)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS ledger_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            address TEXT NOT NULL,
            data TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_risk_categories_address ON risk_categories(address, revision)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_events_address ON ledger_events(address)",
        [],
    )?;

    // append-only
    conn.execute_batch(
        "CREATE TRIGGER IF NOT EXISTS risk_categories_no_update
            BEFORE UPDATE ON risk_categories
            BEGIN SELECT RAISE(ABORT, 'risk_categories is append-only'); END;
         CREATE TRIGGER IF NOT EXISTS risk_categories_no_delete
            BEFORE DELETE ON risk_categories
            BEGIN SELECT RAISE(ABORT, 'risk_categories is append-only'); END;",
    )?;

    Ok(())
}

// ============================================================================
// SYNC OPERATIONS
// ============================================================================

/// Append `categories` for `address` inside one SQLite transaction.
/// Returns the revisions assigned, in order.
pub fn append_categories(
    conn: &mut Connection,
    address: &str,
    categories: &[String],
) -> Result<Vec<u64>, StoreError> {
    if categories.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;

    let last: Option<(i64, String)> = tx
        .query_row(
            "SELECT revision, entry_hash FROM risk_categories
             WHERE address = ?1 ORDER BY revision DESC LIMIT 1",
            params![address],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let (mut revision, mut prev_hash) = match last {
        Some((revision, hash)) => (revision as u64, hash),
        None => (0, GENESIS_HASH.to_string()),
    };

    let batch_id = uuid::Uuid::new_v4().to_string();
    let recorded_at = Utc::now().to_rfc3339();
    let mut assigned = Vec::with_capacity(categories.len());

    for category in categories {
        revision += 1;
        let entry_hash = compute_entry_hash(&prev_hash, address, revision, category, &recorded_at);

        tx.execute(
            "INSERT INTO risk_categories (
                address, revision, category, recorded_at, batch_id, prev_hash, entry_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                address,
                revision as i64,
                category,
                recorded_at,
                batch_id,
                prev_hash,
                entry_hash,
            ],
        )?;

        assigned.push(revision);
        prev_hash = entry_hash;
    }

    let data = serde_json::json!({
        "batch_id": batch_id,
        "categories": categories,
        "revisions": assigned,
    });
    tx.execute(
        "INSERT INTO ledger_events (event_id, timestamp, event_type, address, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            uuid::Uuid::new_v4().to_string(),
            recorded_at,
            "categories_screened",
            address,
            data.to_string(),
        ],
    )?;

    tx.commit()?;
    Ok(assigned)
}

/// Every row stored for `address`, oldest first.
pub fn get_records(conn: &Connection, address: &str) -> Result<Vec<StoredCategoryRecord>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT address, category, revision, recorded_at, batch_id, prev_hash, entry_hash
         FROM risk_categories
         WHERE address = ?1
         ORDER BY revision ASC",
    )?;

    let records = stmt
        .query_map(params![address], |row| {
            let revision: i64 = row.get(2)?;
            let recorded_at: String = row.get(3)?;

            Ok(StoredCategoryRecord {
                address: row.get(0)?,
                category: row.get(1)?,
                revision: revision as u64,
                recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                batch_id: row.get(4)?,
                prev_hash: row.get(5)?,
                entry_hash: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

/// Values and revisions for `address`, oldest first.
pub fn get_history(conn: &Connection, address: &str) -> Result<(Vec<String>, Vec<u64>), StoreError> {
    let mut stmt = conn.prepare(
        "SELECT category, revision FROM risk_categories
         WHERE address = ?1
         ORDER BY revision ASC",
    )?;

    let mut categories = Vec::new();
    let mut revisions = Vec::new();

    let rows = stmt.query_map(params![address], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (category, revision) = row?;
        categories.push(category);
        revisions.push(revision as u64);
    }

    Ok((categories, revisions))
}

/// Audit events for `address`, newest first.
pub fn get_events(conn: &Connection, address: &str) -> Result<Vec<LedgerEvent>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, address, data
         FROM ledger_events
         WHERE address = ?1
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![address], |row| {
            let timestamp: String = row.get(1)?;
            let data: String = row.get(4)?;

            Ok(LedgerEvent {
                event_id: row.get(0)?,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
                    })?
                    .with_timezone(&Utc),
                event_type: row.get(2)?,
                address: row.get(3)?,
                data: serde_json::from_str(&data).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
                })?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(events)
}

/// Recompute the hash chain for `address`.
pub fn verify_records(records: &[StoredCategoryRecord]) -> ChainVerification {
    let mut prev_hash = GENESIS_HASH.to_string();
    let mut expected_revision = 1;

    for record in records {
        let recorded_at = record.recorded_at.to_rfc3339();
        let expected = compute_entry_hash(
            &prev_hash,
            &record.address,
            record.revision,
            &record.category,
            &recorded_at,
        );

        if record.revision != expected_revision
            || record.prev_hash != prev_hash
            || record.entry_hash != expected
        {
            return ChainVerification::Broken {
                revision: record.revision,
            };
        }

        prev_hash = record.entry_hash.clone();
        expected_revision += 1;
    }

    ChainVerification::Intact {
        entries: records.len(),
    }
}

// ============================================================================
// SQLITE LEDGER
// ============================================================================

/// `CategoryLedger` on top of a single SQLite connection.
///
/// Queries run on the blocking thread pool so request tasks are not stalled.
#[derive(Clone)]
pub struct SqliteLedger {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLedger {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        setup_ledger(&conn)?;
        Ok(SqliteLedger {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut guard)
        })
        .await?
    }

    pub async fn records(&self, address: &Address) -> Result<Vec<StoredCategoryRecord>, StoreError> {
        let address = address.to_string();
        self.with_conn(move |conn| get_records(conn, &address)).await
    }

    pub async fn events(&self, address: &Address) -> Result<Vec<LedgerEvent>, StoreError> {
        let address = address.to_string();
        self.with_conn(move |conn| get_events(conn, &address)).await
    }

    pub async fn verify_chain(&self, address: &Address) -> Result<ChainVerification, StoreError> {
        let records = self.records(address).await?;
        let verification = verify_records(&records);
        if let ChainVerification::Broken { revision } = verification {
            warn!(address = %address, revision, "ledger hash chain broken");
        }
        Ok(verification)
    }
}

#[async_trait]
impl CategoryLedger for SqliteLedger {
    async fn write_batch(&self, address: &Address, categories: &[RiskCategory]) -> Result<(), StoreError> {
        let owned = address.to_string();
        let values: Vec<String> = categories.iter().map(|c| c.as_str().to_string()).collect();

        let revisions = self
            .with_conn(move |conn| append_categories(conn, &owned, &values))
            .await?;

        debug!(address = %address, ?revisions, "stored risk categories");
        Ok(())
    }

    async fn read_history(&self, address: &Address) -> Result<(Vec<String>, Vec<u64>), StoreError> {
        let address = address.to_string();
        self.with_conn(move |conn| get_history(conn, &address)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "0xE9e9afac38e64728f1afbb2b65dec7be7c704c05";

    fn address() -> Address {
        Address::parse(ADDRESS).unwrap()
    }

    fn categories(names: &[&str]) -> Vec<RiskCategory> {
        names.iter().map(|n| RiskCategory::new(*n)).collect()
    }

    #[test]
    fn test_append_assigns_revisions_from_one() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_ledger(&conn).unwrap();

        let first = append_categories(&mut conn, ADDRESS, &["Banned".into(), "Scam".into()]).unwrap();
        let second = append_categories(&mut conn, ADDRESS, &["Banned".into()]).unwrap();
        let other = append_categories(&mut conn, "0xother", &["Mixer".into()]).unwrap();

        assert_eq!(first, vec![1, 2]);
        assert_eq!(second, vec![3]);
        assert_eq!(other, vec![1], "revisions are per address");
    }

    #[test]
    fn test_empty_batch_writes_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_ledger(&conn).unwrap();

        assert!(append_categories(&mut conn, ADDRESS, &[]).unwrap().is_empty());
        assert!(get_records(&conn, ADDRESS).unwrap().is_empty());
        assert!(get_events(&conn, ADDRESS).unwrap().is_empty());
    }

    #[test]
    fn test_rows_cannot_be_changed() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_ledger(&conn).unwrap();
        append_categories(&mut conn, ADDRESS, &["Banned".into()]).unwrap();

        assert!(conn
            .execute("UPDATE risk_categories SET category = 'Clean'", [])
            .is_err());
        assert!(conn.execute("DELETE FROM risk_categories", []).is_err());
        assert_eq!(get_history(&conn, ADDRESS).unwrap().0, vec!["Banned"]);
    }

    #[test]
    fn test_batch_is_atomic() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_ledger(&conn).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER reject_poison BEFORE INSERT ON risk_categories
             WHEN NEW.category = 'Poison'
             BEGIN SELECT RAISE(ABORT, 'poison'); END;",
        )
        .unwrap();

        let result = append_categories(&mut conn, ADDRESS, &["Banned".into(), "Poison".into()]);

        assert!(result.is_err());
        assert!(get_records(&conn, ADDRESS).unwrap().is_empty(), "no partial batch");
        assert!(get_events(&conn, ADDRESS).unwrap().is_empty());
    }

    #[test]
    fn test_hash_chain_detects_tampering() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_ledger(&conn).unwrap();
        append_categories(&mut conn, ADDRESS, &["Banned".into(), "Scam".into()]).unwrap();
        append_categories(&mut conn, ADDRESS, &["Mixer".into()]).unwrap();

        let records = get_records(&conn, ADDRESS).unwrap();
        assert_eq!(records[0].prev_hash, GENESIS_HASH);
        assert_eq!(records[1].prev_hash, records[0].entry_hash);
        assert_eq!(verify_records(&records), ChainVerification::Intact { entries: 3 });

        // someone bypasses the triggers and rewrites history
        conn.execute_batch("DROP TRIGGER risk_categories_no_update;").unwrap();
        conn.execute(
            "UPDATE risk_categories SET category = 'Clean' WHERE revision = 2",
            [],
        )
        .unwrap();

        let records = get_records(&conn, ADDRESS).unwrap();
        assert_eq!(verify_records(&records), ChainVerification::Broken { revision: 2 });
    }

    #[test]
    fn test_event_log() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_ledger(&conn).unwrap();
        append_categories(&mut conn, ADDRESS, &["Banned".into()]).unwrap();

        let events = get_events(&conn, ADDRESS).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "categories_screened");
        assert_eq!(events[0].data["revisions"], serde_json::json!([1]));
    }

    #[tokio::test]
    async fn test_sqlite_ledger_history() {
        let ledger = SqliteLedger::open_in_memory().unwrap();
        let address = address();

        let (values, revisions) = ledger.read_history(&address).await.unwrap();
        assert!(values.is_empty() && revisions.is_empty());

        ledger.write_batch(&address, &categories(&["Banned", "Scam"])).await.unwrap();
        ledger.write_batch(&address, &categories(&["Banned", "Scam"])).await.unwrap();

        let (values, revisions) = ledger.read_history(&address).await.unwrap();
        assert_eq!(values, vec!["Banned", "Scam", "Banned", "Scam"]);
        assert_eq!(revisions, vec![1, 2, 3, 4]);

        assert_eq!(
            ledger.verify_chain(&address).await.unwrap(),
            ChainVerification::Intact { entries: 4 }
        );
        assert_eq!(ledger.events(&address).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_ledger_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let address = address();

        {
            let ledger = SqliteLedger::open(&path).unwrap();
            ledger.write_batch(&address, &categories(&["Banned"])).await.unwrap();
        }

        let reopened = SqliteLedger::open(&path).unwrap();
        reopened.write_batch(&address, &categories(&["Scam"])).await.unwrap();

        let (values, revisions) = reopened.read_history(&address).await.unwrap();
        assert_eq!(values, vec!["Banned", "Scam"]);
        assert_eq!(revisions, vec![1, 2]);
    }
}
