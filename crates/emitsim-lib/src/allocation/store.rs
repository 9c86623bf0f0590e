//! Persistence of allocation tables.
//!
//! Every reservation is stored as one JSON record keyed by
//! `(table, resource, reservation key)`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::reservation::Reservation;
use crate::error::{Error, Result};

/// Keyed record store backing [`AllocationTable`](super::AllocationTable).
pub trait AllocationStore: Send + Sync {
    /// Insert or replace a single reservation record.
    fn save_reservation(&self, table: &str, resource: &str, reservation: &Reservation) -> Result<()>;

    /// Replace every record of a resource with `reservations`.
    fn replace_resource(&self, table: &str, resource: &str, reservations: &[Reservation]) -> Result<()>;

    /// All reservations stored for a resource.
    fn load_resource(&self, table: &str, resource: &str) -> Result<Vec<Reservation>>;

    /// Names of the resources holding at least one record in `table`.
    fn list_resources(&self, table: &str) -> Result<Vec<String>>;
}

fn decode(key: &str, record: &str) -> Result<Reservation> {
    serde_json::from_str(record).map_err(|err| Error::CorruptRecord {
        key: key.to_string(),
        message: err.to_string(),
    })
}

type RecordKey = (String, String, String);

/// In-process store, mostly for tests and single-run simulations.
#[derive(Debug, Default)]
pub struct MemoryAllocationStore {
    records: Mutex<BTreeMap<RecordKey, String>>,
}

impl MemoryAllocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AllocationStore for MemoryAllocationStore {
    fn save_reservation(&self, table: &str, resource: &str, reservation: &Reservation) -> Result<()> {
        let record = serde_json::to_string(reservation)?;
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(
            (table.to_string(), resource.to_string(), reservation.key()),
            record,
        );
        Ok(())
    }

    fn replace_resource(&self, table: &str, resource: &str, reservations: &[Reservation]) -> Result<()> {
        let encoded = reservations
            .iter()
            .map(|r| Ok((r.key(), serde_json::to_string(r)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.retain(|(t, r, _), _| !(t == table && r == resource));
        for (key, record) in encoded {
            records.insert((table.to_string(), resource.to_string(), key), record);
        }
        Ok(())
    }

    fn load_resource(&self, table: &str, resource: &str) -> Result<Vec<Reservation>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records
            .iter()
            .filter(|((t, r, _), _)| t == table && r == resource)
            .map(|((_, _, key), record)| decode(key, record))
            .collect()
    }

    fn list_resources(&self, table: &str) -> Result<Vec<String>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = records
            .keys()
            .filter(|(t, _, _)| t == table)
            .map(|(_, r, _)| r.clone())
            .collect();
        names.dedup();
        Ok(names)
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reservations (
    table_name TEXT NOT NULL,
    resource   TEXT NOT NULL,
    label      TEXT NOT NULL,
    record     TEXT NOT NULL,
    PRIMARY KEY (table_name, resource, label)
);";

/// SQLite-backed store.
pub struct SqliteAllocationStore {
    connection: Mutex<Connection>,
}

impl SqliteAllocationStore {
    pub fn open(path: &Path) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }
}

impl AllocationStore for SqliteAllocationStore {
    fn save_reservation(&self, table: &str, resource: &str, reservation: &Reservation) -> Result<()> {
        let record = serde_json::to_string(reservation)?;
        let connection = self.connection.lock().unwrap_or_else(|e| e.into_inner());
        connection.execute(
            "INSERT OR REPLACE INTO reservations (table_name, resource, label, record) VALUES (?1, ?2, ?3, ?4)",
            params![table, resource, reservation.key(), record],
        )?;
        Ok(())
    }

    fn replace_resource(&self, table: &str, resource: &str, reservations: &[Reservation]) -> Result<()> {
        let mut connection = self.connection.lock().unwrap_or_else(|e| e.into_inner());
        let tx = connection.transaction()?;
        tx.execute(
            "DELETE FROM reservations WHERE table_name = ?1 AND resource = ?2",
            params![table, resource],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO reservations (table_name, resource, label, record) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for reservation in reservations {
                let record = serde_json::to_string(reservation)?;
                stmt.execute(params![table, resource, reservation.key(), record])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_resource(&self, table: &str, resource: &str) -> Result<Vec<Reservation>> {
        let connection = self.connection.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = connection.prepare(
            "SELECT label, record FROM reservations WHERE table_name = ?1 AND resource = ?2 ORDER BY label",
        )?;
        let rows = stmt.query_map(params![table, resource], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut reservations = Vec::new();
        for row in rows {
            let (key, record) = row?;
            reservations.push(decode(&key, &record)?);
        }
        Ok(reservations)
    }

    fn list_resources(&self, table: &str) -> Result<Vec<String>> {
        let connection = self.connection.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = connection.prepare(
            "SELECT DISTINCT resource FROM reservations WHERE table_name = ?1 ORDER BY resource",
        )?;
        let rows = stmt.query_map(params![table], |row| row.get::<_, String>(0))?;
        let names = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(names)
    }
}
