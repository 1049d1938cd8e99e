// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`PersistentRegistry`]: the durable store of daemon and RAFS-instance
//! records (§1.4.A).
//!
//! Backed by a single SQLite connection behind a mutex. `rusqlite::Connection`
//! isn't `Sync`, and the registry's own contract only asks for atomicity
//! w.r.t. concurrent callers, not multi-reader concurrency, so one
//! serialized connection is sufficient — every public method runs its body
//! inside a single transaction.

use crate::error::{RegistryError, Result};
use crate::migration;
use crate::schema::CURRENT_SCHEMA_VERSION;
use fsman_core::{DaemonId, DaemonRecord, RafsInstance, SnapshotId};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::debug;

const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS daemons (
    id              TEXT PRIMARY KEY,
    data            TEXT NOT NULL,
    schema_version  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS instances (
    snapshot_id     TEXT PRIMARY KEY,
    data            TEXT NOT NULL,
    seq             INTEGER NOT NULL,
    schema_version  INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS seq_counter (
    id    INTEGER PRIMARY KEY CHECK (id = 0),
    value INTEGER NOT NULL
);
";

pub struct PersistentRegistry {
    conn: Mutex<Connection>,
}

impl PersistentRegistry {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA_DDL)?;
        conn.execute(
            "INSERT INTO seq_counter (id, value) VALUES (0, 0) ON CONFLICT(id) DO NOTHING",
            [],
        )?;

        let stored_version: Option<String> = conn
            .query_row("SELECT value FROM meta WHERE key = 'schema_version'", [], |row| row.get(0))
            .optional()?;

        match stored_version {
            Some(v) => {
                let found: u32 =
                    v.parse().map_err(|_| RegistryError::MigrationFailed(0, format!("unparseable schema_version {v}")))?;
                migration::migrate(&conn, found)?;
            }
            None => {
                // No meta row yet. A fresh store has no daemon rows either;
                // a store seeded directly with legacy rows (tests, or an
                // upgrade from a version that predates the `meta` table)
                // is treated as schema version 1.
                let has_legacy_rows: bool = conn
                    .query_row("SELECT EXISTS(SELECT 1 FROM daemons LIMIT 1)", [], |row| row.get(0))?;
                let found = if has_legacy_rows { 1 } else { CURRENT_SCHEMA_VERSION };
                migration::migrate(&conn, found)?;
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
                )?;
            }
        }

        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn add_daemon(&self, record: &DaemonRecord) -> Result<()> {
        let conn = self.conn.lock();
        let exists: bool =
            conn.query_row("SELECT EXISTS(SELECT 1 FROM daemons WHERE id = ?1)", [record.id.as_str()], |row| row.get(0))?;
        if exists {
            return Err(RegistryError::DaemonAlreadyExists(record.id.to_string()));
        }
        let data = serde_json::to_string(record)?;
        conn.execute(
            "INSERT INTO daemons (id, data, schema_version) VALUES (?1, ?2, ?3)",
            rusqlite::params![record.id.as_str(), data, CURRENT_SCHEMA_VERSION],
        )?;
        debug!(daemon_id = %record.id, "registry: added daemon");
        Ok(())
    }

    pub fn update_daemon(&self, record: &DaemonRecord) -> Result<()> {
        let conn = self.conn.lock();
        let data = serde_json::to_string(record)?;
        let rows = conn.execute(
            "UPDATE daemons SET data = ?2, schema_version = ?3 WHERE id = ?1",
            rusqlite::params![record.id.as_str(), data, CURRENT_SCHEMA_VERSION],
        )?;
        if rows == 0 {
            return Err(RegistryError::DaemonNotFound(record.id.to_string()));
        }
        Ok(())
    }

    /// Idempotent: deleting an already-absent daemon is not an error, since
    /// `destroy_daemon` (§1.4.D) may race a prior deletion.
    pub fn delete_daemon(&self, id: &DaemonId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM daemons WHERE id = ?1", [id.as_str()])?;
        Ok(())
    }

    pub fn walk_daemons(&self) -> Result<Vec<DaemonRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT data FROM daemons ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    pub fn add_rafs_instance(&self, instance: &RafsInstance) -> Result<()> {
        let conn = self.conn.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM instances WHERE snapshot_id = ?1)",
            [instance.snapshot_id.as_str()],
            |row| row.get(0),
        )?;
        if exists {
            return Err(RegistryError::InstanceAlreadyExists(instance.snapshot_id.to_string()));
        }
        let data = serde_json::to_string(instance)?;
        conn.execute(
            "INSERT INTO instances (snapshot_id, data, seq, schema_version) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![instance.snapshot_id.as_str(), data, instance.seq, CURRENT_SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Idempotent for the same reason [`Self::delete_daemon`] is.
    pub fn delete_rafs_instance(&self, snapshot_id: &SnapshotId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM instances WHERE snapshot_id = ?1", [snapshot_id.as_str()])?;
        Ok(())
    }

    pub fn walk_rafs_instances(&self) -> Result<Vec<RafsInstance>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT data FROM instances ORDER BY seq")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    /// Monotonic sequence number for a new RAFS instance, assigned once and
    /// never reused or mutated (§1.3 invariant on `seq`).
    pub fn next_instance_seq(&self) -> Result<u64> {
        let conn = self.conn.lock();
        next_seq_locked(&conn)
    }
}

pub(crate) fn next_seq_locked(conn: &Connection) -> Result<u64> {
    let seq: i64 = conn.query_row(
        "UPDATE seq_counter SET value = value + 1 WHERE id = 0 RETURNING value",
        [],
        |row| row.get(0),
    )?;
    Ok(seq as u64)
}
