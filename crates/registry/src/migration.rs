// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot legacy-schema migration, run at most once on first open of a
//! pre-existing store (§1.4.A).

use crate::error::{RegistryError, Result};
use crate::schema::{self, LegacyDaemonRowV1, CURRENT_SCHEMA_VERSION};
use fsman_core::{DaemonRecord, RafsInstance};
use rusqlite::Connection;
use tracing::info;

/// Reads every `schema_version = 1` daemon row, splits it per
/// [`schema::split_legacy_row`], and rewrites the store at
/// [`CURRENT_SCHEMA_VERSION`]. Runs inside the caller's transaction.
pub fn migrate(conn: &Connection, found_version: u32) -> Result<()> {
    if found_version == CURRENT_SCHEMA_VERSION {
        return Ok(());
    }
    if found_version > CURRENT_SCHEMA_VERSION {
        return Err(RegistryError::SchemaTooNew { found: found_version, supported: CURRENT_SCHEMA_VERSION });
    }
    // Only one legacy version has ever shipped; a gap here means a store
    // written by a version of this binary we don't know how to read forward.
    if found_version != 1 {
        return Err(RegistryError::MigrationFailed(
            found_version,
            format!("no migration path from schema version {found_version}"),
        ));
    }

    let mut stmt = conn.prepare("SELECT data FROM daemons WHERE schema_version = 1")?;
    let legacy_rows: Vec<String> =
        stmt.query_map([], |row| row.get::<_, String>(0))?.collect::<std::result::Result<_, _>>()?;
    drop(stmt);

    let mut migrated_daemons: Vec<DaemonRecord> = Vec::new();
    let mut migrated_instances: Vec<RafsInstance> = Vec::new();

    for raw in legacy_rows {
        let legacy: LegacyDaemonRowV1 = serde_json::from_str(&raw)
            .map_err(|e| RegistryError::MigrationFailed(1, e.to_string()))?;
        let (daemon, instances) = schema::split_legacy_row(legacy);
        migrated_daemons.push(daemon);
        migrated_instances.extend(instances);
    }

    conn.execute("DELETE FROM daemons WHERE schema_version = 1", [])?;

    for daemon in &migrated_daemons {
        let data = serde_json::to_string(daemon)?;
        conn.execute(
            "INSERT INTO daemons (id, data, schema_version) VALUES (?1, ?2, ?3)",
            rusqlite::params![daemon.id.as_str(), data, CURRENT_SCHEMA_VERSION],
        )?;
    }

    for instance in &migrated_instances {
        let seq = crate::registry::next_seq_locked(conn)?;
        let mut instance = instance.clone();
        instance.seq = seq;
        let data = serde_json::to_string(&instance)?;
        conn.execute(
            "INSERT INTO instances (snapshot_id, data, seq, schema_version) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![instance.snapshot_id.as_str(), data, seq, CURRENT_SCHEMA_VERSION],
        )?;
    }

    conn.execute(
        "INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        rusqlite::params![CURRENT_SCHEMA_VERSION.to_string()],
    )?;

    info!(
        daemons = migrated_daemons.len(),
        instances = migrated_instances.len(),
        from_version = found_version,
        to_version = CURRENT_SCHEMA_VERSION,
        "migrated legacy registry store"
    );

    Ok(())
}
