//! Schema versioning for the onboarding store.
//!
//! Applied versions are recorded in `_migrations`. Each pending step runs in
//! its own transaction together with its version record, so a failed step
//! leaves the schema at the previous version.

use libsql::{Connection, params};
use tracing::{debug, info};

use crate::error::StoreError;

struct Step {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Ordered schema steps. Append only.
const STEPS: &[Step] = &[Step {
    version: 1,
    name: "settings_store",
    sql: "CREATE TABLE IF NOT EXISTS settings (
              user_id TEXT NOT NULL,
              key TEXT NOT NULL,
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL DEFAULT (datetime('now')),
              PRIMARY KEY (user_id, key)
          );",
}];

/// Bring the schema up to the newest step.
pub async fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| StoreError::Migration(format!("create _migrations: {e}")))?;

    let applied = schema_version(conn).await?;
    let pending = STEPS.iter().filter(|s| s.version > applied);

    for step in pending {
        info!(version = step.version, name = step.name, "Applying schema step");
        apply(conn, step).await?;
    }

    let version = schema_version(conn).await?;
    debug!(version, "Onboarding schema ready");
    Ok(())
}

async fn apply(conn: &Connection, step: &Step) -> Result<(), StoreError> {
    let fail = |e: libsql::Error| {
        StoreError::Migration(format!("V{} ({}): {e}", step.version, step.name))
    };

    let tx = conn.transaction().await.map_err(fail)?;
    tx.execute_batch(step.sql).await.map_err(fail)?;
    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        params![step.version, step.name],
    )
    .await
    .map_err(fail)?;
    tx.commit().await.map_err(fail)
}

/// Highest applied version, 0 on a fresh database.
async fn schema_version(conn: &Connection) -> Result<i64, StoreError> {
    let read = |e: libsql::Error| StoreError::Migration(format!("read schema version: {e}"));
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(read)?;
    match rows.next().await.map_err(read)? {
        Some(row) => row.get::<i64>(0).map_err(read),
        None => Ok(0),
    }
}
