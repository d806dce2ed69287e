//! Database schema migrations.
//!
//! The meta table stores a monotonically increasing schema version. On open,
//! any missing steps run sequentially under one write transaction and the
//! new version is written atomically with them. A database written by a
//! newer node is refused rather than downgraded.

use almond_store::{MetaTable, Store, StoreError, WriteTxn};

use crate::LmdbStore;

/// The schema version the current code expects.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Runs database migrations to bring the schema up to date.
pub struct Migrator;

impl Migrator {
    pub fn run(store: &LmdbStore) -> Result<(), StoreError> {
        let mut txn = store.tx_begin_write()?;
        let stored = MetaTable::schema_version(txn.as_read())?;

        if stored == CURRENT_SCHEMA_VERSION {
            tracing::info!(version = stored, "database schema is up to date");
            return Ok(());
        }

        if stored > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::SchemaTooNew {
                stored,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }

        for version in stored..CURRENT_SCHEMA_VERSION {
            tracing::info!(from = version, to = version + 1, "running migration");
            run_step(txn.as_mut(), version, version + 1)?;
        }

        MetaTable::set_schema_version(txn.as_mut(), CURRENT_SCHEMA_VERSION)?;
        txn.commit()?;
        tracing::info!(version = CURRENT_SCHEMA_VERSION, "migration complete");
        Ok(())
    }
}

fn run_step(_txn: &mut dyn WriteTxn, from: u32, to: u32) -> Result<(), StoreError> {
    match (from, to) {
        (0, 1) => {
            // Initial schema — nothing to migrate from a blank slate.
            Ok(())
        }
        (1, 2) => {
            // Schema v2: pending keys switched to binary
            // (destination ‖ source_hash) composites and the unchecked table
            // to (dependency ‖ block_hash). No v1 production data existed.
            Ok(())
        }
        _ => Err(StoreError::Backend(format!(
            "unknown migration: {} -> {}",
            from, to
        ))),
    }
}
