use rusqlite::{Connection, Result};
use tracing::debug;

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.configure_pragmas()?;
        db.migrate_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        debug!("SQLite pragmas configured (WAL mode, foreign keys on)");
        Ok(())
    }

    /// Check schema version and migrate if needed.
    /// Version < 1: drop all tables and recreate.
    fn migrate_schema(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "DROP TABLE IF EXISTS restore_item;
                 DROP TABLE IF EXISTS undo_history;
                 DROP TABLE IF EXISTS execution_failure;
                 DROP TABLE IF EXISTS execution;
                 DROP TABLE IF EXISTS backup_manifest;
                 DROP TABLE IF EXISTS plan_item;
                 DROP TABLE IF EXISTS cleanup_plan;",
            )?;
        }

        self.conn.execute_batch(include_str!("schema.sql"))?;
        self.conn.execute_batch("PRAGMA user_version = 1;")?;
        debug!("SQLite schema initialized (version 1)");
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn truncate_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "DELETE FROM restore_item;
             DELETE FROM undo_history;
             DELETE FROM execution_failure;
             DELETE FROM execution;
             DELETE FROM backup_manifest;
             DELETE FROM plan_item;
             DELETE FROM cleanup_plan;",
        )?;
        debug!("All tables truncated");
        Ok(())
    }
}
