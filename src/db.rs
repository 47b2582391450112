use rusqlite::Connection;
use std::path::Path;

use crate::error::Result;

/// Open (or create) the DDS database file and make sure the schema exists.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;

    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    setup_database(&conn)?;
    Ok(conn)
}

/// In-memory database with the full schema, used by tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // SQLite leaves foreign keys off unless asked, per connection
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Reference tables
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS statuses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            type_id INTEGER NOT NULL REFERENCES types(id)
        );

        CREATE TABLE IF NOT EXISTS subcategories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category_id INTEGER NOT NULL REFERENCES categories(id)
        );",
    )?;

    // ==========================================================================
    // Entries (the fact table)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS dds_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            status_id INTEGER NOT NULL REFERENCES statuses(id),
            type_id INTEGER NOT NULL REFERENCES types(id),
            category_id INTEGER NOT NULL REFERENCES categories(id),
            subcategory_id INTEGER NOT NULL REFERENCES subcategories(id),
            amount REAL NOT NULL CHECK (amount > 0),
            comment TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes (one per list filter, plus the hierarchy lookups)
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_entries_date ON dds_entries(date);
        CREATE INDEX IF NOT EXISTS idx_entries_status ON dds_entries(status_id);
        CREATE INDEX IF NOT EXISTS idx_entries_type ON dds_entries(type_id);
        CREATE INDEX IF NOT EXISTS idx_entries_category ON dds_entries(category_id);
        CREATE INDEX IF NOT EXISTS idx_entries_subcategory ON dds_entries(subcategory_id);
        CREATE INDEX IF NOT EXISTS idx_categories_type ON categories(type_id);
        CREATE INDEX IF NOT EXISTS idx_subcategories_category ON subcategories(category_id);",
    )?;

    Ok(())
}

/// Run `f` as one unit of work: a single SQLite transaction that is
/// committed when `f` succeeds and rolled back when it fails.
pub fn in_transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Connection) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&*tx)?;
    tx.commit()?;
    Ok(value)
}
