//! Database migration system.
//!
//! Tracks applied migrations in a `_migrations` table and applies
//! pending ones in order.

use rusqlite::Connection;

use super::error::DatabaseError;

/// A single migration definition.
struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

const CREATE_BANK_DOCUMENTS: &str = "
CREATE TABLE bank_documents (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    original_name TEXT NOT NULL,
    file_ref TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    uploaded_at TEXT NOT NULL,
    processed_at TEXT,
    provider_used TEXT,
    account_ref TEXT,
    transaction_count INTEGER NOT NULL DEFAULT 0,
    processing_error TEXT,
    statement_start TEXT,
    statement_end TEXT
);
CREATE INDEX idx_bank_documents_owner ON bank_documents(owner_id, uploaded_at);
";

const CREATE_PENDING_TRANSACTIONS: &str = "
CREATE TABLE pending_transactions (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES bank_documents(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    original_description TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    kind TEXT NOT NULL,
    category TEXT NOT NULL,
    user_category TEXT,
    confidence REAL NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'PENDING',
    duplicate_of TEXT,
    imported_transaction_id TEXT
);
CREATE INDEX idx_pending_transactions_document ON pending_transactions(document_id, status);
";

const CREATE_TRANSACTIONS: &str = "
CREATE TABLE transactions (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    date TEXT NOT NULL,
    description TEXT NOT NULL,
    amount_cents INTEGER NOT NULL,
    kind TEXT NOT NULL,
    category TEXT NOT NULL,
    document_id TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX idx_transactions_owner_date ON transactions(owner_id, date);
";

/// All migrations in order. Each is applied at most once.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_bank_documents_table",
        sql: CREATE_BANK_DOCUMENTS,
    },
    Migration {
        version: 2,
        description: "create_pending_transactions_table",
        sql: CREATE_PENDING_TRANSACTIONS,
    },
    Migration {
        version: 3,
        description: "create_transactions_table",
        sql: CREATE_TRANSACTIONS,
    },
];

/// Runs all pending migrations on the given connection.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    // Create the migrations tracking table.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current_version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS {
        if migration.version <= current_version {
            continue;
        }

        log::info!(
            "Running migration v{}: {}",
            migration.version,
            migration.description
        );

        conn.execute_batch(migration.sql)
            .map_err(|e| DatabaseError::Migration {
                version: migration.version,
                reason: e.to_string(),
            })?;

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![migration.version, migration.description],
        )?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();
        // Running again should be a no-op.
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_candidate_rows_cascade_with_document() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO bank_documents (id, owner_id, original_name, file_ref, status, uploaded_at)
             VALUES ('d1', 'u1', 'a.pdf', 'a.pdf', 'PROCESSED', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO pending_transactions
             (id, document_id, date, description, original_description, amount_cents, kind, category)
             VALUES ('c1', 'd1', '2026-01-02', 'x', 'x', 100, 'EXPENSE', 'Other')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM bank_documents WHERE id = 'd1'", [])
            .unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM pending_transactions", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_ledger_rows_do_not_cascade() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO bank_documents (id, owner_id, original_name, file_ref, status, uploaded_at)
             VALUES ('d1', 'u1', 'a.pdf', 'a.pdf', 'IMPORTED', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO transactions
             (id, owner_id, date, description, amount_cents, kind, category, document_id, created_at)
             VALUES ('t1', 'u1', '2026-01-02', 'x', 100, 'EXPENSE', 'Other', 'd1', '2026-01-03T00:00:00Z')",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM bank_documents WHERE id = 'd1'", [])
            .unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM transactions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
