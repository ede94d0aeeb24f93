use rusqlite::Connection;

use crate::error::Result;

/// Initialise the document schema in `conn`. Safe to call on every startup.
///
/// One row per document; `obj_id`/`obj_type` mirror the document fields so the
/// compound-key lookups hit an index instead of scanning JSON.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            collection  TEXT NOT NULL,
            id          TEXT NOT NULL,
            obj_id      TEXT,
            obj_type    TEXT,
            doc         TEXT NOT NULL,   -- JSON object
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (collection, id)
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_documents_obj_id_type
            ON documents (collection, obj_id, obj_type);
        ",
    )?;
    Ok(())
}
