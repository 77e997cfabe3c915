use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, items, match notifications)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE items (
                id              TEXT PRIMARY KEY,
                kind            TEXT NOT NULL CHECK (kind IN ('lost', 'found')),
                owner_id        TEXT NOT NULL,
                scope           TEXT NOT NULL DEFAULT 'default',
                category        TEXT NOT NULL,
                color           TEXT NOT NULL DEFAULT '',
                name            TEXT,
                description     TEXT,
                location        TEXT NOT NULL,
                occurred_on     TEXT NOT NULL,
                occurred_time   TEXT,
                reporter_name   TEXT,
                contact         TEXT,
                images          TEXT NOT NULL DEFAULT '[]',
                image_embedding BLOB,
                status          TEXT NOT NULL DEFAULT 'open',
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_items_pool
                ON items(kind, scope, status);

            CREATE TABLE match_notifications (
                id              TEXT PRIMARY KEY,
                lost_id         TEXT NOT NULL REFERENCES items(id),
                found_id        TEXT NOT NULL REFERENCES items(id),
                score           REAL NOT NULL,
                lost_owner_id   TEXT NOT NULL,
                delivered       INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                UNIQUE(lost_id, found_id)
            );

            CREATE INDEX idx_notifications_owner
                ON match_notifications(lost_owner_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (report details, match method)");
        conn.execute_batch(
            "
            ALTER TABLE items ADD COLUMN phone TEXT;
            ALTER TABLE items ADD COLUMN brand TEXT;
            ALTER TABLE items ADD COLUMN serial TEXT;
            ALTER TABLE items ADD COLUMN landmark TEXT;
            ALTER TABLE items ADD COLUMN custody TEXT;
            ALTER TABLE items ADD COLUMN consent INTEGER NOT NULL DEFAULT 0;

            ALTER TABLE match_notifications
                ADD COLUMN match_method TEXT NOT NULL DEFAULT 'text';

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
