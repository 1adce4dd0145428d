use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                          TEXT PRIMARY KEY,
                username                    TEXT NOT NULL UNIQUE,
                password                    TEXT NOT NULL,
                has_unread_mentions         INTEGER NOT NULL DEFAULT 0,
                has_unread_notifications    INTEGER NOT NULL DEFAULT 0,
                created_at                  TEXT NOT NULL
            );

            -- renote_id may dangle; readers treat a missing target as hidden.
            CREATE TABLE notes (
                id          TEXT PRIMARY KEY,
                author_id   TEXT NOT NULL REFERENCES users(id),
                text        TEXT,
                renote_id   TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notes_author ON notes(author_id);

            CREATE TABLE note_mentions (
                note_id     TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                PRIMARY KEY (note_id, user_id)
            );

            CREATE INDEX idx_note_mentions_user ON note_mentions(user_id);

            CREATE TABLE reactions (
                id          TEXT PRIMARY KEY,
                note_id     TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                reaction    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                UNIQUE(note_id, user_id)
            );

            CREATE TABLE notifications (
                id              TEXT PRIMARY KEY,
                recipient_id    TEXT NOT NULL REFERENCES users(id),
                kind            TEXT NOT NULL,
                actor_id        TEXT NOT NULL REFERENCES users(id),
                note_id         TEXT,
                reaction        TEXT,
                is_read         INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_recipient ON notifications(recipient_id);

            CREATE TABLE followings (
                follower_id TEXT NOT NULL REFERENCES users(id),
                followee_id TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (follower_id, followee_id)
            );

            CREATE TABLE mutings (
                muter_id    TEXT NOT NULL REFERENCES users(id),
                mutee_id    TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                PRIMARY KEY (muter_id, mutee_id)
            );

            CREATE INDEX idx_mutings_mutee ON mutings(mutee_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
