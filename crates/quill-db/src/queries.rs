use std::collections::HashMap;

use crate::models::{NoteRow, UserRow, format_timestamp, parse_id};
use crate::{Database, OptionalExt, placeholders};
use anyhow::Result;
use chrono::{DateTime, Utc};
use quill_types::models::Note;
use rusqlite::{Connection, Row};
use uuid::Uuid;

const NOTE_COLUMNS: &str = "n.id, n.author_id, n.text, n.renote_id, n.created_at";

/// Drops notes by users the viewer (`?1`) mutes, and direct renotes of their
/// notes. Deeper renote chains are left to the visibility filter.
const NOT_MUTED_BY_VIEWER: &str = "n.author_id NOT IN (SELECT mutee_id FROM mutings WHERE muter_id = ?1)
                   AND NOT EXISTS (
                       SELECT 1 FROM notes r
                       JOIN mutings m ON m.mutee_id = r.author_id AND m.muter_id = ?1
                       WHERE r.id = n.renote_id
                   )";

/// Author and renote target of a stored note, the minimum needed to walk a
/// renote chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteLink {
    pub author_id: Uuid,
    pub renote_id: Option<Uuid>,
}

impl Database {
    // -- Users --

    pub fn create_user(&self, id: Uuid, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id.to_string(), username, password_hash, format_timestamp(&Utc::now())),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, username, password, created_at FROM users WHERE username = ?1", username)
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            query_user(conn, "SELECT id, username, password, created_at FROM users WHERE id = ?1", &id.to_string())
        })
    }

    pub fn user_exists(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id.to_string()], |row| row.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Resolve usernames to ids. Unknown names are absent from the result.
    pub fn get_user_ids_by_usernames(&self, usernames: &[String]) -> Result<HashMap<String, Uuid>> {
        if usernames.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT id, username FROM users WHERE username IN ({})",
                placeholders(usernames.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(usernames.iter()), |row| {
                    Ok((row.get::<_, String>(1)?, row.get::<_, String>(0)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(username, id)| Ok((username, parse_id(&id)?)))
                .collect()
        })
    }

    /// Batch-fetch usernames for a set of user ids.
    pub fn get_usernames(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        self.with_conn(|conn| {
            let sql = format!("SELECT id, username FROM users WHERE id IN ({})", placeholders(ids.len()));
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(ids.iter().map(|id| id.to_string())), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, username)| Ok((parse_id(&id)?, username)))
                .collect()
        })
    }

    // -- Notes --

    /// Insert a note and its mention rows atomically.
    pub fn insert_note(&self, note: &Note) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO notes (id, author_id, text, renote_id, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    note.id.to_string(),
                    note.author_id.to_string(),
                    note.text,
                    note.renote_id.map(|id| id.to_string()),
                    format_timestamp(&note.created_at),
                ],
            )?;
            for user_id in &note.mentions {
                tx.execute(
                    "INSERT OR IGNORE INTO note_mentions (note_id, user_id) VALUES (?1, ?2)",
                    (note.id.to_string(), user_id.to_string()),
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_note(&self, id: Uuid) -> Result<Option<Note>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {NOTE_COLUMNS} FROM notes n WHERE n.id = ?1");
            let row = conn.query_row(&sql, [id.to_string()], note_row).optional()?;
            let Some(row) = row else {
                return Ok(None);
            };
            let mut rows = vec![row];
            attach_mentions(conn, &mut rows)?;
            rows.pop().map(Note::try_from).transpose()
        })
    }

    pub fn get_note_link(&self, id: Uuid) -> Result<Option<NoteLink>> {
        self.with_conn(|conn| {
            let row: Option<(String, Option<String>)> = conn
                .query_row(
                    "SELECT author_id, renote_id FROM notes WHERE id = ?1",
                    [id.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(author_id, renote_id)| {
                Ok(NoteLink {
                    author_id: parse_id(&author_id)?,
                    renote_id: renote_id.as_deref().map(parse_id).transpose()?,
                })
            })
            .transpose()
        })
    }

    /// Newest-first page of every note on the server that `viewer` has not
    /// muted.
    pub fn local_timeline(&self, viewer: Uuid, limit: u32, until_id: Option<Uuid>) -> Result<Vec<Note>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTE_COLUMNS} FROM notes n
                 WHERE {NOT_MUTED_BY_VIEWER}
                   AND (?2 IS NULL OR n.rowid < (SELECT rowid FROM notes WHERE id = ?2))
                 ORDER BY n.rowid DESC
                 LIMIT ?3"
            );
            query_notes(
                conn,
                &sql,
                rusqlite::params![viewer.to_string(), until_id.map(|id| id.to_string()), limit],
            )
        })
    }

    /// Newest-first page of the user's own notes and those of users they follow.
    pub fn home_timeline(&self, user_id: Uuid, limit: u32, until_id: Option<Uuid>) -> Result<Vec<Note>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTE_COLUMNS} FROM notes n
                 WHERE (n.author_id = ?1
                        OR n.author_id IN (SELECT followee_id FROM followings WHERE follower_id = ?1))
                   AND {NOT_MUTED_BY_VIEWER}
                   AND (?2 IS NULL OR n.rowid < (SELECT rowid FROM notes WHERE id = ?2))
                 ORDER BY n.rowid DESC
                 LIMIT ?3"
            );
            query_notes(
                conn,
                &sql,
                rusqlite::params![user_id.to_string(), until_id.map(|id| id.to_string()), limit],
            )
        })
    }

    /// Newest-first page of notes that mention the user.
    pub fn mentions_of(&self, user_id: Uuid, limit: u32, until_id: Option<Uuid>) -> Result<Vec<Note>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTE_COLUMNS} FROM notes n
                 JOIN note_mentions m ON m.note_id = n.id
                 WHERE m.user_id = ?1
                   AND {NOT_MUTED_BY_VIEWER}
                   AND (?2 IS NULL OR n.rowid < (SELECT rowid FROM notes WHERE id = ?2))
                 ORDER BY n.rowid DESC
                 LIMIT ?3"
            );
            query_notes(
                conn,
                &sql,
                rusqlite::params![user_id.to_string(), until_id.map(|id| id.to_string()), limit],
            )
        })
    }

    // -- Reactions --

    /// Insert a reaction. Returns false if the user already reacted to the note.
    pub fn insert_reaction(
        &self,
        id: Uuid,
        note_id: Uuid,
        user_id: Uuid,
        reaction: &str,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO reactions (id, note_id, user_id, reaction, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    id.to_string(),
                    note_id.to_string(),
                    user_id.to_string(),
                    reaction,
                    format_timestamp(&created_at),
                ],
            )?;
            Ok(changed == 1)
        })
    }
}

fn query_user(conn: &Connection, sql: &str, key: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(sql)?;

    let row = stmt
        .query_row([key], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn note_row(row: &Row<'_>) -> rusqlite::Result<NoteRow> {
    Ok(NoteRow {
        id: row.get(0)?,
        author_id: row.get(1)?,
        text: row.get(2)?,
        renote_id: row.get(3)?,
        created_at: row.get(4)?,
        mentions: Vec::new(),
    })
}

fn query_notes(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Note>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt
        .query_map(params, note_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_mentions(conn, &mut rows)?;

    rows.into_iter().map(Note::try_from).collect()
}

/// Batch-fetch mention rows for a page of notes (avoids N+1).
fn attach_mentions(conn: &Connection, rows: &mut [NoteRow]) -> Result<()> {
    if rows.is_empty() {
        return Ok(());
    }

    let sql = format!(
        "SELECT note_id, user_id FROM note_mentions WHERE note_id IN ({})",
        placeholders(rows.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let pairs = stmt
        .query_map(rusqlite::params_from_iter(rows.iter().map(|r| r.id.as_str())), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_note: HashMap<String, Vec<String>> = HashMap::new();
    for (note_id, user_id) in pairs {
        by_note.entry(note_id).or_default().push(user_id);
    }
    for row in rows.iter_mut() {
        if let Some(mentions) = by_note.remove(&row.id) {
            row.mentions = mentions;
        }
    }

    Ok(())
}
