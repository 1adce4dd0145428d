use crate::models::{MutingRow, format_timestamp, parse_id};
use crate::{Database, OptionalExt};
use anyhow::Result;
use chrono::Utc;
use uuid::Uuid;

impl Database {
    // -- Followings --

    /// Returns false if the edge already existed.
    pub fn insert_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO followings (follower_id, followee_id, created_at) VALUES (?1, ?2, ?3)",
                (follower_id.to_string(), followee_id.to_string(), format_timestamp(&Utc::now())),
            )?;
            Ok(changed == 1)
        })
    }

    pub fn delete_following(&self, follower_id: Uuid, followee_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM followings WHERE follower_id = ?1 AND followee_id = ?2",
                (follower_id.to_string(), followee_id.to_string()),
            )?;
            Ok(changed == 1)
        })
    }

    // -- Mutings --

    /// Insert a mute edge. Returns false if the edge already existed.
    pub fn insert_muting(&self, muter_id: Uuid, mutee_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO mutings (muter_id, mutee_id, created_at) VALUES (?1, ?2, ?3)",
                (muter_id.to_string(), mutee_id.to_string(), format_timestamp(&Utc::now())),
            )?;
            Ok(changed == 1)
        })
    }

    /// Delete a mute edge. Returns false if there was nothing to delete.
    pub fn delete_muting(&self, muter_id: Uuid, mutee_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM mutings WHERE muter_id = ?1 AND mutee_id = ?2",
                (muter_id.to_string(), mutee_id.to_string()),
            )?;
            Ok(changed == 1)
        })
    }

    pub fn muting_exists(&self, muter_id: Uuid, mutee_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM mutings WHERE muter_id = ?1 AND mutee_id = ?2",
                    (muter_id.to_string(), mutee_id.to_string()),
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    pub fn get_mutee_ids(&self, muter_id: Uuid) -> Result<Vec<Uuid>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT mutee_id FROM mutings WHERE muter_id = ?1")?;
            let ids = stmt
                .query_map([muter_id.to_string()], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            ids.iter().map(|id| parse_id(id)).collect()
        })
    }

    /// Mute edges created by `muter_id`, newest first.
    pub fn get_mutings(&self, muter_id: Uuid) -> Result<Vec<MutingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT muter_id, mutee_id, created_at
                 FROM mutings
                 WHERE muter_id = ?1
                 ORDER BY rowid DESC",
            )?;

            let rows = stmt
                .query_map([muter_id.to_string()], |row| {
                    Ok(MutingRow {
                        muter_id: row.get(0)?,
                        mutee_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
