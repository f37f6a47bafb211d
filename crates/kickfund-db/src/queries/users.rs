use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::{NewUser, UserRow};

const USER_COLUMNS: &str =
    "id, name, occupation, email, password_hash, role, avatar, created_at, updated_at";

impl Database {
    /// Insert a user. `None` when the email is already taken.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (name, occupation, email, password_hash) VALUES (?1, ?2, ?3, ?4)",
                (user.name, user.occupation, user.email, user.password_hash),
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                [email],
                map_user,
            )
            .optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// Point the user's avatar at a new storage key.
    /// Returns the previous key so the caller can drop the old file.
    pub fn update_avatar(&self, user_id: i64, avatar: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let previous: Option<String> = tx
                .query_row("SELECT avatar FROM users WHERE id = ?1", [user_id], |row| {
                    row.get::<_, Option<String>>(0)
                })
                .optional()?
                .flatten();
            tx.execute(
                "UPDATE users SET avatar = ?1, updated_at = datetime('now') WHERE id = ?2",
                (avatar, user_id),
            )?;
            tx.commit()?;
            Ok(previous)
        })
    }
}

fn query_user_by_id(conn: &Connection, id: i64) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        map_user,
    )
    .optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        occupation: row.get(2)?,
        email: row.get(3)?,
        password_hash: row.get(4)?,
        role: row.get(5)?,
        avatar: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
