//! User Storage
//! Mission: Credential store for registered users on SQLite

use crate::auth::db::{AuthDb, StoreError};
use crate::auth::models::{User, UserRole};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::info;

const USER_COLUMNS: &str = "id, name, email, username, password_hash, role, created_at";

/// Fields of a user that does not exist yet
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: String,
    pub role: UserRole,
}

/// User storage with SQLite backend
pub struct UserStore {
    db: AuthDb,
}

impl UserStore {
    pub fn new(db: AuthDb) -> Self {
        Self { db }
    }

    /// Insert a user; duplicate email or username yields `StoreError::Conflict`
    pub fn create_user(&self, new_user: NewUser<'_>) -> Result<User, StoreError> {
        let created_at = Utc::now().to_rfc3339();
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO users (name, email, username, password_hash, role, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new_user.name,
                new_user.email,
                new_user.username,
                new_user.password_hash,
                new_user.role.as_str(),
                created_at,
            ],
        )?;

        let user = User {
            id: conn.last_insert_rowid(),
            name: new_user.name.to_string(),
            email: new_user.email.to_string(),
            username: new_user.username.to_string(),
            password_hash: new_user.password_hash,
            role: new_user.role,
            created_at,
        };

        info!("✅ Created user: {} ({})", user.email, user.role);
        Ok(user)
    }

    /// Get user by email (the authentication subject)
    pub fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"), email)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.find_one(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"), id)
    }

    fn find_one<P: rusqlite::ToSql>(&self, sql: &str, key: P) -> Result<Option<User>, StoreError> {
        let conn = self.db.conn();
        let row = conn
            .query_row(sql, params![key], map_user_row)
            .optional()?;

        row.map(|(user, role)| match UserRole::parse(&role) {
            Some(role) => Ok(User { role, ..user }),
            None => Err(StoreError::Corrupt(format!("user {} has role {:?}", user.id, role))),
        })
        .transpose()
    }
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<(User, String)> {
    let role: String = row.get(5)?;
    Ok((
        User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            username: row.get(3)?,
            password_hash: row.get(4)?,
            role: UserRole::User, // replaced once the stored role string is parsed
            created_at: row.get(6)?,
        },
        role,
    ))
}
