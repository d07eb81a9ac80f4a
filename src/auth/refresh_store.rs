//! Refresh Token Storage
//! Mission: Durable registry of opaque refresh tokens keyed by value
//!
//! The store does not decide whether a token is live; expiry checks and the
//! one-token-per-user rule belong to the session manager. The `UNIQUE(user_id)`
//! column only backs that rule up when two logins race.

use crate::auth::db::{AuthDb, StoreError};
use crate::auth::models::{redact, RefreshToken};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info};

pub struct RefreshTokenStore {
    db: AuthDb,
}

impl RefreshTokenStore {
    pub fn new(db: AuthDb) -> Self {
        Self { db }
    }

    pub fn find_by_token(&self, token: &str) -> Result<Option<RefreshToken>, StoreError> {
        self.find_one(
            "SELECT token, user_id, expires_at FROM refresh_tokens WHERE token = ?1",
            token,
        )
    }

    pub fn find_by_user(&self, user_id: i64) -> Result<Option<RefreshToken>, StoreError> {
        self.find_one(
            "SELECT token, user_id, expires_at FROM refresh_tokens WHERE user_id = ?1",
            user_id,
        )
    }

    /// Idempotent: deleting an unknown token succeeds
    pub fn delete_by_token(&self, token: &str) -> Result<(), StoreError> {
        let removed = self
            .db
            .conn()
            .execute("DELETE FROM refresh_tokens WHERE token = ?1", params![token])?;
        debug!("Deleted refresh token {}… ({} row)", redact(token), removed);
        Ok(())
    }

    /// Insert a token, or update owner and expiry of an existing value.
    /// A second token for the same user fails with `StoreError::Conflict`.
    pub fn save(&self, record: &RefreshToken) -> Result<(), StoreError> {
        self.db.conn().execute(
            "INSERT INTO refresh_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(token) DO UPDATE SET
                user_id = excluded.user_id,
                expires_at = excluded.expires_at",
            params![
                record.token,
                record.user_id,
                record.expires_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    /// Delete every token expired at or before `now`; returns how many went
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let purged = self.db.conn().execute(
            "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
            params![now.timestamp_millis()],
        )?;
        if purged > 0 {
            info!("🧹 Purged {} expired refresh tokens", purged);
        }
        Ok(purged)
    }

    fn find_one<P: rusqlite::ToSql>(
        &self,
        sql: &str,
        key: P,
    ) -> Result<Option<RefreshToken>, StoreError> {
        let row = self
            .db
            .conn()
            .query_row(sql, params![key], map_token_row)
            .optional()?;

        row.map(|(token, user_id, expires_ms)| {
            DateTime::<Utc>::from_timestamp_millis(expires_ms)
                .map(|expires_at| RefreshToken {
                    token,
                    user_id,
                    expires_at,
                })
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("refresh token expiry {} out of range", expires_ms))
                })
        })
        .transpose()
    }
}

fn map_token_row(row: &Row<'_>) -> rusqlite::Result<(String, i64, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::UserRole;
    use crate::auth::user_store::{NewUser, UserStore};
    use chrono::Duration;

    fn setup() -> (RefreshTokenStore, i64, i64) {
        let db = AuthDb::in_memory().unwrap();
        let users = UserStore::new(db.clone());
        let mut ids = Vec::new();
        for (email, username) in [("a@example.com", "a"), ("b@example.com", "b")] {
            let user = users
                .create_user(NewUser {
                    name: username,
                    email,
                    username,
                    password_hash: "hash".to_string(),
                    role: UserRole::User,
                })
                .unwrap();
            ids.push(user.id);
        }
        (RefreshTokenStore::new(db), ids[0], ids[1])
    }

    #[test]
    fn test_save_and_find() {
        let (store, alice, _) = setup();
        let token = RefreshToken::issue(alice, Utc::now() + Duration::days(14));
        store.save(&token).unwrap();

        let found = store.find_by_token(&token.token).unwrap().unwrap();
        assert_eq!(found.user_id, alice);
        // Millisecond precision survives the round trip
        assert_eq!(
            found.expires_at.timestamp_millis(),
            token.expires_at.timestamp_millis()
        );
        assert_eq!(store.find_by_user(alice).unwrap().unwrap().token, token.token);
    }

    #[test]
    fn test_unknown_token_is_none() {
        let (store, _, bob) = setup();
        assert!(store.find_by_token("missing").unwrap().is_none());
        assert!(store.find_by_user(bob).unwrap().is_none());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (store, alice, _) = setup();
        let token = RefreshToken::issue(alice, Utc::now() + Duration::days(1));
        store.save(&token).unwrap();

        store.delete_by_token(&token.token).unwrap();
        store.delete_by_token(&token.token).unwrap();
        store.delete_by_token("never-existed").unwrap();
        assert!(store.find_by_token(&token.token).unwrap().is_none());
    }

    #[test]
    fn test_save_updates_existing_value() {
        let (store, alice, _) = setup();
        let mut token = RefreshToken::issue(alice, Utc::now() + Duration::days(1));
        store.save(&token).unwrap();

        token.expires_at = Utc::now() + Duration::days(30);
        store.save(&token).unwrap();

        let found = store.find_by_token(&token.token).unwrap().unwrap();
        assert_eq!(
            found.expires_at.timestamp_millis(),
            token.expires_at.timestamp_millis()
        );
    }

    #[test]
    fn test_second_token_for_user_conflicts() {
        let (store, alice, _) = setup();
        let expires = Utc::now() + Duration::days(14);
        store.save(&RefreshToken::issue(alice, expires)).unwrap();

        let second = store.save(&RefreshToken::issue(alice, expires));
        assert!(matches!(second, Err(StoreError::Conflict(_))));
    }

    #[test]
    fn test_purge_expired_keeps_live_tokens() {
        let (store, alice, bob) = setup();
        let now = Utc::now();
        let stale = RefreshToken::issue(alice, now - Duration::seconds(1));
        let live = RefreshToken::issue(bob, now + Duration::days(1));
        store.save(&stale).unwrap();
        store.save(&live).unwrap();

        assert_eq!(store.purge_expired(now).unwrap(), 1);
        assert!(store.find_by_token(&stale.token).unwrap().is_none());
        assert!(store.find_by_token(&live.token).unwrap().is_some());
    }
}
