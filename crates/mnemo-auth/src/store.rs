//! The token table and append-only audit log.
//!
//! Every validation writes its audit row on the same connection before the
//! result is returned, so the log is durable by the time a caller acts on
//! the outcome. A small TTL cache fronts the token lookup; every mutation
//! invalidates the affected entry so revocations take effect immediately.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::cache::ValidationCache;
use crate::error::{AuthError, Result};
use crate::token::generate_token;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS auth_tokens (
    token TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    display_name TEXT,
    email TEXT,
    enabled INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    expires_at TEXT,
    last_used_at TEXT,
    permissions TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_auth_tokens_user ON auth_tokens(user_id);

CREATE TABLE IF NOT EXISTS auth_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    user_id TEXT,
    token TEXT,
    action TEXT NOT NULL CHECK(action IN ('success','auth_failed','revoked','expired','denied')),
    error_message TEXT,
    client_info TEXT
);

CREATE INDEX IF NOT EXISTS idx_auth_audit_user ON auth_audit(user_id);
CREATE INDEX IF NOT EXISTS idx_auth_audit_time ON auth_audit(timestamp);
"#;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// A stored auth token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    pub user_id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    /// Capability tags ("admin", ...).
    pub permissions: Vec<String>,
}

impl AuthToken {
    /// True when past the expiry timestamp.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }

    /// True when the token carries a capability tag.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Audit actions, one per validation outcome or administrative event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Success,
    AuthFailed,
    Revoked,
    Expired,
    Denied,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AuthFailed => "auth_failed",
            Self::Revoked => "revoked",
            Self::Expired => "expired",
            Self::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(Self::Success),
            "auth_failed" => Some(Self::AuthFailed),
            "revoked" => Some(Self::Revoked),
            "expired" => Some(Self::Expired),
            "denied" => Some(Self::Denied),
            _ => None,
        }
    }
}

/// One audit log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub action: AuditAction,
    pub error_message: Option<String>,
    pub client_info: Option<serde_json::Value>,
}

/// Outcome of validating a token against a claimed user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Validation {
    pub ok: bool,
    /// Set on success.
    pub user_id: Option<String>,
    pub display_name: Option<String>,
    pub permissions: Vec<String>,
    /// Set on failure; safe to surface to the caller.
    pub error: Option<String>,
}

impl Validation {
    fn success(token: &AuthToken) -> Self {
        Self {
            ok: true,
            user_id: Some(token.user_id.clone()),
            display_name: token.display_name.clone(),
            permissions: token.permissions.clone(),
            error: None,
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            user_id: None,
            display_name: None,
            permissions: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Per-user token statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub total_tokens: usize,
    pub active_tokens: usize,
    pub last_activity: Option<DateTime<Utc>>,
    /// Successful validations in the last 30 days.
    pub logins_30d: usize,
    /// Failed validations in the last 30 days.
    pub failures_30d: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Store
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed token store with audit logging.
pub struct AuthStore {
    conn: Mutex<Connection>,
    cache: ValidationCache,
}

impl AuthStore {
    /// Open or create the auth store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        info!(path = %path.as_ref().display(), "auth store ready");
        Ok(Self {
            conn: Mutex::new(conn),
            cache: ValidationCache::default(),
        })
    }

    /// Create an in-memory auth store.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            cache: ValidationCache::default(),
        })
    }

    fn locked(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AuthError::Internal("auth mutex poisoned".to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Issuance & Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a new token bound to `user_id`. Returns the token string.
    pub fn create_token(
        &self,
        user_id: &str,
        display_name: Option<&str>,
        email: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
        permissions: &[String],
    ) -> Result<String> {
        let token = generate_token();
        let conn = self.locked()?;
        conn.execute(
            r#"
            INSERT INTO auth_tokens
                (token, user_id, display_name, email, enabled, created_at, expires_at, permissions)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7)
            "#,
            params![
                token,
                user_id,
                display_name,
                email,
                Utc::now().to_rfc3339(),
                expires_at.map(|at| at.to_rfc3339()),
                serde_json::to_string(permissions)?,
            ],
        )?;
        info!(user_id, "token created");
        Ok(token)
    }

    /// Disable a token without deleting it.
    pub fn revoke(&self, token: &str) -> Result<()> {
        self.set_enabled(token, false)
    }

    /// Re-enable a previously revoked token.
    pub fn enable(&self, token: &str) -> Result<()> {
        self.set_enabled(token, true)
    }

    fn set_enabled(&self, token: &str, enabled: bool) -> Result<()> {
        let conn = self.locked()?;
        let changed = conn.execute(
            "UPDATE auth_tokens SET enabled = ?2 WHERE token = ?1",
            params![token, enabled],
        )?;
        if changed == 0 {
            return Err(AuthError::TokenNotFound);
        }
        self.cache.invalidate(token);
        debug!(enabled, "token state changed");
        Ok(())
    }

    /// Permanently remove a token.
    pub fn delete(&self, token: &str) -> Result<()> {
        let conn = self.locked()?;
        let changed = conn.execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])?;
        if changed == 0 {
            return Err(AuthError::TokenNotFound);
        }
        self.cache.invalidate(token);
        Ok(())
    }

    /// Fetch a token row without validating or auditing.
    ///
    /// For administrative permission checks where no claimed user id exists.
    pub fn get_token(&self, token: &str) -> Result<Option<AuthToken>> {
        if let Some(cached) = self.cache.get(token) {
            return Ok(Some(cached));
        }
        let conn = self.locked()?;
        lookup_token(&conn, token)
    }

    /// Resolve a token prefix to the full token. Errors when zero or more
    /// than one token matches.
    pub fn resolve_prefix(&self, prefix: &str) -> Result<String> {
        let conn = self.locked()?;
        let mut stmt = conn.prepare("SELECT token FROM auth_tokens WHERE token LIKE ?1")?;
        let matches: Vec<String> = stmt
            .query_map(params![format!("{prefix}%")], |row| row.get(0))?
            .collect::<std::result::Result<_, _>>()?;
        match matches.len() {
            0 => Err(AuthError::TokenNotFound),
            1 => Ok(matches.into_iter().next().unwrap()),
            n => Err(AuthError::AmbiguousPrefix(n)),
        }
    }

    /// List tokens, optionally for one user, newest first.
    pub fn list(&self, user_id: Option<&str>) -> Result<Vec<AuthToken>> {
        let conn = self.locked()?;
        let mut tokens = Vec::new();
        match user_id {
            Some(user) => {
                let mut stmt = conn.prepare(
                    "SELECT token, user_id, display_name, email, enabled, created_at,
                            expires_at, last_used_at, permissions
                     FROM auth_tokens WHERE user_id = ?1 ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map(params![user], row_to_token)?;
                for row in rows {
                    tokens.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT token, user_id, display_name, email, enabled, created_at,
                            expires_at, last_used_at, permissions
                     FROM auth_tokens ORDER BY created_at DESC",
                )?;
                let rows = stmt.query_map([], row_to_token)?;
                for row in rows {
                    tokens.push(row?);
                }
            }
        }
        Ok(tokens)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate a token against the user id the caller claims.
    ///
    /// `ok` iff the token exists, is enabled, is unexpired, and is bound to
    /// exactly the claimed user. Success updates `last_used_at`; every
    /// outcome writes its audit row before this returns.
    pub fn validate(
        &self,
        token: &str,
        user_id: &str,
        client_info: Option<serde_json::Value>,
    ) -> Result<Validation> {
        let now = Utc::now();

        let record = match self.cache.get(token) {
            Some(cached) => Some(cached),
            None => {
                let conn = self.locked()?;
                let record = lookup_token(&conn, token)?;
                if let Some(ref record) = record {
                    self.cache.put(record.clone());
                }
                record
            }
        };

        let Some(record) = record else {
            self.audit_write(
                token,
                user_id,
                AuditAction::AuthFailed,
                Some("Invalid token"),
                client_info,
            )?;
            warn!(user_id, "auth failed: unknown token");
            return Ok(Validation::failure(
                "Invalid authentication token. Check your MNEMO_TOKEN configuration.",
            ));
        };

        if !record.enabled {
            self.audit_write(
                token,
                user_id,
                AuditAction::Revoked,
                Some("Token disabled"),
                client_info,
            )?;
            return Ok(Validation::failure(
                "This token has been disabled. Contact your administrator.",
            ));
        }

        if record.is_expired(now) {
            let expired_on = record
                .expires_at
                .map(|at| at.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            self.audit_write(
                token,
                user_id,
                AuditAction::Expired,
                Some(&format!("Token expired on {expired_on}")),
                client_info,
            )?;
            return Ok(Validation::failure(format!(
                "Token expired on {expired_on}. Request a new token from your administrator."
            )));
        }

        if record.user_id != user_id {
            self.audit_write(
                token,
                user_id,
                AuditAction::Denied,
                Some(&format!(
                    "User ID mismatch. Expected: {}, Got: {}",
                    record.user_id, user_id
                )),
                client_info,
            )?;
            return Ok(Validation::failure(format!(
                "User ID mismatch. This token belongs to '{}', but you provided '{}'.",
                record.user_id, user_id
            )));
        }

        {
            let conn = self.locked()?;
            conn.execute(
                "UPDATE auth_tokens SET last_used_at = ?2 WHERE token = ?1",
                params![token, now.to_rfc3339()],
            )?;
        }
        let mut refreshed = record.clone();
        refreshed.last_used_at = Some(now);
        self.cache.put(refreshed);

        self.audit_write(
            token,
            user_id,
            AuditAction::Success,
            Some("Authentication successful"),
            client_info,
        )?;
        debug!(user_id, "authenticated");

        Ok(Validation::success(&record))
    }

    fn audit_write(
        &self,
        token: &str,
        user_id: &str,
        action: AuditAction,
        message: Option<&str>,
        client_info: Option<serde_json::Value>,
    ) -> Result<()> {
        let conn = self.locked()?;
        conn.execute(
            r#"
            INSERT INTO auth_audit (timestamp, user_id, token, action, error_message, client_info)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                Utc::now().to_rfc3339(),
                user_id,
                token,
                action.as_str(),
                message,
                client_info.map(|v| v.to_string()),
            ],
        )?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Audit & Stats
    // ─────────────────────────────────────────────────────────────────────────

    /// Recent audit rows within the last `days`, newest first, capped at 100.
    pub fn audit(&self, days: i64, user_id: Option<&str>) -> Result<Vec<AuditEvent>> {
        let conn = self.locked()?;
        let since = (Utc::now() - Duration::days(days)).to_rfc3339();

        let mut events = Vec::new();
        match user_id {
            Some(user) => {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, user_id, token, action, error_message, client_info
                     FROM auth_audit WHERE timestamp > ?1 AND user_id = ?2
                     ORDER BY timestamp DESC LIMIT 100",
                )?;
                let rows = stmt.query_map(params![since, user], row_to_audit)?;
                for row in rows {
                    events.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT timestamp, user_id, token, action, error_message, client_info
                     FROM auth_audit WHERE timestamp > ?1
                     ORDER BY timestamp DESC LIMIT 100",
                )?;
                let rows = stmt.query_map(params![since], row_to_audit)?;
                for row in rows {
                    events.push(row?);
                }
            }
        }
        Ok(events)
    }

    /// Token and login statistics for one user.
    pub fn stats(&self, user_id: &str) -> Result<UserStats> {
        let conn = self.locked()?;

        let (total, active, last_activity): (i64, i64, Option<String>) = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN enabled THEN 1 ELSE 0 END), 0),
                    MAX(last_used_at)
             FROM auth_tokens WHERE user_id = ?1",
            params![user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let since = (Utc::now() - Duration::days(30)).to_rfc3339();
        let (logins, failures): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(CASE WHEN action = 'success' THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN action != 'success' THEN 1 ELSE 0 END), 0)
             FROM auth_audit WHERE user_id = ?1 AND timestamp > ?2",
            params![user_id, since],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(UserStats {
            user_id: user_id.to_string(),
            total_tokens: total as usize,
            active_tokens: active as usize,
            last_activity: last_activity.map(|s| parse_timestamp(&s)),
            logins_30d: logins as usize,
            failures_30d: failures as usize,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn lookup_token(conn: &Connection, token: &str) -> Result<Option<AuthToken>> {
    let record = conn
        .query_row(
            "SELECT token, user_id, display_name, email, enabled, created_at,
                    expires_at, last_used_at, permissions
             FROM auth_tokens WHERE token = ?1",
            params![token],
            row_to_token,
        )
        .optional()?;
    Ok(record)
}

fn row_to_token(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuthToken> {
    let enabled: i64 = row.get(4)?;
    let created_at: String = row.get(5)?;
    let expires_at: Option<String> = row.get(6)?;
    let last_used_at: Option<String> = row.get(7)?;
    let permissions: String = row.get(8)?;

    Ok(AuthToken {
        token: row.get(0)?,
        user_id: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        enabled: enabled != 0,
        created_at: parse_timestamp(&created_at),
        expires_at: expires_at.map(|s| parse_timestamp(&s)),
        last_used_at: last_used_at.map(|s| parse_timestamp(&s)),
        permissions: serde_json::from_str(&permissions).unwrap_or_default(),
    })
}

fn row_to_audit(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let timestamp: String = row.get(0)?;
    let action: String = row.get(3)?;
    let client_info: Option<String> = row.get(5)?;

    Ok(AuditEvent {
        timestamp: parse_timestamp(&timestamp),
        user_id: row.get(1)?,
        token: row.get(2)?,
        action: AuditAction::parse(&action).unwrap_or(AuditAction::AuthFailed),
        error_message: row.get(4)?,
        client_info: client_info.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_token(user: &str) -> (AuthStore, String) {
        let store = AuthStore::open_in_memory().unwrap();
        let token = store
            .create_token(user, Some("Test User"), None, None, &[])
            .unwrap();
        (store, token)
    }

    #[test]
    fn test_validate_success_updates_last_used() {
        let (store, token) = store_with_token("alice@example.com");

        let result = store.validate(&token, "alice@example.com", None).unwrap();
        assert!(result.ok);
        assert_eq!(result.user_id.as_deref(), Some("alice@example.com"));

        let tokens = store.list(Some("alice@example.com")).unwrap();
        assert!(tokens[0].last_used_at.is_some());

        let audit = store.audit(1, None).unwrap();
        assert_eq!(audit[0].action, AuditAction::Success);
    }

    #[test]
    fn test_validate_unknown_token() {
        let store = AuthStore::open_in_memory().unwrap();
        let result = store.validate("garbage", "alice@example.com", None).unwrap();
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("Invalid authentication token"));

        let audit = store.audit(1, None).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, AuditAction::AuthFailed);
        assert_eq!(audit[0].token.as_deref(), Some("garbage"));
    }

    #[test]
    fn test_validate_user_mismatch() {
        let (store, token) = store_with_token("alice@example.com");
        let result = store.validate(&token, "bob@example.com", None).unwrap();
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("User ID mismatch"));

        let audit = store.audit(1, None).unwrap();
        assert_eq!(audit[0].action, AuditAction::Denied);
    }

    #[test]
    fn test_validate_expired_token() {
        let store = AuthStore::open_in_memory().unwrap();
        let token = store
            .create_token(
                "alice",
                None,
                None,
                Some(Utc::now() - Duration::days(1)),
                &[],
            )
            .unwrap();

        let result = store.validate(&token, "alice", None).unwrap();
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("Token expired"));

        let audit = store.audit(1, None).unwrap();
        assert_eq!(audit[0].action, AuditAction::Expired);
    }

    #[test]
    fn test_revoke_visible_immediately() {
        let (store, token) = store_with_token("alice");

        // Warm the cache with a successful validation.
        assert!(store.validate(&token, "alice", None).unwrap().ok);

        store.revoke(&token).unwrap();
        let result = store.validate(&token, "alice", None).unwrap();
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("disabled"));

        store.enable(&token).unwrap();
        assert!(store.validate(&token, "alice", None).unwrap().ok);
    }

    #[test]
    fn test_delete_token() {
        let (store, token) = store_with_token("alice");
        store.delete(&token).unwrap();
        assert!(matches!(store.delete(&token), Err(AuthError::TokenNotFound)));
        assert!(!store.validate(&token, "alice", None).unwrap().ok);
    }

    #[test]
    fn test_resolve_prefix() {
        let (store, token) = store_with_token("alice");
        let prefix = &token[..12];
        assert_eq!(store.resolve_prefix(prefix).unwrap(), token);
        assert!(matches!(
            store.resolve_prefix("mcp_zzzzzz"),
            Err(AuthError::TokenNotFound)
        ));
    }

    #[test]
    fn test_permissions_round_trip() {
        let store = AuthStore::open_in_memory().unwrap();
        let token = store
            .create_token("root", None, None, None, &["admin".to_string()])
            .unwrap();

        let result = store.validate(&token, "root", None).unwrap();
        assert!(result.ok);
        assert!(result.permissions.contains(&"admin".to_string()));

        let tokens = store.list(Some("root")).unwrap();
        assert!(tokens[0].has_permission("admin"));
        assert!(!tokens[0].has_permission("superuser"));
    }

    #[test]
    fn test_stats() {
        let (store, token) = store_with_token("alice");
        store.validate(&token, "alice", None).unwrap();
        store.validate(&token, "alice", None).unwrap();
        store.validate("bogus", "alice", None).unwrap();

        let stats = store.stats("alice").unwrap();
        assert_eq!(stats.total_tokens, 1);
        assert_eq!(stats.active_tokens, 1);
        assert_eq!(stats.logins_30d, 2);
        assert_eq!(stats.failures_30d, 1);
        assert!(stats.last_activity.is_some());
    }

    #[test]
    fn test_audit_filter_by_user() {
        let (store, token) = store_with_token("alice");
        store.validate(&token, "alice", None).unwrap();
        store.validate("bogus", "bob", None).unwrap();

        let alice_rows = store.audit(1, Some("alice")).unwrap();
        assert_eq!(alice_rows.len(), 1);
        assert_eq!(alice_rows[0].action, AuditAction::Success);
    }
}
