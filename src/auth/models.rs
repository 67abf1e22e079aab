//! Records owned by the credential store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Default cap on concurrent refresh sessions per user.
pub const DEFAULT_MAX_SESSIONS: usize = 3;

/// Used reset tokens become collectable this long after use.
pub const RESET_TOKEN_RETENTION_HOURS: i64 = 24;

/// Account role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Basic,
    Broker,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Broker => "broker",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One device session, embedded in its [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub device: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Same device metadata, new token value and lifetime.
    pub fn rotated(
        &self,
        token: String,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> RefreshTokenRecord {
        RefreshTokenRecord {
            token,
            expires_at,
            device: self.device.clone(),
            user_agent: self.user_agent.clone(),
            created_at: now,
        }
    }
}

/// A registered account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Oldest first.
    pub refresh_tokens: Vec<RefreshTokenRecord>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role,
            refresh_tokens: Vec::new(),
            last_login_at: None,
            created_at: now,
        }
    }

    /// Append a session, evicting the oldest ones beyond `max_sessions`.
    ///
    /// Returns the evicted records, oldest first.
    pub fn push_refresh_token(
        &mut self,
        record: RefreshTokenRecord,
        max_sessions: usize,
    ) -> Vec<RefreshTokenRecord> {
        self.refresh_tokens.push(record);
        let max_sessions = max_sessions.max(1);
        let overflow = self.refresh_tokens.len().saturating_sub(max_sessions);
        self.refresh_tokens.drain(..overflow).collect()
    }

    /// Drop sessions that have expired. Returns how many were removed.
    pub fn prune_expired_sessions(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|r| !r.is_expired(now));
        before - self.refresh_tokens.len()
    }

    /// Index of the unexpired session holding `token`.
    pub fn active_session_index(&self, token: &str, now: DateTime<Utc>) -> Option<usize> {
        self.refresh_tokens
            .iter()
            .position(|r| r.token == token && !r.is_expired(now))
    }

    pub fn remove_refresh_token(&mut self, token: &str) -> bool {
        let before = self.refresh_tokens.len();
        self.refresh_tokens.retain(|r| r.token != token);
        before != self.refresh_tokens.len()
    }

    pub fn clear_refresh_tokens(&mut self) {
        self.refresh_tokens.clear();
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary::from(self)
    }
}

/// A user as returned to callers: no password hash, no session tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// A password reset token.
///
/// Only the SHA-256 digest of the emailed token is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordResetToken {
    pub id: String,
    pub user_id: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PasswordResetToken {
    pub fn new(
        user_id: impl Into<String>,
        token_hash: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            token_hash: token_hash.into(),
            expires_at: now + ttl,
            used: false,
            used_at: None,
            created_at: now,
        }
    }

    /// Unused and unexpired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.used = true;
        self.used_at = Some(now);
    }

    /// Expired, or used more than the retention window ago.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        if self.expires_at <= now {
            return true;
        }
        match self.used_at {
            Some(used_at) => now - used_at >= Duration::hours(RESET_TOKEN_RETENTION_HOURS),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn record(token: &str, created: DateTime<Utc>) -> RefreshTokenRecord {
        RefreshTokenRecord {
            token: token.to_string(),
            expires_at: created + Duration::days(30),
            device: "laptop".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            created_at: created,
        }
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut user = User::new("alice", "alice@x.com", "hash", Role::Basic, t0());

        for i in 0..3 {
            let evicted = user.push_refresh_token(record(&format!("t{}", i), t0()), 3);
            assert!(evicted.is_empty());
        }

        let evicted = user.push_refresh_token(record("t3", t0()), 3);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].token, "t0");

        let tokens: Vec<_> = user.refresh_tokens.iter().map(|r| r.token.as_str()).collect();
        assert_eq!(tokens, vec!["t1", "t2", "t3"]);
    }

    #[test]
    fn test_session_count_never_exceeds_cap() {
        let mut user = User::new("alice", "alice@x.com", "hash", Role::Basic, t0());
        for i in 0..20 {
            user.push_refresh_token(record(&format!("t{}", i), t0()), DEFAULT_MAX_SESSIONS);
            assert!(user.refresh_tokens.len() <= DEFAULT_MAX_SESSIONS);
        }
    }

    #[test]
    fn test_prune_and_lookup_ignore_expired_sessions() {
        let mut user = User::new("alice", "alice@x.com", "hash", Role::Basic, t0());
        let mut stale = record("old", t0());
        stale.expires_at = t0() + Duration::minutes(1);
        user.push_refresh_token(stale, 3);
        user.push_refresh_token(record("fresh", t0()), 3);

        let later = t0() + Duration::minutes(1);
        assert_eq!(user.active_session_index("old", later), None);
        assert_eq!(user.active_session_index("fresh", later), Some(1));

        assert_eq!(user.prune_expired_sessions(later), 1);
        assert_eq!(user.refresh_tokens.len(), 1);
    }

    #[test]
    fn test_summary_has_no_secrets() {
        let user = User::new("alice", "alice@x.com", "$argon2id$secret", Role::Broker, t0());
        let json = serde_json::to_string(&user.summary()).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"role\":\"broker\""));
    }

    #[test]
    fn test_reset_token_lifecycle() {
        let mut token = PasswordResetToken::new("u1", "digest", t0(), Duration::minutes(15));
        assert!(token.is_active(t0()));
        assert!(!token.is_active(t0() + Duration::minutes(15)));
        assert!(token.is_stale(t0() + Duration::minutes(15)));

        token.mark_used(t0() + Duration::minutes(1));
        assert!(!token.is_active(t0() + Duration::minutes(2)));
    }

    #[test]
    fn test_used_token_stale_after_retention() {
        let mut token = PasswordResetToken::new("u1", "digest", t0(), Duration::days(7));
        token.mark_used(t0());

        assert!(!token.is_stale(t0() + Duration::hours(23)));
        assert!(token.is_stale(t0() + Duration::hours(24)));
    }
}
