//! Owner address lookup used to elevate roles at registration.

use async_trait::async_trait;
use std::collections::HashSet;

/// Decides whether an email belongs to a site owner.
#[async_trait]
pub trait OwnerDirectory: Send + Sync {
    async fn is_owner(&self, email: &str) -> bool;
}

/// Owner addresses fixed at startup (e.g. from `ESTATE_OWNER_EMAILS`).
#[derive(Debug, Clone, Default)]
pub struct StaticOwnerDirectory {
    emails: HashSet<String>,
}

impl StaticOwnerDirectory {
    pub fn new(emails: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

#[async_trait]
impl OwnerDirectory for StaticOwnerDirectory {
    async fn is_owner(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }
}
