//! Outbound notifications for the password reset flow.

use crate::error::Result;
use async_trait::async_trait;
use chrono::Duration;

/// A password reset message ready for delivery.
#[derive(Clone)]
pub struct PasswordResetEmail {
    pub to_email: String,
    pub to_name: String,
    /// Link carrying the raw reset token.
    pub reset_link: String,
    /// How long the link stays usable.
    pub valid_for: Duration,
}

impl std::fmt::Debug for PasswordResetEmail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordResetEmail")
            .field("to_email", &self.to_email)
            .field("to_name", &self.to_name)
            .field("reset_link", &"[redacted]")
            .field("valid_for", &self.valid_for)
            .finish()
    }
}

/// Delivers password reset emails.
///
/// Implement this for your mail provider (SMTP, Resend, SendGrid, ...).
#[async_trait]
pub trait ResetNotifier: Send + Sync {
    async fn send_password_reset_email(&self, email: PasswordResetEmail) -> Result<()>;
}

/// A notifier that prints reset emails to stdout instead of sending them.
///
/// # Security Warning
///
/// **FOR DEVELOPMENT USE ONLY.** With full output enabled the reset link,
/// which is a live credential, is printed. By default it is redacted.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    prefix: String,
    show_full_content: bool,
}

impl ConsoleNotifier {
    pub fn new() -> Self {
        Self {
            prefix: "[EMAIL]".to_string(),
            show_full_content: false,
        }
    }

    /// Print the reset link as well.
    pub fn with_full_output(mut self, enabled: bool) -> Self {
        if enabled {
            tracing::warn!(
                "ConsoleNotifier: full output enabled - reset links will be visible in logs. \
                 Do not use in production!"
            );
        }
        self.show_full_content = enabled;
        self
    }

    fn render(&self, email: &PasswordResetEmail) -> Vec<String> {
        let link = if self.show_full_content {
            email.reset_link.as_str()
        } else {
            "[redacted]"
        };

        vec![
            format!("{} ════════════════════════════════════════", self.prefix),
            format!("{} To:      {} <{}>", self.prefix, email.to_name, email.to_email),
            format!("{} Subject: Reset your password", self.prefix),
            format!("{} ────────────────────────────────────────", self.prefix),
            format!("{} Hi {},", self.prefix, email.to_name),
            format!(
                "{} Use this link within {} minutes to choose a new password:",
                self.prefix,
                email.valid_for.num_minutes()
            ),
            format!("{} {}", self.prefix, link),
            format!("{} ════════════════════════════════════════", self.prefix),
        ]
    }
}

impl Default for ConsoleNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResetNotifier for ConsoleNotifier {
    async fn send_password_reset_email(&self, email: PasswordResetEmail) -> Result<()> {
        for line in self.render(&email) {
            println!("{}", line);
        }
        tracing::debug!(to = %email.to_email, "Password reset email printed to console");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email() -> PasswordResetEmail {
        PasswordResetEmail {
            to_email: "alice@x.com".into(),
            to_name: "alice".into(),
            reset_link: "https://estate.test/reset-password/secret-token".into(),
            valid_for: Duration::minutes(15),
        }
    }

    #[test]
    fn test_console_redacts_link_by_default() {
        let lines = ConsoleNotifier::new().render(&email());
        assert!(lines.iter().all(|l| !l.contains("secret-token")));
        assert!(lines.iter().any(|l| l.contains("alice@x.com")));
    }

    #[test]
    fn test_console_full_output_shows_link() {
        let lines = ConsoleNotifier::new().with_full_output(true).render(&email());
        assert!(lines.iter().any(|l| l.contains("secret-token")));
    }

    #[test]
    fn test_console_states_link_lifetime() {
        let lines = ConsoleNotifier::new().render(&email());
        assert!(lines.iter().any(|l| l.contains("within 15 minutes")));

        let longer = PasswordResetEmail {
            valid_for: Duration::hours(1),
            ..email()
        };
        let lines = ConsoleNotifier::new().render(&longer);
        assert!(lines.iter().any(|l| l.contains("within 60 minutes")));
    }

    #[test]
    fn test_debug_redacts_link() {
        assert!(!format!("{:?}", email()).contains("secret-token"));
    }

    #[tokio::test]
    async fn test_console_send_succeeds() {
        assert!(ConsoleNotifier::new().send_password_reset_email(email()).await.is_ok());
    }
}
