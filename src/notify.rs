use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::ClientConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub message: String,
    pub expires_at: Instant,
}

/// Auto-dismissing notification overlay state.
#[derive(Debug, Clone)]
pub struct ToastQueue {
    short_ttl: Duration,
    long_ttl: Duration,
    next_id: u64,
    toasts: Vec<Toast>,
}

impl ToastQueue {
    pub fn new(short_ttl: Duration, long_ttl: Duration) -> Self {
        Self {
            short_ttl,
            long_ttl,
            next_id: 1,
            toasts: Vec::new(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.toast_success_ttl(), config.toast_error_ttl())
    }

    pub fn push(&mut self, level: ToastLevel, message: impl Into<String>) -> u64 {
        self.push_at(level, message, Instant::now())
    }

    /// Queues a toast, dropping any that have already expired.
    pub fn push_at(&mut self, level: ToastLevel, message: impl Into<String>, now: Instant) -> u64 {
        self.toasts.retain(|toast| toast.expires_at > now);
        let message = message.into();
        let ttl = match level {
            ToastLevel::Success | ToastLevel::Info => self.short_ttl,
            ToastLevel::Warning | ToastLevel::Error => self.long_ttl,
        };
        let id = self.next_id;
        self.next_id += 1;
        tracing::debug!(toast_id = id, level = ?level, message = %message, "toast");
        self.toasts.push(Toast {
            id,
            level,
            message,
            expires_at: now + ttl,
        });
        id
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastLevel::Success, message)
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastLevel::Info, message)
    }

    pub fn warning(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastLevel::Warning, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastLevel::Error, message)
    }

    /// Shows the user-facing text of a failed action.
    pub fn failure(&mut self, error: &AppError) -> u64 {
        self.error(error.user_message())
    }

    /// Drops expired toasts and returns the ones still on screen.
    pub fn active(&mut self, now: Instant) -> &[Toast] {
        self.toasts.retain(|toast| toast.expires_at > now);
        &self.toasts
    }

    pub fn dismiss(&mut self, id: u64) {
        self.toasts.retain(|toast| toast.id != id);
    }

    pub fn last(&self) -> Option<&Toast> {
        self.toasts.last()
    }

    pub fn all(&self) -> &[Toast] {
        &self.toasts
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{ToastLevel, ToastQueue};
    use crate::error::AppError;

    #[test]
    fn errors_outlive_success_toasts() {
        let mut queue = ToastQueue::new(Duration::from_secs(3), Duration::from_secs(5));
        let start = Instant::now();
        queue.push_at(ToastLevel::Success, "Saved", start);
        queue.push_at(ToastLevel::Error, "Failed", start);

        assert_eq!(queue.active(start + Duration::from_secs(1)).len(), 2);
        let remaining = queue.active(start + Duration::from_secs(4));
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].level, ToastLevel::Error);
        assert!(queue.active(start + Duration::from_secs(6)).is_empty());
    }

    #[test]
    fn pushing_prunes_expired_toasts() {
        let mut queue = ToastQueue::new(Duration::from_secs(3), Duration::from_secs(5));
        let start = Instant::now();
        for second in 0..10 {
            queue.push_at(ToastLevel::Success, "Saved", start + Duration::from_secs(second * 4));
        }
        assert_eq!(queue.all().len(), 1);

        queue.push_at(ToastLevel::Error, "Failed", start + Duration::from_secs(37));
        assert_eq!(queue.all().len(), 2);
    }

    #[test]
    fn dismisses_by_id() {
        let mut queue = ToastQueue::new(Duration::from_secs(3), Duration::from_secs(5));
        let first = queue.info("one");
        queue.info("two");
        queue.dismiss(first);
        assert_eq!(queue.all().len(), 1);
        assert_eq!(queue.last().map(|toast| toast.message.as_str()), Some("two"));
    }

    #[test]
    fn failure_uses_user_message() {
        let mut queue = ToastQueue::new(Duration::from_secs(3), Duration::from_secs(5));
        queue.failure(&AppError::Dependency(String::new()));
        assert_eq!(
            queue.last().map(|toast| toast.message.as_str()),
            Some("Something went wrong. Please try again.")
        );
    }
}
