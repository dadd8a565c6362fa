use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

/// A transient, user-visible message. Errors get a longer default lifetime
/// since they usually require the user to act.
#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    pub expires_at: Instant,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, lifetime: Duration) -> Self {
        Self {
            message: message.into(),
            level,
            expires_at: Instant::now() + lifetime,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Newest-first queue of notifications, pruned on every tick.
#[derive(Debug, Default)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
}

const INFO_LIFETIME: Duration = Duration::from_secs(5);
const ERROR_LIFETIME: Duration = Duration::from_secs(12);

impl NotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Notification::new(message, NotificationLevel::Info, INFO_LIFETIME));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(Notification::new(
            message,
            NotificationLevel::Warning,
            INFO_LIFETIME,
        ));
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Notification::new(
            message,
            NotificationLevel::Error,
            ERROR_LIFETIME,
        ));
    }

    fn push(&mut self, notification: Notification) {
        self.notifications.insert(0, notification);
    }

    /// Drop expired entries; returns true when anything changed so the
    /// caller knows to repaint.
    pub fn update(&mut self) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired());
        self.notifications.len() != before
    }

    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn dismiss_current(&mut self) -> bool {
        if self.notifications.is_empty() {
            false
        } else {
            self.notifications.remove(0);
            true
        }
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}
