//! Single-slot error and status banners with auto-dismiss deadlines.
//! A new message replaces whatever the slot currently holds.

use std::time::{Duration, Instant};

/// Errors stay up for 10s, informational messages for 5s.
pub const ERROR_TTL: Duration = Duration::from_secs(10);
pub const STATUS_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    /// `None` keeps the banner up until it is replaced or cleared.
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct Banners {
    error: Option<Banner>,
    status: Option<Banner>,
}

impl Banners {
    pub fn show_error(&mut self, message: impl Into<String>) {
        self.error = Some(Banner {
            message: message.into(),
            deadline: Some(Instant::now() + ERROR_TTL),
        });
    }

    /// Remediation messages (e.g. no microphone) stay until replaced.
    pub fn show_error_persistent(&mut self, message: impl Into<String>) {
        self.error = Some(Banner {
            message: message.into(),
            deadline: None,
        });
    }

    pub fn show_status(&mut self, message: impl Into<String>) {
        self.status = Some(Banner {
            message: message.into(),
            deadline: Some(Instant::now() + STATUS_TTL),
        });
    }

    /// Lock notices stay up while a foreign server job runs.
    pub fn show_status_persistent(&mut self, message: impl Into<String>) {
        self.status = Some(Banner {
            message: message.into(),
            deadline: None,
        });
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Drop any banner whose deadline has passed.
    pub fn expire(&mut self, now: Instant) {
        for slot in [&mut self.error, &mut self.status] {
            if let Some(b) = slot {
                if matches!(b.deadline, Some(d) if d <= now) {
                    *slot = None;
                }
            }
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|b| b.message.as_str())
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref().map(|b| b.message.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_expires_after_ttl() {
        let mut banners = Banners::default();
        banners.show_error("boom");
        let now = Instant::now();
        banners.expire(now);
        assert_eq!(banners.error(), Some("boom"));
        banners.expire(now + ERROR_TTL + Duration::from_millis(1));
        assert_eq!(banners.error(), None);
    }

    #[test]
    fn status_expires_before_error() {
        let mut banners = Banners::default();
        banners.show_error("e");
        banners.show_status("s");
        let later = Instant::now() + STATUS_TTL + Duration::from_millis(1);
        banners.expire(later);
        assert_eq!(banners.status(), None);
        assert_eq!(banners.error(), Some("e"));
    }

    #[test]
    fn new_message_replaces_current_one() {
        let mut banners = Banners::default();
        banners.show_status("first");
        banners.show_status("second");
        assert_eq!(banners.status(), Some("second"));
    }

    #[test]
    fn persistent_banner_survives_expiry() {
        let mut banners = Banners::default();
        banners.show_error_persistent("no mic");
        banners.expire(Instant::now() + Duration::from_secs(3600));
        assert_eq!(banners.error(), Some("no mic"));
    }
}
