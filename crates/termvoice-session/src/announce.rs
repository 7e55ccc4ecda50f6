/// Sink for accessibility announcements (screen reader alerts).
pub trait Announcer: Send + Sync {
    fn announce(&self, message: &str);
}

/// Announcer that writes announcements to the log.
#[derive(Debug, Default)]
pub struct TracingAnnouncer;

impl Announcer for TracingAnnouncer {
    fn announce(&self, message: &str) {
        tracing::info!(message = %message, "Announcement");
    }
}

/// Message announced after text was inserted into the console.
pub fn inserted_message(text: &str) -> String {
    format!("{} inserted", text.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inserted_message_trims_leading_space() {
        assert_eq!(inserted_message(" ls -la"), "ls -la inserted");
    }

    #[test]
    fn test_tracing_announcer_does_not_panic() {
        TracingAnnouncer.announce("hello inserted");
    }
}
