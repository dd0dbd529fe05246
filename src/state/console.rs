// Console tab state.
// Activity log of sync events and operation results, with an unread-error badge.

use chrono::{DateTime, Utc};
use ratatui::widgets::ListState;

use filestash::sync::Notice;

/// Console message level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Info,
    Warn,
    Error,
}

/// A console message for the activity log.
#[derive(Debug, Clone)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ConsoleMessage {
    fn new(level: ConsoleLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ConsoleLevel::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(ConsoleLevel::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ConsoleLevel::Error, message)
    }

    pub fn from_notice(notice: &Notice) -> Self {
        let text = format!("{}: {}", notice.title(), notice.message());
        match notice {
            Notice::Offline => Self::warn(text),
            Notice::RetriesExhausted { .. } | Notice::RemoteRejected(_) => Self::error(text),
        }
    }
}

/// Bounded message log.
#[derive(Debug, Default)]
pub struct ConsoleLog {
    pub messages: Vec<ConsoleMessage>,
    pub list_state: ListState,
    /// Errors logged since the Console tab was last viewed.
    pub unread: usize,
}

impl ConsoleLog {
    const MAX_MESSAGES: usize = 500;

    pub fn push(&mut self, message: ConsoleMessage) {
        if message.level == ConsoleLevel::Error {
            self.unread += 1;
        }
        self.messages.push(message);
        if self.messages.len() > Self::MAX_MESSAGES {
            let excess = self.messages.len() - Self::MAX_MESSAGES;
            self.messages.drain(..excess);
        }
    }

    pub fn mark_read(&mut self) {
        self.unread = 0;
    }

    pub fn scroll_down(&mut self) {
        let len = self.messages.len();
        if len == 0 {
            return;
        }
        let i = self.list_state.selected().map_or(0, |i| (i + 1).min(len - 1));
        self.list_state.select(Some(i));
    }

    pub fn scroll_up(&mut self) {
        let i = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
        if !self.messages.is_empty() {
            self.list_state.select(Some(i));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unread_counts_errors_only() {
        let mut log = ConsoleLog::default();
        log.push(ConsoleMessage::info("refreshed"));
        log.push(ConsoleMessage::warn("offline"));
        log.push(ConsoleMessage::error("upload failed"));
        assert_eq!(log.unread, 1);

        log.mark_read();
        assert_eq!(log.unread, 0);
    }

    #[test]
    fn test_log_is_bounded() {
        let mut log = ConsoleLog::default();
        for i in 0..ConsoleLog::MAX_MESSAGES + 10 {
            log.push(ConsoleMessage::info(format!("message {}", i)));
        }
        assert_eq!(log.messages.len(), ConsoleLog::MAX_MESSAGES);
        assert_eq!(log.messages[0].message, "message 10");
    }

    #[test]
    fn test_notice_levels() {
        assert_eq!(
            ConsoleMessage::from_notice(&Notice::Offline).level,
            ConsoleLevel::Warn
        );
        let exhausted = ConsoleMessage::from_notice(&Notice::RetriesExhausted { attempts: 4 });
        assert_eq!(exhausted.level, ConsoleLevel::Error);
        assert!(exhausted.message.starts_with("Error: Failed to load files"));
    }
}
