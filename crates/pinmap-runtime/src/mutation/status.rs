#![forbid(unsafe_code)]

//! Transient status messages.
//!
//! Every mutation failure lands here so the view can surface it. Messages
//! expire after a TTL measured on the host clock; an identical message
//! posted while the first is still visible refreshes it instead of
//! stacking a duplicate.

use web_time::Duration;

/// Severity of a status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub id: u64,
    pub level: StatusLevel,
    pub text: String,
    pub expires_at: Duration,
}

/// Queue of visible status messages, oldest first.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    ttl: Duration,
    next_id: u64,
    messages: Vec<StatusMessage>,
}

impl StatusBoard {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            next_id: 1,
            messages: Vec::new(),
        }
    }

    /// Post a message visible until `now + ttl`. Returns its id.
    pub fn post(&mut self, level: StatusLevel, text: impl Into<String>, now: Duration) -> u64 {
        let text = text.into();
        let expires_at = now.saturating_add(self.ttl);
        if let Some(existing) = self
            .messages
            .iter_mut()
            .find(|m| m.level == level && m.text == text)
        {
            existing.expires_at = expires_at;
            return existing.id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(StatusMessage {
            id,
            level,
            text,
            expires_at,
        });
        id
    }

    /// Drop messages whose TTL elapsed. Returns how many were removed.
    pub fn expire(&mut self, now: Duration) -> usize {
        let before = self.messages.len();
        self.messages.retain(|m| m.expires_at > now);
        before - self.messages.len()
    }

    /// Remove one message early.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != id);
        before != self.messages.len()
    }

    #[must_use]
    pub fn messages(&self) -> &[StatusMessage] {
        &self.messages
    }

    #[must_use]
    pub fn errors(&self) -> impl Iterator<Item = &StatusMessage> {
        self.messages
            .iter()
            .filter(|m| m.level == StatusLevel::Error)
    }

    /// Earliest expiry, for host scheduling.
    #[must_use]
    pub fn next_expiry(&self) -> Option<Duration> {
        self.messages.iter().map(|m| m.expires_at).min()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(4);

    #[test]
    fn messages_expire_after_ttl() {
        let mut board = StatusBoard::new(TTL);
        board.post(StatusLevel::Error, "Could not delete pin", Duration::ZERO);
        assert_eq!(board.expire(Duration::from_millis(3999)), 0);
        assert_eq!(board.expire(Duration::from_secs(4)), 1);
        assert!(board.is_empty());
    }

    #[test]
    fn duplicates_refresh_instead_of_stacking() {
        let mut board = StatusBoard::new(TTL);
        let first = board.post(StatusLevel::Error, "offline", Duration::ZERO);
        let second = board.post(StatusLevel::Error, "offline", Duration::from_secs(2));
        assert_eq!(first, second);
        assert_eq!(board.messages().len(), 1);
        assert_eq!(board.next_expiry(), Some(Duration::from_secs(6)));
    }

    #[test]
    fn dismiss_and_filter() {
        let mut board = StatusBoard::new(TTL);
        let info = board.post(StatusLevel::Info, "saved", Duration::ZERO);
        board.post(StatusLevel::Error, "failed", Duration::ZERO);
        assert_eq!(board.errors().count(), 1);
        assert!(board.dismiss(info));
        assert!(!board.dismiss(info));
        assert_eq!(board.messages().len(), 1);
    }
}
