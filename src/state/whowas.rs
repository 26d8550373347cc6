//! Bounded history of departed users for WHOWAS.

use chrono::{DateTime, Utc};
use lantern_proto::irc_to_lower;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use super::user::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhowasEntry {
    pub nick: String,
    pub ident: String,
    pub host: String,
    pub realname: String,
    pub departed_at: DateTime<Utc>,
}

/// Ring buffer of departed users. Capture is off until the whowas module
/// enables it.
#[derive(Debug)]
pub struct WhowasHistory {
    enabled: AtomicBool,
    capacity: usize,
    entries: Mutex<VecDeque<WhowasEntry>>,
}

impl WhowasHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Turning capture off also forgets everything recorded so far.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.entries.lock().clear();
        }
    }

    pub fn record(&self, user: &User) {
        if !self.is_enabled() || !user.registered {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(WhowasEntry {
            nick: user.nick.clone(),
            ident: user.ident.clone(),
            host: user.visible_host.clone(),
            realname: user.realname.clone(),
            departed_at: Utc::now(),
        });
    }

    /// Entries for `nick`, newest first, at most `max` (0 = all).
    pub fn lookup(&self, nick: &str, max: usize) -> Vec<WhowasEntry> {
        let folded = irc_to_lower(nick);
        let limit = if max == 0 { usize::MAX } else { max };
        self.entries
            .lock()
            .iter()
            .rev()
            .filter(|e| irc_to_lower(&e.nick) == folded)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn departed(nick: &str) -> User {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut user = User::new(
            "0LNAAAAAA".into(),
            "10.0.0.1".parse().unwrap(),
            "10.0.0.1".into(),
            false,
            tx,
        );
        user.nick = nick.into();
        user.ident = "u".into();
        user.registered = true;
        user
    }

    #[test]
    fn disabled_history_records_nothing() {
        let history = WhowasHistory::new(4);
        history.record(&departed("alice"));
        assert!(history.is_empty());
    }

    #[test]
    fn newest_first_and_bounded() {
        let history = WhowasHistory::new(2);
        history.set_enabled(true);
        let mut first = departed("alice");
        first.realname = "first".into();
        history.record(&first);
        let mut second = departed("Alice");
        second.realname = "second".into();
        history.record(&second);
        history.record(&departed("bob"));

        assert_eq!(history.len(), 2);
        let found = history.lookup("ALICE", 0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].realname, "second");
    }

    #[test]
    fn disabling_clears() {
        let history = WhowasHistory::new(4);
        history.set_enabled(true);
        history.record(&departed("alice"));
        history.set_enabled(false);
        assert!(history.lookup("alice", 0).is_empty());
    }
}
