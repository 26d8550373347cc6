//! Channel-related types and state.

use chrono::{DateTime, Utc};
use lantern_proto::irc_to_lower;
use std::collections::HashSet;

use super::uid::Uid;
use crate::security::mask::WildcardMask;

/// Channel topic with metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub text: String,
    pub set_by: String,
    pub set_at: i64,
}

/// An entry in the ban list. The mask is compiled when the ban is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BanEntry {
    pub mask: String,
    pub creator: String,
    pub reason: String,
    pub created_at: i64,
    matcher: WildcardMask,
}

impl BanEntry {
    pub fn new(mask: &str, creator: &str, reason: &str, created_at: i64) -> Self {
        Self {
            mask: mask.to_string(),
            creator: creator.to_string(),
            reason: reason.to_string(),
            created_at,
            matcher: WildcardMask::new(mask),
        }
    }

    /// Whether a `nick!ident@host` string falls under this ban.
    pub fn matches(&self, hostmask: &str) -> bool {
        self.matcher.matches(hostmask)
    }
}

/// Channel modes from the fixed alphabet `iklmnpstP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelModes {
    pub invite_only: bool, // +i
    pub moderated: bool,   // +m
    pub no_external: bool, // +n
    pub private: bool,     // +p
    pub secret: bool,      // +s
    pub topic_lock: bool,  // +t
    pub persistent: bool,  // +P
    pub key: Option<String>,
    pub limit: Option<usize>,
}

impl Default for ChannelModes {
    /// New channels start as `+nt`.
    fn default() -> Self {
        Self {
            invite_only: false,
            moderated: false,
            no_external: true,
            private: false,
            secret: false,
            topic_lock: true,
            persistent: false,
            key: None,
            limit: None,
        }
    }
}

impl ChannelModes {
    /// Mutable access to a boolean mode flag.
    pub fn flag_mut(&mut self, mode: char) -> Option<&mut bool> {
        Some(match mode {
            'i' => &mut self.invite_only,
            'm' => &mut self.moderated,
            'n' => &mut self.no_external,
            'p' => &mut self.private,
            's' => &mut self.secret,
            't' => &mut self.topic_lock,
            'P' => &mut self.persistent,
            _ => return None,
        })
    }

    /// Mode string with parameters, e.g. `("+klnt", ["key", "10"])`.
    ///
    /// The key is only revealed to members.
    pub fn describe(&self, show_key: bool) -> (String, Vec<String>) {
        let mut modes = String::from("+");
        let mut args = Vec::new();
        let flags = [
            (self.invite_only, 'i'),
            (self.key.is_some(), 'k'),
            (self.limit.is_some(), 'l'),
            (self.moderated, 'm'),
            (self.no_external, 'n'),
            (self.private, 'p'),
            (self.secret, 's'),
            (self.topic_lock, 't'),
            (self.persistent, 'P'),
        ];
        for (on, c) in flags {
            if !on {
                continue;
            }
            modes.push(c);
            match c {
                'k' => args.push(if show_key {
                    self.key.clone().unwrap_or_default()
                } else {
                    "*".to_string()
                }),
                'l' => args.push(self.limit.unwrap_or_default().to_string()),
                _ => {}
            }
        }
        (modes, args)
    }
}

/// A channel and its membership. Per-member roles live on the user side.
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub topic: Option<Topic>,
    pub modes: ChannelModes,
    pub members: HashSet<Uid>,
    pub bans: Vec<BanEntry>,
    pub invites: HashSet<Uid>,
    pub created_at: DateTime<Utc>,
}

impl Channel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            topic: None,
            modes: ChannelModes::default(),
            members: HashSet::new(),
            bans: Vec::new(),
            invites: HashSet::new(),
            created_at: Utc::now(),
        }
    }

    pub fn folded_name(&self) -> String {
        irc_to_lower(&self.name)
    }

    /// Whether the ban list holds `mask` (case-insensitive).
    pub fn has_ban(&self, mask: &str) -> bool {
        let folded = irc_to_lower(mask);
        self.bans.iter().any(|b| irc_to_lower(&b.mask) == folded)
    }

    /// Hidden from non-members in WHOIS and NAMES.
    pub fn is_hidden(&self) -> bool {
        self.modes.secret || self.modes.private
    }
}

/// `#` or `&` sigil followed by at least one character; no spaces, commas
/// or control-G, at most 50 bytes.
pub fn is_valid_channel_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some('#' | '&'))
        && name.len() > 1
        && name.len() <= 50
        && chars.all(|c| !matches!(c, ' ' | ',' | '\x07' | '\r' | '\n' | '\0'))
}
