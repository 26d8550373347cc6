//! User-related types and state.

use chrono::{DateTime, Utc};
use lantern_proto::Message;
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::mpsc;

use super::uid::Uid;

/// Traffic queued for a connection's writer.
#[derive(Debug, Clone)]
pub enum Outbound {
    Line(Message),
    /// Close the connection with this reason after flushing queued lines.
    Close(String),
}

pub type OutboundTx = mpsc::UnboundedSender<Outbound>;

/// User modes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UserModes {
    pub admin: bool,           // +a
    pub oper: bool,            // +o
    pub invisible: bool,       // +i
    pub protected: bool,       // +p
    pub registered_nick: bool, // +r
    pub server_notices: bool,  // +s
    pub wallops: bool,         // +w
    pub service: bool,         // +S
}

impl UserModes {
    /// Convert modes to a string like "+iow".
    pub fn as_mode_string(&self) -> String {
        let flags = [
            (self.admin, 'a'),
            (self.invisible, 'i'),
            (self.oper, 'o'),
            (self.protected, 'p'),
            (self.registered_nick, 'r'),
            (self.server_notices, 's'),
            (self.wallops, 'w'),
            (self.service, 'S'),
        ];
        let mut s = String::from("+");
        s.extend(flags.iter().filter(|(on, _)| *on).map(|(_, c)| *c));
        s
    }

    /// Mutable access to the flag behind a mode letter.
    pub fn flag_mut(&mut self, mode: char) -> Option<&mut bool> {
        Some(match mode {
            'a' => &mut self.admin,
            'o' => &mut self.oper,
            'i' => &mut self.invisible,
            'p' => &mut self.protected,
            'r' => &mut self.registered_nick,
            's' => &mut self.server_notices,
            'w' => &mut self.wallops,
            'S' => &mut self.service,
            _ => return None,
        })
    }
}

/// A user's standing in one channel.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemberRoles {
    pub chanop: bool,
    pub voice: bool,
    /// Joined while holding server admin status.
    pub admin: bool,
    /// Joined with IJOIN: hidden from other members.
    pub invisible: bool,
}

impl MemberRoles {
    /// Highest prefix, or all of them with `multi_prefix`.
    pub fn prefixes(&self, multi_prefix: bool) -> String {
        let mut out = String::new();
        if self.chanop {
            out.push('@');
        }
        if self.voice && (multi_prefix || out.is_empty()) {
            out.push('+');
        }
        out
    }
}

/// IRCv3 capabilities the client enabled.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub multi_prefix: bool,
    pub userhost_in_names: bool,
    /// Connected over TLS (not negotiable).
    pub tls: bool,
}

/// A connected client, registered or not.
#[derive(Debug, Clone)]
pub struct User {
    pub uid: Uid,
    /// `*` until a NICK is accepted.
    pub nick: String,
    pub ident: String,
    pub realname: String,
    /// Real host (the peer address in text form).
    pub host: String,
    /// Host shown to other users (cloaked when cloaking is on).
    pub visible_host: String,
    pub ip: IpAddr,
    pub modes: UserModes,
    /// Folded channel name → roles.
    pub channels: HashMap<String, MemberRoles>,
    pub away: Option<String>,
    pub caps: Capabilities,
    pub registered: bool,
    pub signon: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    tx: OutboundTx,
}

impl User {
    pub fn new(uid: Uid, ip: IpAddr, visible_host: String, tls: bool, tx: OutboundTx) -> Self {
        let now = Utc::now();
        Self {
            uid,
            nick: "*".to_string(),
            ident: String::new(),
            realname: String::new(),
            host: ip.to_string(),
            visible_host,
            ip,
            modes: UserModes::default(),
            channels: HashMap::new(),
            away: None,
            caps: Capabilities {
                tls,
                ..Capabilities::default()
            },
            registered: false,
            signon: now,
            last_activity: now,
            tx,
        }
    }

    /// `nick!ident@visible_host`, the prefix other users see.
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.visible_host)
    }

    /// `nick!ident@host` with the real host.
    pub fn real_mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.host)
    }

    /// Queue a line for this user. A closed connection drops it silently.
    pub fn send(&self, msg: Message) {
        let _ = self.tx.send(Outbound::Line(msg));
    }

    /// Ask this user's connection to close.
    pub fn close(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Outbound::Close(reason.into()));
    }

    pub fn sender(&self) -> &OutboundTx {
        &self.tx
    }
}

/// Characters allowed anywhere in a nickname.
pub fn is_valid_nick_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || is_special_nick_char(c) || c == '-'
}

fn is_special_nick_char(c: char) -> bool {
    matches!(c, '_' | '[' | ']' | '\\' | '^' | '{' | '}' | '|' | '`')
}

/// `[A-Za-z_\-\[\]\\^{}|`][A-Za-z0-9_\-\[\]\\^{}|`]*`, at most `max_len` long.
pub fn is_valid_nick(nick: &str, max_len: usize) -> bool {
    let mut chars = nick.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    nick.len() <= max_len
        && (first.is_ascii_alphabetic() || is_special_nick_char(first) || first == '-')
        && chars.all(is_valid_nick_char)
}
