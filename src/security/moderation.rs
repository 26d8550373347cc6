//! Server-wide moderation lists: K-lines, Q-lines and Z-lines.
//!
//! | Type   | Target            | Checked at                 |
//! |--------|-------------------|----------------------------|
//! | K-line | `ident@host` mask | accept and registration    |
//! | Q-line | nick mask         | NICK                       |
//! | Z-line | IPv4 (or CIDR)    | connection accept          |
//!
//! Each list is an independent [`ModerationStore`] guarded by its own lock.
//! Stores optionally write through to a [`ModerationPersist`] backend: append
//! on add, full rewrite on remove.

use chrono::Utc;
use ipnet::Ipv4Net;
use lantern_proto::irc_to_lower;
use parking_lot::RwLock;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::mask::WildcardMask;
use super::persist::{ModerationPersist, PersistError};
use crate::state::is_valid_nick_char;

/// Which list a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationKind {
    KLine,
    QLine,
    ZLine,
}

impl ModerationKind {
    pub const ALL: [ModerationKind; 3] = [Self::KLine, Self::QLine, Self::ZLine];

    pub fn name(self) -> &'static str {
        match self {
            Self::KLine => "K-line",
            Self::QLine => "Q-line",
            Self::ZLine => "Z-line",
        }
    }

    /// STATS letter for this list.
    pub fn letter(self) -> char {
        match self {
            Self::KLine => 'k',
            Self::QLine => 'q',
            Self::ZLine => 'z',
        }
    }

    /// Field name of the target in the persisted record.
    pub fn target_field(self) -> &'static str {
        match self {
            Self::QLine => "nick",
            Self::KLine | Self::ZLine => "address",
        }
    }

    /// Check target syntax for this list.
    pub fn validate_target(self, target: &str) -> Result<(), ModerationError> {
        let ok = !target.is_empty()
            && !target.contains(' ')
            && match self {
                Self::KLine => valid_kline_target(target),
                Self::QLine => target
                    .chars()
                    .all(|c| c == '*' || c == '?' || is_valid_nick_char(c)),
                Self::ZLine => valid_zline_target(target),
            };
        if ok {
            Ok(())
        } else {
            Err(ModerationError::InvalidTarget {
                kind: self.name(),
                target: target.to_string(),
            })
        }
    }
}

fn valid_kline_target(target: &str) -> bool {
    match target.split_once('@') {
        Some((ident, host)) => {
            !ident.is_empty() && !host.is_empty() && !host.contains('@') && !target.contains('!')
        }
        None => false,
    }
}

fn valid_zline_target(target: &str) -> bool {
    if target.contains('/') {
        return target.parse::<Ipv4Net>().is_ok();
    }
    let octets: Vec<&str> = target.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| *o == "*" || (!o.is_empty() && o.len() <= 3 && o.parse::<u8>().is_ok()))
}

/// One K/Q/Z-line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModerationRecord {
    pub target: String,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    /// 0 means permanent.
    pub duration_hours: u32,
    pub creator: String,
    pub reason: String,
}

impl ModerationRecord {
    pub fn new(target: &str, duration_hours: u32, creator: &str, reason: &str) -> Self {
        Self {
            target: target.to_string(),
            created_at: Utc::now().timestamp(),
            duration_hours,
            creator: creator.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn expires_at(&self) -> Option<i64> {
        (self.duration_hours > 0).then(|| self.created_at + i64::from(self.duration_hours) * 3600)
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at().is_some_and(|at| at <= now)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("{0} is already listed")]
    Duplicate(String),
    #[error("invalid {kind} target: {target}")]
    InvalidTarget { kind: &'static str, target: String },
    #[error("invalid duration {0:?}: expected a whole number of hours")]
    InvalidDuration(String),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Parse a duration argument: a non-negative integer number of hours.
pub fn parse_duration(text: &str) -> Result<u32, ModerationError> {
    text.parse::<u32>()
        .map_err(|_| ModerationError::InvalidDuration(text.to_string()))
}

/// How a stored target is compared against candidates. Built once when the
/// record enters the list.
#[derive(Debug, Clone)]
enum TargetMatcher {
    Mask(WildcardMask),
    Net(Ipv4Net),
}

impl TargetMatcher {
    fn compile(kind: ModerationKind, target: &str) -> Self {
        if kind == ModerationKind::ZLine
            && let Ok(net) = target.parse::<Ipv4Net>()
        {
            return Self::Net(net);
        }
        Self::Mask(WildcardMask::new(target))
    }

    fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Mask(mask) => mask.matches(candidate),
            Self::Net(net) => match candidate.parse::<IpAddr>() {
                Ok(IpAddr::V4(ip)) => net.contains(&ip),
                Ok(IpAddr::V6(ip)) => ip.to_ipv4_mapped().is_some_and(|v4| net.contains(&v4)),
                Err(_) => false,
            },
        }
    }
}

/// Z-line candidates given as IPv4-mapped IPv6 are matched in dotted form.
fn normalize_candidate(kind: ModerationKind, candidate: &str) -> String {
    match (kind, candidate.parse::<IpAddr>()) {
        (ModerationKind::ZLine, Ok(IpAddr::V6(ip))) => ip
            .to_ipv4_mapped()
            .map(|v4: Ipv4Addr| v4.to_string())
            .unwrap_or_else(|| candidate.to_string()),
        _ => candidate.to_string(),
    }
}

#[derive(Debug, Clone)]
struct Listed {
    record: ModerationRecord,
    matcher: TargetMatcher,
}

impl Listed {
    fn new(kind: ModerationKind, record: ModerationRecord) -> Self {
        let matcher = TargetMatcher::compile(kind, &record.target);
        Self { record, matcher }
    }
}

fn compile_all(kind: ModerationKind, records: Vec<ModerationRecord>) -> Vec<Listed> {
    records.into_iter().map(|r| Listed::new(kind, r)).collect()
}

fn records_of(listed: &[Listed]) -> Vec<ModerationRecord> {
    listed.iter().map(|l| l.record.clone()).collect()
}

/// A single moderation list.
#[derive(Debug)]
pub struct ModerationStore {
    kind: ModerationKind,
    records: RwLock<Vec<Listed>>,
    persist: Option<Arc<dyn ModerationPersist>>,
}

impl ModerationStore {
    /// An in-memory list.
    pub fn new(kind: ModerationKind) -> Self {
        Self {
            kind,
            records: RwLock::new(Vec::new()),
            persist: None,
        }
    }

    /// A list backed by `persist`, seeded from its current contents.
    pub fn with_persist(
        kind: ModerationKind,
        persist: Arc<dyn ModerationPersist>,
    ) -> Result<Self, PersistError> {
        let records = persist.load()?;
        info!(kind = kind.name(), count = records.len(), "Moderation list loaded");
        Ok(Self {
            kind,
            records: RwLock::new(compile_all(kind, records)),
            persist: Some(persist),
        })
    }

    pub fn kind(&self) -> ModerationKind {
        self.kind
    }

    /// Add a record. Duplicate targets (case-insensitive) are rejected.
    ///
    /// Expired records are dropped first; when any were, the backend is
    /// rewritten instead of appended to.
    pub fn add(
        &self,
        target: &str,
        duration_hours: u32,
        creator: &str,
        reason: &str,
    ) -> Result<ModerationRecord, ModerationError> {
        self.kind.validate_target(target)?;
        let folded = irc_to_lower(target);

        let mut records = self.records.write();
        let before = records.len();
        records.retain(|l| !l.record.is_expired());
        let expired = before - records.len();
        let pruned = expired > 0;
        if records.iter().any(|l| irc_to_lower(&l.record.target) == folded) {
            if pruned && let Some(persist) = &self.persist {
                persist.rewrite(&records_of(&records))?;
            }
            return Err(ModerationError::Duplicate(target.to_string()));
        }

        let record = ModerationRecord::new(target, duration_hours, creator, reason);
        if let Some(persist) = &self.persist {
            if pruned {
                let mut all = records_of(&records);
                all.push(record.clone());
                persist.rewrite(&all)?;
            } else {
                persist.append(&record)?;
            }
        }
        records.push(Listed::new(self.kind, record.clone()));
        debug!(kind = self.kind.name(), target = %target, expired, "Moderation record added");
        Ok(record)
    }

    /// Remove the record for `target`. Returns whether one existed.
    pub fn remove(&self, target: &str) -> Result<bool, ModerationError> {
        let folded = irc_to_lower(target);
        let mut records = self.records.write();
        let before = records.len();
        let remaining: Vec<Listed> = records
            .iter()
            .filter(|l| irc_to_lower(&l.record.target) != folded)
            .cloned()
            .collect();
        if remaining.len() == before {
            return Ok(false);
        }
        if let Some(persist) = &self.persist {
            persist.rewrite(&records_of(&remaining))?;
        }
        *records = remaining;
        Ok(true)
    }

    /// Snapshot of the live (unexpired) records.
    pub fn list(&self) -> Vec<ModerationRecord> {
        let now = Utc::now().timestamp();
        self.records
            .read()
            .iter()
            .filter(|l| !l.record.is_expired_at(now))
            .map(|l| l.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any live record matches `candidate`.
    pub fn matches(&self, candidate: &str) -> bool {
        self.find_match(candidate).is_some()
    }

    /// The first live record matching `candidate`.
    ///
    /// Candidates are `ident@host` for K-lines, a nickname for Q-lines and
    /// an IP address for Z-lines.
    pub fn find_match(&self, candidate: &str) -> Option<ModerationRecord> {
        let now = Utc::now().timestamp();
        let candidate = normalize_candidate(self.kind, candidate);
        self.records
            .read()
            .iter()
            .find(|l| !l.record.is_expired_at(now) && l.matcher.matches(&candidate))
            .map(|l| l.record.clone())
    }

    /// Replace the in-memory list with the backend's contents.
    ///
    /// On failure the current list is left untouched. Returns the new count.
    pub fn reload(&self) -> Result<usize, ModerationError> {
        let Some(persist) = &self.persist else {
            return Ok(self.len());
        };
        let fresh = persist.load()?;
        let count = fresh.len();
        *self.records.write() = compile_all(self.kind, fresh);
        Ok(count)
    }
}

/// The three moderation lists.
#[derive(Debug)]
pub struct Moderation {
    pub klines: ModerationStore,
    pub qlines: ModerationStore,
    pub zlines: ModerationStore,
}

impl Moderation {
    pub fn in_memory() -> Self {
        Self {
            klines: ModerationStore::new(ModerationKind::KLine),
            qlines: ModerationStore::new(ModerationKind::QLine),
            zlines: ModerationStore::new(ModerationKind::ZLine),
        }
    }

    pub fn store(&self, kind: ModerationKind) -> &ModerationStore {
        match kind {
            ModerationKind::KLine => &self.klines,
            ModerationKind::QLine => &self.qlines,
            ModerationKind::ZLine => &self.zlines,
        }
    }

    /// Connection-time admission: Z-lines on the address, then K-lines on
    /// `ident@host`. Returns the matching record, if any.
    pub fn check_admission(&self, ident: &str, host: &str, ip: &IpAddr) -> Option<ModerationRecord> {
        self.zlines
            .find_match(&ip.to_string())
            .or_else(|| self.klines.find_match(&format!("{ident}@{host}")))
    }
}
