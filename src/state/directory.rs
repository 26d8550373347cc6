//! The channel and user directory.
//!
//! Users, the nick index and channels live behind one `parking_lot::RwLock`.
//! Every mutation that touches both sides of a membership (the channel's
//! member set and the user's role map) happens inside a single write
//! critical section, so the two views never disagree. Nothing here awaits
//! or writes to a socket: callers get snapshots back and deliver messages
//! through each user's outbound queue after the lock is released.

use lantern_proto::{Message, irc_to_lower};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use super::channel::{Channel, Topic};
use super::uid::Uid;
use super::user::{MemberRoles, User};
use crate::error::ChannelError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NickError {
    #[error("nickname {0} is already in use")]
    InUse(String),
    #[error("unknown user")]
    UnknownUser,
}

/// Result of a successful nick claim.
#[derive(Debug, Clone)]
pub struct NickChange {
    /// Mask before the change (`*!@host` for a first NICK).
    pub old_mask: String,
    /// False when the new nick is byte-identical to the old one.
    pub changed: bool,
    /// Users sharing a channel with the renamed user, self excluded.
    pub peers: Vec<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinMode {
    /// Regular JOIN, subject to channel policy.
    Normal,
    /// IJOIN: hidden from other members, never auto-opped.
    Invisible,
    /// FJOIN: bypasses bans, keys, limits and invite-only.
    Forced,
}

#[derive(Debug, Clone, Copy)]
pub struct JoinRequest<'a> {
    pub key: Option<&'a str>,
    pub mode: JoinMode,
    pub max_channels: usize,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// Snapshot taken after the insert.
    pub channel: Channel,
    pub roles: MemberRoles,
    pub created: bool,
    pub already_member: bool,
}

/// Result of leaving a channel (PART or KICK).
#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub channel_name: String,
    /// Who should see the departure, the leaving user included.
    pub recipients: Vec<User>,
    pub destroyed: bool,
}

#[derive(Debug, Clone)]
pub struct KickOutcome {
    pub target: User,
    pub leave: LeaveOutcome,
}

/// Result of removing a user from the whole directory.
#[derive(Debug, Clone)]
pub struct Departure {
    pub user: User,
    /// Users who shared a visible channel with the departed user.
    pub peers: Vec<User>,
    /// Channels dropped because they became empty.
    pub destroyed: Vec<String>,
}

/// Mutable view of one channel handed to MODE.
pub struct ChannelEdit<'a> {
    pub channel: &'a mut Channel,
    folded: &'a str,
    users: &'a mut HashMap<Uid, User>,
    nicks: &'a HashMap<String, Uid>,
}

impl ChannelEdit<'_> {
    pub fn user(&self, uid: &str) -> Option<&User> {
        self.users.get(uid)
    }

    /// UID of `nick` if that user is a member of this channel.
    pub fn member_uid(&self, nick: &str) -> Option<Uid> {
        self.nicks
            .get(&irc_to_lower(nick))
            .filter(|uid| self.channel.members.contains(*uid))
            .cloned()
    }

    pub fn roles(&self, uid: &str) -> Option<MemberRoles> {
        self.users.get(uid)?.channels.get(self.folded).copied()
    }

    pub fn roles_mut(&mut self, uid: &str) -> Option<&mut MemberRoles> {
        self.users.get_mut(uid)?.channels.get_mut(self.folded)
    }
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uid, User>,
    /// Folded nick → UID.
    nicks: HashMap<String, Uid>,
    /// Folded channel name → channel.
    channels: HashMap<String, Channel>,
}

impl Inner {
    fn roles(&self, uid: &str, folded: &str) -> Option<MemberRoles> {
        self.users.get(uid)?.channels.get(folded).copied()
    }

    fn visible_members(&self, channel: &Channel, folded: &str) -> usize {
        channel
            .members
            .iter()
            .filter(|m| self.roles(m, folded).is_some_and(|r| !r.invisible))
            .count()
    }

    /// Drop `uid` from `folded` on both sides. Returns the recipients of the
    /// departure and whether the channel was destroyed.
    fn leave(&mut self, uid: &str, folded: &str) -> Option<LeaveOutcome> {
        let roles = self.users.get_mut(uid)?.channels.remove(folded)?;
        let channel = self.channels.get_mut(folded)?;
        let recipients: Vec<User> = if roles.invisible {
            self.users.get(uid).cloned().into_iter().collect()
        } else {
            channel
                .members
                .iter()
                .filter_map(|m| self.users.get(m).cloned())
                .collect()
        };
        channel.members.remove(uid);
        let channel_name = channel.name.clone();
        let destroyed = channel.members.is_empty() && !channel.modes.persistent;
        if destroyed {
            self.channels.remove(folded);
        }
        Some(LeaveOutcome {
            channel_name,
            recipients,
            destroyed,
        })
    }

    fn peers(&self, uid: &str) -> Vec<User> {
        let Some(user) = self.users.get(uid) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut peers = Vec::new();
        for (folded, roles) in &user.channels {
            if roles.invisible {
                continue;
            }
            let Some(channel) = self.channels.get(folded) else {
                continue;
            };
            for member in &channel.members {
                if member != uid
                    && seen.insert(member.clone())
                    && let Some(peer) = self.users.get(member)
                {
                    peers.push(peer.clone());
                }
            }
        }
        peers
    }
}

/// Users, nicknames and channels.
#[derive(Debug, Default)]
pub struct Directory {
    inner: RwLock<Inner>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.inner.write().users.insert(user.uid.clone(), user);
    }

    /// Snapshot of a user.
    pub fn user(&self, uid: &str) -> Option<User> {
        self.inner.read().users.get(uid).cloned()
    }

    pub fn with_user<R>(&self, uid: &str, f: impl FnOnce(&User) -> R) -> Option<R> {
        self.inner.read().users.get(uid).map(f)
    }

    pub fn update_user<R>(&self, uid: &str, f: impl FnOnce(&mut User) -> R) -> Option<R> {
        self.inner.write().users.get_mut(uid).map(f)
    }

    pub fn find_user_by_nick(&self, nick: &str) -> Option<User> {
        let inner = self.inner.read();
        let uid = inner.nicks.get(&irc_to_lower(nick))?;
        inner.users.get(uid).cloned()
    }

    pub fn uid_for_nick(&self, nick: &str) -> Option<Uid> {
        self.inner.read().nicks.get(&irc_to_lower(nick)).cloned()
    }

    pub fn find_channel(&self, name: &str) -> Option<Channel> {
        self.inner.read().channels.get(&irc_to_lower(name)).cloned()
    }

    pub fn user_count(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn channel_count(&self) -> usize {
        self.inner.read().channels.len()
    }

    /// Claim `nick` for `uid` in one step.
    ///
    /// Case-only changes of the user's own nick are allowed. On success the
    /// index and the user record are updated under the same write lock.
    pub fn claim_nick(&self, uid: &str, nick: &str) -> Result<NickChange, NickError> {
        let folded = irc_to_lower(nick);
        let mut inner = self.inner.write();
        if let Some(owner) = inner.nicks.get(&folded)
            && owner != uid
        {
            return Err(NickError::InUse(nick.to_string()));
        }
        let user = inner.users.get_mut(uid).ok_or(NickError::UnknownUser)?;
        let old_mask = user.mask();
        let old_folded = irc_to_lower(&user.nick);
        let changed = user.nick != nick;
        user.nick = nick.to_string();

        if old_folded != folded {
            inner.nicks.remove(&old_folded);
        }
        inner.nicks.insert(folded, uid.to_string());

        let peers = if changed { inner.peers(uid) } else { Vec::new() };
        Ok(NickChange {
            old_mask,
            changed,
            peers,
        })
    }

    pub fn set_user_info(&self, uid: &str, ident: &str, realname: &str) {
        self.update_user(uid, |u| {
            u.ident = ident.to_string();
            u.realname = realname.to_string();
        });
    }

    pub fn mark_registered(&self, uid: &str) {
        self.update_user(uid, |u| u.registered = true);
    }

    /// Join `uid` to `name`, creating the channel if needed.
    ///
    /// Policy (bans, invite-only, key, limit, channel count) is checked in
    /// the same critical section as the insert.
    pub fn join(
        &self,
        uid: &str,
        name: &str,
        request: JoinRequest<'_>,
    ) -> Result<JoinOutcome, ChannelError> {
        let folded = irc_to_lower(name);
        let mut guard = self.inner.write();
        let inner = &mut *guard;

        let user = inner
            .users
            .get(uid)
            .ok_or_else(|| ChannelError::NoSuchNick(uid.to_string()))?;
        if let Some(roles) = user.channels.get(&folded).copied() {
            let channel = inner
                .channels
                .get(&folded)
                .cloned()
                .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
            return Ok(JoinOutcome {
                channel,
                roles,
                created: false,
                already_member: true,
            });
        }

        if request.mode != JoinMode::Forced && user.channels.len() >= request.max_channels {
            return Err(ChannelError::TooManyChannels(name.to_string()));
        }

        if request.mode == JoinMode::Normal
            && let Some(channel) = inner.channels.get(&folded)
        {
            let invited = channel.invites.contains(uid);
            let (mask, real_mask) = (user.mask(), user.real_mask());
            if channel
                .bans
                .iter()
                .any(|b| b.matches(&mask) || b.matches(&real_mask))
            {
                return Err(ChannelError::BannedFromChan(channel.name.clone()));
            }
            if channel.modes.invite_only && !invited {
                return Err(ChannelError::InviteOnly(channel.name.clone()));
            }
            if let Some(key) = &channel.modes.key
                && request.key != Some(key.as_str())
            {
                return Err(ChannelError::BadKey(channel.name.clone()));
            }
            if let Some(limit) = channel.modes.limit
                && channel.members.len() >= limit
            {
                return Err(ChannelError::ChannelFull(channel.name.clone()));
            }
        }

        let created = !inner.channels.contains_key(&folded);
        let visible = inner
            .channels
            .get(&folded)
            .map(|c| inner.visible_members(c, &folded))
            .unwrap_or(0);
        let invisible = request.mode == JoinMode::Invisible;
        let roles = MemberRoles {
            chanop: !invisible && visible == 0,
            voice: false,
            admin: user.modes.admin,
            invisible,
        };

        let channel = inner
            .channels
            .entry(folded.clone())
            .or_insert_with(|| Channel::new(name));
        channel.members.insert(uid.to_string());
        channel.invites.remove(uid);
        let snapshot = channel.clone();
        if let Some(user) = inner.users.get_mut(uid) {
            user.channels.insert(folded, roles);
        }

        Ok(JoinOutcome {
            channel: snapshot,
            roles,
            created,
            already_member: false,
        })
    }

    pub fn part(&self, uid: &str, name: &str) -> Result<LeaveOutcome, ChannelError> {
        let folded = irc_to_lower(name);
        let mut inner = self.inner.write();
        if !inner.channels.contains_key(&folded) {
            return Err(ChannelError::NoSuchChannel(name.to_string()));
        }
        inner
            .leave(uid, &folded)
            .ok_or_else(|| ChannelError::NotOnChannel(name.to_string()))
    }

    /// Remove `target_nick` from `name` on behalf of `actor`.
    ///
    /// The actor must be a chanop (or a server operator). Services and `+p`
    /// users can only be kicked by server operators.
    pub fn kick(
        &self,
        actor: &str,
        name: &str,
        target_nick: &str,
    ) -> Result<KickOutcome, ChannelError> {
        let folded = irc_to_lower(name);
        let mut inner = self.inner.write();
        let channel_name = inner
            .channels
            .get(&folded)
            .map(|c| c.name.clone())
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
        let actor_is_oper = inner.users.get(actor).is_some_and(|u| u.modes.oper);
        let actor_roles = inner.roles(actor, &folded);
        if actor_roles.is_none() && !actor_is_oper {
            return Err(ChannelError::NotOnChannel(channel_name));
        }
        if !actor_roles.is_some_and(|r| r.chanop) && !actor_is_oper {
            return Err(ChannelError::ChanOpNeeded(channel_name));
        }

        let target_uid = inner
            .nicks
            .get(&irc_to_lower(target_nick))
            .cloned()
            .ok_or_else(|| ChannelError::NoSuchNick(target_nick.to_string()))?;
        let target = inner
            .users
            .get(&target_uid)
            .cloned()
            .ok_or_else(|| ChannelError::NoSuchNick(target_nick.to_string()))?;
        if !target.channels.contains_key(&folded) {
            return Err(ChannelError::UserNotInChannel(
                target.nick.clone(),
                channel_name,
            ));
        }
        if (target.modes.service || target.modes.protected) && !actor_is_oper {
            return Err(ChannelError::ChanOpNeeded(channel_name));
        }

        // Everyone sees the KICK, including members who joined invisibly.
        let recipients: Vec<User> = inner
            .channels
            .get(&folded)
            .map(|c| {
                c.members
                    .iter()
                    .filter_map(|m| inner.users.get(m).cloned())
                    .collect()
            })
            .unwrap_or_default();
        let mut leave = inner
            .leave(&target_uid, &folded)
            .ok_or_else(|| ChannelError::UserNotInChannel(target.nick.clone(), name.to_string()))?;
        leave.recipients = recipients;
        Ok(KickOutcome { target, leave })
    }

    /// Remove a user from every channel and from the indexes.
    pub fn remove_user_globally(&self, uid: &str) -> Option<Departure> {
        let mut inner = self.inner.write();
        let peers = inner.peers(uid);
        let folded_channels: Vec<String> = inner.users.get(uid)?.channels.keys().cloned().collect();
        let mut destroyed = Vec::new();
        for folded in folded_channels {
            if let Some(outcome) = inner.leave(uid, &folded)
                && outcome.destroyed
            {
                destroyed.push(outcome.channel_name);
            }
        }
        let user = inner.users.remove(uid)?;
        let folded_nick = irc_to_lower(&user.nick);
        if inner.nicks.get(&folded_nick).is_some_and(|owner| owner == uid) {
            inner.nicks.remove(&folded_nick);
        }
        Some(Departure {
            user,
            peers,
            destroyed,
        })
    }

    /// Deliver to every member of `name`. Members are snapshotted under the
    /// read lock; `message_fn` runs after it is released. Returns the number
    /// of messages queued.
    pub fn broadcast(
        &self,
        name: &str,
        mut message_fn: impl FnMut(&User) -> Option<Message>,
    ) -> usize {
        let members = self
            .channel_members(name)
            .map(|m| m.into_iter().map(|(u, _)| u).collect::<Vec<_>>())
            .unwrap_or_default();
        let mut sent = 0;
        for member in &members {
            if let Some(msg) = message_fn(member) {
                member.send(msg);
                sent += 1;
            }
        }
        sent
    }

    /// Members of `name` with their roles.
    pub fn channel_members(&self, name: &str) -> Option<Vec<(User, MemberRoles)>> {
        let folded = irc_to_lower(name);
        let inner = self.inner.read();
        let channel = inner.channels.get(&folded)?;
        Some(
            channel
                .members
                .iter()
                .filter_map(|m| {
                    let user = inner.users.get(m)?;
                    let roles = user.channels.get(&folded).copied()?;
                    Some((user.clone(), roles))
                })
                .collect(),
        )
    }

    /// Users sharing at least one visible channel with `uid`.
    pub fn peers_of(&self, uid: &str) -> Vec<User> {
        self.inner.read().peers(uid)
    }

    /// `(channel snapshot, roles)` for every channel `uid` is in.
    pub fn user_channels(&self, uid: &str) -> Vec<(Channel, MemberRoles)> {
        let inner = self.inner.read();
        let Some(user) = inner.users.get(uid) else {
            return Vec::new();
        };
        user.channels
            .iter()
            .filter_map(|(folded, roles)| Some((inner.channels.get(folded)?.clone(), *roles)))
            .collect()
    }

    pub fn users_where(&self, pred: impl Fn(&User) -> bool) -> Vec<User> {
        self.inner
            .read()
            .users
            .values()
            .filter(|u| pred(u))
            .cloned()
            .collect()
    }

    /// Set the topic. `+t` channels need a chanop (or server operator).
    pub fn set_topic(
        &self,
        uid: &str,
        name: &str,
        text: &str,
        set_by: &str,
    ) -> Result<(String, Option<Topic>), ChannelError> {
        let folded = irc_to_lower(name);
        let mut inner = self.inner.write();
        let roles = inner.roles(uid, &folded);
        let is_oper = inner.users.get(uid).is_some_and(|u| u.modes.oper);
        let channel = inner
            .channels
            .get_mut(&folded)
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
        let Some(roles) = roles else {
            return Err(ChannelError::NotOnChannel(channel.name.clone()));
        };
        if channel.modes.topic_lock && !roles.chanop && !is_oper {
            return Err(ChannelError::ChanOpNeeded(channel.name.clone()));
        }
        channel.topic = (!text.is_empty()).then(|| Topic {
            text: text.to_string(),
            set_by: set_by.to_string(),
            set_at: chrono::Utc::now().timestamp(),
        });
        Ok((channel.name.clone(), channel.topic.clone()))
    }

    /// Record an invitation of `target_nick` to `name`.
    ///
    /// A missing channel is not an error: the invite is delivered but not
    /// recorded. Returns the invited user.
    pub fn invite(&self, actor: &str, target_nick: &str, name: &str) -> Result<User, ChannelError> {
        let folded = irc_to_lower(name);
        let mut inner = self.inner.write();
        let target = inner
            .nicks
            .get(&irc_to_lower(target_nick))
            .and_then(|uid| inner.users.get(uid))
            .cloned()
            .ok_or_else(|| ChannelError::NoSuchNick(target_nick.to_string()))?;
        let actor_roles = inner.roles(actor, &folded);
        let actor_is_oper = inner.users.get(actor).is_some_and(|u| u.modes.oper);
        let Some(channel) = inner.channels.get_mut(&folded) else {
            return Ok(target);
        };
        let Some(actor_roles) = actor_roles else {
            return Err(ChannelError::NotOnChannel(channel.name.clone()));
        };
        if target.channels.contains_key(&folded) {
            return Err(ChannelError::UserOnChannel(
                target.nick.clone(),
                channel.name.clone(),
            ));
        }
        if channel.modes.invite_only && !actor_roles.chanop && !actor_is_oper {
            return Err(ChannelError::ChanOpNeeded(channel.name.clone()));
        }
        channel.invites.insert(target.uid.clone());
        Ok(target)
    }

    /// Check that `uid` may speak in `name` (`+n`, `+m` and bans).
    pub fn can_send(&self, uid: &str, name: &str) -> Result<Channel, ChannelError> {
        let folded = irc_to_lower(name);
        let inner = self.inner.read();
        let channel = inner
            .channels
            .get(&folded)
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
        let user = inner
            .users
            .get(uid)
            .ok_or_else(|| ChannelError::NoSuchNick(uid.to_string()))?;
        let roles = user.channels.get(&folded);
        let cannot = || Err(ChannelError::CannotSend(channel.name.clone()));
        if roles.is_none() && channel.modes.no_external {
            return cannot();
        }
        let privileged = roles.is_some_and(|r| r.chanop || r.voice);
        if channel.modes.moderated && !privileged {
            return cannot();
        }
        if !privileged {
            let (mask, real_mask) = (user.mask(), user.real_mask());
            if channel
                .bans
                .iter()
                .any(|b| b.matches(&mask) || b.matches(&real_mask))
            {
                return cannot();
            }
        }
        Ok(channel.clone())
    }

    /// Run `edit` against a channel under the write lock. An empty,
    /// non-persistent channel is dropped afterwards (e.g. after `-P`).
    pub fn edit_channel<R>(
        &self,
        name: &str,
        edit: impl FnOnce(&mut ChannelEdit<'_>) -> R,
    ) -> Result<R, ChannelError> {
        let folded = irc_to_lower(name);
        let mut guard = self.inner.write();
        let Inner {
            users,
            nicks,
            channels,
        } = &mut *guard;
        let channel = channels
            .get_mut(&folded)
            .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
        let result = edit(&mut ChannelEdit {
            channel,
            folded: &folded,
            users,
            nicks,
        });
        if channels
            .get(&folded)
            .is_some_and(|c| c.members.is_empty() && !c.modes.persistent)
        {
            channels.remove(&folded);
        }
        Ok(result)
    }

    pub fn is_member(&self, uid: &str, name: &str) -> bool {
        self.inner.read().roles(uid, &irc_to_lower(name)).is_some()
    }

    pub fn is_chanop(&self, uid: &str, name: &str) -> bool {
        self.inner
            .read()
            .roles(uid, &irc_to_lower(name))
            .is_some_and(|r| r.chanop)
    }

    pub fn is_voiced(&self, uid: &str, name: &str) -> bool {
        self.inner
            .read()
            .roles(uid, &irc_to_lower(name))
            .is_some_and(|r| r.voice)
    }

    pub fn is_admin(&self, uid: &str) -> bool {
        self.with_user(uid, |u| u.modes.admin).unwrap_or(false)
    }

    pub fn is_operator(&self, uid: &str) -> bool {
        self.with_user(uid, |u| u.modes.oper).unwrap_or(false)
    }

    pub fn is_service(&self, uid: &str) -> bool {
        self.with_user(uid, |u| u.modes.service).unwrap_or(false)
    }
}
