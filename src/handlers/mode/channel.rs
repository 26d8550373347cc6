//! Channel modes.
//!
//! `MODE <channel> [<modes> [<args>...]]`. Changes are parsed first and then
//! applied one by one through [`CHANNEL_MODES`], all under one directory
//! write lock. Replies are collected and sent after the lock is released.

use chrono::Utc;
use lantern_proto::Response;
use tracing::debug;

use super::parse::{ModeChange, Sign, parse_mode_string, render_changes};
use crate::error::ChannelError;
use crate::handlers::{Context, HandlerResult, from_user};
use crate::security::mask::normalize_mask;
use crate::state::{BanEntry, ChannelEdit};

/// How a channel mode letter behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModeKind {
    /// Boolean flag. `oper_only` flags need a server operator.
    Flag { oper_only: bool },
    Key,
    Limit,
    Ban,
    Op,
    Voice,
}

const CHANNEL_MODES: &[(char, ModeKind)] = &[
    ('i', ModeKind::Flag { oper_only: false }),
    ('m', ModeKind::Flag { oper_only: false }),
    ('n', ModeKind::Flag { oper_only: false }),
    ('p', ModeKind::Flag { oper_only: false }),
    ('s', ModeKind::Flag { oper_only: false }),
    ('t', ModeKind::Flag { oper_only: false }),
    ('P', ModeKind::Flag { oper_only: true }),
    ('k', ModeKind::Key),
    ('l', ModeKind::Limit),
    ('b', ModeKind::Ban),
    ('o', ModeKind::Op),
    ('v', ModeKind::Voice),
];

fn mode_kind(mode: char) -> Option<ModeKind> {
    CHANNEL_MODES
        .iter()
        .find(|(c, _)| *c == mode)
        .map(|(_, kind)| *kind)
}

fn takes_arg(sign: Sign, mode: char) -> bool {
    match mode_kind(mode) {
        Some(ModeKind::Key | ModeKind::Ban | ModeKind::Op | ModeKind::Voice) => true,
        Some(ModeKind::Limit) => sign.is_plus(),
        _ => false,
    }
}

/// Who is changing modes.
struct Actor {
    nick: String,
    is_oper: bool,
    is_chanop: bool,
}

#[derive(Default)]
struct Outcome {
    applied: Vec<ModeChange>,
    replies: Vec<(Response, Vec<String>)>,
    errors: Vec<ChannelError>,
    channel_name: String,
}

impl Outcome {
    fn reply(&mut self, response: Response, args: Vec<String>) {
        self.replies.push((response, args));
    }
}

/// Apply one change. Returns the change as it should be broadcast, or
/// `None` when it had no effect or was refused.
fn apply(
    edit: &mut ChannelEdit<'_>,
    actor: &Actor,
    kind: ModeKind,
    change: &ModeChange,
    out: &mut Outcome,
) -> Option<ModeChange> {
    let plus = change.sign.is_plus();
    let channel_name = edit.channel.name.clone();
    match kind {
        ModeKind::Flag { oper_only } => {
            if oper_only && !actor.is_oper {
                out.reply(Response::ERR_NOPRIVILEGES, vec![]);
                return None;
            }
            let flag = edit.channel.modes.flag_mut(change.mode)?;
            if *flag == plus {
                return None;
            }
            *flag = plus;
            Some(ModeChange::new(change.sign, change.mode, None))
        }
        ModeKind::Key => {
            if plus {
                let key = change.arg.as_deref().filter(|k| !k.is_empty() && !k.contains(' '))?;
                if edit.channel.modes.key.is_some() {
                    out.reply(Response::ERR_KEYSET, vec![channel_name]);
                    return None;
                }
                edit.channel.modes.key = Some(key.to_string());
                Some(ModeChange::new(Sign::Plus, 'k', Some(key.to_string())))
            } else {
                edit.channel.modes.key.take()?;
                Some(ModeChange::new(Sign::Minus, 'k', Some("*".to_string())))
            }
        }
        ModeKind::Limit => {
            if plus {
                let limit = change
                    .arg
                    .as_deref()
                    .and_then(|a| a.parse::<usize>().ok())
                    .filter(|l| *l > 0)?;
                if edit.channel.modes.limit == Some(limit) {
                    return None;
                }
                edit.channel.modes.limit = Some(limit);
                Some(ModeChange::new(Sign::Plus, 'l', Some(limit.to_string())))
            } else {
                edit.channel.modes.limit.take()?;
                Some(ModeChange::new(Sign::Minus, 'l', None))
            }
        }
        ModeKind::Ban => {
            let mask = normalize_mask(change.arg.as_deref()?);
            if plus {
                if edit.channel.has_ban(&mask) {
                    return None;
                }
                edit.channel.bans.push(BanEntry::new(
                    &mask,
                    &actor.nick,
                    "",
                    Utc::now().timestamp(),
                ));
            } else {
                let folded = lantern_proto::irc_to_lower(&mask);
                let before = edit.channel.bans.len();
                edit.channel
                    .bans
                    .retain(|b| lantern_proto::irc_to_lower(&b.mask) != folded);
                if edit.channel.bans.len() == before {
                    return None;
                }
            }
            Some(ModeChange::new(change.sign, 'b', Some(mask)))
        }
        ModeKind::Op | ModeKind::Voice => {
            let nick = change.arg.as_deref()?;
            let Some(target_uid) = edit.member_uid(nick) else {
                out.errors
                    .push(ChannelError::UserNotInChannel(nick.to_string(), channel_name));
                return None;
            };
            let target_nick = edit.user(&target_uid).map(|u| u.nick.clone())?;
            let shielded = edit
                .user(&target_uid)
                .is_some_and(|u| u.modes.service || u.modes.protected);
            if kind == ModeKind::Op && !plus && shielded && !actor.is_oper {
                out.errors.push(ChannelError::ChanOpNeeded(channel_name));
                return None;
            }
            let roles = edit.roles_mut(&target_uid)?;
            let slot = if kind == ModeKind::Op {
                &mut roles.chanop
            } else {
                &mut roles.voice
            };
            if *slot == plus {
                return None;
            }
            *slot = plus;
            Some(ModeChange::new(change.sign, change.mode, Some(target_nick)))
        }
    }
}

fn apply_all(edit: &mut ChannelEdit<'_>, actor: &Actor, changes: &[ModeChange]) -> Outcome {
    let mut out = Outcome {
        channel_name: edit.channel.name.clone(),
        ..Outcome::default()
    };
    let mut refused = false;
    let mut listed = false;
    for change in changes {
        let Some(kind) = mode_kind(change.mode) else {
            out.reply(
                Response::ERR_UNKNOWNMODE,
                vec![change.mode.to_string(), "is unknown mode char to me".to_string()],
            );
            continue;
        };
        // A bare `b` lists bans and needs no privileges.
        if kind == ModeKind::Ban && change.arg.is_none() {
            if !listed {
                listed = true;
                for ban in &edit.channel.bans {
                    out.reply(
                        Response::RPL_BANLIST,
                        vec![
                            out.channel_name.clone(),
                            ban.mask.clone(),
                            ban.creator.clone(),
                            ban.created_at.to_string(),
                        ],
                    );
                }
                out.reply(Response::RPL_ENDOFBANLIST, vec![out.channel_name.clone()]);
            }
            continue;
        }
        if !actor.is_chanop && !actor.is_oper {
            if !refused {
                refused = true;
                out.errors
                    .push(ChannelError::ChanOpNeeded(out.channel_name.clone()));
            }
            continue;
        }
        if let Some(applied) = apply(edit, actor, kind, change, &mut out) {
            out.applied.push(applied);
        }
    }
    out
}

/// Reply 324 and 329 for `name`.
fn send_channel_modes(ctx: &Context<'_>, name: &str) -> HandlerResult {
    let channel = ctx
        .server
        .directory
        .find_channel(name)
        .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
    let is_member = ctx.server.directory.is_member(ctx.uid, name);
    let (modes, args) = channel.modes.describe(is_member);
    let mut params = vec![channel.name.clone(), modes];
    params.extend(args);
    ctx.reply(Response::RPL_CHANNELMODEIS, params);
    ctx.reply(
        Response::RPL_CREATIONTIME,
        vec![channel.name, channel.created_at.timestamp().to_string()],
    );
    Ok(())
}

pub(super) fn handle_channel_mode(
    ctx: &mut Context<'_>,
    name: &str,
    modes: Option<&str>,
    args: &[&str],
) -> HandlerResult {
    let Some(modes) = modes else {
        return send_channel_modes(ctx, name);
    };
    let user = ctx.user()?;
    let changes = parse_mode_string(modes, args, takes_arg);

    let outcome = ctx.server.directory.edit_channel(name, |edit| {
        let actor = Actor {
            nick: user.nick.clone(),
            is_oper: user.modes.oper,
            is_chanop: edit.roles(&user.uid).is_some_and(|r| r.chanop),
        };
        apply_all(edit, &actor, &changes)
    })?;

    for (response, params) in outcome.replies {
        ctx.reply(response, params);
    }
    for error in &outcome.errors {
        ctx.send(error.to_irc_reply(ctx.server_name(), &user.nick));
    }
    if outcome.applied.is_empty() {
        return Ok(());
    }

    let (mode_str, mode_args) = render_changes(&outcome.applied);
    let mut params = vec![outcome.channel_name.clone(), mode_str.clone()];
    params.extend(mode_args);
    let msg = from_user(&user, "MODE", params);
    ctx.server
        .directory
        .broadcast(&outcome.channel_name, |_| Some(msg.clone()));
    // Operators may change modes on channels they are not in.
    if !ctx.server.directory.is_member(ctx.uid, &outcome.channel_name) {
        ctx.send(msg);
    }
    debug!(
        uid = %ctx.uid,
        channel = %outcome.channel_name,
        modes = %mode_str,
        "Channel modes changed"
    );
    Ok(())
}
