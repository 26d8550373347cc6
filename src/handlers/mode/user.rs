//! User modes: `MODE <nick> [<modes>]`.
//!
//! `+i`, `+w` and `+s` are freely settable. `o`, `a` and `p` can only be
//! dropped (`+o`/`+a` come from OPER, `+p` from an operator). `r` and `S`
//! are never client-settable.

use lantern_proto::Response;

use super::parse::{ModeChange, Sign, parse_mode_string, render_changes};
use crate::handlers::{Context, HandlerError, HandlerResult, from_user};
use crate::state::UserModes;

const USER_MODE_LETTERS: &str = "aioprswS";

/// Whether the user may apply `change` to their own modes.
fn self_settable(modes: &UserModes, change: &ModeChange) -> bool {
    match (change.mode, change.sign) {
        ('i' | 'w' | 's', _) => true,
        ('o' | 'a', Sign::Minus) => true,
        ('p', Sign::Minus) => true,
        ('p', Sign::Plus) => modes.oper,
        _ => false,
    }
}

pub(super) fn handle_user_mode(
    ctx: &mut Context<'_>,
    target: &str,
    modes: Option<&str>,
) -> HandlerResult {
    let user = ctx.user()?;
    if !lantern_proto::irc_eq(target, &user.nick) {
        return match ctx.server.directory.find_user_by_nick(target) {
            Some(_) => {
                ctx.reply(Response::ERR_USERSDONTMATCH, vec![]);
                Ok(())
            }
            None => Err(HandlerError::NoSuchNick(target.to_string())),
        };
    }

    let Some(modes) = modes else {
        ctx.reply(Response::RPL_UMODEIS, vec![user.modes.as_mode_string()]);
        return Ok(());
    };

    let changes = parse_mode_string(modes, &[], |_, _| false);
    let mut unknown = false;
    let applied = ctx
        .server
        .directory
        .update_user(ctx.uid, |u| {
            let mut applied = Vec::new();
            for change in &changes {
                if !USER_MODE_LETTERS.contains(change.mode) {
                    unknown = true;
                    continue;
                }
                if !self_settable(&u.modes, change) {
                    continue;
                }
                let plus = change.sign.is_plus();
                let Some(flag) = u.modes.flag_mut(change.mode) else {
                    continue;
                };
                if *flag == plus {
                    continue;
                }
                *flag = plus;
                applied.push(ModeChange::new(change.sign, change.mode, None));
                // Admin implies operator.
                if change.mode == 'o' && !plus && u.modes.admin {
                    u.modes.admin = false;
                    applied.push(ModeChange::new(Sign::Minus, 'a', None));
                }
            }
            applied
        })
        .unwrap_or_default();

    if unknown {
        ctx.reply(Response::ERR_UMODEUNKNOWNFLAG, vec![]);
    }
    if !applied.is_empty() {
        let (mode_str, _) = render_changes(&applied);
        ctx.send(from_user(&user, "MODE", vec![user.nick.clone(), mode_str]));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(sign: Sign, mode: char) -> ModeChange {
        ModeChange::new(sign, mode, None)
    }

    #[test]
    fn operator_modes_can_only_be_dropped() {
        let modes = UserModes::default();
        assert!(self_settable(&modes, &change(Sign::Plus, 'i')));
        assert!(!self_settable(&modes, &change(Sign::Plus, 'o')));
        assert!(self_settable(&modes, &change(Sign::Minus, 'o')));
        assert!(!self_settable(&modes, &change(Sign::Plus, 'p')));
        assert!(!self_settable(&modes, &change(Sign::Plus, 'S')));
        assert!(!self_settable(&modes, &change(Sign::Minus, 'r')));
    }

    #[test]
    fn operators_may_set_protected() {
        let modes = UserModes {
            oper: true,
            ..UserModes::default()
        };
        assert!(self_settable(&modes, &change(Sign::Plus, 'p')));
    }
}
