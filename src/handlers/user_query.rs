//! User queries: WHOIS, WHOWAS and AWAY.

use async_trait::async_trait;
use chrono::Utc;
use lantern_proto::{Message, Response};

use crate::handlers::{Context, Handler, HandlerError, HandlerResult, comma_list, truncate};
use crate::state::User;

/// Channel list for 319 as seen by `viewer`: hidden channels and invisible
/// memberships are left out unless the viewer shares them or is the target.
fn visible_channels(ctx: &Context<'_>, target: &User) -> String {
    let is_self = target.uid == ctx.uid;
    let mut names: Vec<String> = ctx
        .server
        .directory
        .user_channels(&target.uid)
        .into_iter()
        .filter(|(channel, roles)| {
            is_self
                || (!roles.invisible
                    && (!channel.is_hidden() || ctx.server.directory.is_member(ctx.uid, &channel.name)))
        })
        .map(|(channel, roles)| format!("{}{}", roles.prefixes(false), channel.name))
        .collect();
    names.sort();
    names.join(" ")
}

fn whois_one(ctx: &Context<'_>, nick: &str) {
    let Some(target) = ctx.server.directory.find_user_by_nick(nick) else {
        ctx.reply(Response::ERR_NOSUCHNICK, vec![nick.to_string()]);
        ctx.reply(Response::RPL_ENDOFWHOIS, vec![nick.to_string()]);
        return;
    };
    let config = ctx.server.config();

    ctx.reply(
        Response::RPL_WHOISUSER,
        vec![
            target.nick.clone(),
            target.ident.clone(),
            target.visible_host.clone(),
            "*".to_string(),
            target.realname.clone(),
        ],
    );
    let channels = visible_channels(ctx, &target);
    if !channels.is_empty() {
        ctx.reply(
            Response::RPL_WHOISCHANNELS,
            vec![target.nick.clone(), channels],
        );
    }
    ctx.reply(
        Response::RPL_WHOISSERVER,
        vec![
            target.nick.clone(),
            ctx.server_name().to_string(),
            config.server.description.clone(),
        ],
    );
    if let Some(away) = &target.away {
        ctx.reply(Response::RPL_AWAY, vec![target.nick.clone(), away.clone()]);
    }
    if target.modes.oper {
        ctx.reply(Response::RPL_WHOISOPERATOR, vec![target.nick.clone()]);
    }
    let idle = (Utc::now() - target.last_activity).num_seconds().max(0);
    ctx.reply(
        Response::RPL_WHOISIDLE,
        vec![
            target.nick.clone(),
            idle.to_string(),
            target.signon.timestamp().to_string(),
            "seconds idle, signon time".to_string(),
        ],
    );
    ctx.reply(Response::RPL_ENDOFWHOIS, vec![target.nick]);
}

/// `WHOIS [<server>] <nick>{,<nick>}`
pub struct WhoisHandler;

#[async_trait]
impl Handler for WhoisHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        // With two arguments the first names a server; there is only us.
        let nicks = msg
            .arg(1)
            .or(msg.arg(0))
            .filter(|n| !n.is_empty())
            .ok_or(HandlerError::NoNicknameGiven)?;
        for nick in comma_list(nicks) {
            whois_one(ctx, nick);
        }
        Ok(())
    }
}

/// `WHOWAS <nick> [<count>]`
pub struct WhowasHandler;

#[async_trait]
impl Handler for WhowasHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let nick = msg
            .arg(0)
            .filter(|n| !n.is_empty())
            .ok_or(HandlerError::NoNicknameGiven)?;
        let count = msg
            .arg(1)
            .and_then(|c| c.parse::<usize>().ok())
            .unwrap_or(0);

        let entries = ctx.server.whowas.lookup(nick, count);
        if entries.is_empty() {
            ctx.reply(Response::ERR_WASNOSUCHNICK, vec![nick.to_string()]);
        }
        for entry in entries {
            ctx.reply(
                Response::RPL_WHOWASUSER,
                vec![
                    entry.nick.clone(),
                    entry.ident,
                    entry.host,
                    "*".to_string(),
                    entry.realname,
                ],
            );
            ctx.reply(
                Response::RPL_WHOISSERVER,
                vec![
                    entry.nick,
                    ctx.server_name().to_string(),
                    entry.departed_at.format("%a %b %d %H:%M:%S %Y").to_string(),
                ],
            );
        }
        ctx.reply(Response::RPL_ENDOFWHOWAS, vec![nick.to_string()]);
        Ok(())
    }
}

/// `AWAY [:message]`. No message (or an empty one) clears the away status.
pub struct AwayHandler;

#[async_trait]
impl Handler for AwayHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let awaylen = ctx.server.config().limits.awaylen;
        let away = msg
            .arg(0)
            .filter(|m| !m.is_empty())
            .map(|m| truncate(m, awaylen).to_string());
        let now_away = away.is_some();
        ctx.server
            .directory
            .update_user(ctx.uid, |u| u.away = away);
        if now_away {
            ctx.reply(Response::RPL_NOWAWAY, vec![]);
        } else {
            ctx.reply(Response::RPL_UNAWAY, vec![]);
        }
        Ok(())
    }
}
