//! JOIN, IJOIN and FJOIN.

use async_trait::async_trait;
use lantern_proto::{Message, Response};
use tracing::{debug, info};

use super::names::send_names;
use super::numeric;
use crate::error::ChannelError;
use crate::handlers::{Context, Handler, HandlerError, HandlerResult, comma_list, from_user};
use crate::state::{JoinMode, JoinRequest, Server, is_valid_channel_name};

/// Join `uid` to `name` and send the JOIN, topic and names to the right
/// people. Invisible joins are only echoed to the joiner.
fn join_one(
    server: &Server,
    uid: &str,
    name: &str,
    key: Option<&str>,
    mode: JoinMode,
) -> Result<(), ChannelError> {
    if !is_valid_channel_name(name) {
        return Err(ChannelError::NoSuchChannel(name.to_string()));
    }
    let max_channels = server.config().limits.max_channels;
    let outcome = server.directory.join(
        uid,
        name,
        JoinRequest {
            key,
            mode,
            max_channels,
        },
    )?;
    if outcome.already_member {
        return Ok(());
    }
    let Some(user) = server.directory.user(uid) else {
        return Ok(());
    };
    let channel = outcome.channel;
    let join = from_user(&user, "JOIN", vec![channel.name.clone()]);
    if outcome.roles.invisible {
        user.send(join);
    } else {
        server.directory.broadcast(&channel.name, |_| Some(join.clone()));
    }

    if let Some(topic) = &channel.topic {
        user.send(numeric(
            server,
            &user.nick,
            Response::RPL_TOPIC,
            vec![channel.name.clone(), topic.text.clone()],
        ));
        user.send(numeric(
            server,
            &user.nick,
            Response::RPL_TOPICWHOTIME,
            vec![
                channel.name.clone(),
                topic.set_by.clone(),
                topic.set_at.to_string(),
            ],
        ));
    }
    send_names(server, &user, &channel.name);

    debug!(
        uid = %uid,
        channel = %channel.name,
        created = outcome.created,
        chanop = outcome.roles.chanop,
        ?mode,
        "Joined channel"
    );
    Ok(())
}

/// `JOIN 0`: leave every channel.
fn part_all(ctx: &Context<'_>) -> HandlerResult {
    let user = ctx.user()?;
    for (channel, _) in ctx.server.directory.user_channels(ctx.uid) {
        if let Ok(leave) = ctx.server.directory.part(ctx.uid, &channel.name) {
            let part = from_user(&user, "PART", vec![leave.channel_name.clone()]);
            for recipient in &leave.recipients {
                recipient.send(part.clone());
            }
        }
    }
    Ok(())
}

pub struct JoinHandler;

#[async_trait]
impl Handler for JoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        // JOIN <channel>{,<channel>} [<key>{,<key>}]
        let targets = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        if targets == "0" {
            return part_all(ctx);
        }
        let keys: Vec<&str> = msg.arg(1).map(|k| k.split(',').collect()).unwrap_or_default();

        for (i, name) in comma_list(targets).enumerate() {
            let key = keys.get(i).copied().filter(|k| !k.is_empty());
            if let Err(e) = join_one(ctx.server, ctx.uid, name, key, JoinMode::Normal) {
                ctx.send(e.to_irc_reply(ctx.server_name(), &ctx.nick()));
            }
        }
        Ok(())
    }
}

/// `IJOIN <channel>`: admin-only invisible join.
pub struct IjoinHandler;

#[async_trait]
impl Handler for IjoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;
        let admin = ctx.require_admin()?;
        join_one(ctx.server, ctx.uid, name, None, JoinMode::Invisible)?;
        info!(admin = %admin.nick, channel = %name, "Invisible join");
        Ok(())
    }
}

/// `FJOIN <nick> <channel>`: operator forces a user into a channel,
/// bypassing bans, keys, limits and invite-only.
pub struct FjoinHandler;

#[async_trait]
impl Handler for FjoinHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let (Some(target), Some(name)) = (msg.arg(0), msg.arg(1)) else {
            return Err(HandlerError::NeedMoreParams);
        };
        let oper = ctx.require_oper()?;
        let victim = ctx
            .server
            .directory
            .find_user_by_nick(target)
            .ok_or_else(|| HandlerError::NoSuchNick(target.to_string()))?;
        join_one(ctx.server, &victim.uid, name, None, JoinMode::Forced)?;
        ctx.server.notify_opers(&format!(
            "{} used FJOIN to join {} to {}",
            oper.nick, victim.nick, name
        ));
        Ok(())
    }
}
