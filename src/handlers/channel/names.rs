//! NAMES handler and the shared names burst.

use async_trait::async_trait;
use lantern_proto::{Message, Response};

use super::numeric;
use crate::handlers::{Context, Handler, HandlerResult, comma_list};
use crate::state::{Server, User};

/// Keep each 353 line comfortably under the 512-byte limit.
const NAMES_LINE_BUDGET: usize = 400;

/// Send 353 lines and 366 for `name` to `viewer`.
///
/// Members who joined invisibly are only listed to themselves. A secret or
/// private channel shows nothing to non-members.
pub(crate) fn send_names(server: &Server, viewer: &User, name: &str) {
    let end = |display: &str| {
        viewer.send(numeric(
            server,
            &viewer.nick,
            Response::RPL_ENDOFNAMES,
            vec![display.to_string()],
        ))
    };

    let (Some(channel), Some(members)) = (
        server.directory.find_channel(name),
        server.directory.channel_members(name),
    ) else {
        end(name);
        return;
    };
    let is_member = members.iter().any(|(u, _)| u.uid == viewer.uid);
    if channel.is_hidden() && !is_member {
        end(&channel.name);
        return;
    }

    let symbol = if channel.modes.secret {
        "@"
    } else if channel.modes.private {
        "*"
    } else {
        "="
    };

    let mut entries: Vec<String> = members
        .iter()
        .filter(|(u, roles)| !roles.invisible || u.uid == viewer.uid)
        .map(|(u, roles)| {
            let prefix = roles.prefixes(viewer.caps.multi_prefix);
            if viewer.caps.userhost_in_names {
                format!("{prefix}{}", u.mask())
            } else {
                format!("{prefix}{}", u.nick)
            }
        })
        .collect();
    entries.sort();

    let mut line = String::new();
    for entry in entries {
        if !line.is_empty() && line.len() + entry.len() + 1 > NAMES_LINE_BUDGET {
            viewer.send(numeric(
                server,
                &viewer.nick,
                Response::RPL_NAMREPLY,
                vec![symbol.to_string(), channel.name.clone(), std::mem::take(&mut line)],
            ));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&entry);
    }
    if !line.is_empty() {
        viewer.send(numeric(
            server,
            &viewer.nick,
            Response::RPL_NAMREPLY,
            vec![symbol.to_string(), channel.name.clone(), line],
        ));
    }
    end(&channel.name);
}

pub struct NamesHandler;

#[async_trait]
impl Handler for NamesHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let user = ctx.user()?;
        match msg.arg(0) {
            Some(targets) => {
                for name in comma_list(targets) {
                    send_names(ctx.server, &user, name);
                }
            }
            // Without a target only list the caller's channels.
            None => {
                for (channel, _) in ctx.server.directory.user_channels(ctx.uid) {
                    send_names(ctx.server, &user, &channel.name);
                }
            }
        }
        Ok(())
    }
}
