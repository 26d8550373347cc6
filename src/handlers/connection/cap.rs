//! CAP command handler (IRCv3 capability negotiation).
//!
//! Supported: `multi-prefix` and `userhost-in-names`. `LS` or `REQ` before
//! registration holds registration back until `CAP END`.

use async_trait::async_trait;
use lantern_proto::{Message, Response};

use super::welcome::try_complete_registration;
use crate::handlers::{Context, Handler, HandlerError, HandlerResult};
use crate::state::Capabilities;

pub const SUPPORTED_CAPS: [&str; 2] = ["multi-prefix", "userhost-in-names"];

fn flag_mut<'c>(caps: &'c mut Capabilities, name: &str) -> Option<&'c mut bool> {
    match name {
        "multi-prefix" => Some(&mut caps.multi_prefix),
        "userhost-in-names" => Some(&mut caps.userhost_in_names),
        _ => None,
    }
}

fn enabled(caps: &Capabilities) -> Vec<&'static str> {
    let mut out = Vec::new();
    if caps.multi_prefix {
        out.push("multi-prefix");
    }
    if caps.userhost_in_names {
        out.push("userhost-in-names");
    }
    out
}

pub struct CapHandler;

impl CapHandler {
    fn cap_reply(ctx: &Context<'_>, sub: &str, body: String) {
        let msg = Message::new("CAP", vec![ctx.nick(), sub.to_string(), body])
            .with_prefix(ctx.server_name());
        ctx.send(msg);
    }
}

#[async_trait]
impl Handler for CapHandler {
    fn requires_registration(&self) -> bool {
        false
    }

    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let sub = msg
            .arg(0)
            .ok_or(HandlerError::NeedMoreParams)?
            .to_ascii_uppercase();

        match sub.as_str() {
            "LS" => {
                if !ctx.session.is_registered() {
                    ctx.session.cap_negotiating = true;
                }
                Self::cap_reply(ctx, "LS", SUPPORTED_CAPS.join(" "));
            }
            "LIST" => {
                let caps = ctx.user()?.caps;
                Self::cap_reply(ctx, "LIST", enabled(&caps).join(" "));
            }
            "REQ" => {
                if !ctx.session.is_registered() {
                    ctx.session.cap_negotiating = true;
                }
                let requested = msg.arg(1).unwrap_or_default().to_string();
                let all_known = requested
                    .split_whitespace()
                    .all(|c| SUPPORTED_CAPS.contains(&c.trim_start_matches('-')));
                if !all_known || requested.trim().is_empty() {
                    Self::cap_reply(ctx, "NAK", requested);
                    return Ok(());
                }
                ctx.server.directory.update_user(ctx.uid, |u| {
                    for cap in requested.split_whitespace() {
                        let (on, name) = match cap.strip_prefix('-') {
                            Some(name) => (false, name),
                            None => (true, cap),
                        };
                        if let Some(flag) = flag_mut(&mut u.caps, name) {
                            *flag = on;
                        }
                    }
                });
                Self::cap_reply(ctx, "ACK", requested);
            }
            "END" => {
                if ctx.session.cap_negotiating {
                    ctx.session.cap_negotiating = false;
                    return try_complete_registration(ctx);
                }
            }
            _ => ctx.reply(Response::ERR_INVALIDCAPCMD, vec![sub]),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_toggle_by_name() {
        let mut caps = Capabilities::default();
        *flag_mut(&mut caps, "multi-prefix").unwrap() = true;
        assert_eq!(enabled(&caps), vec!["multi-prefix"]);
        assert!(flag_mut(&mut caps, "sasl").is_none());
    }
}
