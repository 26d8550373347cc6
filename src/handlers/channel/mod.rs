//! Channel membership handlers: JOIN, IJOIN, FJOIN, PART, KICK, TOPIC,
//! NAMES and INVITE.

mod invite;
mod join;
mod kick;
mod names;
mod part;
mod topic;

pub use invite::InviteHandler;
pub use join::{FjoinHandler, IjoinHandler, JoinHandler};
pub use kick::KickHandler;
pub use names::NamesHandler;
pub use part::PartHandler;
pub use topic::TopicHandler;

use lantern_proto::{Message, Response, reply};

use crate::state::Server;

/// A numeric addressed to `nick`, for replies that go to someone other than
/// the command's sender (e.g. the target of FJOIN).
fn numeric(server: &Server, nick: &str, response: Response, args: Vec<String>) -> Message {
    let mut params = Vec::with_capacity(args.len() + 1);
    params.push(nick.to_string());
    params.extend(args);
    reply(&server.name, response, params)
}
