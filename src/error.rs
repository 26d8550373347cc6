//! Error types for command processing.
//!
//! Handlers return [`HandlerError`]; the dispatcher turns each one into at
//! most one numeric reply. Directory operations return [`ChannelError`],
//! which carries the names it needs to render its own reply.

use lantern_proto::{Message, Response, reply};
use thiserror::Error;

// ============================================================================
// Handler Errors (command processing)
// ============================================================================

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,

    #[error("not registered")]
    NotRegistered,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("permission denied")]
    NoPrivileges,

    #[error("no nickname given")]
    NoNicknameGiven,

    #[error("nickname in use: {0}")]
    NicknameInUse(String),

    #[error("erroneous nickname: {0}")]
    ErroneousNickname(String),

    /// Q-lined nickname.
    #[error("reserved nickname {nick}: {reason}")]
    NickReserved { nick: String, reason: String },

    #[error("no such nick: {0}")]
    NoSuchNick(String),

    #[error("no such channel: {0}")]
    NoSuchChannel(String),

    #[error("no recipient")]
    NoRecipient,

    #[error("no text to send")]
    NoTextToSend,

    #[error("password mismatch")]
    PasswdMismatch,

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// The client asked to leave.
    #[error("client quit: {0:?}")]
    Quit(Option<String>),

    /// Close the connection with this reason (replies already sent).
    #[error("disconnect: {0}")]
    Disconnect(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl HandlerError {
    /// Static label for logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NeedMoreParams => "need_more_params",
            Self::NotRegistered => "not_registered",
            Self::AlreadyRegistered => "already_registered",
            Self::NoPrivileges => "no_privileges",
            Self::NoNicknameGiven => "no_nickname_given",
            Self::NicknameInUse(_) => "nickname_in_use",
            Self::ErroneousNickname(_) => "erroneous_nickname",
            Self::NickReserved { .. } => "nick_reserved",
            Self::NoSuchNick(_) => "no_such_nick",
            Self::NoSuchChannel(_) => "no_such_channel",
            Self::NoRecipient => "no_recipient",
            Self::NoTextToSend => "no_text_to_send",
            Self::PasswdMismatch => "passwd_mismatch",
            Self::Channel(_) => "channel",
            Self::Quit(_) => "quit",
            Self::Disconnect(_) => "disconnect",
            Self::Internal(_) => "internal_error",
        }
    }

    /// The numeric for this error, or `None` when the client sees nothing.
    pub fn to_irc_reply(&self, server_name: &str, nick: &str, cmd_name: &str) -> Option<Message> {
        let (response, params) = match self {
            Self::NeedMoreParams => (Response::ERR_NEEDMOREPARAMS, vec![nick, cmd_name]),
            Self::NotRegistered => (Response::ERR_NOTREGISTERED, vec![nick]),
            Self::AlreadyRegistered => (Response::ERR_ALREADYREGISTRED, vec![nick]),
            Self::NoPrivileges => (Response::ERR_NOPRIVILEGES, vec![nick]),
            Self::NoNicknameGiven => (Response::ERR_NONICKNAMEGIVEN, vec![nick]),
            Self::NicknameInUse(bad) => (Response::ERR_NICKNAMEINUSE, vec![nick, bad.as_str()]),
            Self::ErroneousNickname(bad) => {
                (Response::ERR_ERRONEUSNICKNAME, vec![nick, bad.as_str()])
            }
            Self::NickReserved { nick: bad, reason } => (
                Response::ERR_ERRONEUSNICKNAME,
                vec![nick, bad.as_str(), reason.as_str()],
            ),
            Self::NoSuchNick(target) => (Response::ERR_NOSUCHNICK, vec![nick, target.as_str()]),
            Self::NoSuchChannel(name) => (Response::ERR_NOSUCHCHANNEL, vec![nick, name.as_str()]),
            Self::NoRecipient => {
                let text = format!("No recipient given ({cmd_name})");
                return Some(reply(
                    server_name,
                    Response::ERR_NORECIPIENT,
                    vec![nick.to_string(), text],
                ));
            }
            Self::NoTextToSend => (Response::ERR_NOTEXTTOSEND, vec![nick]),
            Self::PasswdMismatch => (Response::ERR_PASSWDMISMATCH, vec![nick]),
            Self::Channel(e) => return Some(e.to_irc_reply(server_name, nick)),
            Self::Quit(_) | Self::Disconnect(_) | Self::Internal(_) => return None,
        };
        Some(reply(
            server_name,
            response,
            params.into_iter().map(str::to_owned).collect(),
        ))
    }
}

/// Result type for command handlers.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Channel Errors (directory operations)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("no such channel {0}")]
    NoSuchChannel(String),

    #[error("no such nick {0}")]
    NoSuchNick(String),

    #[error("not on channel {0}")]
    NotOnChannel(String),

    #[error("{0} is not on {1}")]
    UserNotInChannel(String, String),

    #[error("{0} is already on {1}")]
    UserOnChannel(String, String),

    #[error("channel operator privileges needed on {0}")]
    ChanOpNeeded(String),

    #[error("cannot join {0} (+b)")]
    BannedFromChan(String),

    #[error("cannot join {0} (+i)")]
    InviteOnly(String),

    #[error("cannot join {0} (+k)")]
    BadKey(String),

    #[error("cannot join {0} (+l)")]
    ChannelFull(String),

    #[error("too many channels, refused {0}")]
    TooManyChannels(String),

    #[error("cannot send to {0}")]
    CannotSend(String),

    #[error("bad channel mask {0}")]
    BadChanMask(String),
}

impl ChannelError {
    pub fn to_irc_reply(&self, server_name: &str, nick: &str) -> Message {
        let (response, subjects): (Response, Vec<&str>) = match self {
            Self::NoSuchChannel(c) => (Response::ERR_NOSUCHCHANNEL, vec![c.as_str()]),
            Self::NoSuchNick(n) => (Response::ERR_NOSUCHNICK, vec![n.as_str()]),
            Self::NotOnChannel(c) => (Response::ERR_NOTONCHANNEL, vec![c.as_str()]),
            Self::UserNotInChannel(n, c) => (Response::ERR_USERNOTINCHANNEL, vec![n.as_str(), c.as_str()]),
            Self::UserOnChannel(n, c) => (Response::ERR_USERONCHANNEL, vec![n.as_str(), c.as_str()]),
            Self::ChanOpNeeded(c) => (Response::ERR_CHANOPRIVSNEEDED, vec![c.as_str()]),
            Self::BannedFromChan(c) => (Response::ERR_BANNEDFROMCHAN, vec![c.as_str()]),
            Self::InviteOnly(c) => (Response::ERR_INVITEONLYCHAN, vec![c.as_str()]),
            Self::BadKey(c) => (Response::ERR_BADCHANNELKEY, vec![c.as_str()]),
            Self::ChannelFull(c) => (Response::ERR_CHANNELISFULL, vec![c.as_str()]),
            Self::TooManyChannels(c) => (Response::ERR_TOOMANYCHANNELS, vec![c.as_str()]),
            Self::CannotSend(c) => (Response::ERR_CANNOTSENDTOCHAN, vec![c.as_str()]),
            Self::BadChanMask(c) => (Response::ERR_BADCHANMASK, vec![c.as_str()]),
        };
        let mut params = vec![nick.to_string()];
        params.extend(subjects.into_iter().map(str::to_owned));
        reply(server_name, response, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_errors_map_to_one_numeric() {
        let msg = HandlerError::NeedMoreParams
            .to_irc_reply("irc.test", "bob", "JOIN")
            .unwrap();
        assert_eq!(msg.to_string(), ":irc.test 461 bob JOIN :Not enough parameters");

        let msg = HandlerError::NickReserved {
            nick: "ChanServ".into(),
            reason: "Reserved for services".into(),
        }
        .to_irc_reply("irc.test", "*", "NICK")
        .unwrap();
        assert_eq!(msg.to_string(), ":irc.test 432 * ChanServ :Reserved for services");
    }

    #[test]
    fn silent_errors() {
        assert!(HandlerError::Quit(None).to_irc_reply("s", "n", "QUIT").is_none());
        assert!(HandlerError::Internal("x".into()).to_irc_reply("s", "n", "X").is_none());
        assert_eq!(HandlerError::Disconnect("bye".into()).error_code(), "disconnect");
    }

    #[test]
    fn channel_errors_render() {
        let msg = ChannelError::UserNotInChannel("eve".into(), "#x".into())
            .to_irc_reply("irc.test", "bob");
        assert_eq!(msg.to_string(), ":irc.test 441 bob eve #x :They aren't on that channel");

        let msg = HandlerError::from(ChannelError::BadKey("#k".into()))
            .to_irc_reply("irc.test", "bob", "JOIN")
            .unwrap();
        assert_eq!(msg.to_string(), ":irc.test 475 bob #k :Cannot join channel (+k)");
    }

    #[test]
    fn no_recipient_names_the_command() {
        let msg = HandlerError::NoRecipient
            .to_irc_reply("irc.test", "bob", "PRIVMSG")
            .unwrap();
        assert_eq!(msg.to_string(), ":irc.test 411 bob :No recipient given (PRIVMSG)");
    }
}
