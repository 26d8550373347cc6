//! Numeric reply catalog.
//!
//! Names follow RFC 1459/2812 plus the handful of common extensions the
//! daemon emits (`RPL_TOPICWHOTIME`, `RPL_MODLIST`, ...).

use std::fmt;

use crate::message::Message;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Response {
    RPL_WELCOME = 1,
    RPL_YOURHOST = 2,
    RPL_CREATED = 3,
    RPL_MYINFO = 4,
    RPL_ISUPPORT = 5,
    RPL_STATSCOMMANDS = 212,
    RPL_STATSKLINE = 216,
    RPL_STATSQLINE = 217,
    RPL_ENDOFSTATS = 219,
    RPL_UMODEIS = 221,
    RPL_STATSZLINE = 225,
    RPL_STATSUPTIME = 242,
    RPL_AWAY = 301,
    RPL_UNAWAY = 305,
    RPL_NOWAWAY = 306,
    RPL_WHOISUSER = 311,
    RPL_WHOISSERVER = 312,
    RPL_WHOISOPERATOR = 313,
    RPL_WHOWASUSER = 314,
    RPL_WHOISIDLE = 317,
    RPL_ENDOFWHOIS = 318,
    RPL_WHOISCHANNELS = 319,
    RPL_CHANNELMODEIS = 324,
    RPL_CREATIONTIME = 329,
    RPL_NOTOPIC = 331,
    RPL_TOPIC = 332,
    RPL_TOPICWHOTIME = 333,
    RPL_INVITING = 341,
    RPL_NAMREPLY = 353,
    RPL_ENDOFNAMES = 366,
    RPL_BANLIST = 367,
    RPL_ENDOFBANLIST = 368,
    RPL_ENDOFWHOWAS = 369,
    RPL_MOTD = 372,
    RPL_MOTDSTART = 375,
    RPL_ENDOFMOTD = 376,
    RPL_YOUREOPER = 381,
    RPL_REHASHING = 382,
    ERR_NOSUCHNICK = 401,
    ERR_NOSUCHCHANNEL = 403,
    ERR_CANNOTSENDTOCHAN = 404,
    ERR_TOOMANYCHANNELS = 405,
    ERR_WASNOSUCHNICK = 406,
    ERR_NOORIGIN = 409,
    ERR_INVALIDCAPCMD = 410,
    ERR_NORECIPIENT = 411,
    ERR_NOTEXTTOSEND = 412,
    ERR_UNKNOWNCOMMAND = 421,
    ERR_NOMOTD = 422,
    ERR_NONICKNAMEGIVEN = 431,
    ERR_ERRONEUSNICKNAME = 432,
    ERR_NICKNAMEINUSE = 433,
    ERR_USERNOTINCHANNEL = 441,
    ERR_NOTONCHANNEL = 442,
    ERR_USERONCHANNEL = 443,
    ERR_NOTREGISTERED = 451,
    ERR_NEEDMOREPARAMS = 461,
    ERR_ALREADYREGISTRED = 462,
    ERR_PASSWDMISMATCH = 464,
    ERR_YOUREBANNEDCREEP = 465,
    ERR_KEYSET = 467,
    ERR_CHANNELISFULL = 471,
    ERR_UNKNOWNMODE = 472,
    ERR_INVITEONLYCHAN = 473,
    ERR_BANNEDFROMCHAN = 474,
    ERR_BADCHANNELKEY = 475,
    ERR_BADCHANMASK = 476,
    ERR_NOPRIVILEGES = 481,
    ERR_CHANOPRIVSNEEDED = 482,
    ERR_NOOPERHOST = 491,
    ERR_UMODEUNKNOWNFLAG = 501,
    ERR_USERSDONTMATCH = 502,
    RPL_MODLIST = 702,
    RPL_ENDOFMODLIST = 703,
}

impl Response {
    #[inline]
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Whether this is an error numeric (4xx/5xx).
    pub fn is_error(self) -> bool {
        (400..600).contains(&self.code())
    }

    /// Fixed trailing text for numerics that carry one.
    pub fn default_text(self) -> Option<&'static str> {
        Some(match self {
            Self::RPL_ENDOFSTATS => "End of /STATS report",
            Self::RPL_UNAWAY => "You are no longer marked as being away",
            Self::RPL_NOWAWAY => "You have been marked as being away",
            Self::RPL_WHOISOPERATOR => "is an IRC operator",
            Self::RPL_ENDOFWHOIS => "End of /WHOIS list",
            Self::RPL_NOTOPIC => "No topic is set",
            Self::RPL_ENDOFNAMES => "End of /NAMES list",
            Self::RPL_ENDOFBANLIST => "End of channel ban list",
            Self::RPL_ENDOFWHOWAS => "End of WHOWAS",
            Self::RPL_ENDOFMOTD => "End of /MOTD command",
            Self::RPL_YOUREOPER => "You are now an IRC operator",
            Self::RPL_REHASHING => "Rehashing",
            Self::RPL_ENDOFMODLIST => "End of MODLIST",
            Self::ERR_NOSUCHNICK => "No such nick/channel",
            Self::ERR_NOSUCHCHANNEL => "No such channel",
            Self::ERR_CANNOTSENDTOCHAN => "Cannot send to channel",
            Self::ERR_TOOMANYCHANNELS => "You have joined too many channels",
            Self::ERR_WASNOSUCHNICK => "There was no such nickname",
            Self::ERR_NOORIGIN => "No origin specified",
            Self::ERR_INVALIDCAPCMD => "Invalid CAP subcommand",
            Self::ERR_NORECIPIENT => "No recipient given",
            Self::ERR_NOTEXTTOSEND => "No text to send",
            Self::ERR_UNKNOWNCOMMAND => "Unknown command",
            Self::ERR_NOMOTD => "MOTD File is missing",
            Self::ERR_NONICKNAMEGIVEN => "No nickname given",
            Self::ERR_ERRONEUSNICKNAME => "Erroneous nickname",
            Self::ERR_NICKNAMEINUSE => "Nickname is already in use",
            Self::ERR_USERNOTINCHANNEL => "They aren't on that channel",
            Self::ERR_NOTONCHANNEL => "You're not on that channel",
            Self::ERR_USERONCHANNEL => "is already on channel",
            Self::ERR_NOTREGISTERED => "You have not registered",
            Self::ERR_NEEDMOREPARAMS => "Not enough parameters",
            Self::ERR_ALREADYREGISTRED => "You may not reregister",
            Self::ERR_PASSWDMISMATCH => "Password incorrect",
            Self::ERR_YOUREBANNEDCREEP => "You are banned from this server",
            Self::ERR_KEYSET => "Channel key already set",
            Self::ERR_CHANNELISFULL => "Cannot join channel (+l)",
            Self::ERR_UNKNOWNMODE => "is unknown mode char to me",
            Self::ERR_INVITEONLYCHAN => "Cannot join channel (+i)",
            Self::ERR_BANNEDFROMCHAN => "Cannot join channel (+b)",
            Self::ERR_BADCHANNELKEY => "Cannot join channel (+k)",
            Self::ERR_BADCHANMASK => "Bad Channel Mask",
            Self::ERR_NOPRIVILEGES => "Permission Denied- You're not an IRC operator",
            Self::ERR_CHANOPRIVSNEEDED => "You're not channel operator",
            Self::ERR_NOOPERHOST => "No O-lines for your host",
            Self::ERR_UMODEUNKNOWNFLAG => "Unknown MODE flag",
            Self::ERR_USERSDONTMATCH => "Cannot change mode for other users",
            _ => return None,
        })
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

/// Build a numeric reply from `server`. `params` starts with the target nick.
///
/// When the numeric has a fixed text and the caller stopped after its
/// subjects, the text is appended as the trailing argument.
pub fn reply(server: &str, response: Response, mut params: Vec<String>) -> Message {
    if let Some(text) = response.default_text()
        && params.len() <= subjects(response)
    {
        params.push(text.to_owned());
    }
    Message::new(response.to_string(), params).with_prefix(server)
}

/// Render a numeric reply line (without CRLF). `args` are positional, target first.
pub fn format_reply(server: &str, response: Response, args: &[&str]) -> String {
    reply(server, response, args.iter().map(|a| (*a).to_owned()).collect()).to_string()
}

/// Parameters (target included) that precede a numeric's fixed text.
fn subjects(response: Response) -> usize {
    match response {
        Response::ERR_USERNOTINCHANNEL | Response::ERR_USERONCHANNEL => 3,
        Response::RPL_UNAWAY
        | Response::RPL_NOWAWAY
        | Response::RPL_ENDOFMOTD
        | Response::RPL_YOUREOPER
        | Response::RPL_ENDOFMODLIST
        | Response::ERR_NOORIGIN
        | Response::ERR_NORECIPIENT
        | Response::ERR_NOTEXTTOSEND
        | Response::ERR_NOMOTD
        | Response::ERR_NONICKNAMEGIVEN
        | Response::ERR_NOTREGISTERED
        | Response::ERR_ALREADYREGISTRED
        | Response::ERR_PASSWDMISMATCH
        | Response::ERR_YOUREBANNEDCREEP
        | Response::ERR_NOPRIVILEGES
        | Response::ERR_NOOPERHOST
        | Response::ERR_UMODEUNKNOWNFLAG
        | Response::ERR_USERSDONTMATCH => 1,
        _ => 2,
    }
}
