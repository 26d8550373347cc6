//! Server state.
//!
//! The [`Server`] value ties together the [`Directory`] (users, nicks,
//! channels), per-connection [`Session`] data and WHOWAS history.

pub mod channel;
pub mod directory;
pub mod server;
pub mod session;
mod uid;
pub mod user;
pub mod whowas;

pub use channel::{BanEntry, Channel, ChannelModes, Topic, is_valid_channel_name};
pub use directory::{
    ChannelEdit, Departure, Directory, JoinMode, JoinOutcome, JoinRequest, KickOutcome,
    LeaveOutcome, NickChange, NickError,
};
pub use server::{RehashDomain, RehashReport, Server, Shutdown, ShutdownKind};
pub use session::{PassState, RegistrationState, Session};
pub use uid::{Uid, UidGenerator};
pub use user::{
    Capabilities, MemberRoles, Outbound, OutboundTx, User, UserModes, is_valid_nick,
    is_valid_nick_char,
};
pub use whowas::{WhowasEntry, WhowasHistory};
