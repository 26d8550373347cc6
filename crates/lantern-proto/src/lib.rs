//! IRC protocol building blocks for `lanternd`.
//!
//! - [`line`]: CRLF framing as a `tokio_util` codec
//! - [`message`]: tokenizing a line into command + arguments, and rendering replies
//! - [`response`]: the numeric reply catalog
//! - [`casemap`]: RFC 1459 case folding for nicks and channel names

pub mod casemap;
pub mod error;
pub mod line;
pub mod message;
pub mod response;

pub use casemap::{irc_eq, irc_lower_char, irc_to_lower};
pub use error::ProtocolError;
pub use line::{DEFAULT_LINE_CEILING, LineCodec, MAX_LINE_LEN};
pub use message::{Message, tokenize};
pub use response::{Response, format_reply, reply};
