//! Connection and registration handlers.
//!
//! Handles NICK, USER, PASS, CAP, PING, PONG and QUIT, plus the welcome
//! burst sent when registration completes.

mod cap;
mod nick;
mod pass;
mod ping;
mod quit;
mod user;
mod welcome;

pub use cap::CapHandler;
pub use nick::NickHandler;
pub use pass::PassHandler;
pub use ping::{PingHandler, PongHandler};
pub use quit::QuitHandler;
pub use user::UserHandler;
pub use welcome::try_complete_registration;
