//! Security subsystems: moderation lists, masks, secrets and cloaking.

pub mod cloaking;
pub mod mask;
pub mod moderation;
pub mod password;
pub mod persist;

pub use moderation::{
    Moderation, ModerationError, ModerationKind, ModerationRecord, ModerationStore,
    parse_duration,
};
pub use persist::{JsonLinesFile, ModerationPersist, PersistError};
