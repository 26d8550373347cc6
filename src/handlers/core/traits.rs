//! The command handler trait.

use async_trait::async_trait;
use lantern_proto::Message;

use super::context::Context;
use crate::error::HandlerResult;

/// A command implementation.
///
/// Handlers are stateless values shared through `Arc`; anything they need
/// lives on the [`Context`].
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult;

    /// Commands usable before registration override this.
    fn requires_registration(&self) -> bool {
        true
    }
}
