use async_trait::async_trait;
use lantern_proto::{Message, Response};

use crate::error::ChannelError;
use crate::handlers::{Context, Handler, HandlerError, HandlerResult, from_user, truncate};

/// `TOPIC <channel> [:text]`
///
/// Without text the current topic is returned (331, or 332 + 333). An empty
/// text clears the topic.
pub struct TopicHandler;

#[async_trait]
impl Handler for TopicHandler {
    async fn handle(&self, ctx: &mut Context<'_>, msg: &Message) -> HandlerResult {
        let name = msg.arg(0).ok_or(HandlerError::NeedMoreParams)?;

        let Some(text) = msg.arg(1) else {
            let channel = ctx
                .server
                .directory
                .find_channel(name)
                .ok_or_else(|| ChannelError::NoSuchChannel(name.to_string()))?;
            if channel.is_hidden() && !ctx.server.directory.is_member(ctx.uid, name) {
                return Err(ChannelError::NotOnChannel(channel.name).into());
            }
            match channel.topic {
                Some(topic) => {
                    ctx.reply(
                        Response::RPL_TOPIC,
                        vec![channel.name.clone(), topic.text],
                    );
                    ctx.reply(
                        Response::RPL_TOPICWHOTIME,
                        vec![channel.name, topic.set_by, topic.set_at.to_string()],
                    );
                }
                None => ctx.reply(Response::RPL_NOTOPIC, vec![channel.name]),
            }
            return Ok(());
        };

        let user = ctx.user()?;
        let topiclen = ctx.server.config().limits.topiclen;
        let text = truncate(text, topiclen);
        let (channel_name, _) = ctx
            .server
            .directory
            .set_topic(ctx.uid, name, text, &user.nick)?;
        let topic = from_user(&user, "TOPIC", vec![channel_name.clone(), text.to_string()]);
        ctx.server
            .directory
            .broadcast(&channel_name, |_| Some(topic.clone()));
        Ok(())
    }
}
