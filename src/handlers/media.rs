//! Ask the executor to save incoming images and videos.

use async_trait::async_trait;
use tracing::debug;

use crate::context::ExecutionContext;
use crate::error::PipelineError;
use crate::handlers::action_target;
use crate::pipeline::Handler;
use crate::pipeline::types::{Action, MessageKind};

pub const IMAGE_NAME: &str = "image-plugin";
pub const VIDEO_NAME: &str = "video-plugin";

pub struct ImageHandler;

#[async_trait]
impl Handler for ImageHandler {
    fn name(&self) -> &str {
        IMAGE_NAME
    }

    fn description(&self) -> &str {
        "Downloads received images"
    }

    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineError> {
        if ctx.event().kind != MessageKind::Image {
            return Ok(());
        }
        let target = action_target(ctx.event());
        debug!(target = %target, "Queueing image download");
        ctx.add_action(Action::DownloadImage { target });
        Ok(())
    }
}

pub struct VideoHandler;

#[async_trait]
impl Handler for VideoHandler {
    fn name(&self) -> &str {
        VIDEO_NAME
    }

    fn description(&self) -> &str {
        "Downloads received videos"
    }

    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineError> {
        let event = ctx.event();
        if event.kind != MessageKind::Video {
            return Ok(());
        }
        let action = Action::DownloadVideo {
            target: action_target(event),
            is_chatroom: event.is_chatroom,
        };
        debug!("Queueing video download");
        ctx.add_action(action);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{Event, Participant};

    fn in_room(kind: MessageKind) -> Event {
        Event::new(kind, "").in_room(Participant::new("1@chatroom", "Rust 群"))
    }

    #[tokio::test]
    async fn image_queues_download_without_stopping() {
        let mut ctx = ExecutionContext::new(in_room(MessageKind::Image));
        ImageHandler.handle(&mut ctx).await.unwrap();
        assert!(!ctx.is_stopped());
        assert_eq!(
            ctx.actions(),
            &[Action::DownloadImage {
                target: "Rust 群".into()
            }]
        );
    }

    #[tokio::test]
    async fn video_carries_group_flag() {
        let mut ctx = ExecutionContext::new(in_room(MessageKind::Video));
        VideoHandler.handle(&mut ctx).await.unwrap();
        assert!(!ctx.is_stopped());
        assert_eq!(
            ctx.actions(),
            &[Action::DownloadVideo {
                target: "Rust 群".into(),
                is_chatroom: true,
            }]
        );
    }

    #[tokio::test]
    async fn other_kinds_are_ignored() {
        let mut ctx = ExecutionContext::new(in_room(MessageKind::Text));
        ImageHandler.handle(&mut ctx).await.unwrap();
        VideoHandler.handle(&mut ctx).await.unwrap();
        assert!(ctx.actions().is_empty());
    }
}
