//! Welcome posters for members joining a group.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::context::ExecutionContext;
use crate::error::PipelineError;
use crate::llm::{self, PosterResult, WorkflowClient, WorkflowRequest};
use crate::media::MediaFetcher;
use crate::pipeline::Handler;
use crate::pipeline::classify::{RoomGate, extract_joined_username};
use crate::pipeline::types::{Action, MessageKind};

pub const NAME: &str = "welcome-plugin";

pub struct WelcomeHandler {
    workflow: Arc<dyn WorkflowClient>,
    media: Arc<dyn MediaFetcher>,
    gate: RoomGate,
    require_invite_pair: bool,
    timeout: Duration,
}

impl WelcomeHandler {
    pub fn new(
        workflow: Arc<dyn WorkflowClient>,
        media: Arc<dyn MediaFetcher>,
        gate: RoomGate,
        require_invite_pair: bool,
        timeout: Duration,
    ) -> Self {
        Self {
            workflow,
            media,
            gate,
            require_invite_pair,
            timeout,
        }
    }
}

#[async_trait]
impl Handler for WelcomeHandler {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Sends a welcome poster when someone joins a group"
    }

    async fn handle(&self, ctx: &mut ExecutionContext) -> Result<(), PipelineError> {
        let event = ctx.event();
        if event.kind != MessageKind::System {
            return Ok(());
        }
        let Some(room) = event.room.clone() else {
            return Ok(());
        };
        if !self.gate.allows(&room) {
            debug!(room = %room.username, "Room not in welcome list");
            return Ok(());
        }
        let Some(user_name) = extract_joined_username(&event.content, self.require_invite_pair)
        else {
            debug!(room = %room.username, "Not a join notice");
            return Ok(());
        };

        info!(room = %room.username, user = %user_name, "New member joined");
        let request = WorkflowRequest::new(room.username.as_str())
            .input("user_name", user_name)
            .input("room_name", room.display_name.as_str())
            .input("room_user_name", room.username.as_str());

        let poster = match llm::bounded("workflow", self.timeout, self.workflow.run(request))
            .await
            .and_then(|output| output.parse::<PosterResult>())
        {
            Ok(poster) => poster,
            Err(e) => {
                warn!(room = %room.username, error = %e, "Poster workflow failed");
                return Ok(());
            }
        };

        let Some(url) = poster.image_urls.first() else {
            info!(room = %room.username, "Workflow produced no poster");
            return Ok(());
        };

        // A generated poster claims the notice even if the download fails.
        let fetch = self.media.fetch_image(url);
        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(image_path)) => ctx.add_action(Action::SendImage {
                image_path,
                target: room.display_name,
                is_chatroom: true,
            }),
            Ok(Err(e)) => warn!(url = %url, error = %e, "Poster download failed"),
            Err(_) => warn!(url = %url, "Poster download timed out"),
        }
        ctx.request_stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{StubMedia, StubWorkflow};
    use crate::pipeline::types::{Event, Participant};
    use serde_json::json;
    use std::path::PathBuf;

    const INVITE: &str = "\"老胡@omni-rpa\"邀请\"胡言蹊\"加入了群聊";

    fn handler(workflow: Arc<StubWorkflow>, gate: RoomGate, media_fails: bool) -> WelcomeHandler {
        WelcomeHandler::new(
            workflow,
            Arc::new(StubMedia { fail: media_fails }),
            gate,
            false,
            Duration::from_secs(1),
        )
    }

    fn open_gate() -> RoomGate {
        RoomGate {
            all_room_allowed: true,
            allowed_room_list: Vec::new(),
        }
    }

    fn notice(content: &str) -> Event {
        Event::new(MessageKind::System, content).in_room(Participant::new("1@chatroom", "Rust 群"))
    }

    #[tokio::test]
    async fn sends_poster_for_invitee() {
        let workflow = Arc::new(StubWorkflow::answering(
            json!({"image_urls": ["https://cdn.example.com/a.png", "https://cdn.example.com/b.png"]}),
        ));
        let mut ctx = ExecutionContext::new(notice(INVITE));
        handler(workflow.clone(), open_gate(), false)
            .handle(&mut ctx)
            .await
            .unwrap();

        assert!(ctx.is_stopped());
        assert_eq!(
            ctx.actions(),
            &[Action::SendImage {
                image_path: PathBuf::from("/tmp/poster.png"),
                target: "Rust 群".into(),
                is_chatroom: true,
            }]
        );

        let requests = workflow.requests.lock().unwrap();
        assert_eq!(requests[0].user, "1@chatroom");
        assert_eq!(requests[0].inputs["user_name"], "胡言蹊");
        assert_eq!(requests[0].inputs["room_name"], "Rust 群");
        assert_eq!(requests[0].inputs["room_user_name"], "1@chatroom");
    }

    #[tokio::test]
    async fn structured_notice_is_welcomed() {
        let content = json!({
            "sysmsg": {
                "@type": "delchatroommember",
                "delchatroommember": {"plain": "\"张三\"加入了群聊"}
            }
        })
        .to_string();
        let workflow = Arc::new(StubWorkflow::answering(json!({"image_urls": ["https://x/p.png"]})));
        let mut ctx = ExecutionContext::new(notice(&content));
        handler(workflow.clone(), open_gate(), false)
            .handle(&mut ctx)
            .await
            .unwrap();
        assert_eq!(ctx.actions().len(), 1);
        assert_eq!(workflow.requests.lock().unwrap()[0].inputs["user_name"], "张三");
    }

    #[tokio::test]
    async fn gated_room_is_skipped() {
        let workflow = Arc::new(StubWorkflow::answering(json!({"image_urls": ["https://x/p.png"]})));
        let gate = RoomGate {
            all_room_allowed: false,
            allowed_room_list: vec!["2@chatroom".into()],
        };
        let mut ctx = ExecutionContext::new(notice(INVITE));
        handler(workflow.clone(), gate, false).handle(&mut ctx).await.unwrap();
        assert_eq!(workflow.calls(), 0);
        assert!(ctx.actions().is_empty());
    }

    #[tokio::test]
    async fn unrecognized_notice_is_skipped() {
        let workflow = Arc::new(StubWorkflow::answering(json!({"image_urls": ["https://x/p.png"]})));
        let mut ctx = ExecutionContext::new(notice("\"张三\"修改群名为\"Rust 2024\""));
        handler(workflow.clone(), open_gate(), false)
            .handle(&mut ctx)
            .await
            .unwrap();
        assert_eq!(workflow.calls(), 0);
    }

    #[tokio::test]
    async fn no_poster_does_not_stop() {
        let workflow = Arc::new(StubWorkflow::answering(json!({"image_urls": []})));
        let mut ctx = ExecutionContext::new(notice(INVITE));
        handler(workflow, open_gate(), false).handle(&mut ctx).await.unwrap();
        assert!(!ctx.is_stopped());
        assert!(ctx.actions().is_empty());
    }

    #[tokio::test]
    async fn workflow_failure_does_not_stop() {
        let failing = Arc::new(StubWorkflow::failing("timeout"));
        let mut ctx = ExecutionContext::new(notice(INVITE));
        handler(failing, open_gate(), false).handle(&mut ctx).await.unwrap();
        assert!(!ctx.is_stopped());
        assert!(ctx.actions().is_empty());
    }

    #[tokio::test]
    async fn failed_download_still_stops() {
        let workflow = Arc::new(StubWorkflow::answering(json!({"image_urls": ["https://x/p.png"]})));
        let mut ctx = ExecutionContext::new(notice(INVITE));
        handler(workflow, open_gate(), true).handle(&mut ctx).await.unwrap();
        assert!(ctx.is_stopped());
        assert!(ctx.actions().is_empty());
    }
}
