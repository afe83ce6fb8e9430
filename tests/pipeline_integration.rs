//! End-to-end runs of the configured handler chain with stub collaborators and
//! an in-memory libSQL history store.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use bot_triage::config::TriageConfig;
use bot_triage::error::LlmError;
use bot_triage::handlers::{Collaborators, build_handlers};
use bot_triage::llm::{ChatCompleter, ChatRequest, WorkflowClient, WorkflowOutput, WorkflowRequest};
use bot_triage::media::MediaFetcher;
use bot_triage::pipeline::{Action, Event, MessageKind, Participant, Scheduler};
use bot_triage::store::LibSqlHistoryStore;

const STORE: &str = ":memory:";
const ROOM: &str = "1@chatroom";

// ── Stubs ───────────────────────────────────────────────────────────

struct StubWorkflow {
    answer: Option<Value>,
    calls: AtomicUsize,
}

impl StubWorkflow {
    fn answering(answer: Value) -> Arc<Self> {
        Arc::new(Self {
            answer: Some(answer),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            answer: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WorkflowClient for StubWorkflow {
    async fn run(&self, _request: WorkflowRequest) -> Result<WorkflowOutput, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .map(WorkflowOutput)
            .ok_or_else(|| LlmError::RequestFailed {
                provider: "stub".into(),
                reason: "502 Bad Gateway".into(),
            })
    }
}

struct PanickingWorkflow;

#[async_trait]
impl WorkflowClient for PanickingWorkflow {
    async fn run(&self, _request: WorkflowRequest) -> Result<WorkflowOutput, LlmError> {
        panic!("relevance workflow crashed");
    }
}

struct StubChat {
    answer: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubChat {
    fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.to_string(),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatCompleter for StubChat {
    async fn complete(&self, request: ChatRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.answer.clone())
    }
}

struct StubMedia;

#[async_trait]
impl MediaFetcher for StubMedia {
    async fn fetch_image(&self, _url: &str) -> anyhow::Result<PathBuf> {
        Ok(PathBuf::from("/tmp/welcome.png"))
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct Harness {
    scheduler: Scheduler,
    history: Arc<LibSqlHistoryStore>,
    relevance: Arc<StubWorkflow>,
    chat: Arc<StubChat>,
}

fn config(raw: Value) -> TriageConfig {
    let config = TriageConfig::from_json(&raw.to_string()).unwrap();
    config.validate().unwrap();
    config
}

fn harness(config: &TriageConfig, relevance: Arc<StubWorkflow>, poster: Arc<StubWorkflow>) -> Harness {
    let history = Arc::new(LibSqlHistoryStore::new());
    let chat = StubChat::answering("收到");
    let deps = Collaborators {
        relevance: relevance.clone(),
        poster,
        chat: chat.clone(),
        history: history.clone(),
        media: Arc::new(StubMedia),
    };
    Harness {
        scheduler: Scheduler::new(build_handlers(config, deps)).unwrap(),
        history,
        relevance,
        chat,
    }
}

fn full_config() -> TriageConfig {
    config(json!({
        "bot": {"account": "wxid_bot", "nickname": "小助手"},
        "history_db": STORE,
        "history_context": {"enabled": true},
        "bot_check": {"enabled": true, "dify_base_url": "https://dify.local/v1"},
        "pat": {"enabled": true},
        "welcome": {"enabled": true, "dify_base_url": "https://dify.local/v1"},
        "chat_reply": {"enabled": true, "openai_api_key": "sk-test"},
        "image": {"enabled": true},
        "video": {"enabled": true}
    }))
}

fn room() -> Participant {
    Participant::new(ROOM, "Rust 群")
}

fn alice() -> Participant {
    Participant::new("wxid_alice", "Alice")
}

fn pat_from_alice() -> Event {
    Event::new(MessageKind::Pat, "")
        .with_title("\"Alice\" 拍了拍我")
        .with_patted("wxid_bot")
        .in_room(room())
        .from_contact(alice())
}

fn mention_from_alice() -> Event {
    Event::new(MessageKind::Text, "@小助手\u{2005}帮我看看这段代码")
        .in_room(room())
        .from_contact(alice())
        .with_mention()
}

async fn seed_history(history: &LibSqlHistoryStore, sender: &str, content: &str) {
    history
        .record(STORE, ROOM, sender, content, Utc::now() - Duration::seconds(30))
        .await
        .unwrap();
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn pat_is_returned_once_per_cooldown() {
    let config = full_config();
    let h = harness(&config, StubWorkflow::answering(json!({})), StubWorkflow::answering(json!({})));
    seed_history(&h.history, "wxid_alice", "早上好").await;

    let first = h.scheduler.run(pat_from_alice()).await;
    assert!(first.is_stopped());
    assert_eq!(
        first.actions(),
        &[Action::Pat {
            target: "Rust 群".into(),
            user_name: "Alice".into(),
            is_chatroom: true,
        }]
    );

    let second = h.scheduler.run(pat_from_alice()).await;
    assert!(second.is_stopped());
    assert!(second.actions().is_empty());

    // Pats never reach the relevance check or the chat model.
    assert_eq!(h.relevance.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn pat_without_history_from_patter_is_dropped() {
    let config = full_config();
    let h = harness(&config, StubWorkflow::answering(json!({})), StubWorkflow::answering(json!({})));
    seed_history(&h.history, "wxid_carol", "有人吗").await;

    let ctx = h.scheduler.run(pat_from_alice()).await;
    assert!(ctx.is_stopped());
    assert!(ctx.actions().is_empty());
}

#[tokio::test]
async fn failed_relevance_check_blocks_reply() {
    let config = full_config();
    let h = harness(&config, StubWorkflow::failing(), StubWorkflow::answering(json!({})));

    let ctx = h.scheduler.run(mention_from_alice()).await;
    assert!(ctx.facts().bot_check);
    assert!(ctx.facts().not_for_bot);
    assert!(ctx.actions().is_empty());
    assert_eq!(h.relevance.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.chat.calls(), 0);
}

#[tokio::test]
async fn panicking_relevance_check_still_blocks_private_reply() {
    let config = full_config();
    let chat = StubChat::answering("不该回复");
    let deps = Collaborators {
        relevance: Arc::new(PanickingWorkflow),
        poster: StubWorkflow::answering(json!({})),
        chat: chat.clone(),
        history: Arc::new(LibSqlHistoryStore::new()),
        media: Arc::new(StubMedia),
    };
    let scheduler = Scheduler::new(build_handlers(&config, deps)).unwrap();

    let event = Event::new(MessageKind::Text, "在吗").from_contact(alice());
    let ctx = scheduler.run(event).await;

    assert!(ctx.facts().bot_check);
    assert!(ctx.facts().not_for_bot);
    assert!(
        !ctx
            .actions()
            .iter()
            .any(|a| matches!(a, Action::SendText { .. }))
    );
    assert_eq!(chat.calls(), 0);
}

#[tokio::test]
async fn relevant_message_gets_reply_with_history() {
    let config = full_config();
    let h = harness(
        &config,
        StubWorkflow::answering(json!({"is_for_bot": true})),
        StubWorkflow::answering(json!({})),
    );
    seed_history(&h.history, "wxid_alice", "我写了个 trait").await;

    let ctx = h.scheduler.run(mention_from_alice()).await;
    assert!(ctx.is_stopped());
    assert_eq!(ctx.facts().chat_history.as_deref(), Some("wxid_alice: 我写了个 trait"));
    assert_eq!(
        ctx.actions(),
        &[Action::SendText {
            content: "收到".into(),
            target: "Rust 群".into(),
            is_chatroom: true,
            quote_message: Some("@小助手 帮我看看这段代码".into()),
            at_user_name: None,
        }]
    );

    let requests = h.chat.requests.lock().unwrap();
    assert!(requests[0].messages[0].content.contains("wxid_alice: 我写了个 trait"));
    assert_eq!(requests[0].messages[1].content, "帮我看看这段代码");
}

#[tokio::test]
async fn join_notice_sends_welcome_poster() {
    let config = full_config();
    let poster = StubWorkflow::answering(json!({"image_urls": ["https://cdn.local/p.png"]}));
    let h = harness(&config, StubWorkflow::answering(json!({})), poster.clone());

    let event = Event::new(MessageKind::System, "\"老胡@omni-rpa\"邀请\"胡言蹊\"加入了群聊")
        .in_room(room());
    let ctx = h.scheduler.run(event).await;

    assert!(ctx.is_stopped());
    assert_eq!(
        ctx.actions(),
        &[Action::SendImage {
            image_path: PathBuf::from("/tmp/welcome.png"),
            target: "Rust 群".into(),
            is_chatroom: true,
        }]
    );
    assert_eq!(poster.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn welcome_respects_room_allow_list() {
    let config = config(json!({
        "welcome": {
            "enabled": true,
            "dify_base_url": "https://dify.local/v1",
            "all_room_allowed": false,
            "allowed_room_list": ["其他群"]
        }
    }));
    let poster = StubWorkflow::answering(json!({"image_urls": ["https://cdn.local/p.png"]}));
    let h = harness(&config, StubWorkflow::answering(json!({})), poster.clone());

    let event = Event::new(MessageKind::System, "\"张三\"邀请\"李四\"加入了群聊").in_room(room());
    let ctx = h.scheduler.run(event).await;
    assert!(ctx.actions().is_empty());
    assert_eq!(poster.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn media_handlers_share_a_run() {
    let config = config(json!({
        "image": {"enabled": true, "priority": 200},
        "video": {"enabled": true}
    }));
    let h = harness(&config, StubWorkflow::answering(json!({})), StubWorkflow::answering(json!({})));

    let ctx = h
        .scheduler
        .run(Event::new(MessageKind::Image, "").in_room(room()))
        .await;
    assert!(!ctx.is_stopped());
    assert_eq!(
        ctx.into_actions(),
        vec![Action::DownloadImage {
            target: "Rust 群".into()
        }]
    );
}

#[tokio::test]
async fn default_config_takes_no_action() {
    let config = TriageConfig::default();
    let h = harness(&config, StubWorkflow::answering(json!({})), StubWorkflow::answering(json!({})));
    assert_eq!(h.scheduler.enabled_count(), 0);

    let ctx = h.scheduler.run(mention_from_alice()).await;
    assert!(ctx.actions().is_empty());
    assert!(!ctx.is_stopped());
}

#[tokio::test]
async fn concurrent_pats_from_one_contact_yield_one_action() {
    let config = full_config();
    let h = harness(&config, StubWorkflow::answering(json!({})), StubWorkflow::answering(json!({})));
    seed_history(&h.history, "wxid_alice", "在吗").await;

    let scheduler = Arc::new(h.scheduler);
    let mut runs = Vec::new();
    for _ in 0..8 {
        let scheduler = Arc::clone(&scheduler);
        runs.push(tokio::spawn(async move {
            scheduler.run(pat_from_alice()).await.into_actions().len()
        }));
    }

    let mut total = 0;
    for run in runs {
        total += run.await.unwrap();
    }
    assert_eq!(total, 1);
}
