use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use bot_triage::config::TriageConfig;
use bot_triage::executor::{ActionExecutor, JsonLinesExecutor};
use bot_triage::handlers::{Collaborators, build_handlers};
use bot_triage::llm::{DifyWorkflowClient, RigChatCompleter};
use bot_triage::media::HttpMediaFetcher;
use bot_triage::pipeline::{Event, Scheduler};
use bot_triage::store::LibSqlHistoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Logs go to stderr; stdout carries the action stream
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = TriageConfig::from_env().context("Invalid configuration")?;
    let timeout = config.call_timeout();

    // ── Collaborators ───────────────────────────────────────────────────
    let deps = Collaborators {
        relevance: Arc::new(DifyWorkflowClient::new(
            config.bot_check.dify_api_key.clone(),
            config.bot_check.dify_base_url.clone(),
            timeout,
        )?),
        poster: Arc::new(DifyWorkflowClient::new(
            config.welcome.dify_api_key.clone(),
            config.welcome.dify_base_url.clone(),
            timeout,
        )?),
        chat: Arc::new(RigChatCompleter::new(
            &config.chat_reply.openai_api_key,
            &config.chat_reply.openai_base_url,
        )?),
        history: Arc::new(LibSqlHistoryStore::new()),
        media: Arc::new(HttpMediaFetcher::new(timeout)?),
    };

    let scheduler = Arc::new(Scheduler::new(build_handlers(&config, deps))?);
    let executor = Arc::new(JsonLinesExecutor::stdout());

    eprintln!("🤖 Bot triage v{}", env!("CARGO_PKG_VERSION"));
    for descriptor in scheduler.handlers() {
        eprintln!(
            "   {:<24} priority {:>5}  {}",
            descriptor.name,
            descriptor.priority,
            if descriptor.enabled { "on" } else { "off" }
        );
    }
    eprintln!("   Reading events from stdin, one JSON object per line.\n");

    // ── Event intake ────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut runs = tokio::task::JoinSet::new();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let event: Event = match serde_json::from_str(line) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "Skipping malformed event line");
                        continue;
                    }
                };

                let scheduler = Arc::clone(&scheduler);
                let executor = Arc::clone(&executor);
                runs.spawn(async move {
                    let actions = scheduler.run(event).await.into_actions();
                    if let Err(e) = executor.execute(&actions).await {
                        tracing::error!(error = %e, "Failed to hand off actions");
                    }
                });
            }
            Ok(None) => break, // EOF
            Err(e) => {
                tracing::error!("Error reading stdin: {}", e);
                break;
            }
        }

        // Reap finished runs so the set does not grow without bound
        while runs.try_join_next().is_some() {}
    }

    while runs.join_next().await.is_some() {}
    Ok(())
}
