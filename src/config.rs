//! Configuration types.
//!
//! Every section is optional in the JSON file; missing keys take the defaults
//! below. Secrets and identity can be overridden from the environment.

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ConfigError;

/// Default system prompt for the chat-reply handler.
pub const DEFAULT_REPLY_PROMPT: &str = "你是一个聊天机器人，请根据用户的问题给出回答。历史对话：{{chat_history}} 当前时间：{{time_now}} \
你的昵称：{{self_nickname}} 群昵称：{{room_nickname}} 消息来自于：{{contact_nickname}}";

fn empty_secret() -> SecretString {
    SecretString::from(String::new())
}

/// The bot's own account.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotProfile {
    /// Protocol id, compared against the patted account of Pat events.
    pub account: String,
    /// Display name, used for @-mention stripping and prompts.
    pub nickname: String,
}

/// Loads recent conversation history into the `chat_history` fact.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryContextConfig {
    pub enabled: bool,
    pub priority: i64,
    pub limit: usize,
}

impl Default for HistoryContextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 1003,
            limit: 20,
        }
    }
}

/// Workflow-based relevance screening.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotCheckConfig {
    pub enabled: bool,
    pub priority: i64,
    pub dify_api_key: SecretString,
    pub dify_base_url: String,
    /// Nickname users address the bot by, besides its display name.
    pub nick_name: String,
    /// Screen group messages only.
    pub only_room: bool,
}

impl Default for BotCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 1002,
            dify_api_key: empty_secret(),
            dify_base_url: String::new(),
            nick_name: String::new(),
            only_room: false,
        }
    }
}

/// Reciprocal pats.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatConfig {
    pub enabled: bool,
    pub priority: i64,
    pub cooldown_secs: u64,
    /// How many recent messages the history check looks at.
    pub history_limit: usize,
}

impl Default for PatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 900,
            cooldown_secs: 120,
            history_limit: 10,
        }
    }
}

/// Welcome posters for new group members.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WelcomeConfig {
    pub enabled: bool,
    pub priority: i64,
    pub dify_api_key: SecretString,
    pub dify_base_url: String,
    pub all_room_allowed: bool,
    /// Room ids or display names, consulted when `all_room_allowed` is off.
    pub allowed_room_list: Vec<String>,
    /// Only accept notices naming exactly an inviter and an invitee.
    pub require_invite_pair: bool,
}

impl Default for WelcomeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 101,
            dify_api_key: empty_secret(),
            dify_base_url: String::new(),
            all_room_allowed: true,
            allowed_room_list: Vec::new(),
            require_invite_pair: false,
        }
    }
}

/// LLM replies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatReplyConfig {
    pub enabled: bool,
    pub priority: i64,
    pub openai_api_key: SecretString,
    pub openai_base_url: String,
    pub openai_model: String,
    /// System prompt with `{{placeholder}}` variables.
    pub prompt: String,
}

impl Default for ChatReplyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 100,
            openai_api_key: SecretString::from("unknown".to_string()),
            openai_base_url: "https://api.openai.com/v1".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            prompt: DEFAULT_REPLY_PROMPT.to_string(),
        }
    }
}

/// Image and video download handlers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaHandlerConfig {
    pub enabled: bool,
    pub priority: i64,
}

impl Default for MediaHandlerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            priority: 100,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub bot: BotProfile,
    /// Upper bound for every external call a handler makes.
    pub call_timeout_secs: u64,
    /// History store handle for events that carry none.
    pub history_db: Option<String>,
    pub history_context: HistoryContextConfig,
    pub bot_check: BotCheckConfig,
    pub pat: PatConfig,
    pub welcome: WelcomeConfig,
    pub chat_reply: ChatReplyConfig,
    pub image: MediaHandlerConfig,
    pub video: MediaHandlerConfig,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            bot: BotProfile::default(),
            call_timeout_secs: 30,
            history_db: None,
            history_context: HistoryContextConfig::default(),
            bot_check: BotCheckConfig::default(),
            pat: PatConfig::default(),
            welcome: WelcomeConfig::default(),
            chat_reply: ChatReplyConfig::default(),
            image: MediaHandlerConfig::default(),
            video: MediaHandlerConfig::default(),
        }
    }
}

impl TriageConfig {
    /// Parse a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load from `BOT_TRIAGE_CONFIG` (if set), apply env overrides, validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("BOT_TRIAGE_CONFIG") {
            Ok(path) => Self::load(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(account) = lookup("BOT_TRIAGE_ACCOUNT") {
            self.bot.account = account;
        }
        if let Some(nickname) = lookup("BOT_TRIAGE_NICKNAME") {
            self.bot.nickname = nickname;
        }
        if let Some(key) = lookup("DIFY_API_KEY") {
            self.bot_check.dify_api_key = SecretString::from(key.clone());
            self.welcome.dify_api_key = SecretString::from(key);
        }
        if let Some(url) = lookup("DIFY_BASE_URL") {
            self.bot_check.dify_base_url = url.clone();
            self.welcome.dify_base_url = url;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.chat_reply.openai_api_key = SecretString::from(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            self.chat_reply.openai_base_url = url;
        }
        if let Some(model) = lookup("OPENAI_MODEL") {
            self.chat_reply.openai_model = model;
        }
        if let Some(db) = lookup("BOT_TRIAGE_HISTORY_DB") {
            self.history_db = Some(db);
        }
        if let Some(secs) = lookup("BOT_TRIAGE_CALL_TIMEOUT_SECS") {
            self.call_timeout_secs = secs.parse().map_err(|_| ConfigError::InvalidValue {
                key: "BOT_TRIAGE_CALL_TIMEOUT_SECS".into(),
                message: format!("not a number of seconds: {secs}"),
            })?;
        }
        Ok(())
    }

    /// Reject enabled handlers that are missing what they need.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "call_timeout_secs".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.bot_check.enabled && self.bot_check.dify_base_url.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "bot_check.dify_base_url".into(),
                hint: "Set it in the config file or export DIFY_BASE_URL".into(),
            });
        }
        if self.welcome.enabled && self.welcome.dify_base_url.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "welcome.dify_base_url".into(),
                hint: "Set it in the config file or export DIFY_BASE_URL".into(),
            });
        }
        if self.chat_reply.enabled && self.chat_reply.openai_api_key.expose_secret().is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "chat_reply.openai_api_key".into(),
                hint: "export OPENAI_API_KEY=sk-...".into(),
            });
        }
        if self.pat.enabled && self.bot.account.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "bot.account".into(),
                hint: "The pat handler needs the bot's own account; export BOT_TRIAGE_ACCOUNT".into(),
            });
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}
