//! Classification of conversation events into structured facts.
//!
//! Two independent pieces live here:
//! - the relevance verdict (`RelevanceOutcome`), which turns a workflow
//!   answer or failure into a fail-closed decision;
//! - join/invite notice parsing, a pure two-stage parser. The first stage picks
//!   the notice encoding (structured JSON record or free text) and yields its
//!   plain text; the second stage scans that text for the quoted username.

use std::fmt::Display;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::pipeline::types::Participant;

/// `@type` of the structured system record that carries join/leave notices.
pub const MEMBER_RECORD_MARKER: &str = "delchatroommember";

/// Marks an invitation ("X invited Y").
pub const INVITE_MARKER: &str = "邀请";

/// Marks a completed join.
pub const JOIN_MARKER: &str = "加入了群聊";

static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]*)""#).unwrap());

// ── Relevance ───────────────────────────────────────────────────────

/// Outcome of asking whether a message is addressed to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelevanceOutcome {
    ForBot,
    NotForBot,
    /// The check itself failed (transport, status, malformed answer, timeout).
    CheckFailed,
}

impl RelevanceOutcome {
    /// Map a verdict or its failure to an outcome.
    pub fn from_verdict<E: Display>(verdict: Result<bool, E>) -> Self {
        match verdict {
            Ok(true) => Self::ForBot,
            Ok(false) => Self::NotForBot,
            Err(_) => Self::CheckFailed,
        }
    }

    /// Fail-closed policy: only a positive verdict counts as addressed to the bot.
    pub fn is_for_bot(self) -> bool {
        matches!(self, Self::ForBot)
    }
}

// ── Room gate ───────────────────────────────────────────────────────

/// Which group chats join/invite notices are processed for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomGate {
    /// Process notices from every group.
    pub all_room_allowed: bool,
    /// Otherwise only these rooms, matched by id or display name.
    pub allowed_room_list: Vec<String>,
}

impl RoomGate {
    pub fn allows(&self, room: &Participant) -> bool {
        if self.all_room_allowed {
            return true;
        }
        self.allowed_room_list
            .iter()
            .any(|allowed| *allowed == room.username || *allowed == room.display_name)
    }
}

// ── Join/invite notices ─────────────────────────────────────────────

/// How a system notice is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeEncoding {
    /// JSON with a `sysmsg` member record.
    Structured,
    FreeText,
}

impl NoticeEncoding {
    /// Check raw content for the structured-record marker.
    pub fn detect(raw: &str) -> Self {
        if raw.contains(MEMBER_RECORD_MARKER) {
            Self::Structured
        } else {
            Self::FreeText
        }
    }
}

/// Stage one: the plain notice text, or `None` when this is not a join/invite notice.
pub fn notice_plain_text(raw: &str) -> Option<String> {
    match NoticeEncoding::detect(raw) {
        NoticeEncoding::Structured => structured_plain_text(raw),
        NoticeEncoding::FreeText => {
            (raw.contains(INVITE_MARKER) && raw.contains(JOIN_MARKER)).then(|| raw.to_string())
        }
    }
}

fn structured_plain_text(raw: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let sysmsg = value.get("sysmsg")?;
    if sysmsg.get("@type")?.as_str()? != MEMBER_RECORD_MARKER {
        return None;
    }
    sysmsg
        .get(MEMBER_RECORD_MARKER)?
        .get("plain")?
        .as_str()
        .map(str::to_string)
}

/// Stage two: pull the joining user's name out of notice text.
///
/// Every `"..."` substring is collected left to right. With an invitation
/// marker and at least two names the last one (the invitee) wins, otherwise
/// the first. `require_pair` demands exactly two quoted names. Blank names
/// count as no match.
pub fn extract_username(text: &str, require_pair: bool) -> Option<String> {
    let names: Vec<&str> = QUOTED
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    if require_pair && names.len() != 2 {
        return None;
    }

    let chosen = if text.contains(INVITE_MARKER) && names.len() >= 2 {
        names.last()
    } else {
        names.first()
    }?;

    let name = chosen.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Both stages: raw system-notice content to the joining user's name.
pub fn extract_joined_username(raw: &str, require_pair: bool) -> Option<String> {
    let plain = notice_plain_text(raw)?;
    extract_username(&plain, require_pair)
}
