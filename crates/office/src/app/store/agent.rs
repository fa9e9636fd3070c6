use std::fmt;

use chrono::{DateTime, Utc};
use engine::{Color, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_TITLE: &str = "Agent";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub(crate) struct AgentId(String);

impl AgentId {
    pub(crate) fn generate() -> Self {
        Self(format!("agent-{}", Uuid::now_v7()))
    }

    #[cfg(test)]
    pub(crate) fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Avatar {
    Adam,
    Ash,
    Lucy,
    Nancy,
}

impl Avatar {
    pub(crate) const ALL: [Avatar; 4] = [Avatar::Adam, Avatar::Ash, Avatar::Lucy, Avatar::Nancy];

    pub(crate) fn sprite_key(self) -> &'static str {
        match self {
            Avatar::Adam => "adam",
            Avatar::Ash => "ash",
            Avatar::Lucy => "lucy",
            Avatar::Nancy => "nancy",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Avatar::Adam => "Adam",
            Avatar::Ash => "Ash",
            Avatar::Lucy => "Lucy",
            Avatar::Nancy => "Nancy",
        }
    }

    /// Name-tag color.
    pub(crate) fn color(self) -> Color {
        match self {
            Avatar::Adam => Color::from_hex(0x4ade80),
            Avatar::Ash => Color::from_hex(0x60a5fa),
            Avatar::Lucy => Color::from_hex(0xc084fc),
            Avatar::Nancy => Color::from_hex(0xfacc15),
        }
    }

    pub(crate) fn idle_animation(self) -> String {
        format!("{}_idle_down", self.sprite_key())
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|avatar| avatar.sprite_key().eq_ignore_ascii_case(raw.trim()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AgentStatus {
    #[default]
    Idle,
    Thinking,
    Busy,
}

impl AgentStatus {
    pub(crate) fn label(self) -> &'static str {
        match self {
            AgentStatus::Idle => "Idle",
            AgentStatus::Thinking => "Thinking",
            AgentStatus::Busy => "Busy",
        }
    }

    pub(crate) fn color(self) -> Color {
        match self {
            AgentStatus::Idle => Color::from_hex(0x4ade80),
            AgentStatus::Thinking => Color::from_hex(0xfacc15),
            AgentStatus::Busy => Color::from_hex(0xf87171),
        }
    }

    pub(crate) fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idle" => Some(AgentStatus::Idle),
            "thinking" => Some(AgentStatus::Thinking),
            "busy" => Some(AgentStatus::Busy),
            _ => None,
        }
    }
}

/// Topic labels, trimmed, non-empty and unique. Order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub(crate) struct KnowledgeBase(Vec<String>);

impl KnowledgeBase {
    pub(crate) fn learn(&mut self, topic: &str) -> bool {
        let topic = topic.trim();
        if topic.is_empty() || self.contains(topic) {
            return false;
        }
        self.0.push(topic.to_string());
        true
    }

    pub(crate) fn forget(&mut self, topic: &str) -> bool {
        let topic = topic.trim();
        let before = self.0.len();
        self.0.retain(|existing| existing != topic);
        self.0.len() != before
    }

    pub(crate) fn contains(&self, topic: &str) -> bool {
        self.0.iter().any(|existing| existing == topic)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for KnowledgeBase {
    fn from(topics: Vec<String>) -> Self {
        let mut base = KnowledgeBase::default();
        for topic in &topics {
            base.learn(topic);
        }
        base
    }
}

impl From<KnowledgeBase> for Vec<String> {
    fn from(base: KnowledgeBase) -> Self {
        base.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum ChatRole {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// An agent waiting to be dropped on the map. It has no position by construction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingAgent {
    pub id: AgentId,
    pub name: String,
    pub title: String,
    pub avatar: Avatar,
    pub status: AgentStatus,
    pub knowledge_base: KnowledgeBase,
    pub conversation_history: Vec<ChatMessage>,
}

impl PendingAgent {
    pub(crate) fn place(self, position: Vec2) -> Agent {
        Agent {
            id: self.id,
            name: self.name,
            title: self.title,
            avatar: self.avatar,
            position,
            status: self.status,
            knowledge_base: self.knowledge_base,
            conversation_history: self.conversation_history,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Agent {
    pub id: AgentId,
    pub name: String,
    pub title: String,
    pub avatar: Avatar,
    pub position: Vec2,
    pub status: AgentStatus,
    #[serde(default)]
    pub knowledge_base: KnowledgeBase,
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum AgentDraftError {
    #[error("name is required")]
    EmptyName,
}

/// Raw fields from the creation surface.
#[derive(Debug, Clone)]
pub(crate) struct AgentDraft {
    pub name: String,
    pub title: String,
    pub avatar: Avatar,
}

impl AgentDraft {
    pub(crate) fn into_pending(self) -> Result<PendingAgent, AgentDraftError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AgentDraftError::EmptyName);
        }
        let title = match self.title.trim() {
            "" => DEFAULT_TITLE,
            title => title,
        };
        Ok(PendingAgent {
            id: AgentId::generate(),
            name: name.to_string(),
            title: title.to_string(),
            avatar: self.avatar,
            status: AgentStatus::Idle,
            knowledge_base: KnowledgeBase::default(),
            conversation_history: Vec::new(),
        })
    }
}

/// Partial update. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct AgentPatch {
    pub name: Option<String>,
    pub title: Option<String>,
    pub avatar: Option<Avatar>,
    pub status: Option<AgentStatus>,
    pub knowledge_base: Option<KnowledgeBase>,
    pub position: Option<Vec2>,
}

impl AgentPatch {
    pub(crate) fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub(crate) fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub(crate) fn avatar(avatar: Avatar) -> Self {
        Self {
            avatar: Some(avatar),
            ..Self::default()
        }
    }

    pub(crate) fn status(status: AgentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub(crate) fn knowledge_base(knowledge_base: KnowledgeBase) -> Self {
        Self {
            knowledge_base: Some(knowledge_base),
            ..Self::default()
        }
    }

    pub(crate) fn position(position: Vec2) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    /// Returns whether any field actually changed.
    pub(crate) fn apply_to(self, agent: &mut Agent) -> bool {
        let mut changed = false;
        if let Some(name) = self.name {
            changed |= agent.name != name;
            agent.name = name;
        }
        if let Some(title) = self.title {
            changed |= agent.title != title;
            agent.title = title;
        }
        if let Some(avatar) = self.avatar {
            changed |= agent.avatar != avatar;
            agent.avatar = avatar;
        }
        if let Some(status) = self.status {
            changed |= agent.status != status;
            agent.status = status;
        }
        if let Some(knowledge_base) = self.knowledge_base {
            changed |= agent.knowledge_base != knowledge_base;
            agent.knowledge_base = knowledge_base;
        }
        if let Some(position) = self.position {
            changed |= agent.position != position;
            agent.position = position;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_trims_and_defaults_title() {
        let pending = AgentDraft {
            name: "  Ada  ".to_string(),
            title: "   ".to_string(),
            avatar: Avatar::Lucy,
        }
        .into_pending()
        .expect("valid draft");

        assert_eq!(pending.name, "Ada");
        assert_eq!(pending.title, "Agent");
        assert_eq!(pending.status, AgentStatus::Idle);
        assert!(pending.id.as_str().starts_with("agent-"));
    }

    #[test]
    fn draft_rejects_blank_name() {
        let err = AgentDraft {
            name: " \t".to_string(),
            title: "Engineer".to_string(),
            avatar: Avatar::Adam,
        }
        .into_pending()
        .expect_err("blank name");
        assert_eq!(err, AgentDraftError::EmptyName);
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(AgentId::generate(), AgentId::generate());
    }

    #[test]
    fn knowledge_base_rejects_blank_and_duplicates() {
        let mut base = KnowledgeBase::default();
        assert!(base.learn(" rust "));
        assert!(!base.learn("rust"));
        assert!(!base.learn("   "));
        assert!(base.learn("tiled"));
        assert_eq!(base.iter().collect::<Vec<_>>(), vec!["rust", "tiled"]);

        assert!(base.forget("rust"));
        assert!(!base.forget("rust"));
        assert_eq!(base.len(), 1);
    }

    #[test]
    fn knowledge_base_deserialize_normalizes_topics() {
        let base: KnowledgeBase =
            serde_json::from_str(r#"["a", " a ", "", "b"]"#).expect("decode");
        assert_eq!(base.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn avatar_parse_is_case_insensitive_and_keyed() {
        assert_eq!(Avatar::parse("NANCY"), Some(Avatar::Nancy));
        assert_eq!(Avatar::parse("bob"), None);
        assert_eq!(Avatar::Ash.idle_animation(), "ash_idle_down");
        assert_eq!(Avatar::Lucy.color(), Color::from_hex(0xc084fc));
    }

    #[test]
    fn patch_reports_whether_anything_changed() {
        let mut agent = AgentDraft {
            name: "Ada".to_string(),
            title: String::new(),
            avatar: Avatar::Adam,
        }
        .into_pending()
        .expect("draft")
        .place(Vec2::new(100.0, 100.0));

        assert!(!AgentPatch::name("Ada").apply_to(&mut agent));
        assert!(AgentPatch::status(AgentStatus::Busy).apply_to(&mut agent));
        assert_eq!(agent.status, AgentStatus::Busy);
    }
}
