use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::write_text_atomic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::store::{Agent, AgentStore, StoreEvent};

pub(crate) const SAVE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct SessionSnapshot {
    pub save_version: u32,
    pub map_fingerprint: String,
    pub agents: Vec<Agent>,
}

impl SessionSnapshot {
    pub(crate) fn capture(store: &AgentStore, map_fingerprint: &str) -> Self {
        Self {
            save_version: SAVE_VERSION,
            map_fingerprint: map_fingerprint.to_string(),
            agents: store.agents().to_vec(),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("read session '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write session '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("encode session json: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("parse session json at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {path}: expected {expected}, got {actual}")]
    Validation {
        path: String,
        expected: String,
        actual: String,
    },
    #[error("session persistence is disabled")]
    Disabled,
}

/// Receives store changes. Implementations must not fail the caller.
pub(crate) trait PersistenceSink {
    fn on_events(&mut self, events: &[StoreEvent], store: &AgentStore);
    fn save_now(&mut self, store: &AgentStore) -> Result<PathBuf, SessionError>;
    fn load(&mut self) -> Result<Option<SessionSnapshot>, SessionError>;
}

/// Writes the whole session after every agent-changing event.
#[derive(Debug)]
pub(crate) struct SessionFileSink {
    path: PathBuf,
    map_fingerprint: String,
}

impl SessionFileSink {
    pub(crate) fn new(path: PathBuf, map_fingerprint: impl Into<String>) -> Self {
        Self {
            path,
            map_fingerprint: map_fingerprint.into(),
        }
    }
}

impl PersistenceSink for SessionFileSink {
    fn on_events(&mut self, events: &[StoreEvent], store: &AgentStore) {
        if !events.iter().any(StoreEvent::touches_agents) {
            return;
        }
        if let Err(error) = self.save_now(store) {
            warn!(error = %error, "session_autosave_failed");
        }
    }

    fn save_now(&mut self, store: &AgentStore) -> Result<PathBuf, SessionError> {
        let snapshot = SessionSnapshot::capture(store, &self.map_fingerprint);
        write_session(&self.path, &snapshot)?;
        Ok(self.path.clone())
    }

    fn load(&mut self) -> Result<Option<SessionSnapshot>, SessionError> {
        if !self.path.is_file() {
            return Ok(None);
        }
        let snapshot = read_session(&self.path)?;
        if snapshot.map_fingerprint != self.map_fingerprint {
            warn!(
                saved = %snapshot.map_fingerprint,
                current = %self.map_fingerprint,
                "session_map_fingerprint_mismatch"
            );
        }
        info!(path = %self.path.display(), agents = snapshot.agents.len(), "session_loaded");
        Ok(Some(snapshot))
    }
}

/// Sink used when persistence is turned off. Nothing is restored or written.
#[derive(Debug, Default)]
pub(crate) struct NullSink;

impl PersistenceSink for NullSink {
    fn on_events(&mut self, _events: &[StoreEvent], _store: &AgentStore) {}

    fn save_now(&mut self, _store: &AgentStore) -> Result<PathBuf, SessionError> {
        Err(SessionError::Disabled)
    }

    fn load(&mut self) -> Result<Option<SessionSnapshot>, SessionError> {
        Ok(None)
    }
}

pub(crate) fn write_session(path: &Path, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
    let json = serde_json::to_string_pretty(snapshot).map_err(SessionError::Encode)?;
    write_text_atomic(path, &json).map_err(|source| SessionError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn read_session(path: &Path) -> Result<SessionSnapshot, SessionError> {
    let raw = fs::read_to_string(path).map_err(|source| SessionError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot = parse_session_json(&raw)?;
    validate_session(&snapshot)?;
    Ok(snapshot)
}

pub(crate) fn parse_session_json(raw: &str) -> Result<SessionSnapshot, SessionError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize::<_, SessionSnapshot>(&mut deserializer).map_err(|error| {
        let path = error.path().to_string();
        SessionError::Parse {
            path,
            source: error.into_inner(),
        }
    })
}

fn validate_session(snapshot: &SessionSnapshot) -> Result<(), SessionError> {
    if snapshot.save_version != SAVE_VERSION {
        return Err(SessionError::Validation {
            path: "save_version".to_string(),
            expected: SAVE_VERSION.to_string(),
            actual: snapshot.save_version.to_string(),
        });
    }
    for (index, agent) in snapshot.agents.iter().enumerate() {
        if !agent.position.x.is_finite() || !agent.position.y.is_finite() {
            return Err(SessionError::Validation {
                path: format!("agents[{index}].position"),
                expected: "finite coordinates".to_string(),
                actual: format!("({}, {})", agent.position.x, agent.position.y),
            });
        }
        if agent.name.trim().is_empty() {
            return Err(SessionError::Validation {
                path: format!("agents[{index}].name"),
                expected: "non-empty name".to_string(),
                actual: format!("{:?}", agent.name),
            });
        }
        if snapshot.agents[..index]
            .iter()
            .any(|earlier| earlier.id == agent.id)
        {
            return Err(SessionError::Validation {
                path: format!("agents[{index}].id"),
                expected: "unique id".to_string(),
                actual: agent.id.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use engine::Vec2;
    use tempfile::TempDir;

    use super::*;
    use crate::app::store::{Action, AgentDraft, AgentPatch, AgentStatus, Avatar, ChatRole};

    fn store_with_agent() -> AgentStore {
        let mut store = AgentStore::default();
        let agent = AgentDraft {
            name: "Ada".to_string(),
            title: "Analyst".to_string(),
            avatar: Avatar::Nancy,
        }
        .into_pending()
        .expect("draft")
        .place(Vec2::new(320.0, 240.0));
        let id = agent.id.clone();
        store.dispatch(Action::AddAgent(agent));
        store.dispatch(Action::AddMessage {
            agent_id: id.clone(),
            role: ChatRole::User,
            content: "hello".to_string(),
        });
        store.dispatch(Action::UpdateAgent {
            id,
            patch: AgentPatch::status(AgentStatus::Busy),
        });
        store
    }

    #[test]
    fn save_then_read_preserves_agents() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("saves").join("session.json");
        let store = store_with_agent();
        let mut sink = SessionFileSink::new(path.clone(), "abc");

        sink.save_now(&store).expect("save");
        let loaded = sink.load().expect("load").expect("present");

        assert_eq!(loaded.save_version, SAVE_VERSION);
        assert_eq!(loaded.map_fingerprint, "abc");
        assert_eq!(loaded.agents, store.agents());
    }

    #[test]
    fn autosave_only_on_agent_events() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("session.json");
        let store = store_with_agent();
        let mut sink = SessionFileSink::new(path.clone(), "abc");

        sink.on_events(&[StoreEvent::CreationDialogChanged(true)], &store);
        assert!(!path.exists());

        let id = store.agents()[0].id.clone();
        sink.on_events(&[StoreEvent::AgentUpdated(id)], &store);
        assert!(path.is_file());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let temp = TempDir::new().expect("tempdir");
        let mut sink = SessionFileSink::new(temp.path().join("none.json"), "abc");
        assert!(sink.load().expect("load").is_none());
    }

    #[test]
    fn parse_error_reports_json_path() {
        let raw = r#"{"save_version":1,"map_fingerprint":"x","agents":[{"id":"agent-1","name":"A","title":"T","avatar":"robot","position":{"x":1.0,"y":2.0},"status":"idle"}]}"#;
        let error = parse_session_json(raw).expect_err("bad avatar");
        assert!(error.to_string().contains("agents[0].avatar"), "{error}");
    }

    #[test]
    fn wrong_version_is_rejected() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("session.json");
        let mut snapshot = SessionSnapshot::capture(&store_with_agent(), "abc");
        snapshot.save_version = SAVE_VERSION + 1;
        write_session(&path, &snapshot).expect("write");

        let error = read_session(&path).expect_err("version");
        assert!(matches!(error, SessionError::Validation { ref path, .. } if path == "save_version"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let store = store_with_agent();
        let mut snapshot = SessionSnapshot::capture(&store, "abc");
        snapshot.agents.push(snapshot.agents[0].clone());

        let error = validate_session(&snapshot).expect_err("dup");
        assert!(error.to_string().contains("agents[1].id"));
    }
}
