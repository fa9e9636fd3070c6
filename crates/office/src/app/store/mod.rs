mod agent;

use chrono::Utc;
use engine::Vec2;
use tracing::debug;

pub(crate) use agent::{
    Agent, AgentDraft, AgentId, AgentPatch, AgentStatus, Avatar, ChatMessage, ChatRole,
    PendingAgent,
};
#[cfg(test)]
pub(crate) use agent::KnowledgeBase;

/// Either nothing is being placed, or exactly one pending agent is.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) enum PlacementMode {
    #[default]
    Inactive,
    Armed(PendingAgent),
}

impl PlacementMode {
    pub(crate) fn is_active(&self) -> bool {
        matches!(self, PlacementMode::Armed(_))
    }

    pub(crate) fn agent_data(&self) -> Option<&PendingAgent> {
        match self {
            PlacementMode::Inactive => None,
            PlacementMode::Armed(pending) => Some(pending),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Action {
    StartPlacement(PendingAgent),
    CancelPlacement,
    FinishPlacement(Vec2),
    AddAgent(Agent),
    RemoveAgent(AgentId),
    SelectAgent(AgentId),
    DeselectAgent,
    ToggleDetailPanel,
    UpdateAgent {
        id: AgentId,
        patch: AgentPatch,
    },
    AddMessage {
        agent_id: AgentId,
        role: ChatRole,
        content: String,
    },
    OpenCreationDialog,
    CloseCreationDialog,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoreEvent {
    PlacementStarted(AgentId),
    PlacementCancelled,
    AgentPlaced(AgentId),
    AgentAdded(AgentId),
    AgentUpdated(AgentId),
    AgentRemoved(AgentId),
    MessageAppended { agent_id: AgentId, role: ChatRole },
    SelectionChanged(Option<AgentId>),
    DetailPanelChanged(bool),
    CreationDialogChanged(bool),
}

impl StoreEvent {
    /// Events that change what a saved session would contain.
    pub(crate) fn touches_agents(&self) -> bool {
        matches!(
            self,
            StoreEvent::AgentPlaced(_)
                | StoreEvent::AgentAdded(_)
                | StoreEvent::AgentUpdated(_)
                | StoreEvent::AgentRemoved(_)
                | StoreEvent::MessageAppended { .. }
        )
    }
}

/// Single owner of agent records. All mutation goes through [`AgentStore::dispatch`].
#[derive(Debug, Default)]
pub(crate) struct AgentStore {
    agents: Vec<Agent>,
    selected_agent_id: Option<AgentId>,
    detail_panel_open: bool,
    placement: PlacementMode,
    creation_dialog_open: bool,
    revision: u64,
}

impl AgentStore {
    pub(crate) fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub(crate) fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.agents.iter().find(|agent| &agent.id == id)
    }

    /// Exact id first, then a case-insensitive name match.
    pub(crate) fn find_agent(&self, id_or_name: &str) -> Option<&Agent> {
        let needle = id_or_name.trim();
        self.agents
            .iter()
            .find(|agent| agent.id.as_str() == needle)
            .or_else(|| {
                self.agents
                    .iter()
                    .find(|agent| agent.name.eq_ignore_ascii_case(needle))
            })
    }

    pub(crate) fn selected_agent_id(&self) -> Option<&AgentId> {
        self.selected_agent_id.as_ref()
    }

    /// `None` for a selection that no longer resolves.
    pub(crate) fn selected_agent(&self) -> Option<&Agent> {
        self.selected_agent_id
            .as_ref()
            .and_then(|id| self.agent(id))
    }

    pub(crate) fn is_detail_panel_open(&self) -> bool {
        self.detail_panel_open
    }

    pub(crate) fn placement(&self) -> &PlacementMode {
        &self.placement
    }

    pub(crate) fn is_creation_dialog_open(&self) -> bool {
        self.creation_dialog_open
    }

    pub(crate) fn revision(&self) -> u64 {
        self.revision
    }

    pub(crate) fn dispatch(&mut self, action: Action) -> Vec<StoreEvent> {
        let mut events = Vec::new();
        match action {
            Action::StartPlacement(pending) => {
                events.push(StoreEvent::PlacementStarted(pending.id.clone()));
                self.placement = PlacementMode::Armed(pending);
                self.set_creation_dialog(false, &mut events);
            }
            Action::CancelPlacement => {
                if self.placement.is_active() {
                    self.placement = PlacementMode::Inactive;
                    events.push(StoreEvent::PlacementCancelled);
                }
            }
            Action::FinishPlacement(position) => {
                if let PlacementMode::Armed(pending) = std::mem::take(&mut self.placement) {
                    let agent = pending.place(position);
                    let id = agent.id.clone();
                    self.agents.push(agent);
                    events.push(StoreEvent::AgentPlaced(id.clone()));
                    self.select(id, &mut events);
                }
            }
            Action::AddAgent(agent) => {
                if self.agent(&agent.id).is_some() {
                    debug!(agent_id = %agent.id, "add_agent_duplicate_ignored");
                } else {
                    events.push(StoreEvent::AgentAdded(agent.id.clone()));
                    self.agents.push(agent);
                }
            }
            Action::RemoveAgent(id) => {
                let before = self.agents.len();
                self.agents.retain(|agent| agent.id != id);
                if self.agents.len() != before {
                    events.push(StoreEvent::AgentRemoved(id.clone()));
                }
                if self.selected_agent_id.as_ref() == Some(&id) {
                    self.deselect(&mut events);
                }
            }
            Action::SelectAgent(id) => self.select(id, &mut events),
            Action::DeselectAgent => self.deselect(&mut events),
            Action::ToggleDetailPanel => {
                if self.detail_panel_open {
                    self.deselect(&mut events);
                } else {
                    self.detail_panel_open = true;
                    events.push(StoreEvent::DetailPanelChanged(true));
                }
            }
            Action::UpdateAgent { id, patch } => {
                if let Some(agent) = self.agents.iter_mut().find(|agent| agent.id == id) {
                    if patch.apply_to(agent) {
                        events.push(StoreEvent::AgentUpdated(id));
                    }
                }
            }
            Action::AddMessage {
                agent_id,
                role,
                content,
            } => {
                if let Some(agent) = self.agents.iter_mut().find(|agent| agent.id == agent_id) {
                    agent.conversation_history.push(ChatMessage {
                        role,
                        content,
                        timestamp: Utc::now(),
                    });
                    events.push(StoreEvent::MessageAppended { agent_id, role });
                }
            }
            Action::OpenCreationDialog => self.set_creation_dialog(true, &mut events),
            Action::CloseCreationDialog => self.set_creation_dialog(false, &mut events),
        }

        if !events.is_empty() {
            self.revision = self.revision.saturating_add(1);
        }
        events
    }

    fn select(&mut self, id: AgentId, events: &mut Vec<StoreEvent>) {
        if self.selected_agent_id.as_ref() != Some(&id) {
            events.push(StoreEvent::SelectionChanged(Some(id.clone())));
            self.selected_agent_id = Some(id);
        }
        if !self.detail_panel_open {
            self.detail_panel_open = true;
            events.push(StoreEvent::DetailPanelChanged(true));
        }
    }

    fn deselect(&mut self, events: &mut Vec<StoreEvent>) {
        if self.selected_agent_id.take().is_some() {
            events.push(StoreEvent::SelectionChanged(None));
        }
        if self.detail_panel_open {
            self.detail_panel_open = false;
            events.push(StoreEvent::DetailPanelChanged(false));
        }
    }

    fn set_creation_dialog(&mut self, open: bool, events: &mut Vec<StoreEvent>) {
        if self.creation_dialog_open != open {
            self.creation_dialog_open = open;
            events.push(StoreEvent::CreationDialogChanged(open));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(name: &str) -> PendingAgent {
        AgentDraft {
            name: name.to_string(),
            title: "Researcher".to_string(),
            avatar: Avatar::Ash,
        }
        .into_pending()
        .expect("draft")
    }

    fn store_with_agent(name: &str, position: Vec2) -> (AgentStore, AgentId) {
        let mut store = AgentStore::default();
        let agent = pending(name).place(position);
        let id = agent.id.clone();
        store.dispatch(Action::AddAgent(agent));
        (store, id)
    }

    #[test]
    fn start_placement_arms_and_closes_dialog() {
        let mut store = AgentStore::default();
        store.dispatch(Action::OpenCreationDialog);
        let armed = pending("Ada");

        let events = store.dispatch(Action::StartPlacement(armed.clone()));

        assert!(store.placement().is_active());
        assert_eq!(store.placement().agent_data(), Some(&armed));
        assert!(!store.is_creation_dialog_open());
        assert!(events.contains(&StoreEvent::CreationDialogChanged(false)));
    }

    #[test]
    fn finish_placement_appends_selects_and_disarms() {
        let mut store = AgentStore::default();
        let armed = pending("Ada");
        let id = armed.id.clone();
        store.dispatch(Action::StartPlacement(armed));

        store.dispatch(Action::FinishPlacement(Vec2::new(200.0, 300.0)));

        assert_eq!(store.agents().len(), 1);
        assert_eq!(store.agents()[0].position, Vec2::new(200.0, 300.0));
        assert_eq!(store.selected_agent_id(), Some(&id));
        assert!(store.is_detail_panel_open());
        assert_eq!(store.placement(), &PlacementMode::Inactive);
    }

    #[test]
    fn finish_placement_while_inactive_changes_nothing() {
        let mut store = AgentStore::default();
        let revision = store.revision();

        let events = store.dispatch(Action::FinishPlacement(Vec2::new(1.0, 1.0)));

        assert!(events.is_empty());
        assert!(store.agents().is_empty());
        assert_eq!(store.revision(), revision);
    }

    #[test]
    fn removing_selected_agent_clears_selection_and_panel() {
        let (mut store, id) = store_with_agent("Ada", Vec2::new(100.0, 100.0));
        store.dispatch(Action::SelectAgent(id.clone()));

        let events = store.dispatch(Action::RemoveAgent(id.clone()));

        assert!(store.agents().is_empty());
        assert!(store.selected_agent_id().is_none());
        assert!(!store.is_detail_panel_open());
        assert!(events.contains(&StoreEvent::AgentRemoved(id)));
    }

    #[test]
    fn closing_detail_panel_clears_selection() {
        let (mut store, id) = store_with_agent("Ada", Vec2::new(100.0, 100.0));
        store.dispatch(Action::SelectAgent(id));

        store.dispatch(Action::ToggleDetailPanel);
        assert!(!store.is_detail_panel_open());
        assert!(store.selected_agent_id().is_none());

        store.dispatch(Action::ToggleDetailPanel);
        assert!(store.is_detail_panel_open());
        assert!(store.selected_agent().is_none());
    }

    #[test]
    fn stale_selection_resolves_to_nothing() {
        let mut store = AgentStore::default();
        store.dispatch(Action::SelectAgent(AgentId::from_raw("agent-gone")));

        assert!(store.selected_agent_id().is_some());
        assert!(store.selected_agent().is_none());
    }

    #[test]
    fn update_and_message_on_unknown_id_are_no_ops() {
        let (mut store, _) = store_with_agent("Ada", Vec2::new(100.0, 100.0));
        let revision = store.revision();
        let ghost = AgentId::from_raw("agent-ghost");

        assert!(store
            .dispatch(Action::UpdateAgent {
                id: ghost.clone(),
                patch: AgentPatch::name("Nope"),
            })
            .is_empty());
        assert!(store
            .dispatch(Action::AddMessage {
                agent_id: ghost,
                role: ChatRole::Agent,
                content: "hello".to_string(),
            })
            .is_empty());
        assert_eq!(store.revision(), revision);
        assert_eq!(store.agents()[0].name, "Ada");
    }

    #[test]
    fn add_message_appends_in_order() {
        let (mut store, id) = store_with_agent("Ada", Vec2::new(100.0, 100.0));
        for (role, content) in [(ChatRole::User, "hi"), (ChatRole::Agent, "hello")] {
            store.dispatch(Action::AddMessage {
                agent_id: id.clone(),
                role,
                content: content.to_string(),
            });
        }

        let history = &store.agent(&id).expect("agent").conversation_history;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].content, "hello");
        assert!(history[0].timestamp <= history[1].timestamp);
    }

    #[test]
    fn duplicate_add_is_ignored() {
        let (mut store, id) = store_with_agent("Ada", Vec2::new(100.0, 100.0));
        let copy = store.agent(&id).cloned().expect("agent");

        assert!(store.dispatch(Action::AddAgent(copy)).is_empty());
        assert_eq!(store.agents().len(), 1);
    }

    #[test]
    fn find_agent_by_id_or_name() {
        let (store, id) = store_with_agent("Ada Lovelace", Vec2::new(100.0, 100.0));
        assert_eq!(store.find_agent(id.as_str()).map(|a| &a.id), Some(&id));
        assert_eq!(store.find_agent("ada lovelace").map(|a| &a.id), Some(&id));
        assert!(store.find_agent("Grace").is_none());
    }
}
