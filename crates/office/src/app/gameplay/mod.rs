mod chat;
mod items;
mod placement;
mod player;
mod sync;

use engine::{
    screen_to_world_px, Color, ConsoleLineResult, HudLine, InputAction, InputSnapshot, Scene,
    SceneCommand, SceneWorld, Vec2, Viewport,
};
use tracing::{info, warn};

use super::commands::{CommandRegistry, OfficeCommand};
use super::office_map::{ItemKind, OfficeMap};
use super::persistence::{PersistenceSink, SessionSnapshot};
use super::store::{
    Action, AgentDraft, AgentId, AgentPatch, AgentStore, ChatRole, StoreEvent,
};

use chat::{reply_text, ReplyScheduler};
use items::{ItemRuntime, OverlapBridge};
use placement::{PlacementContext, PlacementController, PlacementRules};
use player::Player;
use sync::AgentSpriteSync;

const CAMERA_ZOOM: f32 = 1.5;
const HUD_RECENT_MESSAGES: usize = 4;
const NOTICE_SECONDS: f64 = 4.0;
const TITLE_COLOR: Color = Color::from_hex(0x0d59f2);

#[derive(Debug, Clone)]
struct Notice {
    text: String,
    expires_at_seconds: f64,
}

/// The office floor: local player, map items, placed agents and the
/// placement preview, all driven from one [`AgentStore`].
pub(crate) struct OfficeScene {
    map: OfficeMap,
    store: AgentStore,
    commands: CommandRegistry,
    sink: Box<dyn PersistenceSink>,
    placement: PlacementController,
    sprites: AgentSpriteSync,
    player: Player,
    items: Vec<ItemRuntime>,
    overlap: OverlapBridge,
    replies: ReplyScheduler,
    clock_seconds: f64,
    notice: Option<Notice>,
}

impl OfficeScene {
    pub(crate) fn new(map: OfficeMap, sink: Box<dyn PersistenceSink>) -> Self {
        let items = map.items.iter().cloned().map(ItemRuntime::new).collect();
        Self {
            map,
            store: AgentStore::default(),
            commands: CommandRegistry::with_office_commands(),
            sink,
            placement: PlacementController::new(PlacementRules::default()),
            sprites: AgentSpriteSync::default(),
            player: Player::default(),
            items,
            overlap: OverlapBridge::default(),
            replies: ReplyScheduler::default(),
            clock_seconds: 0.0,
            notice: None,
        }
    }

    fn placement_context(&self) -> PlacementContext {
        PlacementContext {
            map_size: Vec2::new(self.map.width_px(), self.map.height_px()),
            player_position: Some(self.player.position),
        }
    }

    fn dispatch(&mut self, action: Action) -> Vec<StoreEvent> {
        let events = self.store.dispatch(action);
        self.publish(&events);
        events
    }

    /// Side effects of store changes: orphaned chat replies are dropped and
    /// the persistence sink hears about everything.
    fn publish(&mut self, events: &[StoreEvent]) {
        for event in events {
            if let StoreEvent::AgentRemoved(id) = event {
                let dropped = self.replies.cancel_for_agent(id);
                if dropped > 0 {
                    info!(agent_id = %id, dropped, "pending_replies_cancelled");
                }
            }
        }
        self.sink.on_events(events, &self.store);
    }

    fn notify(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!(notice = %text, "hud_notice");
        self.notice = Some(Notice {
            text,
            expires_at_seconds: self.clock_seconds + NOTICE_SECONDS,
        });
    }

    fn save_session(&mut self) -> Result<String, String> {
        match self.sink.save_now(&self.store) {
            Ok(path) => {
                info!(path = %path.display(), agents = self.store.agents().len(), "session_saved");
                Ok(format!("saved {} agent(s)", self.store.agents().len()))
            }
            Err(error) => {
                warn!(error = %error, "session_save_failed");
                Err(error.to_string())
            }
        }
    }

    fn load_session(&mut self) -> Result<String, String> {
        match self.sink.load() {
            Ok(Some(snapshot)) => {
                let count = snapshot.agents.len();
                self.apply_snapshot(snapshot);
                Ok(format!("loaded {count} agent(s)"))
            }
            Ok(None) => Ok("no session file yet".to_string()),
            Err(error) => {
                warn!(error = %error, "session_load_failed");
                Err(error.to_string())
            }
        }
    }

    /// Replaces every placed agent with the snapshot's. Not forwarded to the
    /// sink: the file already holds this state.
    fn apply_snapshot(&mut self, snapshot: SessionSnapshot) {
        let existing: Vec<AgentId> = self.store.agents().iter().map(|a| a.id.clone()).collect();
        for id in existing {
            self.store.dispatch(Action::RemoveAgent(id));
        }
        self.store.dispatch(Action::CancelPlacement);
        self.replies.clear();
        for agent in snapshot.agents {
            self.store.dispatch(Action::AddAgent(agent));
        }
    }

    fn update_item_overlap(&mut self) {
        let selector = self.player.selector_bounds();
        let overlapping: Vec<usize> = self
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.bounds().overlaps(&selector))
            .map(|(index, _)| index)
            .collect();
        self.overlap
            .update(&mut self.items, &overlapping, self.player.is_sitting());
    }

    fn interact(&mut self) {
        if self.player.is_sitting() {
            self.player.stand_up();
            info!("player_stood_up");
            return;
        }
        let Some(index) = self.overlap.current() else {
            return;
        };
        let item = &self.items[index].item;
        if let ItemKind::Chair { direction } = item.kind {
            let seat = item.bounds.center;
            self.player.sit(index, seat, direction);
            info!(chair = item.index, "player_sat_down");
        }
    }

    fn use_item(&mut self) {
        let message = self
            .overlap
            .current()
            .and_then(|index| self.items[index].use_message());
        if let Some(message) = message {
            self.notify(message);
        }
    }

    fn deliver_due_replies(&mut self) {
        for reply in self.replies.drain_due(self.clock_seconds) {
            self.dispatch(Action::AddMessage {
                agent_id: reply.agent_id,
                role: ChatRole::Agent,
                content: reply.content,
            });
        }
    }

    fn run_command(&mut self, command: OfficeCommand) -> ConsoleLineResult {
        match command {
            OfficeCommand::Help => ConsoleLineResult::Success(self.commands.help_lines()),
            OfficeCommand::Clear => ConsoleLineResult::ClearOutput,
            OfficeCommand::ListAgents => {
                if self.store.agents().is_empty() {
                    return ConsoleLineResult::Success(vec!["no agents placed".to_string()]);
                }
                let lines = self
                    .store
                    .agents()
                    .iter()
                    .map(|agent| {
                        format!(
                            "{} {} ({}) {} at ({:.0}, {:.0})",
                            agent.id,
                            agent.name,
                            agent.title,
                            agent.status.label(),
                            agent.position.x,
                            agent.position.y
                        )
                    })
                    .collect();
                ConsoleLineResult::Success(lines)
            }
            OfficeCommand::New {
                name,
                title,
                avatar,
            } => {
                self.dispatch(Action::OpenCreationDialog);
                let pending = match (AgentDraft {
                    name,
                    title,
                    avatar,
                })
                .into_pending()
                {
                    Ok(pending) => pending,
                    Err(error) => {
                        self.dispatch(Action::CloseCreationDialog);
                        return ConsoleLineResult::Error(error.to_string());
                    }
                };
                let line = format!(
                    "placing {} ({}): click a free spot, Esc to cancel",
                    pending.name, pending.title
                );
                info!(agent_id = %pending.id, name = %pending.name, "placement_started");
                self.dispatch(Action::StartPlacement(pending));
                ConsoleLineResult::Success(vec![line])
            }
            OfficeCommand::Cancel => {
                if !self.store.placement().is_active() {
                    return ConsoleLineResult::Success(vec!["nothing to cancel".to_string()]);
                }
                self.dispatch(Action::CancelPlacement);
                ConsoleLineResult::Success(vec!["placement cancelled".to_string()])
            }
            OfficeCommand::Select { target } => {
                let Some(id) = self.store.find_agent(&target).map(|agent| agent.id.clone()) else {
                    return ConsoleLineResult::Error(format!("no agent matches '{target}'"));
                };
                self.dispatch(Action::SelectAgent(id.clone()));
                ConsoleLineResult::Success(vec![format!("selected {id}")])
            }
            OfficeCommand::Deselect => {
                self.dispatch(Action::DeselectAgent);
                ConsoleLineResult::Success(Vec::new())
            }
            OfficeCommand::TogglePanel => {
                self.dispatch(Action::ToggleDetailPanel);
                let state = if self.store.is_detail_panel_open() {
                    "open"
                } else {
                    "closed"
                };
                ConsoleLineResult::Success(vec![format!("detail panel {state}")])
            }
            OfficeCommand::Rename { name } => self.update_selected(AgentPatch::name(name)),
            OfficeCommand::Retitle { title } => self.update_selected(AgentPatch::title(title)),
            OfficeCommand::SetAvatar { avatar } => self.update_selected(AgentPatch::avatar(avatar)),
            OfficeCommand::SetStatus { status } => self.update_selected(AgentPatch::status(status)),
            OfficeCommand::Learn { topic } => self.edit_knowledge(&topic, true),
            OfficeCommand::Forget { topic } => self.edit_knowledge(&topic, false),
            OfficeCommand::Say { text } => {
                let Some(agent) = self.store.selected_agent() else {
                    return ConsoleLineResult::Error("no agent selected".to_string());
                };
                let id = agent.id.clone();
                let reply = reply_text(&agent.name, &agent.title, &text);
                self.dispatch(Action::AddMessage {
                    agent_id: id.clone(),
                    role: ChatRole::User,
                    content: text,
                });
                self.replies.schedule(id, reply, self.clock_seconds);
                ConsoleLineResult::Success(Vec::new())
            }
            OfficeCommand::Move { x, y } => self.move_selected(Vec2::new(x, y)),
            OfficeCommand::Remove { target } => {
                let agent = match target.as_deref() {
                    Some(target) => self.store.find_agent(target),
                    None => self.store.selected_agent(),
                };
                let Some((id, name)) = agent.map(|agent| (agent.id.clone(), agent.name.clone()))
                else {
                    return ConsoleLineResult::Error("no matching agent".to_string());
                };
                self.dispatch(Action::RemoveAgent(id.clone()));
                info!(agent_id = %id, "agent_removed");
                ConsoleLineResult::Success(vec![format!("removed {name}")])
            }
            OfficeCommand::Save => match self.save_session() {
                Ok(line) => ConsoleLineResult::Success(vec![line]),
                Err(error) => ConsoleLineResult::Error(error),
            },
            OfficeCommand::Load => match self.load_session() {
                Ok(line) => ConsoleLineResult::Success(vec![line]),
                Err(error) => ConsoleLineResult::Error(error),
            },
        }
    }

    fn update_selected(&mut self, patch: AgentPatch) -> ConsoleLineResult {
        let Some(id) = self.store.selected_agent().map(|agent| agent.id.clone()) else {
            return ConsoleLineResult::Error("no agent selected".to_string());
        };
        let events = self.dispatch(Action::UpdateAgent { id, patch });
        let line = if events.is_empty() { "unchanged" } else { "updated" };
        ConsoleLineResult::Success(vec![line.to_string()])
    }

    /// Same spacing rules as placement, ignoring the agent being moved.
    fn move_selected(&mut self, target: Vec2) -> ConsoleLineResult {
        let Some(id) = self.store.selected_agent().map(|agent| agent.id.clone()) else {
            return ConsoleLineResult::Error("no agent selected".to_string());
        };
        let others: Vec<_> = self
            .store
            .agents()
            .iter()
            .filter(|agent| agent.id != id)
            .cloned()
            .collect();
        let context = self.placement_context();
        if !self.placement.rules().is_valid(
            target,
            context.map_size,
            &others,
            context.player_position,
        ) {
            return ConsoleLineResult::Error(format!(
                "({:.0}, {:.0}) is off the floor or too close to someone",
                target.x, target.y
            ));
        }
        self.update_selected(AgentPatch::position(target))
    }

    fn edit_knowledge(&mut self, topic: &str, learn: bool) -> ConsoleLineResult {
        let Some(agent) = self.store.selected_agent() else {
            return ConsoleLineResult::Error("no agent selected".to_string());
        };
        let id = agent.id.clone();
        let mut knowledge = agent.knowledge_base.clone();
        let changed = if learn {
            knowledge.learn(topic)
        } else {
            knowledge.forget(topic)
        };
        if !changed {
            let reason = if learn {
                format!("'{}' is blank or already known", topic.trim())
            } else {
                format!("'{}' is not a known topic", topic.trim())
            };
            return ConsoleLineResult::Error(reason);
        }
        self.dispatch(Action::UpdateAgent {
            id,
            patch: AgentPatch::knowledge_base(knowledge),
        });
        ConsoleLineResult::Success(Vec::new())
    }

    fn selected_agent_lines(&self) -> Vec<HudLine> {
        if !self.store.is_detail_panel_open() {
            return Vec::new();
        }
        let Some(agent) = self.store.selected_agent() else {
            return Vec::new();
        };
        let mut lines = vec![
            HudLine::blank(),
            HudLine::colored(agent.name.clone(), agent.avatar.color()),
            HudLine::dim(format!("{} / {}", agent.title, agent.avatar.label())),
            HudLine::colored(
                format!("status: {}", agent.status.label()),
                agent.status.color(),
            ),
        ];
        let topics = if agent.knowledge_base.is_empty() {
            "none".to_string()
        } else {
            agent.knowledge_base.iter().collect::<Vec<_>>().join(", ")
        };
        lines.push(HudLine::dim(format!(
            "knowledge ({}): {topics}",
            agent.knowledge_base.len()
        )));

        let history = &agent.conversation_history;
        for message in &history[history.len().saturating_sub(HUD_RECENT_MESSAGES)..] {
            let speaker = match message.role {
                ChatRole::User => "you",
                ChatRole::Agent => agent.name.as_str(),
            };
            lines.push(HudLine::primary(format!("{speaker}: {}", message.content)));
        }
        lines
    }
}

impl Scene for OfficeScene {
    fn load(&mut self, world: &mut SceneWorld) {
        world.clear();
        world.set_tilemap(self.map.ground.clone());
        world.camera_mut().zoom = CAMERA_ZOOM;

        self.player.spawn(world);
        for item in &self.items {
            item.spawn(world);
        }

        match self.sink.load() {
            Ok(Some(snapshot)) => self.apply_snapshot(snapshot),
            Ok(None) => {}
            Err(error) => warn!(error = %error, "session_restore_failed"),
        }
        self.sprites.sync(&self.store, world);
        world.camera_mut().follow(self.player.position);
        world.apply_pending();

        info!(
            agents = self.store.agents().len(),
            items = self.items.len(),
            nodes = world.node_count(),
            map = %self.map.fingerprint,
            "scene_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand {
        self.clock_seconds += f64::from(fixed_dt_seconds);

        if input.just_pressed(InputAction::Save) {
            match self.save_session() {
                Ok(line) => self.notify(line),
                Err(error) => self.notify(format!("save failed: {error}")),
            }
        }
        if input.just_pressed(InputAction::Load) {
            match self.load_session() {
                Ok(line) => self.notify(line),
                Err(error) => self.notify(format!("load failed: {error}")),
            }
        }

        self.player.step(input, fixed_dt_seconds, &self.map);
        self.update_item_overlap();
        if input.just_pressed(InputAction::Interact) {
            self.interact();
        }
        if input.just_pressed(InputAction::Use) {
            self.use_item();
        }

        if input.just_pressed(InputAction::Cancel) {
            let events = self.placement.handle_cancel(&mut self.store, world);
            self.publish(&events);
        }

        let viewport = Viewport::from_window_size(input.window_size());
        let cursor_world = input
            .cursor_position_px()
            .map(|px| screen_to_world_px(px, world.camera(), viewport));
        if let Some(point) = cursor_world {
            let context = self.placement_context();
            if input.pointer_moved() {
                self.placement
                    .handle_pointer_move(point, &self.store, context, world);
                self.sprites.update_hover(point, world);
            }
            if input.left_click_pressed() {
                let clicked = world
                    .pick_topmost_interactive_at(point)
                    .and_then(|node| self.sprites.agent_for_node(node))
                    .cloned();
                if let Some(id) = clicked {
                    self.dispatch(Action::SelectAgent(id));
                }
                let events =
                    self.placement
                        .handle_primary_click(point, &mut self.store, context, world);
                self.publish(&events);
            }
        }

        self.deliver_due_replies();
        if self
            .notice
            .as_ref()
            .is_some_and(|notice| notice.expires_at_seconds <= self.clock_seconds)
        {
            self.notice = None;
        }

        self.placement.sync_with_store(&self.store, world);
        self.sprites.sync(&self.store, world);
        self.player.sync_node(world);
        world.camera_mut().follow(self.player.position);

        SceneCommand::None
    }

    fn unload(&mut self, world: &mut SceneWorld) {
        self.sprites.clear(world);
        self.replies.clear();
        info!(agents = self.store.agents().len(), "scene_unloaded");
    }

    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        Some(format!(
            "Pixel Office | agents {} | rev {}",
            self.store.agents().len(),
            self.store.revision()
        ))
    }

    fn hud_lines(&self, _world: &SceneWorld) -> Vec<HudLine> {
        let mut lines = vec![HudLine::colored("Pixel Office", TITLE_COLOR)];

        if let Some(pending) = self.store.placement().agent_data() {
            let state = match self.placement.preview_is_valid() {
                Some(true) => "spot ok",
                Some(false) => "too close",
                None => "move the pointer",
            };
            lines.push(HudLine::primary(format!(
                "placing {}: click to drop, Esc to cancel ({state})",
                pending.name
            )));
        } else if self.store.is_creation_dialog_open() {
            lines.push(HudLine::dim("new agent: new <name> [title] [avatar]"));
        }

        if let Some(dialog) = self.overlap.current().and_then(|i| self.items[i].dialog()) {
            lines.push(HudLine::primary(dialog));
        }
        if let Some(notice) = &self.notice {
            lines.push(HudLine::dim(notice.text.clone()));
        }

        lines.extend(self.selected_agent_lines());
        lines
    }

    fn execute_console_line(&mut self, line: &str, _world: &mut SceneWorld) -> ConsoleLineResult {
        match self.commands.parse_line(line) {
            Ok(Some(command)) => self.run_command(command),
            Ok(None) => ConsoleLineResult::Success(Vec::new()),
            Err(message) => ConsoleLineResult::Error(message),
        }
    }
}
