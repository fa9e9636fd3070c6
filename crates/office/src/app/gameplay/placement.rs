use engine::{Color, Graphics, NodeDesc, NodeId, SceneWorld, SpriteDesc, Vec2};
use tracing::{debug, info};

use crate::app::store::{Action, Agent, AgentStore, Avatar, StoreEvent};

pub(crate) const PREVIEW_DEPTH: f32 = 10_000.0;
const PREVIEW_RADIUS: f32 = 25.0;
const PREVIEW_RING_WIDTH: f32 = 2.0;
const PREVIEW_RING_ALPHA: f32 = 0.5;
const PREVIEW_FILL_ALPHA: f32 = 0.08;
const INVALID_SPRITE_ALPHA: f32 = 0.6;
const VALID_COLOR: Color = Color::from_hex(0x4ade80);
const INVALID_COLOR: Color = Color::from_hex(0xff4444);

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlacementRules {
    pub edge_margin: f32,
    pub min_agent_separation: f32,
    pub min_player_separation: f32,
}

impl Default for PlacementRules {
    fn default() -> Self {
        Self {
            edge_margin: 32.0,
            min_agent_separation: 50.0,
            min_player_separation: 40.0,
        }
    }
}

impl PlacementRules {
    /// Inside the inset map bounds, and far enough from every placed agent
    /// and from the local player.
    pub(crate) fn is_valid(
        &self,
        point: Vec2,
        map_size: Vec2,
        agents: &[Agent],
        player_position: Option<Vec2>,
    ) -> bool {
        let margin = self.edge_margin;
        if point.x < margin
            || point.x > map_size.x - margin
            || point.y < margin
            || point.y > map_size.y - margin
        {
            return false;
        }
        if agents
            .iter()
            .any(|agent| point.distance_to(agent.position) < self.min_agent_separation)
        {
            return false;
        }
        !player_position
            .is_some_and(|player| point.distance_to(player) < self.min_player_separation)
    }
}

/// What the controller needs to know about the world besides the store.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PlacementContext {
    pub map_size: Vec2,
    pub player_position: Option<Vec2>,
}

#[derive(Debug, Clone, Copy)]
struct Preview {
    node: NodeId,
    valid: bool,
}

/// Drives the pending-agent preview that follows the pointer while placement
/// is armed. Dormant otherwise.
#[derive(Debug, Default)]
pub(crate) struct PlacementController {
    rules: PlacementRules,
    preview: Option<Preview>,
}

impl PlacementController {
    pub(crate) fn new(rules: PlacementRules) -> Self {
        Self {
            rules,
            preview: None,
        }
    }

    pub(crate) fn rules(&self) -> &PlacementRules {
        &self.rules
    }

    #[cfg(test)]
    pub(crate) fn preview_node(&self) -> Option<NodeId> {
        self.preview.map(|preview| preview.node)
    }

    pub(crate) fn preview_is_valid(&self) -> Option<bool> {
        self.preview.map(|preview| preview.valid)
    }

    pub(crate) fn handle_pointer_move(
        &mut self,
        world_point: Vec2,
        store: &AgentStore,
        context: PlacementContext,
        world: &mut SceneWorld,
    ) {
        let Some(pending) = store.placement().agent_data() else {
            return;
        };
        let valid = self.rules.is_valid(
            world_point,
            context.map_size,
            store.agents(),
            context.player_position,
        );

        let node = match self.preview {
            Some(preview) => preview.node,
            None => world.spawn_node(NodeDesc {
                position: world_point,
                depth: PREVIEW_DEPTH,
                debug_name: "placement_preview",
                ..NodeDesc::default()
            }),
        };
        if let Some(visual) = world.node_mut(node) {
            visual.position = world_point;
            visual.graphics = Some(preview_graphics(valid));
            visual.sprite = Some(preview_sprite(pending.avatar, valid));
        }
        self.preview = Some(Preview { node, valid });
    }

    /// Validity is recomputed at the click point; an invalid click does nothing.
    pub(crate) fn handle_primary_click(
        &mut self,
        world_point: Vec2,
        store: &mut AgentStore,
        context: PlacementContext,
        world: &mut SceneWorld,
    ) -> Vec<StoreEvent> {
        if !store.placement().is_active() {
            return Vec::new();
        }
        let valid = self.rules.is_valid(
            world_point,
            context.map_size,
            store.agents(),
            context.player_position,
        );
        if !valid {
            debug!(x = world_point.x, y = world_point.y, "placement_click_rejected");
            return Vec::new();
        }

        let events = store.dispatch(Action::FinishPlacement(world_point));
        info!(x = world_point.x, y = world_point.y, "agent_placed");
        self.destroy_preview(world);
        events
    }

    pub(crate) fn handle_cancel(
        &mut self,
        store: &mut AgentStore,
        world: &mut SceneWorld,
    ) -> Vec<StoreEvent> {
        if !store.placement().is_active() {
            return Vec::new();
        }
        let events = store.dispatch(Action::CancelPlacement);
        info!("placement_cancelled");
        self.destroy_preview(world);
        events
    }

    /// Drops a preview left over after placement was switched off elsewhere.
    pub(crate) fn sync_with_store(&mut self, store: &AgentStore, world: &mut SceneWorld) {
        if !store.placement().is_active() && self.preview.is_some() {
            self.destroy_preview(world);
        }
    }

    fn destroy_preview(&mut self, world: &mut SceneWorld) {
        if let Some(preview) = self.preview.take() {
            world.despawn(preview.node);
        }
    }
}

fn preview_graphics(valid: bool) -> Graphics {
    let color = if valid { VALID_COLOR } else { INVALID_COLOR };
    let mut graphics = Graphics::new();
    graphics
        .stroke_circle(PREVIEW_RADIUS, PREVIEW_RING_WIDTH, color, PREVIEW_RING_ALPHA)
        .fill_circle(PREVIEW_RADIUS, color, PREVIEW_FILL_ALPHA);
    graphics
}

fn preview_sprite(avatar: Avatar, valid: bool) -> SpriteDesc {
    let mut sprite = SpriteDesc::new(avatar.sprite_key());
    if !valid {
        sprite.alpha = INVALID_SPRITE_ALPHA;
        sprite.tint = Some(INVALID_COLOR);
    }
    sprite
}
