use std::collections::BTreeMap;

use engine::{
    Color, Graphics, HitArea, LabelDesc, NodeDesc, NodeId, SceneWorld, SpriteDesc, Vec2,
};
use tracing::debug;

use crate::app::store::{Agent, AgentId, AgentStore, Avatar};

pub(crate) const AGENT_HIT_RADIUS: f32 = 20.0;
const HOVER_SCALE: f32 = 1.1;
const HIGHLIGHT_COLOR: Color = Color::from_hex(0x0d59f2);
const HIGHLIGHT_RING_WIDTH: f32 = 2.0;
const HIGHLIGHT_RING_ALPHA: f32 = 0.8;
const HIGHLIGHT_FILL_ALPHA: f32 = 0.1;
const NAME_TAG_OFFSET: Vec2 = Vec2::new(0.0, -30.0);

#[derive(Debug, Clone)]
struct AgentNode {
    node: NodeId,
    name: String,
    avatar: Avatar,
}

/// Keeps one world node per placed agent, mirroring the store once per frame.
#[derive(Debug, Default)]
pub(crate) struct AgentSpriteSync {
    nodes: BTreeMap<AgentId, AgentNode>,
    hovered: Option<AgentId>,
}

impl AgentSpriteSync {
    pub(crate) fn node_for(&self, id: &AgentId) -> Option<NodeId> {
        self.nodes.get(id).map(|entry| entry.node)
    }

    pub(crate) fn agent_for_node(&self, node: NodeId) -> Option<&AgentId> {
        self.nodes
            .iter()
            .find(|(_, entry)| entry.node == node)
            .map(|(id, _)| id)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub(crate) fn hovered(&self) -> Option<&AgentId> {
        self.hovered.as_ref()
    }

    pub(crate) fn sync(&mut self, store: &AgentStore, world: &mut SceneWorld) {
        let agents = store.agents();
        self.nodes.retain(|id, entry| {
            let keep = agents.iter().any(|agent| &agent.id == id);
            if !keep {
                world.despawn(entry.node);
                debug!(agent_id = %id, "agent_node_removed");
            }
            keep
        });
        if self
            .hovered
            .as_ref()
            .is_some_and(|id| !self.nodes.contains_key(id))
        {
            self.hovered = None;
        }

        let selected = store.selected_agent_id();
        for agent in agents {
            let is_selected = selected == Some(&agent.id);
            let is_hovered = self.hovered.as_ref() == Some(&agent.id);
            let entry = self.nodes.entry(agent.id.clone()).or_insert_with(|| {
                debug!(agent_id = %agent.id, "agent_node_created");
                AgentNode {
                    node: world.spawn_node(agent_node_desc(agent)),
                    name: agent.name.clone(),
                    avatar: agent.avatar,
                }
            });

            let Some(visual) = world.node_mut(entry.node) else {
                continue;
            };
            visual.position = agent.position;
            visual.depth = agent.position.y;
            visual.graphics = Some(highlight_graphics(is_selected));
            if entry.avatar != agent.avatar {
                entry.avatar = agent.avatar;
                visual.sprite = Some(agent_sprite(agent.avatar));
            }
            if entry.name != agent.name {
                entry.name.clone_from(&agent.name);
                visual.label = Some(name_tag(agent));
            }
            if let Some(label) = visual.label.as_mut() {
                label.color = agent.avatar.color();
            }
            if let Some(sprite) = visual.sprite.as_mut() {
                sprite.scale = if is_hovered { HOVER_SCALE } else { 1.0 };
            }
        }
    }

    /// Pointer-over / pointer-out on agent nodes.
    pub(crate) fn update_hover(&mut self, world_point: Vec2, world: &mut SceneWorld) {
        let next = world
            .pick_topmost_interactive_at(world_point)
            .and_then(|node| self.agent_for_node(node))
            .cloned();
        if next == self.hovered {
            return;
        }
        if let Some(previous) = self.hovered.take() {
            self.set_sprite_scale(&previous, 1.0, world);
        }
        if let Some(id) = next.as_ref() {
            self.set_sprite_scale(id, HOVER_SCALE, world);
        }
        self.hovered = next;
    }

    fn set_sprite_scale(&self, id: &AgentId, scale: f32, world: &mut SceneWorld) {
        let sprite = self
            .node_for(id)
            .and_then(|node| world.node_mut(node))
            .and_then(|visual| visual.sprite.as_mut());
        if let Some(sprite) = sprite {
            sprite.scale = scale;
        }
    }

    pub(crate) fn clear(&mut self, world: &mut SceneWorld) {
        for entry in self.nodes.values() {
            world.despawn(entry.node);
        }
        self.nodes.clear();
        self.hovered = None;
    }
}

fn agent_node_desc(agent: &Agent) -> NodeDesc {
    NodeDesc {
        position: agent.position,
        depth: agent.position.y,
        graphics: Some(Graphics::new()),
        sprite: Some(agent_sprite(agent.avatar)),
        label: Some(name_tag(agent)),
        hit_area: Some(HitArea::Circle {
            radius: AGENT_HIT_RADIUS,
        }),
        debug_name: "agent",
    }
}

fn agent_sprite(avatar: Avatar) -> SpriteDesc {
    SpriteDesc::new(avatar.sprite_key()).playing(avatar.idle_animation())
}

fn name_tag(agent: &Agent) -> LabelDesc {
    LabelDesc {
        text: agent.name.clone(),
        color: agent.avatar.color(),
        stroke: Some(Color::BLACK),
        offset: NAME_TAG_OFFSET,
    }
}

fn highlight_graphics(selected: bool) -> Graphics {
    let mut graphics = Graphics::new();
    if selected {
        graphics
            .stroke_circle(
                AGENT_HIT_RADIUS,
                HIGHLIGHT_RING_WIDTH,
                HIGHLIGHT_COLOR,
                HIGHLIGHT_RING_ALPHA,
            )
            .fill_circle(AGENT_HIT_RADIUS, HIGHLIGHT_COLOR, HIGHLIGHT_FILL_ALPHA);
    }
    graphics
}
