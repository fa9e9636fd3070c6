use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::graphics::{Color, Graphics};
use super::input::{ActionStates, InputAction};
use super::tools::HudLine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleLineResult {
    Unsupported,
    Success(Vec<String>),
    Error(String),
    ClearOutput,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    pointer_moved: bool,
    left_click_pressed: bool,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn new(
        actions: ActionStates,
        cursor_position_px: Option<Vec2>,
        pointer_moved: bool,
        left_click_pressed: bool,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            actions,
            cursor_position_px,
            pointer_moved,
            left_click_pressed,
            window_width,
            window_height,
        }
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    /// True only on the tick the key went down.
    pub fn just_pressed(&self, action: InputAction) -> bool {
        self.actions.just_pressed(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self.actions.set_pressed_edge(action, false);
        self
    }

    pub fn with_action_pressed(mut self, action: InputAction) -> Self {
        self.actions.set(action, true);
        self.actions.set_pressed_edge(action, true);
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_pointer_moved(mut self, pointer_moved: bool) -> Self {
        self.pointer_moved = pointer_moved;
        self
    }

    pub fn with_left_click_pressed(mut self, left_click_pressed: bool) -> Self {
        self.left_click_pressed = left_click_pressed;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn pointer_moved(&self) -> bool {
        self.pointer_moved
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

/// World positions are map pixels with y growing downward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.5;
pub const CAMERA_ZOOM_MAX: f32 = 3.0;

#[derive(Debug, Clone, Copy)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::default(),
            zoom: CAMERA_ZOOM_DEFAULT,
        }
    }
}

impl Camera2D {
    pub fn effective_zoom(&self) -> f32 {
        if !self.zoom.is_finite() {
            return CAMERA_ZOOM_DEFAULT;
        }
        self.zoom.clamp(CAMERA_ZOOM_MIN, CAMERA_ZOOM_MAX)
    }

    pub fn follow(&mut self, target: Vec2) {
        self.position = target;
    }
}

/// Ground layer of the map in tiles. Tile `(x, y)` covers the pixel rectangle
/// starting at `(x * tile_width, y * tile_height)`. Tile value `0` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
    tiles: Vec<u32>,
    colliding_gids: HashSet<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch { expected: usize, actual: usize },
    #[error("tile size must be non-zero, got {width}x{height}")]
    ZeroTileSize { width: u32, height: u32 },
}

impl Tilemap {
    pub fn new(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        tiles: Vec<u32>,
    ) -> Result<Self, TilemapError> {
        if tile_width == 0 || tile_height == 0 {
            return Err(TilemapError::ZeroTileSize {
                width: tile_width,
                height: tile_height,
            });
        }
        let expected = width as usize * height as usize;
        let actual = tiles.len();
        if expected != actual {
            return Err(TilemapError::TileCountMismatch { expected, actual });
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
            tiles,
            colliding_gids: HashSet::new(),
        })
    }

    pub fn with_colliding_gids(mut self, gids: impl IntoIterator<Item = u32>) -> Self {
        self.colliding_gids.extend(gids);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    pub fn width_in_pixels(&self) -> f32 {
        (self.width * self.tile_width) as f32
    }

    pub fn height_in_pixels(&self) -> f32 {
        (self.height * self.tile_height) as f32
    }

    pub fn tile_at(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.tiles
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn tile_coords_at_world(&self, world: Vec2) -> Option<(u32, u32)> {
        if world.x < 0.0 || world.y < 0.0 {
            return None;
        }
        let x = (world.x / self.tile_width as f32).floor() as u32;
        let y = (world.y / self.tile_height as f32).floor() as u32;
        (x < self.width && y < self.height).then_some((x, y))
    }

    pub fn is_colliding_gid(&self, gid: u32) -> bool {
        self.colliding_gids.contains(&gid)
    }

    /// Points outside the map count as blocked.
    pub fn is_blocked_at_world(&self, world: Vec2) -> bool {
        match self.tile_coords_at_world(world) {
            Some((x, y)) => self
                .tile_at(x, y)
                .is_some_and(|gid| self.is_colliding_gid(gid)),
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteDesc {
    pub texture_key: String,
    pub animation: Option<String>,
    pub scale: f32,
    pub alpha: f32,
    pub tint: Option<Color>,
}

impl SpriteDesc {
    pub fn new(texture_key: impl Into<String>) -> Self {
        Self {
            texture_key: texture_key.into(),
            animation: None,
            scale: 1.0,
            alpha: 1.0,
            tint: None,
        }
    }

    pub fn playing(mut self, animation: impl Into<String>) -> Self {
        self.animation = Some(animation.into());
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelDesc {
    pub text: String,
    pub color: Color,
    pub stroke: Option<Color>,
    pub offset: Vec2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitArea {
    Circle { radius: f32 },
}

impl HitArea {
    fn contains(self, center: Vec2, point: Vec2) -> bool {
        match self {
            HitArea::Circle { radius } => center.distance_to(point) <= radius,
        }
    }
}

/// What to spawn. Layers draw in field order: graphics, sprite, label.
#[derive(Debug, Clone, Default)]
pub struct NodeDesc {
    pub position: Vec2,
    pub depth: f32,
    pub graphics: Option<Graphics>,
    pub sprite: Option<SpriteDesc>,
    pub label: Option<LabelDesc>,
    pub hit_area: Option<HitArea>,
    pub debug_name: &'static str,
}

/// A container in the scene graph: one position, one depth, up to three layers.
#[derive(Debug, Clone)]
pub struct VisualNode {
    pub id: NodeId,
    pub position: Vec2,
    pub depth: f32,
    pub graphics: Option<Graphics>,
    pub sprite: Option<SpriteDesc>,
    pub label: Option<LabelDesc>,
    pub hit_area: Option<HitArea>,
    pub debug_name: &'static str,
    spawn_order: u64,
}

impl VisualNode {
    pub fn spawn_order(&self) -> u64 {
        self.spawn_order
    }
}

#[derive(Debug, Default)]
struct NodeIdAllocator {
    next: u64,
}

impl NodeIdAllocator {
    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

#[derive(Debug, Default)]
pub struct SceneWorld {
    allocator: NodeIdAllocator,
    nodes: Vec<VisualNode>,
    pending_spawns: Vec<VisualNode>,
    pending_despawns: Vec<NodeId>,
    next_spawn_order: u64,
    camera: Camera2D,
    tilemap: Option<Tilemap>,
}

impl SceneWorld {
    pub fn spawn_node(&mut self, desc: NodeDesc) -> NodeId {
        let id = self.allocator.allocate();
        let spawn_order = self.next_spawn_order;
        self.next_spawn_order = self.next_spawn_order.saturating_add(1);
        self.pending_spawns.push(VisualNode {
            id,
            position: desc.position,
            depth: desc.depth,
            graphics: desc.graphics,
            sprite: desc.sprite,
            label: desc.label,
            hit_area: desc.hit_area,
            debug_name: desc.debug_name,
            spawn_order,
        });
        id
    }

    pub fn despawn(&mut self, id: NodeId) -> bool {
        let exists_now = self.nodes.iter().any(|node| node.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|node| node.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_despawns.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_despawns.is_empty() {
            self.pending_despawns.sort();
            self.pending_despawns.dedup();
            let pending = &self.pending_despawns;
            self.nodes
                .retain(|node| pending.binary_search(&node.id).is_err());
            self.pending_spawns
                .retain(|node| pending.binary_search(&node.id).is_err());
            self.pending_despawns.clear();
        }

        self.nodes.append(&mut self.pending_spawns);
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.pending_spawns.clear();
        self.pending_despawns.clear();
        self.next_spawn_order = 0;
        self.camera = Camera2D::default();
    }

    /// Finds a node whether or not its spawn has been applied yet.
    pub fn node(&self, id: NodeId) -> Option<&VisualNode> {
        self.nodes
            .iter()
            .chain(self.pending_spawns.iter())
            .find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut VisualNode> {
        self.nodes
            .iter_mut()
            .chain(self.pending_spawns.iter_mut())
            .find(|node| node.id == id)
    }

    pub fn nodes(&self) -> &[VisualNode] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_pending_despawn(&self, id: NodeId) -> bool {
        self.pending_despawns.contains(&id)
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn set_tilemap(&mut self, tilemap: Tilemap) {
        self.tilemap = Some(tilemap);
    }

    pub fn tilemap(&self) -> Option<&Tilemap> {
        self.tilemap.as_ref()
    }

    /// Topmost node whose hit area contains `world_point`: highest depth wins,
    /// later spawns win ties.
    pub fn pick_topmost_interactive_at(&self, world_point: Vec2) -> Option<NodeId> {
        let mut best: Option<(f32, u64, NodeId)> = None;

        for node in self.nodes.iter().chain(self.pending_spawns.iter()) {
            let Some(hit_area) = node.hit_area else {
                continue;
            };
            if self.is_pending_despawn(node.id) || !hit_area.contains(node.position, world_point) {
                continue;
            }

            let in_front = match best {
                None => true,
                Some((depth, order, _)) => {
                    node.depth > depth || (node.depth == depth && node.spawn_order > order)
                }
            };
            if in_front {
                best = Some((node.depth, node.spawn_order, node.id));
            }
        }

        best.map(|(_, _, id)| id)
    }
}

pub trait Scene {
    fn load(&mut self, world: &mut SceneWorld);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut SceneWorld,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut SceneWorld);
    fn debug_title(&self, _world: &SceneWorld) -> Option<String> {
        None
    }
    fn hud_lines(&self, _world: &SceneWorld) -> Vec<HudLine> {
        Vec::new()
    }
    fn execute_console_line(&mut self, _line: &str, _world: &mut SceneWorld) -> ConsoleLineResult {
        ConsoleLineResult::Unsupported
    }
}
