use engine::{
    Color, InputAction, InputSnapshot, LabelDesc, NodeDesc, NodeId, SceneWorld, SpriteDesc, Vec2,
};

use crate::app::office_map::{Bounds, Facing, OfficeMap};
use crate::app::store::Avatar;

pub(crate) const PLAYER_SPAWN: Vec2 = Vec2::new(705.0, 500.0);
pub(crate) const PLAYER_SPEED: f32 = 200.0;
const PLAYER_AVATAR: Avatar = Avatar::Adam;
const PLAYER_LABEL: &str = "You";
const BODY_SIZE: Vec2 = Vec2::new(16.0, 16.0);
const SELECTOR_DISTANCE: f32 = 32.0;
const SELECTOR_SIZE: Vec2 = Vec2::new(16.0, 16.0);
const LABEL_OFFSET: Vec2 = Vec2::new(0.0, -30.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PlayerBehavior {
    Idle,
    Walking,
    /// Index into the scene's item list.
    Sitting { item: usize },
}

#[derive(Debug)]
pub(crate) struct Player {
    pub position: Vec2,
    pub facing: Facing,
    pub behavior: PlayerBehavior,
    node: Option<NodeId>,
    stand_position: Vec2,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(PLAYER_SPAWN)
    }
}

impl Player {
    pub(crate) fn new(position: Vec2) -> Self {
        Self {
            position,
            facing: Facing::Down,
            behavior: PlayerBehavior::Idle,
            node: None,
            stand_position: position,
        }
    }

    pub(crate) fn is_sitting(&self) -> bool {
        matches!(self.behavior, PlayerBehavior::Sitting { .. })
    }

    pub(crate) fn spawn(&mut self, world: &mut SceneWorld) {
        self.node = Some(world.spawn_node(NodeDesc {
            position: self.position,
            depth: self.position.y,
            sprite: Some(self.sprite()),
            label: Some(LabelDesc {
                text: PLAYER_LABEL.to_string(),
                color: Color::WHITE,
                stroke: Some(Color::BLACK),
                offset: LABEL_OFFSET,
            }),
            debug_name: "player",
            ..NodeDesc::default()
        }));
    }

    /// Zone in front of the player used to pick nearby items.
    pub(crate) fn selector_bounds(&self) -> Bounds {
        let step = self.facing.unit();
        Bounds::new(
            Vec2::new(
                self.position.x + step.x * SELECTOR_DISTANCE,
                self.position.y + step.y * SELECTOR_DISTANCE,
            ),
            SELECTOR_SIZE,
        )
    }

    /// Walks with collision against the map; each axis resolves on its own so
    /// the player slides along walls. Sitting players do not move.
    pub(crate) fn step(&mut self, input: &InputSnapshot, fixed_dt_seconds: f32, map: &OfficeMap) {
        if self.is_sitting() {
            return;
        }
        let delta = movement_delta(input, fixed_dt_seconds, PLAYER_SPEED);
        if delta.x == 0.0 && delta.y == 0.0 {
            self.behavior = PlayerBehavior::Idle;
            return;
        }
        self.behavior = PlayerBehavior::Walking;
        self.facing = facing_for(delta, self.facing);

        let moved_x = Vec2::new(self.position.x + delta.x, self.position.y);
        if !map.blocks(&Bounds::new(moved_x, BODY_SIZE)) {
            self.position = moved_x;
        }
        let moved_y = Vec2::new(self.position.x, self.position.y + delta.y);
        if !map.blocks(&Bounds::new(moved_y, BODY_SIZE)) {
            self.position = moved_y;
        }
        self.position = clamp_to_map(self.position, map);
    }

    pub(crate) fn sit(&mut self, item: usize, seat: Vec2, direction: Facing) {
        self.stand_position = self.position;
        self.position = seat;
        self.facing = direction;
        self.behavior = PlayerBehavior::Sitting { item };
    }

    pub(crate) fn stand_up(&mut self) {
        if self.is_sitting() {
            self.position = self.stand_position;
            self.behavior = PlayerBehavior::Idle;
        }
    }

    pub(crate) fn sync_node(&self, world: &mut SceneWorld) {
        let Some(visual) = self.node.and_then(|node| world.node_mut(node)) else {
            return;
        };
        visual.position = self.position;
        visual.depth = self.position.y;
        visual.sprite = Some(self.sprite());
    }

    fn sprite(&self) -> SpriteDesc {
        let pose = match self.behavior {
            PlayerBehavior::Idle => "idle",
            PlayerBehavior::Walking => "run",
            PlayerBehavior::Sitting { .. } => "sit",
        };
        SpriteDesc::new(PLAYER_AVATAR.sprite_key()).playing(format!(
            "{}_{pose}_{}",
            PLAYER_AVATAR.sprite_key(),
            self.facing.as_str()
        ))
    }
}

fn movement_delta(input: &InputSnapshot, fixed_dt_seconds: f32, speed: f32) -> Vec2 {
    let mut x = 0.0f32;
    let mut y = 0.0f32;

    if input.is_down(InputAction::MoveRight) {
        x += 1.0;
    }
    if input.is_down(InputAction::MoveLeft) {
        x -= 1.0;
    }
    if input.is_down(InputAction::MoveUp) {
        y -= 1.0;
    }
    if input.is_down(InputAction::MoveDown) {
        y += 1.0;
    }

    let len_sq = x * x + y * y;
    if len_sq > 0.0 {
        let inv_len = len_sq.sqrt().recip();
        x *= inv_len;
        y *= inv_len;
    }

    Vec2::new(x * speed * fixed_dt_seconds, y * speed * fixed_dt_seconds)
}

/// Horizontal input wins on diagonals, matching the side-facing run frames.
fn facing_for(delta: Vec2, current: Facing) -> Facing {
    if delta.x > 0.0 {
        Facing::Right
    } else if delta.x < 0.0 {
        Facing::Left
    } else if delta.y < 0.0 {
        Facing::Up
    } else if delta.y > 0.0 {
        Facing::Down
    } else {
        current
    }
}

fn clamp_to_map(position: Vec2, map: &OfficeMap) -> Vec2 {
    let half_w = BODY_SIZE.x * 0.5;
    let half_h = BODY_SIZE.y * 0.5;
    Vec2::new(
        position.x.clamp(half_w, (map.width_px() - half_w).max(half_w)),
        position.y.clamp(half_h, (map.height_px() - half_h).max(half_h)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::office_map::builtin_map;

    fn office() -> OfficeMap {
        OfficeMap::from_loaded(builtin_map().expect("builtin")).expect("office")
    }

    fn held(actions: &[InputAction]) -> InputSnapshot {
        actions.iter().fold(InputSnapshot::empty(), |snapshot, action| {
            snapshot.with_action_down(*action, true)
        })
    }

    #[test]
    fn diagonal_movement_is_normalized() {
        let delta = movement_delta(&held(&[InputAction::MoveUp, InputAction::MoveRight]), 1.0, 200.0);
        assert!((delta.x - 141.421).abs() < 0.01);
        assert!((delta.y + 141.421).abs() < 0.01);
    }

    #[test]
    fn walking_updates_facing_and_position() {
        let map = office();
        let mut player = Player::default();

        player.step(&held(&[InputAction::MoveDown]), 0.1, &map);

        assert_eq!(player.behavior, PlayerBehavior::Walking);
        assert_eq!(player.facing, Facing::Down);
        assert!((player.position.y - 520.0).abs() < 1e-3);

        player.step(&InputSnapshot::empty(), 0.1, &map);
        assert_eq!(player.behavior, PlayerBehavior::Idle);
    }

    #[test]
    fn walls_stop_the_player() {
        let map = office();
        let mut player = Player::new(Vec2::new(48.0, 500.0));

        for _ in 0..30 {
            player.step(&held(&[InputAction::MoveLeft]), 1.0 / 60.0, &map);
        }

        assert!(player.position.x >= 32.0 + BODY_SIZE.x * 0.5 - 0.01);
    }

    #[test]
    fn sitting_blocks_movement_until_standing() {
        let map = office();
        let mut player = Player::default();
        player.sit(0, Vec2::new(240.0, 256.0), Facing::Up);

        player.step(&held(&[InputAction::MoveDown]), 0.5, &map);
        assert_eq!(player.position, Vec2::new(240.0, 256.0));
        assert!(player.is_sitting());

        player.stand_up();
        assert_eq!(player.position, PLAYER_SPAWN);
        assert!(!player.is_sitting());
    }

    #[test]
    fn selector_sits_in_front_of_facing() {
        let mut player = Player::new(Vec2::new(100.0, 100.0));
        player.facing = Facing::Left;
        assert_eq!(player.selector_bounds().center, Vec2::new(68.0, 100.0));
    }
}
