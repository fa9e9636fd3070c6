use std::collections::HashMap;

use winit::keyboard::KeyCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Interact,
    Use,
    Cancel,
    ToggleOverlay,
    ToggleConsole,
    Save,
    Load,
}

const ACTION_COUNT: usize = 11;

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Interact => 4,
            InputAction::Use => 5,
            InputAction::Cancel => 6,
            InputAction::ToggleOverlay => 7,
            InputAction::ToggleConsole => 8,
            InputAction::Save => 9,
            InputAction::Load => 10,
        }
    }
}

/// Level state plus a one-tick press edge per action.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
    pressed: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        let index = action.index();
        if is_down && !self.down[index] {
            self.pressed[index] = true;
        }
        self.down[index] = is_down;
    }

    pub(crate) fn set_pressed_edge(&mut self, action: InputAction, pressed: bool) {
        self.pressed[action.index()] = pressed;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    pub(crate) fn just_pressed(&self, action: InputAction) -> bool {
        self.pressed[action.index()]
    }

    pub(crate) fn clear_pressed_edges(&mut self) {
        self.pressed = [false; ACTION_COUNT];
    }

    pub(crate) fn release_all(&mut self) {
        *self = Self::default();
    }
}

/// Physical key to action table. Registration is keyed by physical key, so
/// registering the same binding again replaces it instead of stacking a second
/// listener.
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    by_key: HashMap<KeyCode, InputAction>,
}

impl KeyBindings {
    pub fn with_defaults() -> Self {
        let mut bindings = Self::default();
        bindings.register_defaults();
        bindings
    }

    pub fn register_defaults(&mut self) {
        self.bind(KeyCode::KeyW, InputAction::MoveUp);
        self.bind(KeyCode::ArrowUp, InputAction::MoveUp);
        self.bind(KeyCode::KeyS, InputAction::MoveDown);
        self.bind(KeyCode::ArrowDown, InputAction::MoveDown);
        self.bind(KeyCode::KeyA, InputAction::MoveLeft);
        self.bind(KeyCode::ArrowLeft, InputAction::MoveLeft);
        self.bind(KeyCode::KeyD, InputAction::MoveRight);
        self.bind(KeyCode::ArrowRight, InputAction::MoveRight);
        self.bind(KeyCode::KeyE, InputAction::Interact);
        self.bind(KeyCode::KeyR, InputAction::Use);
        self.bind(KeyCode::Escape, InputAction::Cancel);
        self.bind(KeyCode::F3, InputAction::ToggleOverlay);
        self.bind(KeyCode::Backquote, InputAction::ToggleConsole);
        self.bind(KeyCode::F5, InputAction::Save);
        self.bind(KeyCode::F9, InputAction::Load);
    }

    /// Returns `true` when the key was not bound before.
    pub fn bind(&mut self, key: KeyCode, action: InputAction) -> bool {
        self.by_key.insert(key, action).is_none()
    }

    pub fn action_for(&self, key: KeyCode) -> Option<InputAction> {
        self.by_key.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_defaults_twice_does_not_duplicate_bindings() {
        let mut bindings = KeyBindings::with_defaults();
        let first_len = bindings.len();

        bindings.register_defaults();
        bindings.register_defaults();

        assert_eq!(bindings.len(), first_len);
        assert_eq!(
            bindings.action_for(KeyCode::Escape),
            Some(InputAction::Cancel)
        );
    }

    #[test]
    fn wasd_and_arrows_share_movement_actions() {
        let bindings = KeyBindings::with_defaults();
        assert_eq!(bindings.action_for(KeyCode::KeyW), Some(InputAction::MoveUp));
        assert_eq!(
            bindings.action_for(KeyCode::ArrowUp),
            Some(InputAction::MoveUp)
        );
        assert_eq!(bindings.action_for(KeyCode::KeyQ), None);
    }

    #[test]
    fn press_edge_only_on_transition_to_down() {
        let mut states = ActionStates::default();
        states.set(InputAction::Cancel, true);
        assert!(states.just_pressed(InputAction::Cancel));

        states.clear_pressed_edges();
        states.set(InputAction::Cancel, true);
        assert!(!states.just_pressed(InputAction::Cancel));
        assert!(states.is_down(InputAction::Cancel));

        states.set(InputAction::Cancel, false);
        states.set(InputAction::Cancel, true);
        assert!(states.just_pressed(InputAction::Cancel));
    }

    #[test]
    fn release_all_drops_level_and_edges() {
        let mut states = ActionStates::default();
        states.set(InputAction::MoveLeft, true);
        states.release_all();
        assert!(!states.is_down(InputAction::MoveLeft));
        assert!(!states.just_pressed(InputAction::MoveLeft));
    }
}
