//! Keyboard state tracking.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

use crate::window::WindowEvent;

/// Keyboard state built from [`WindowEvent`]s.
///
/// Call [`begin_frame`](Self::begin_frame) once per frame before applying that
/// frame's events so the `just_*` sets only hold the latest transitions.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    just_released_keys: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
    }

    /// Updates the state from a key event. Other events are ignored.
    pub fn apply(&mut self, event: &WindowEvent) {
        match *event {
            WindowEvent::KeyPressed(key) => self.on_key_pressed(key),
            WindowEvent::KeyReleased(key) => self.on_key_released(key),
            WindowEvent::CloseRequested | WindowEvent::Resized { .. } => {}
        }
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
    }

    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed_keys.contains(&key)
    }

    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_and_release() {
        let mut input = InputState::new();
        input.apply(&WindowEvent::KeyPressed(KeyCode::Escape));
        assert!(input.is_key_pressed(KeyCode::Escape));
        assert!(input.is_key_just_pressed(KeyCode::Escape));

        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::Escape));
        assert!(!input.is_key_just_pressed(KeyCode::Escape));

        input.apply(&WindowEvent::KeyReleased(KeyCode::Escape));
        assert!(!input.is_key_pressed(KeyCode::Escape));
        assert!(input.is_key_just_released(KeyCode::Escape));
    }

    #[test]
    fn test_release_without_press_is_ignored() {
        let mut input = InputState::new();
        input.on_key_released(KeyCode::Space);
        assert!(!input.is_key_just_released(KeyCode::Space));
    }

    #[test]
    fn test_non_key_events_are_ignored() {
        let mut input = InputState::new();
        input.apply(&WindowEvent::CloseRequested);
        input.apply(&WindowEvent::Resized {
            width: 10,
            height: 10,
        });
        assert!(!input.is_key_pressed(KeyCode::Escape));
    }
}
