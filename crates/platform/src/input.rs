//! Keyboard input tracking.

use std::collections::HashSet;

pub use winit::keyboard::KeyCode;

/// Tracks which keys are currently held and which changed this frame.
#[derive(Debug, Default)]
pub struct InputState {
    /// Currently pressed keys
    pressed: HashSet<KeyCode>,
    /// Keys pressed since the last `begin_frame`
    just_pressed: HashSet<KeyCode>,
}

impl InputState {
    /// Create an empty input state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame state; call once at the start of each frame.
    pub fn begin_frame(&mut self) {
        self.just_pressed.clear();
    }

    /// Handle a key press event.
    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed.insert(key) {
            self.just_pressed.insert(key);
        }
    }

    /// Handle a key release event.
    pub fn on_key_released(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    /// Check if a key is currently held.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// Check if a key went down since the last `begin_frame`.
    pub fn is_key_just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn press_and_release_roundtrip() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Escape);
        assert!(input.is_key_pressed(KeyCode::Escape));
        assert!(input.is_key_just_pressed(KeyCode::Escape));

        input.begin_frame();
        assert!(input.is_key_pressed(KeyCode::Escape));
        assert!(!input.is_key_just_pressed(KeyCode::Escape));

        input.on_key_released(KeyCode::Escape);
        assert!(!input.is_key_pressed(KeyCode::Escape));
    }

    #[test]
    fn repeat_events_do_not_retrigger_just_pressed() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::Space);
        input.begin_frame();
        input.on_key_pressed(KeyCode::Space);
        assert!(!input.is_key_just_pressed(KeyCode::Space));
    }
}
