use std::collections::HashSet;

use glam::Vec2;
use winit::keyboard::KeyCode;

#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    pub mouse_delta: Vec2,
    pub scroll_delta: f32,
    pub dragging: bool,
}

impl InputState {
    pub fn press_key(&mut self, key: KeyCode) {
        self.pressed_keys.insert(key);
    }

    pub fn release_key(&mut self, key: KeyCode) {
        self.pressed_keys.remove(&key);
    }

    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// Mouse motion only orbits while the primary button is held.
    pub fn add_mouse_delta(&mut self, delta: Vec2) {
        if self.dragging {
            self.mouse_delta += delta;
        }
    }

    pub fn add_scroll(&mut self, lines: f32) {
        self.scroll_delta += lines;
    }

    pub fn clear_frame(&mut self) {
        self.mouse_delta = Vec2::ZERO;
        self.scroll_delta = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::InputState;

    #[test]
    fn motion_without_drag_is_ignored() {
        let mut input = InputState::default();
        input.add_mouse_delta(Vec2::new(4.0, 2.0));
        assert_eq!(input.mouse_delta, Vec2::ZERO);

        input.dragging = true;
        input.add_mouse_delta(Vec2::new(4.0, 2.0));
        input.add_mouse_delta(Vec2::new(1.0, 0.0));
        assert_eq!(input.mouse_delta, Vec2::new(5.0, 2.0));
    }

    #[test]
    fn clear_frame_resets_deltas_but_keeps_drag() {
        let mut input = InputState {
            dragging: true,
            ..InputState::default()
        };
        input.add_mouse_delta(Vec2::ONE);
        input.add_scroll(-2.0);
        input.clear_frame();
        assert_eq!(input.mouse_delta, Vec2::ZERO);
        assert_eq!(input.scroll_delta, 0.0);
        assert!(input.dragging);
    }
}
