//! Pointer position and button tracker.

use glam::Vec2;
use winit::event::{ElementState, MouseButton};

/// Maps a [`MouseButton`] to an index 0..5.
fn button_index(button: MouseButton) -> usize {
    match button {
        MouseButton::Left => 0,
        MouseButton::Right => 1,
        MouseButton::Middle => 2,
        MouseButton::Back => 3,
        MouseButton::Forward | MouseButton::Other(_) => 4,
    }
}

/// Pointer position in window pixels and held buttons.
#[derive(Debug, Clone, Copy, Default)]
pub struct MouseState {
    position: Vec2,
    buttons: [bool; 5],
}

impl MouseState {
    /// Creates a new `MouseState` at the window origin with no buttons held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a state at `position` with the given buttons held.
    #[must_use]
    pub fn at(position: Vec2, held: &[MouseButton]) -> Self {
        let mut state = Self {
            position,
            ..Self::default()
        };
        for &button in held {
            state.on_button(button, ElementState::Pressed);
        }
        state
    }

    /// Records a cursor move to `(x, y)` in window pixels.
    pub fn on_cursor_moved(&mut self, x: f64, y: f64) {
        self.position = Vec2::new(x as f32, y as f32);
    }

    /// Records a button press or release.
    pub fn on_button(&mut self, button: MouseButton, state: ElementState) {
        self.buttons[button_index(button)] = state == ElementState::Pressed;
    }

    /// Current pointer position in window pixels.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Returns `true` while `button` is held.
    #[must_use]
    pub fn is_pressed(&self, button: MouseButton) -> bool {
        self.buttons[button_index(button)]
    }
}
