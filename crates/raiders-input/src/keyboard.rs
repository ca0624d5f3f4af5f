//! Held-key tracker.
//!
//! [`KeyboardState`] accumulates key events and answers whether a physical
//! key is currently held. Physical key codes are used so that WASD movement
//! works identically regardless of the user's keyboard layout.

use std::collections::HashSet;
use winit::event::{ElementState, KeyEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Minimal description of a key event for processing.
#[derive(Debug, Clone, Copy)]
pub struct RawKeyEvent {
    /// The physical key involved.
    pub key: KeyCode,
    /// Whether the key was pressed or released.
    pub state: ElementState,
    /// Whether this is a repeat event.
    pub repeat: bool,
}

/// Set of physical keys currently held down.
#[derive(Debug, Clone, Default)]
pub struct KeyboardState {
    pressed: HashSet<KeyCode>,
}

impl KeyboardState {
    /// Creates a new `KeyboardState` with no keys pressed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes a winit [`KeyEvent`]. Keys without a known code are ignored.
    pub fn process_event(&mut self, event: &KeyEvent) {
        if let PhysicalKey::Code(key) = event.physical_key {
            self.process_raw(RawKeyEvent {
                key,
                state: event.state,
                repeat: event.repeat,
            });
        }
    }

    /// Processes a [`RawKeyEvent`] (platform-independent, test-friendly).
    pub fn process_raw(&mut self, event: RawKeyEvent) {
        if event.repeat {
            return;
        }
        match event.state {
            ElementState::Pressed => {
                self.pressed.insert(event.key);
            }
            ElementState::Released => {
                self.pressed.remove(&event.key);
            }
        }
    }

    /// Marks `key` as held.
    pub fn press(&mut self, key: KeyCode) {
        self.pressed.insert(key);
    }

    /// Marks `key` as released.
    pub fn release(&mut self, key: KeyCode) {
        self.pressed.remove(&key);
    }

    /// Returns `true` while the key is held down.
    #[must_use]
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    /// Releases every key, e.g. when the window loses focus.
    pub fn clear(&mut self) {
        self.pressed.clear();
    }
}

impl FromIterator<KeyCode> for KeyboardState {
    fn from_iter<I: IntoIterator<Item = KeyCode>>(iter: I) -> Self {
        Self {
            pressed: iter.into_iter().collect(),
        }
    }
}
