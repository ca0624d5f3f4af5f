//! Builds the outgoing action record from local input.

use glam::DVec2;
use raiders_input::{KeyCode, KeyboardState, MouseButton, MouseState};
use raiders_net::Action;

/// Ability selection keys in scan order. When several are held the last
/// one in this list wins.
const ABILITY_KEYS: [(KeyCode, u8); 9] = [
    (KeyCode::Digit1, 1),
    (KeyCode::Digit2, 2),
    (KeyCode::Digit3, 3),
    (KeyCode::Digit4, 4),
    (KeyCode::Digit5, 5),
    (KeyCode::Digit6, 6),
    (KeyCode::KeyQ, 7),
    (KeyCode::KeyR, 8),
    (KeyCode::KeyE, 9),
];

const MOVE_LEFT: KeyCode = KeyCode::KeyA;
const MOVE_RIGHT: KeyCode = KeyCode::KeyD;
const MOVE_DOWN: KeyCode = KeyCode::KeyS;
const MOVE_UP: KeyCode = KeyCode::KeyW;

/// Turns sampled input into [`Action`]s and remembers the latest one.
#[derive(Debug, Clone)]
pub struct ActionEncoder {
    viewport_size: f64,
    last: Action,
}

impl ActionEncoder {
    /// `viewport_size` is the side of the logical layout surface that the
    /// renderer stretches over the window.
    pub fn new(viewport_size: f64) -> Self {
        Self {
            viewport_size,
            last: Action::NEUTRAL,
        }
    }

    /// Most recently encoded action; [`Action::NEUTRAL`] before the first frame.
    pub fn last(&self) -> Action {
        self.last
    }

    /// Encode the current input.
    ///
    /// The aim angle points from the player's on-screen position (its
    /// `relative_pos` scaled from layout space to `window_size`) towards the
    /// pointer, in radians, with the vertical axis flipped.
    pub fn encode(
        &mut self,
        keyboard: &KeyboardState,
        mouse: &MouseState,
        window_size: (u32, u32),
        relative_pos: DVec2,
    ) -> Action {
        let active = ABILITY_KEYS
            .iter()
            .filter(|(key, _)| keyboard.is_pressed(*key))
            .map(|&(_, id)| id)
            .last()
            .unwrap_or(0);

        let ax = axis(keyboard, MOVE_LEFT, MOVE_RIGHT);
        let ay = axis(keyboard, MOVE_DOWN, MOVE_UP);

        let scale = DVec2::new(f64::from(window_size.0), f64::from(window_size.1))
            / self.viewport_size;
        let center = relative_pos * scale;
        let pointer = mouse.position().as_dvec2();
        let angle = -(pointer.y - center.y).atan2(pointer.x - center.x);

        self.last = Action {
            ax,
            ay,
            active,
            action: mouse.is_pressed(MouseButton::Left),
            angle,
        };
        self.last
    }
}

/// 1 at rest, one less for `negative`, one more for `positive`.
fn axis(keyboard: &KeyboardState, negative: KeyCode, positive: KeyCode) -> u8 {
    let mut value = 1;
    if keyboard.is_pressed(negative) {
        value -= 1;
    }
    if keyboard.is_pressed(positive) {
        value += 1;
    }
    value
}
