//! Input-device seam between the session and whatever owns the window.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use raiders_input::{ElementState, KeyboardState, MouseButton, MouseState, RawKeyEvent};
use winit::event::WindowEvent;

/// Source of local input, sampled once per tick.
pub trait InputDevice {
    /// Take a consistent snapshot of the device for this tick. Called before
    /// [`keyboard`](Self::keyboard) and [`mouse`](Self::mouse) are read.
    fn sample(&mut self) {}

    /// Keys currently held.
    fn keyboard(&self) -> &KeyboardState;

    /// Pointer position (window pixels) and held buttons.
    fn mouse(&self) -> &MouseState;
}

/// Input device whose state only changes when its owner changes it.
///
/// With the default state it reports no keys and an idle pointer, which is
/// what a windowless client sends.
#[derive(Debug, Clone, Default)]
pub struct FixedInput {
    pub keyboard: KeyboardState,
    pub mouse: MouseState,
}

impl FixedInput {
    pub fn new(keyboard: KeyboardState, mouse: MouseState) -> Self {
        Self { keyboard, mouse }
    }
}

impl InputDevice for FixedInput {
    fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    fn mouse(&self) -> &MouseState {
        &self.mouse
    }
}

/// Input device for headless runs: no keys, pointer parked at the origin.
pub type IdleInput = FixedInput;

/// Input fed from a winit window.
///
/// Clones share one set of trackers: the window thread feeds events into its
/// clone, the session samples its own once per tick.
#[derive(Debug, Clone, Default)]
pub struct WindowInput {
    shared: Arc<Mutex<FixedInput>>,
    sampled: FixedInput,
}

impl WindowInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route one window event into the keyboard and mouse trackers.
    /// Events that carry no input are ignored.
    pub fn on_window_event(&self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => self.lock().keyboard.process_event(event),
            WindowEvent::CursorMoved { position, .. } => self.on_cursor_moved(position.x, position.y),
            WindowEvent::MouseInput { state, button, .. } => self.on_button(*button, *state),
            WindowEvent::Focused(false) => self.release_all(),
            _ => {}
        }
    }

    pub fn on_key(&self, event: RawKeyEvent) {
        self.lock().keyboard.process_raw(event);
    }

    pub fn on_cursor_moved(&self, x: f64, y: f64) {
        self.lock().mouse.on_cursor_moved(x, y);
    }

    pub fn on_button(&self, button: MouseButton, state: ElementState) {
        self.lock().mouse.on_button(button, state);
    }

    /// Drop every held key and button, e.g. when the window loses focus.
    pub fn release_all(&self) {
        let mut state = self.lock();
        state.keyboard.clear();
        let position = state.mouse.position();
        state.mouse = MouseState::at(position, &[]);
    }

    fn lock(&self) -> MutexGuard<'_, FixedInput> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InputDevice for WindowInput {
    fn sample(&mut self) {
        let current = self.lock().clone();
        self.sampled = current;
    }

    fn keyboard(&self) -> &KeyboardState {
        &self.sampled.keyboard
    }

    fn mouse(&self) -> &MouseState {
        &self.sampled.mouse
    }
}
