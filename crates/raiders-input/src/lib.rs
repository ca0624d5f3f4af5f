//! Local input state: held keys and pointer position/buttons, sampled once
//! per tick by the action encoder.

pub mod keyboard;
pub mod mouse;

pub use keyboard::{KeyboardState, RawKeyEvent};
pub use mouse::MouseState;
pub use winit::event::{ElementState, MouseButton};
pub use winit::keyboard::KeyCode;
