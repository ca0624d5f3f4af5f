//! Game client for the Raiders server.
//!
//! Projects server snapshots into a player-centred viewport, renders them, and
//! answers each one with the locally sampled input.

pub mod encoder;
pub mod input;
pub mod limiter;
pub mod raster;
pub mod render;
pub mod scene;
pub mod session;
pub mod viewport;

pub use encoder::ActionEncoder;
pub use input::{FixedInput, IdleInput, InputDevice, WindowInput};
pub use limiter::FrameLimiter;
pub use raster::RasterRenderer;
pub use render::{RecordingRenderer, RenderError, Renderer};
pub use scene::{Color, DrawCommand, Resource, ResourceCounters, Scene};
pub use session::{ClientSession, ExitReason, SessionError, SessionState};
pub use viewport::{HealthBar, Layout, ProjectError, ProjectedObject, Rect, Viewport, ViewportProjector};
