//! Renderer seam and a recording implementation for headless runs.

use crate::scene::Scene;

/// Errors a renderer can report for one frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The renderer was already closed.
    #[error("renderer is closed")]
    Closed,

    /// Encoding or saving a frame image failed.
    #[error("failed to write frame: {0}")]
    Image(#[from] image::ImageError),

    /// A filesystem operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Presents scenes to the player.
pub trait Renderer {
    /// Current window size in pixels.
    fn window_size(&self) -> (u32, u32);

    /// Draw the world layer, stretch it to the window, flip it vertically,
    /// draw the HUD layer on top, and present the result.
    fn render(&mut self, scene: &Scene) -> Result<(), RenderError>;

    /// Whether the user asked to quit since the last call.
    fn poll_quit(&mut self) -> bool;

    /// Release renderer resources. Must be safe to call more than once.
    fn close(&mut self);
}

/// Keeps every presented scene in memory instead of drawing it.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub window_size: (u32, u32),
    pub scenes: Vec<Scene>,
    /// Reported by the next [`poll_quit`](Renderer::poll_quit).
    pub quit_requested: bool,
    /// Number of [`close`](Renderer::close) calls, including repeats.
    pub close_calls: u32,
}

impl RecordingRenderer {
    pub fn new(window_size: (u32, u32)) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls > 0
    }
}

impl Renderer for RecordingRenderer {
    fn window_size(&self) -> (u32, u32) {
        self.window_size
    }

    fn render(&mut self, scene: &Scene) -> Result<(), RenderError> {
        if self.is_closed() {
            return Err(RenderError::Closed);
        }
        self.scenes.push(scene.clone());
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        std::mem::take(&mut self.quit_requested)
    }

    fn close(&mut self) {
        self.close_calls += 1;
    }
}
