//! Client window: winit event handling on the main thread, frame hand-off
//! from the session thread.
//!
//! The session composes frames with a [`RasterRenderer`] wrapped in a
//! [`WindowRenderer`], which parks each finished frame in a [`FrameSlot`] and
//! wakes the event loop. [`ClientWindow`] presents whatever is parked, feeds
//! window input into a shared [`WindowInput`], and raises the quit flag when
//! the window is closed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::RgbaImage;
use raiders_client::{RasterRenderer, RenderError, Renderer, Scene, WindowInput};
use tracing::{debug, error, info};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoopProxy};
use winit::window::{Window, WindowId};

use crate::present::{PresentError, Presenter};

/// Events the session thread sends to the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    /// A new frame is waiting in the [`FrameSlot`].
    FrameReady,
    /// The session released its renderer; the window can go.
    SessionEnded,
}

/// Wakes the event loop from another thread.
pub trait Wake {
    fn wake(&self, event: UserEvent);
}

impl Wake for EventLoopProxy<UserEvent> {
    fn wake(&self, event: UserEvent) {
        if self.send_event(event).is_err() {
            debug!(?event, "event loop already closed");
        }
    }
}

/// Latest composed frame and current window size, shared by both threads.
#[derive(Debug)]
pub struct FrameSlot {
    frame: Mutex<Option<RgbaImage>>,
    window_size: Mutex<(u32, u32)>,
}

impl FrameSlot {
    pub fn new(window_size: (u32, u32)) -> Self {
        Self {
            frame: Mutex::new(None),
            window_size: Mutex::new(window_size),
        }
    }

    /// Park a frame, replacing one that was never presented.
    pub fn put(&self, frame: RgbaImage) {
        *lock(&self.frame) = Some(frame);
    }

    pub fn take(&self) -> Option<RgbaImage> {
        lock(&self.frame).take()
    }

    pub fn window_size(&self) -> (u32, u32) {
        *lock(&self.window_size)
    }

    pub fn set_window_size(&self, size: (u32, u32)) {
        *lock(&self.window_size) = size;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Session-side renderer: composes on the CPU, hands frames to the window.
pub struct WindowRenderer<W> {
    raster: RasterRenderer,
    slot: Arc<FrameSlot>,
    waker: W,
    closed: bool,
}

impl<W: Wake> WindowRenderer<W> {
    pub fn new(raster: RasterRenderer, slot: Arc<FrameSlot>, waker: W) -> Self {
        Self {
            raster,
            slot,
            waker,
            closed: false,
        }
    }
}

impl<W: Wake> Renderer for WindowRenderer<W> {
    fn window_size(&self) -> (u32, u32) {
        self.slot.window_size()
    }

    fn render(&mut self, scene: &Scene) -> Result<(), RenderError> {
        self.raster.set_window_size(self.slot.window_size());
        // A failed PNG dump still leaves a frame worth showing.
        let result = self.raster.render(scene);
        if let Some(frame) = self.raster.take_frame() {
            self.slot.put(frame);
            self.waker.wake(UserEvent::FrameReady);
        }
        result
    }

    fn poll_quit(&mut self) -> bool {
        self.raster.poll_quit()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.raster.close();
        self.waker.wake(UserEvent::SessionEnded);
    }
}

/// winit application that shows the session's frames.
pub struct ClientWindow {
    title: String,
    initial_size: (u32, u32),
    window: Option<Arc<Window>>,
    presenter: Option<Presenter>,
    slot: Arc<FrameSlot>,
    input: WindowInput,
    quit: Arc<AtomicBool>,
    failed: bool,
}

impl ClientWindow {
    pub fn new(
        title: String,
        slot: Arc<FrameSlot>,
        input: WindowInput,
        quit: Arc<AtomicBool>,
    ) -> Self {
        let initial_size = slot.window_size();
        Self {
            title,
            initial_size,
            window: None,
            presenter: None,
            slot,
            input,
            quit,
            failed: false,
        }
    }

    /// Whether the window could not be opened or drawn to.
    pub fn failed(&self) -> bool {
        self.failed
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop) {
        self.failed = true;
        self.quit.store(true, Ordering::Relaxed);
        event_loop.exit();
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<(), String> {
        let (width, height) = self.initial_size;
        let attrs = Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(width, height));
        let window = Arc::new(event_loop.create_window(attrs).map_err(|e| e.to_string())?);

        let presenter = pollster::block_on(Presenter::new(Arc::clone(&window)))
            .map_err(|e| e.to_string())?;

        let size = window.inner_size();
        self.slot.set_window_size((size.width.max(1), size.height.max(1)));
        info!(width = size.width, height = size.height, "window opened");
        self.presenter = Some(presenter);
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler<UserEvent> for ClientWindow {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.open(event_loop) {
            error!(error = %e, "failed to open window");
            self.fail(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("window closed, stopping");
                self.quit.store(true, Ordering::Relaxed);
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                self.slot.set_window_size((size.width.max(1), size.height.max(1)));
                if let Some(presenter) = &mut self.presenter {
                    presenter.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(presenter) = &mut self.presenter else {
                    return;
                };
                let frame = self.slot.take();
                match presenter.present(frame.as_ref()) {
                    Ok(()) => {}
                    Err(e @ PresentError::OutOfMemory) => {
                        error!(error = %e, "cannot draw to window");
                        self.fail(event_loop);
                    }
                    Err(e) => error!(error = %e, "failed to present frame"),
                }
            }
            other => self.input.on_window_event(&other),
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::FrameReady => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            UserEvent::SessionEnded => {
                debug!("session ended, closing window");
                event_loop.exit();
            }
        }
    }
}
