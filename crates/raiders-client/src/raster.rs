//! Software renderer that composes each scene into an RGBA image.
//!
//! Objects are drawn as flat discs colored by kind, counters with a small
//! built-in digit font. Every `frame_dump_interval`-th frame can be written to
//! disk as PNG, which is how a windowless client shows what it sees.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use glam::DVec2;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use raiders_config::RenderConfig;
use tracing::{debug, info};

use crate::render::{RenderError, Renderer};
use crate::scene::{Color, DrawCommand, Resource, Scene};
use crate::viewport::Rect;

const PLAYER_RADIUS: f64 = 15.0;
const PLAYER_COLOR: Color = Color::rgb(230, 190, 150);
const OBJECT_PALETTE: [Color; 6] = [
    Color::rgb(60, 120, 50),
    Color::rgb(130, 130, 140),
    Color::rgb(200, 60, 60),
    Color::rgb(150, 100, 50),
    Color::rgb(80, 80, 200),
    Color::rgb(220, 200, 80),
];
const ICON_SIZE: f64 = 30.0;

/// 3×5 bitmaps for `0`-`9` and `-`, one row per byte, high bit on the left.
const GLYPHS: [[u8; 5]; 11] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
    [0b000, 0b000, 0b111, 0b000, 0b000],
];
const GLYPH_SCALE: f64 = 4.0;
const GLYPH_ADVANCE: f64 = 4.0 * GLYPH_SCALE;

/// Renders scenes into an in-memory frame buffer.
pub struct RasterRenderer {
    title: String,
    window_size: (u32, u32),
    frames_dir: Option<PathBuf>,
    frame_dump_interval: u32,
    frame: Option<RgbaImage>,
    frames_presented: u64,
    quit: Arc<AtomicBool>,
    closed: bool,
}

impl RasterRenderer {
    pub fn new(settings: &RenderConfig, title: impl Into<String>) -> Self {
        let title = title.into();
        info!(
            %title,
            width = settings.window_width,
            height = settings.window_height,
            frames_dir = ?settings.frames_dir,
            "created raster renderer"
        );
        Self {
            title,
            window_size: (settings.window_width.max(1), settings.window_height.max(1)),
            frames_dir: settings.frames_dir.clone(),
            frame_dump_interval: settings.frame_dump_interval,
            frame: None,
            frames_presented: 0,
            quit: Arc::new(AtomicBool::new(false)),
            closed: false,
        }
    }

    /// Flag that makes [`poll_quit`](Renderer::poll_quit) report `true` once set.
    pub fn quit_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    /// The most recently presented frame.
    pub fn frame(&self) -> Option<&RgbaImage> {
        self.frame.as_ref()
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Hand the most recent frame over to whoever displays it.
    pub fn take_frame(&mut self) -> Option<RgbaImage> {
        self.frame.take()
    }

    /// Follow a window resize. Zero-sized (minimized) windows keep one pixel.
    pub fn set_window_size(&mut self, (width, height): (u32, u32)) {
        self.window_size = (width.max(1), height.max(1));
    }

    fn dump(&self, frame: &RgbaImage) -> Result<(), RenderError> {
        let Some(dir) = &self.frames_dir else {
            return Ok(());
        };
        if self.frame_dump_interval == 0
            || self.frames_presented % u64::from(self.frame_dump_interval) != 0
        {
            return Ok(());
        }
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("frame_{:06}.png", self.frames_presented));
        frame.save(&path)?;
        debug!(path = %path.display(), "wrote frame");
        Ok(())
    }
}

impl Renderer for RasterRenderer {
    fn window_size(&self) -> (u32, u32) {
        self.window_size
    }

    fn render(&mut self, scene: &Scene) -> Result<(), RenderError> {
        if self.closed {
            return Err(RenderError::Closed);
        }

        let side = scene.layout_size.round().max(1.0) as u32;
        let mut surface = RgbaImage::from_pixel(side, side, rgba(scene.background));
        for cmd in &scene.world {
            draw(&mut surface, cmd);
        }

        let (w, h) = self.window_size;
        let mut frame = if (w, h) == (side, side) {
            surface
        } else {
            imageops::resize(&surface, w, h, FilterType::Nearest)
        };
        imageops::flip_vertical_in_place(&mut frame);
        for cmd in &scene.hud {
            draw(&mut frame, cmd);
        }

        self.frames_presented += 1;
        let result = self.dump(&frame);
        self.frame = Some(frame);
        result
    }

    fn poll_quit(&mut self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.frame = None;
        debug!(title = %self.title, frames = self.frames_presented, "renderer closed");
    }
}

fn rgba(color: Color) -> Rgba<u8> {
    Rgba([color.r, color.g, color.b, 255])
}

fn draw(img: &mut RgbaImage, cmd: &DrawCommand) {
    match cmd {
        DrawCommand::Object { record, pos } => {
            let (radius, color) = if record.is_player() {
                (PLAYER_RADIUS, PLAYER_COLOR)
            } else {
                let idx = record.kind.rem_euclid(OBJECT_PALETTE.len() as i64) as usize;
                (10.0 + 4.0 * (idx % 3) as f64, OBJECT_PALETTE[idx])
            };
            fill_circle(img, *pos, radius, color);
        }
        DrawCommand::Rect { rect, color } => fill_rect(img, rect, *color),
        DrawCommand::Icon { resource, pos } => {
            let color = match resource {
                Resource::Food => Color::rgb(200, 60, 60),
                Resource::Wood => Color::rgb(140, 90, 40),
                Resource::Stone => Color::rgb(150, 150, 150),
            };
            fill_rect(img, &Rect::new(pos.x, pos.y, ICON_SIZE, ICON_SIZE), color);
        }
        DrawCommand::Text { text, pos, color } => draw_text(img, text, *pos, *color),
    }
}

fn fill_rect(img: &mut RgbaImage, rect: &Rect, color: Color) {
    if ![rect.x, rect.y, rect.w, rect.h].iter().all(|v| v.is_finite()) {
        return;
    }
    let (w, h) = (f64::from(img.width()), f64::from(img.height()));
    let x0 = rect.x.floor().max(0.0);
    let y0 = rect.y.floor().max(0.0);
    let x1 = (rect.x + rect.w).ceil().min(w);
    let y1 = (rect.y + rect.h).ceil().min(h);
    if !(x0 < x1 && y0 < y1) {
        return;
    }
    let px = rgba(color);
    for y in y0 as u32..y1 as u32 {
        for x in x0 as u32..x1 as u32 {
            img.put_pixel(x, y, px);
        }
    }
}

fn fill_circle(img: &mut RgbaImage, center: DVec2, radius: f64, color: Color) {
    if !center.is_finite() || !radius.is_finite() {
        return;
    }
    let bounds = Rect::new(center.x - radius, center.y - radius, radius * 2.0, radius * 2.0);
    let (w, h) = (f64::from(img.width()), f64::from(img.height()));
    let x0 = bounds.x.floor().max(0.0);
    let y0 = bounds.y.floor().max(0.0);
    let x1 = (bounds.x + bounds.w).ceil().min(w);
    let y1 = (bounds.y + bounds.h).ceil().min(h);
    if !(x0 < x1 && y0 < y1) {
        return;
    }
    let px = rgba(color);
    let r2 = radius * radius;
    for y in y0 as u32..y1 as u32 {
        for x in x0 as u32..x1 as u32 {
            let d = DVec2::new(f64::from(x) + 0.5, f64::from(y) + 0.5) - center;
            if d.length_squared() <= r2 {
                img.put_pixel(x, y, px);
            }
        }
    }
}

fn draw_text(img: &mut RgbaImage, text: &str, pos: DVec2, color: Color) {
    let mut x = pos.x;
    for ch in text.chars() {
        let glyph = match ch {
            '0'..='9' => Some(&GLYPHS[ch as usize - '0' as usize]),
            '-' => Some(&GLYPHS[10]),
            _ => None,
        };
        if let Some(rows) = glyph {
            for (row, bits) in rows.iter().enumerate() {
                for col in 0u8..3 {
                    if bits & (0b100u8 >> col) != 0 {
                        let cell = Rect::new(
                            x + f64::from(col) * GLYPH_SCALE,
                            pos.y + row as f64 * GLYPH_SCALE,
                            GLYPH_SCALE,
                            GLYPH_SCALE,
                        );
                        fill_rect(img, &cell, color);
                    }
                }
            }
        }
        x += GLYPH_ADVANCE;
    }
}
