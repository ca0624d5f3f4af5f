//! Viewport projection: maps one world snapshot into the 600×600 layout
//! space around the local player.
//!
//! World coordinates grow downward. The crop origin is clamped so the crop
//! never leaves the world, and the player's own position inside the crop
//! (`relative_pos`) uses a bottom-up vertical axis. Every other object is
//! placed relative to that anchor, and anything farther than the cull radius
//! from the crop center is dropped.

use glam::DVec2;
use raiders_config::ViewportConfig;
use raiders_net::{ObjectRecord, PlayerId, WorldSnapshot};

/// Height of the health bar background.
const BAR_HEIGHT: f64 = 6.0;
/// Vertical gap between a player's anchor and the top of its health bar.
const BAR_OFFSET_Y: f64 = 20.0;
/// Horizontal inset of the fill inside the background.
const FILL_INSET: f64 = 3.0;
/// Height of the health and absorption fills.
const FILL_HEIGHT: f64 = 3.0;

/// Axis-aligned rectangle in layout pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }
}

/// The crop window for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// World-space top-left corner of the crop.
    pub origin: DVec2,
    /// Side length of the square crop.
    pub size: f64,
    /// The local player's position inside the crop, y growing upward.
    pub relative_pos: DVec2,
}

impl Viewport {
    /// World-space center of the crop.
    pub fn center(&self) -> DVec2 {
        self.origin + DVec2::splat(self.size / 2.0)
    }
}

/// An object that survived culling, with its layout position.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedObject<'a> {
    pub record: &'a ObjectRecord,
    pub screen_pos: DVec2,
}

/// Draw parameters for one player's health bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthBar {
    /// Layout position of the player the bar belongs to.
    pub screen_pos: DVec2,
    /// `health / max_health`; above 1 when absorption is active.
    pub health_ratio: f64,
    /// `health_ratio - 1` when positive, otherwise 0.
    pub absorption_ratio: f64,
    pub background: Rect,
    pub foreground: Rect,
    /// Present only when `health_ratio > 1`.
    pub absorption: Option<Rect>,
}

/// Everything the renderer needs for one tick, borrowed from the snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout<'a> {
    pub viewport: Viewport,
    pub objects: Vec<ProjectedObject<'a>>,
    pub health_bars: Vec<HealthBar>,
}

/// Reasons a snapshot cannot be laid out.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectError {
    /// The snapshot has no position for the local player.
    #[error("snapshot has no position for player {0}")]
    UnknownPlayer(PlayerId),

    /// The local player's position is NaN or infinite.
    #[error("player {0} has a non-finite position")]
    NonFinitePosition(PlayerId),

    /// The frame announced a world with no area.
    #[error("world size {0}x{1} is empty")]
    EmptyWorld(u32, u32),
}

/// Lays snapshots out around the local player.
#[derive(Debug, Clone)]
pub struct ViewportProjector {
    settings: ViewportConfig,
}

impl Default for ViewportProjector {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl ViewportProjector {
    pub fn new(settings: ViewportConfig) -> Self {
        Self { settings }
    }

    /// Side length of the crop.
    pub fn size(&self) -> f64 {
        self.settings.size
    }

    /// Compute the crop window for a player at world position `player`.
    pub fn viewport(&self, player: DVec2, world_size: (u32, u32)) -> Viewport {
        let size = self.settings.size;
        let origin = DVec2::new(
            clamp_origin(player.x, f64::from(world_size.0), size),
            clamp_origin(player.y, f64::from(world_size.1), size),
        );
        let relative_pos = DVec2::new(player.x - origin.x, size - (player.y - origin.y));
        Viewport {
            origin,
            size,
            relative_pos,
        }
    }

    /// Lay out `snapshot` for `player_id` in a world of `world_size`.
    pub fn project<'a>(
        &self,
        snapshot: &'a WorldSnapshot,
        player_id: PlayerId,
        world_size: (u32, u32),
    ) -> Result<Layout<'a>, ProjectError> {
        if world_size.0 == 0 || world_size.1 == 0 {
            return Err(ProjectError::EmptyWorld(world_size.0, world_size.1));
        }
        let &(px, py) = snapshot
            .positions
            .get(&player_id)
            .ok_or(ProjectError::UnknownPlayer(player_id))?;
        let player = DVec2::new(px, py);
        if !player.is_finite() {
            return Err(ProjectError::NonFinitePosition(player_id));
        }

        let viewport = self.viewport(player, world_size);
        let center = viewport.center();
        // Layout position of the world point under the player.
        let anchor = DVec2::new(
            viewport.relative_pos.x,
            viewport.size - viewport.relative_pos.y,
        );

        let objects: Vec<ProjectedObject<'a>> = snapshot
            .objects
            .iter()
            .filter_map(|record| {
                let pos = DVec2::new(record.x, record.y);
                // NaN distances fail this test too, so malformed objects are culled.
                if !(pos.distance(center) <= self.settings.cull_radius) {
                    return None;
                }
                Some(ProjectedObject {
                    record,
                    screen_pos: pos - player + anchor,
                })
            })
            .collect();

        let health_bars = objects
            .iter()
            .filter_map(|obj| {
                obj.record
                    .health()
                    .and_then(|health| self.health_bar(obj.screen_pos, health))
            })
            .collect();

        Ok(Layout {
            viewport,
            objects,
            health_bars,
        })
    }

    /// Health bar geometry for a player drawn at `screen_pos`, or `None` if
    /// the player has no health left.
    pub fn health_bar(&self, screen_pos: DVec2, health: f64) -> Option<HealthBar> {
        if !(health > 0.0) {
            return None;
        }

        let width = self.settings.health_bar_width;
        let fill_width = width - FILL_INSET;
        let fill_y = screen_pos.y + BAR_OFFSET_Y + 1.0;
        let health_ratio = health / self.settings.max_health;
        let absorption_ratio = (health_ratio - 1.0).max(0.0);

        let background = Rect::new(
            screen_pos.x - width / 2.0,
            screen_pos.y + BAR_OFFSET_Y,
            width,
            BAR_HEIGHT,
        );
        let foreground = Rect::new(
            screen_pos.x - fill_width / 2.0,
            fill_y,
            fill_width * health_ratio.min(1.0),
            FILL_HEIGHT,
        );
        let absorption = (health_ratio > 1.0).then(|| {
            let w = fill_width * absorption_ratio;
            Rect::new(screen_pos.x - w / 2.0, fill_y, w, FILL_HEIGHT)
        });

        Some(HealthBar {
            screen_pos,
            health_ratio,
            absorption_ratio,
            background,
            foreground,
            absorption,
        })
    }
}

/// Crop origin along one axis: centered on `pos`, truncated to whole pixels,
/// then clamped into `[0, dim - size]` (0 when the world is smaller than the crop).
fn clamp_origin(pos: f64, dim: f64, size: f64) -> f64 {
    (pos - size / 2.0).trunc().min(dim - size).max(0.0)
}
