//! Per-tick draw lists handed to the [`Renderer`](crate::render::Renderer).
//!
//! A [`Scene`] has two layers. The world layer is in layout space (the square
//! crop around the player); the renderer stretches it to the window and flips
//! it vertically. The HUD layer is already in window pixels and is drawn on
//! top after the flip.

use glam::DVec2;
use raiders_net::{ObjectRecord, PlayerId, WorldSnapshot};

use crate::viewport::{Layout, Rect};

/// 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Grass fill behind the world layer.
pub const BACKGROUND: Color = Color::rgb(100, 170, 70);
pub const BAR_BACKGROUND: Color = Color::rgb(40, 40, 40);
pub const BAR_HEALTH: Color = Color::rgb(140, 210, 100);
pub const BAR_ABSORPTION: Color = Color::rgb(255, 220, 90);
pub const TEXT: Color = Color::rgb(255, 255, 255);

/// Resources shown in the HUD, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Food,
    Wood,
    Stone,
}

/// HUD rows: resource and its vertical offset from the bottom-anchored layout band.
const HUD_ROWS: [(Resource, f64); 3] = [
    (Resource::Food, 420.0),
    (Resource::Wood, 470.0),
    (Resource::Stone, 520.0),
];
const HUD_ICON_X: f64 = 15.0;
const HUD_TEXT_X: f64 = 60.0;
const HUD_TEXT_DY: f64 = 10.0;

/// One primitive for the renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// A world object, drawn according to its kind.
    Object { record: ObjectRecord, pos: DVec2 },
    /// A filled rectangle.
    Rect { rect: Rect, color: Color },
    /// A resource icon with its top-left corner at `pos`.
    Icon { resource: Resource, pos: DVec2 },
    /// A line of text with its top-left corner at `pos`.
    Text { text: String, pos: DVec2, color: Color },
}

/// The local player's resource counts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResourceCounters {
    pub food: f64,
    pub wood: f64,
    pub stone: f64,
}

impl ResourceCounters {
    /// Counts for `player_id`; a player missing from a map counts as 0.
    pub fn for_player(snapshot: &WorldSnapshot, player_id: PlayerId) -> Self {
        let get = |map: &std::collections::HashMap<PlayerId, f64>| {
            map.get(&player_id).copied().unwrap_or_default()
        };
        Self {
            food: get(&snapshot.food),
            wood: get(&snapshot.wood),
            stone: get(&snapshot.stone),
        }
    }

    pub fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Food => self.food,
            Resource::Wood => self.wood,
            Resource::Stone => self.stone,
        }
    }
}

/// Everything drawn for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Side of the square world layer in layout pixels.
    pub layout_size: f64,
    pub background: Color,
    /// Layout-space commands, in draw order.
    pub world: Vec<DrawCommand>,
    /// Window-space commands, in draw order.
    pub hud: Vec<DrawCommand>,
}

impl Scene {
    /// Build the draw lists for a projected layout and the HUD counters.
    ///
    /// Objects are drawn in snapshot order, then every health bar on top.
    pub fn compose(layout: &Layout<'_>, counters: &ResourceCounters, window_size: (u32, u32)) -> Self {
        let layout_size = layout.viewport.size;

        let mut world: Vec<DrawCommand> = layout
            .objects
            .iter()
            .map(|obj| DrawCommand::Object {
                record: obj.record.clone(),
                pos: obj.screen_pos,
            })
            .collect();

        for bar in &layout.health_bars {
            world.push(DrawCommand::Rect {
                rect: bar.background,
                color: BAR_BACKGROUND,
            });
            world.push(DrawCommand::Rect {
                rect: bar.foreground,
                color: BAR_HEALTH,
            });
            if let Some(rect) = bar.absorption {
                world.push(DrawCommand::Rect {
                    rect,
                    color: BAR_ABSORPTION,
                });
            }
        }

        // The HUD band is anchored to the bottom of the window.
        let band_top = f64::from(window_size.1) - layout_size;
        let mut hud = Vec::with_capacity(HUD_ROWS.len() * 2);
        for (resource, dy) in HUD_ROWS {
            let y = band_top + dy;
            hud.push(DrawCommand::Icon {
                resource,
                pos: DVec2::new(HUD_ICON_X, y),
            });
            hud.push(DrawCommand::Text {
                text: format!("{}", counters.get(resource).trunc() as i64),
                pos: DVec2::new(HUD_TEXT_X, y + HUD_TEXT_DY),
                color: TEXT,
            });
        }

        Self {
            layout_size,
            background: BACKGROUND,
            world,
            hud,
        }
    }

    /// Health bar foreground and absorption rectangles, in draw order.
    pub fn bar_fills(&self) -> impl Iterator<Item = (&Rect, Color)> {
        self.world.iter().filter_map(|cmd| match cmd {
            DrawCommand::Rect { rect, color } if *color != BAR_BACKGROUND => Some((rect, *color)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::ViewportProjector;

    fn snapshot() -> WorldSnapshot {
        let mut snapshot = WorldSnapshot::default();
        snapshot.positions.insert(1, (500.0, 500.0));
        snapshot.objects = vec![
            ObjectRecord::new(3, 520.0, 500.0, 0.0),
            ObjectRecord::new(-1, 500.0, 500.0, 25.0),
        ];
        snapshot.food.insert(1, 12.9);
        snapshot.wood.insert(1, 3.0);
        snapshot
    }

    #[test]
    fn test_counters_default_to_zero() {
        let counters = ResourceCounters::for_player(&snapshot(), 1);
        assert_eq!(counters.food, 12.9);
        assert_eq!(counters.wood, 3.0);
        assert_eq!(counters.stone, 0.0);
        assert_eq!(ResourceCounters::for_player(&snapshot(), 9), ResourceCounters::default());
    }

    #[test]
    fn test_world_layer_objects_then_bars() {
        let snapshot = snapshot();
        let layout = ViewportProjector::default()
            .project(&snapshot, 1, (1000, 1000))
            .unwrap();
        let scene = Scene::compose(&layout, &ResourceCounters::default(), (800, 800));

        assert_eq!(scene.world.len(), 2 + 3);
        assert!(matches!(scene.world[0], DrawCommand::Object { ref record, .. } if record.kind == 3));
        assert!(matches!(scene.world[1], DrawCommand::Object { ref record, .. } if record.kind == -1));
        assert!(matches!(
            scene.world[2],
            DrawCommand::Rect {
                color: BAR_BACKGROUND,
                ..
            }
        ));
        let fills: Vec<Color> = scene.bar_fills().map(|(_, c)| c).collect();
        assert_eq!(fills, vec![BAR_HEALTH, BAR_ABSORPTION]);
    }

    #[test]
    fn test_hud_rows_anchor_to_window_bottom() {
        let snapshot = snapshot();
        let layout = ViewportProjector::default()
            .project(&snapshot, 1, (1000, 1000))
            .unwrap();
        let counters = ResourceCounters::for_player(&snapshot, 1);
        let scene = Scene::compose(&layout, &counters, (800, 800));

        assert_eq!(
            scene.hud[0],
            DrawCommand::Icon {
                resource: Resource::Food,
                pos: DVec2::new(15.0, 620.0)
            }
        );
        assert_eq!(
            scene.hud[1],
            DrawCommand::Text {
                text: "12".to_string(),
                pos: DVec2::new(60.0, 630.0),
                color: TEXT
            }
        );
        assert!(matches!(
            scene.hud[5],
            DrawCommand::Text { ref text, pos, .. } if text == "0" && pos.y == 730.0
        ));
    }
}
