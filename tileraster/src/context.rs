//! Everything a rasterization pass needs to know besides the features themselves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use geo_types::{Coord, Rect, coord};

use crate::evaluator::StyleEvaluator;
use crate::mercator::{TileId, tile_divisor};
use crate::paint::{DashPattern, Paint};
use crate::style::Style;
use crate::value::{Value, ValueDefId};
use crate::zoom::{InvalidZoom, ZoomLevel};

/// Lets the caller stop a pass early. Checked for every feature, every primitive and every
/// vertex that is visited.
pub trait QueryController {
    fn is_aborted(&self) -> bool;
}

impl QueryController for AtomicBool {
    fn is_aborted(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

pub(crate) fn is_aborted(controller: Option<&dyn QueryController>) -> bool {
    controller.is_some_and(QueryController::is_aborted)
}

/// How line shadows are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(try_from = "u8")]
pub enum ShadowMode {
    #[default]
    Off,
    /// Blur attached to the main stroke of every line which asks for it.
    BlurLooper,
    /// Separate pass of blurred strokes beneath all lines.
    Blur,
    /// Separate pass of widened, recolored strokes beneath all lines.
    SolidOutline,
}

impl TryFrom<u8> for ShadowMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ShadowMode::Off),
            1 => Ok(ShadowMode::BlurLooper),
            2 => Ok(ShadowMode::Blur),
            3 => Ok(ShadowMode::SolidOutline),
            other => Err(format!("invalid shadow mode {other}")),
        }
    }
}

impl ShadowMode {
    /// Whether shadows get a pass of their own.
    pub fn has_shadow_pass(self) -> bool {
        matches!(self, ShadowMode::Blur | ShadowMode::SolidOutline)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
#[serde(default)]
pub struct RasterizerConfig {
    /// Background, ARGB. Zero leaves the canvas untouched.
    pub default_color: u32,
    pub shadow_mode: ShadowMode,
    /// Used for shadows of lines which do not define their own color.
    pub shadow_color: u32,
    /// Polygons with smaller scaled area are not drawn as polygons, only as points.
    pub polygon_min_area: f64,
    /// Polygons with smaller scaled area are not drawn at all.
    pub polygon_min_size_to_display: f64,
    /// Offset added to the zoom to get the grid of the road density filter.
    pub road_density_zoom_tile: u8,
    pub roads_density_limit_per_tile: u32,
    pub one_way_min_zoom: u8,
    pub display_density: f32,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        Self {
            default_color: 0,
            shadow_mode: ShadowMode::Off,
            shadow_color: 0,
            polygon_min_area: 75.,
            polygon_min_size_to_display: 0.,
            road_density_zoom_tile: 0,
            roads_density_limit_per_tile: 0,
            one_way_min_zoom: 16,
            display_density: 1.,
        }
    }
}

impl RasterizerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Part of the map being rasterized and where it lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderArea {
    pub zoom: ZoomLevel,
    /// In tile units at `zoom`.
    pub area: Rect<f64>,
    pub tile_size_px: f32,
    /// Canvas position of the area's top left corner.
    pub origin: Coord<f32>,
}

impl RenderArea {
    pub fn new(zoom: ZoomLevel, area: Rect<f64>, tile_size_px: f32) -> Self {
        Self {
            zoom,
            area,
            tile_size_px,
            origin: coord! { x: 0., y: 0. },
        }
    }

    pub fn for_tile(tile: TileId, tile_size_px: f32) -> Result<Self, InvalidZoom> {
        Ok(Self::new(
            ZoomLevel::try_from(tile.zoom)?,
            tile.bounds(),
            tile_size_px,
        ))
    }

    /// Canvas rectangle covered by the area.
    pub fn viewport(&self) -> Rect<f32> {
        let size = coord! {
            x: (self.area.width() * f64::from(self.tile_size_px)) as f32,
            y: (self.area.height() * f64::from(self.tile_size_px)) as f32,
        };
        Rect::new(self.origin, self.origin + size)
    }

    /// Number of 31-bit units in one tile at this zoom.
    pub fn tile_divisor(&self) -> f64 {
        tile_divisor(self.zoom.get())
    }

    /// Canvas position of a 31-bit point.
    pub fn project(&self, point: Coord<i32>) -> Coord<f32> {
        let divisor = self.tile_divisor();
        let tile_px = f64::from(self.tile_size_px);
        coord! {
            x: ((f64::from(point.x) / divisor - self.area.min().x) * tile_px) as f32 + self.origin.x,
            y: ((f64::from(point.y) / divisor - self.area.min().y) * tile_px) as f32 + self.origin.y,
        }
    }
}

const ONE_WAY_COLOR: u32 = 0xff6f_6f6f;

fn one_way_paints(patterns: [[f32; 4]; 4]) -> Vec<Paint> {
    patterns
        .into_iter()
        .zip(1..)
        .map(|(intervals, width)| {
            Paint::stroke(ONE_WAY_COLOR, width as f32)
                .with_dash(DashPattern::new(intervals.to_vec(), 1.))
        })
        .collect()
}

/// Shared, read-only setup of rasterization passes. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RasterizerEnvironment {
    pub style: Arc<Style>,
    pub config: RasterizerConfig,
    properties: Vec<(ValueDefId, Value)>,
    one_way_paints: Vec<Paint>,
    reverse_one_way_paints: Vec<Paint>,
}

impl RasterizerEnvironment {
    pub fn new(style: Arc<Style>, config: RasterizerConfig) -> Self {
        Self {
            style,
            config,
            properties: Vec::new(),
            one_way_paints: one_way_paints([
                [0., 12., 10., 152.],
                [0., 12., 9., 153.],
                [0., 18., 2., 154.],
                [0., 18., 1., 155.],
            ]),
            reverse_one_way_paints: one_way_paints([
                [0., 12., 10., 152.],
                [0., 13., 9., 152.],
                [0., 14., 2., 158.],
                [0., 15., 1., 158.],
            ]),
        }
    }

    /// Set a style property, e.g. `nightMode`, for every evaluation. Unknown names are ignored.
    pub fn set_property(&mut self, name: &str, value: Value) -> bool {
        let Some(definition) = self.style.value_definition(name) else {
            log::debug!("Style has no property '{name}'.");
            return false;
        };

        let id = definition.id;
        match self.properties.iter_mut().find(|(d, _)| *d == id) {
            Some((_, existing)) => *existing = value,
            None => self.properties.push((id, value)),
        }
        true
    }

    /// Like [`Self::set_property`], for string values, which have to be known to the style.
    pub fn set_string_property(&mut self, name: &str, value: &str) -> bool {
        let id = self.style.string_id(value);
        self.set_property(name, Value::String(id))
    }

    /// Put the properties into the evaluator's inputs.
    pub fn apply_context(&self, evaluator: &mut StyleEvaluator<'_>) {
        for (definition, value) in &self.properties {
            evaluator.set_value(*definition, *value);
        }
    }

    pub fn one_way_paints(&self) -> &[Paint] {
        &self.one_way_paints
    }

    pub fn reverse_one_way_paints(&self) -> &[Paint] {
        &self.reverse_one_way_paints
    }
}
