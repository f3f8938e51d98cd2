//! Web Mercator in the 31-bit integer space map features are stored in. The whole world spans
//! `0..2^31` on both axes, so shifting right by `31 - zoom` gives the slippy map tile number.
//! <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>

use std::f64::consts::TAU;

use geo_types::{Coord, Rect, coord};

/// Geographical position with longitude as `x` and latitude as `y`.
pub type Position = geo_types::Point;

/// Construct `Position` from longitude and latitude.
pub fn lon_lat(lon: f64, lat: f64) -> Position {
    Position::new(lon, lat)
}

const WORLD_SIZE_31: f64 = (1u64 << 31) as f64;

/// Fraction of the world width (or height) from its top left corner.
fn world_fraction(position: Position) -> Coord<f64> {
    let lat = position.y().to_radians();
    coord! {
        x: 0.5 + position.x().to_radians() / TAU,
        y: 0.5 - lat.tan().asinh() / TAU,
    }
}

pub fn position_to_31(position: Position) -> Coord<i32> {
    let fraction = world_fraction(position);
    let to_31 = |f: f64| (f * WORLD_SIZE_31).clamp(0., WORLD_SIZE_31 - 1.) as i32;
    coord! { x: to_31(fraction.x), y: to_31(fraction.y) }
}

/// How many 31-bit units fit in a single tile at the given zoom.
pub(crate) fn tile_divisor(zoom: u8) -> f64 {
    2f64.powi(31 - i32::from(zoom))
}

/// Slippy map tile.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub struct TileId {
    pub x: u32,
    pub y: u32,
    pub zoom: u8,
}

impl TileId {
    /// Area covered by the tile, in tile units of its own zoom level.
    pub fn bounds(&self) -> Rect<f64> {
        let min = coord! { x: f64::from(self.x), y: f64::from(self.y) };
        Rect::new(min, min + coord! { x: 1., y: 1. })
    }
}
