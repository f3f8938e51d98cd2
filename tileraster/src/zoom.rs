#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("invalid zoom level")]
pub struct InvalidZoom;

/// Integer zoom level of a rasterization pass.
///
/// Feature coordinates are 31-bit and a tile has 256 (2^8) pixels, so zoom levels above 23 would
/// need sub-unit precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoomLevel(u8);

impl ZoomLevel {
    pub const MAX: u8 = 23;

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ZoomLevel {
    type Error = InvalidZoom;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            Err(InvalidZoom)
        } else {
            Ok(Self(value))
        }
    }
}

impl From<ZoomLevel> for u8 {
    fn from(zoom: ZoomLevel) -> Self {
        zoom.0
    }
}

impl Default for ZoomLevel {
    fn default() -> Self {
        Self(16)
    }
}
