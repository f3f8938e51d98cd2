#![doc = include_str!("../README.md")]
#![deny(clippy::unwrap_used, rustdoc::broken_intra_doc_links)]

mod canvas;
mod context;
mod density;
mod evaluator;
mod feature;
mod mercator;
mod paint;
mod primitives;
mod rasterizer;
mod rule;
#[cfg(feature = "pixmap")]
mod skia;
mod style;
mod value;
mod zoom;

pub use canvas::{Canvas, DrawCall, RecordingCanvas};
pub use context::{
    QueryController, RasterizerConfig, RasterizerEnvironment, RenderArea, ShadowMode,
};
pub use density::filter_lines_by_density;
pub use evaluator::{EvaluationResult, StyleEvaluator};
pub use feature::{MapFeature, TagValue};
pub use mercator::{Position, TileId, lon_lat, position_to_31};
pub use paint::{BlurLooper, DashPattern, FillRule, LineCap, MapPath, Paint, PaintStyle};
pub use primitives::{
    Primitive, PrimitiveKind, Primitives, compare_lines, compare_polygons, obtain_primitives,
};
pub use rasterizer::{Rasterizer, ValueSet, rasterize_map};
pub use rule::{Rule, RuleEntry};
#[cfg(feature = "pixmap")]
pub use skia::PixmapCanvas;
pub use style::{
    AttributeValue, PropertyDefinition, RuleDefinition, RulesetType, Style, StyleBuilder,
    StyleDefinition, StyleError,
};
pub use value::{
    ComplexValue, DataType, RuleValue, StringId, Value, ValueClass, ValueDefId, ValueDefinition,
    builtin,
};
pub use zoom::{InvalidZoom, ZoomLevel};
