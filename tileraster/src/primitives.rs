//! Turning features into sorted lists of things to draw.

use std::cmp::Ordering;

use geo::Area;
use geo_types::{LineString, Polygon};
use log::{debug, trace};

use crate::context::{QueryController, RasterizerEnvironment, RenderArea, is_aborted};
use crate::density::filter_lines_by_density;
use crate::evaluator::{EvaluationResult, StyleEvaluator};
use crate::feature::{MapFeature, TagValue};
use crate::style::RulesetType;
use crate::value::{builtin, fuzzy_eq_f64};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Point,
    Line,
    Polygon,
}

impl PrimitiveKind {
    /// Kind as written in the `objectType` output.
    pub fn from_object_type(object_type: i32) -> Option<Self> {
        match object_type {
            1 => Some(PrimitiveKind::Point),
            2 => Some(PrimitiveKind::Line),
            3 => Some(PrimitiveKind::Polygon),
            _ => None,
        }
    }
}

/// One type of a feature, classified and ordered. Lives as long as the rasterization pass.
#[derive(Debug, Clone, Copy)]
pub struct Primitive<'f> {
    pub feature: &'f MapFeature,
    pub kind: PrimitiveKind,
    pub z_order: f64,
    /// Which of the feature's types this is.
    pub type_index: usize,
}

impl<'f> Primitive<'f> {
    pub fn tag_value(&self) -> Option<&'f TagValue> {
        self.feature.types.get(self.type_index)
    }
}

/// Polygons go from the largest, so the small ones are drawn on top.
pub fn compare_polygons(l: &Primitive<'_>, r: &Primitive<'_>) -> Ordering {
    if fuzzy_eq_f64(l.z_order, r.z_order) {
        l.type_index.cmp(&r.type_index)
    } else {
        r.z_order.total_cmp(&l.z_order)
    }
}

/// Lines and points go by ascending order, shorter ones first on ties.
pub fn compare_lines(l: &Primitive<'_>, r: &Primitive<'_>) -> Ordering {
    if fuzzy_eq_f64(l.z_order, r.z_order) {
        l.type_index
            .cmp(&r.type_index)
            .then_with(|| l.feature.points.len().cmp(&r.feature.points.len()))
    } else {
        l.z_order.total_cmp(&r.z_order)
    }
}

#[derive(Debug, Default, Clone)]
pub struct Primitives<'f> {
    pub polygons: Vec<Primitive<'f>>,
    pub lines: Vec<Primitive<'f>>,
    pub points: Vec<Primitive<'f>>,
    /// Lowest and highest order of the types which cast shadows.
    pub shadow_levels: Option<(i32, i32)>,
}

impl Primitives<'_> {
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty() && self.lines.is_empty() && self.points.is_empty()
    }

    pub fn casts_shadow(&self, z_order: f64) -> bool {
        self.shadow_levels
            .is_some_and(|(min, max)| f64::from(min) <= z_order && z_order <= f64::from(max))
    }

    fn track_shadow_level(&mut self, order: i32) {
        self.shadow_levels = Some(match self.shadow_levels {
            Some((min, max)) => (min.min(order), max.max(order)),
            None => (order, order),
        });
    }
}

/// Converts an area in 31-bit units into one in pixels of a 256 px tile at the given zoom.
fn area_scale(zoom: u8) -> f64 {
    let shift = 31i32 - (i32::from(zoom) + 8);
    let mult = 1. / 2f64.powi(shift.max(0));
    mult * mult
}

fn ring_area(ring: &[geo_types::Coord<i32>]) -> f64 {
    let exterior: LineString<f64> = ring
        .iter()
        .map(|point| (f64::from(point.x), f64::from(point.y)))
        .collect();
    Polygon::new(exterior, Vec::new()).unsigned_area()
}

/// Classify every type of every feature using the order ruleset and sort the results. Returns
/// `None` if aborted.
pub fn obtain_primitives<'f>(
    environment: &RasterizerEnvironment,
    area: &RenderArea,
    features: &'f [MapFeature],
    controller: Option<&dyn QueryController>,
) -> Option<Primitives<'f>> {
    let style = environment.style.as_ref();
    let config = &environment.config;
    let zoom = area.zoom.get();
    let scale = area_scale(zoom);

    let mut evaluator = StyleEvaluator::new(style, RulesetType::Order, config.display_density);
    let mut result = EvaluationResult::new();
    let mut primitives = Primitives::default();
    let mut unfiltered_lines = Vec::new();

    for feature in features {
        if is_aborted(controller) {
            return None;
        }

        let layer = feature.simple_layer_value();
        for (type_index, tag_value) in feature.types.iter().enumerate() {
            evaluator.reset();
            evaluator.set_feature(Some(feature));
            environment.apply_context(&mut evaluator);
            evaluator.set_string_value(builtin::INPUT_TAG, &tag_value.tag);
            evaluator.set_string_value(builtin::INPUT_VALUE, &tag_value.value);
            evaluator.set_integer_value(builtin::INPUT_MINZOOM, i32::from(zoom));
            evaluator.set_integer_value(builtin::INPUT_MAXZOOM, i32::from(zoom));
            evaluator.set_integer_value(builtin::INPUT_LAYER, layer);
            evaluator.set_boolean_value(builtin::INPUT_AREA, feature.is_area);
            evaluator.set_boolean_value(builtin::INPUT_POINT, feature.points.len() == 1);
            evaluator.set_boolean_value(builtin::INPUT_CYCLE, feature.is_closed_figure(false));

            if !evaluator.evaluate(Some(&mut result), true) {
                continue;
            }

            let Some(kind) = result
                .get_integer(builtin::OUTPUT_OBJECT_TYPE)
                .and_then(PrimitiveKind::from_object_type)
            else {
                debug!(
                    "Feature #{} matched order rule for {}={} without a valid object type.",
                    feature.id, tag_value.tag, tag_value.value
                );
                continue;
            };

            let order = result.get_integer(builtin::OUTPUT_ORDER).unwrap_or(0);
            let primitive = Primitive {
                feature,
                kind,
                z_order: f64::from(order),
                type_index,
            };

            match kind {
                PrimitiveKind::Polygon => {
                    let z_order = ring_area(&feature.points) * scale;
                    if z_order > config.polygon_min_area {
                        primitives.polygons.push(Primitive {
                            z_order,
                            ..primitive
                        });
                    } else {
                        trace!("Polygon #{} is too small ({z_order}).", feature.id);
                    }
                    primitives.points.push(Primitive {
                        kind: PrimitiveKind::Point,
                        ..primitive
                    });
                }
                PrimitiveKind::Point => primitives.points.push(primitive),
                PrimitiveKind::Line => unfiltered_lines.push(primitive),
            }

            if result
                .get_integer(builtin::OUTPUT_SHADOW_LEVEL)
                .is_some_and(|level| level > 0)
            {
                primitives.track_shadow_level(order);
            }
        }
    }

    primitives.polygons.sort_by(compare_polygons);
    unfiltered_lines.sort_by(compare_lines);
    primitives.lines = filter_lines_by_density(unfiltered_lines, zoom, config, controller)?;
    primitives.points.sort_by(compare_lines);

    debug!(
        "Obtained {} polygons, {} lines and {} points from {} features.",
        primitives.polygons.len(),
        primitives.lines.len(),
        primitives.points.len(),
        features.len()
    );

    Some(primitives)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RasterizerConfig;
    use crate::mercator::TileId;
    use crate::style::{RuleDefinition, StyleBuilder};
    use geo_types::{Coord, coord};
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    fn square(left: i32, top: i32, side: i32) -> Vec<Coord<i32>> {
        vec![
            coord! { x: left, y: top },
            coord! { x: left + side, y: top },
            coord! { x: left + side, y: top + side },
            coord! { x: left, y: top + side },
            coord! { x: left, y: top },
        ]
    }

    fn line(points: usize) -> Vec<Coord<i32>> {
        (0..points as i32).map(|i| coord! { x: i, y: i }).collect()
    }

    fn environment() -> RasterizerEnvironment {
        let mut builder = StyleBuilder::new();
        for rule in [
            RuleDefinition::new()
                .with("tag", "landuse")
                .with("objectType", 3),
            RuleDefinition::new()
                .with("tag", "highway")
                .with("objectType", 2)
                .with("order", 40)
                .with("shadowLevel", 1),
            RuleDefinition::new()
                .with("tag", "highway")
                .with("value", "primary")
                .with("objectType", 2)
                .with("order", 60)
                .with("shadowLevel", 1),
            RuleDefinition::new()
                .with("tag", "highway")
                .with("value", "footway")
                .with("objectType", 2)
                .with("order", 10),
            RuleDefinition::new()
                .with("tag", "amenity")
                .with("objectType", 1)
                .with("order", 5),
            RuleDefinition::new().with("tag", "barrier").with("order", 5),
        ] {
            builder.add_rule(RulesetType::Order, &rule).unwrap();
        }

        RasterizerEnvironment::new(Arc::new(builder.build()), RasterizerConfig::default())
    }

    /// At zoom 15, 256 units of 31-bit space are one pixel.
    fn area() -> RenderArea {
        RenderArea::for_tile(TileId { x: 0, y: 0, zoom: 15 }, 256.).unwrap()
    }

    fn primitive(feature: &MapFeature, z_order: f64, type_index: usize) -> Primitive<'_> {
        Primitive {
            feature,
            kind: PrimitiveKind::Line,
            z_order,
            type_index,
        }
    }

    #[test]
    fn shorter_lines_come_first_on_ties() {
        let short = MapFeature::new(1, line(3));
        let long = MapFeature::new(2, line(7));

        let mut lines = vec![primitive(&long, 5., 2), primitive(&short, 5., 2)];
        lines.sort_by(compare_lines);

        assert_eq!(1, lines[0].feature.id);
        assert_eq!(2, lines[1].feature.id);
    }

    #[test]
    fn line_order() {
        let a = MapFeature::new(1, line(9));
        let b = MapFeature::new(2, line(2));
        let c = MapFeature::new(3, line(2));

        let mut lines = vec![
            primitive(&a, 7., 0),
            primitive(&b, 5.000_000_000_000_01, 1),
            primitive(&c, 5., 0),
        ];
        lines.sort_by(compare_lines);

        let ids: Vec<u64> = lines.iter().map(|p| p.feature.id).collect();
        assert_eq!(vec![3, 2, 1], ids);
    }

    #[test]
    fn polygon_order() {
        let a = MapFeature::new(1, square(0, 0, 10));
        let b = MapFeature::new(2, square(0, 0, 10));
        let c = MapFeature::new(3, square(0, 0, 10));

        let mut polygons = vec![
            primitive(&a, 10., 0),
            primitive(&b, 300., 1),
            primitive(&c, 300., 0),
        ];
        polygons.sort_by(compare_polygons);

        let ids: Vec<u64> = polygons.iter().map(|p| p.feature.id).collect();
        assert_eq!(vec![3, 2, 1], ids);
    }

    #[test]
    fn polygons_are_ordered_by_area() {
        let _ = env_logger::try_init();

        // 20x20 and 40x40 pixels.
        let features = vec![
            MapFeature::new(1, square(0, 0, 20 * 256)).with_type("landuse", "forest"),
            MapFeature::new(2, square(0, 0, 40 * 256)).with_type("landuse", "meadow"),
        ];

        let primitives = obtain_primitives(&environment(), &area(), &features, None).unwrap();

        assert_eq!(2, primitives.polygons.len());
        assert_eq!(2, primitives.polygons[0].feature.id);
        approx::assert_relative_eq!(1600., primitives.polygons[0].z_order);
        approx::assert_relative_eq!(400., primitives.polygons[1].z_order);
    }

    #[test]
    fn small_polygons_become_points_only() {
        let _ = env_logger::try_init();

        let features =
            vec![MapFeature::new(1, square(0, 0, 5 * 256)).with_type("landuse", "forest")];

        let primitives = obtain_primitives(&environment(), &area(), &features, None).unwrap();

        assert!(primitives.polygons.is_empty());
        assert_eq!(1, primitives.points.len());
        assert_eq!(PrimitiveKind::Point, primitives.points[0].kind);
        assert_eq!(0, primitives.points[0].type_index);
    }

    #[test]
    fn large_polygons_are_points_as_well() {
        let features =
            vec![MapFeature::new(1, square(0, 0, 20 * 256)).with_type("landuse", "forest")];

        let primitives = obtain_primitives(&environment(), &area(), &features, None).unwrap();

        assert_eq!(1, primitives.polygons.len());
        assert_eq!(1, primitives.points.len());
    }

    #[test]
    fn every_type_is_classified_independently() {
        let features = vec![
            MapFeature::new(1, line(4))
                .with_type("highway", "primary")
                .with_type("amenity", "parking")
                .with_type("barrier", "fence")
                .with_type("unknown", "tag"),
        ];

        let primitives = obtain_primitives(&environment(), &area(), &features, None).unwrap();

        assert_eq!(1, primitives.lines.len());
        assert_eq!(0, primitives.lines[0].type_index);
        assert_eq!(60., primitives.lines[0].z_order);

        // Barrier has no object type, so only the amenity is a point.
        assert_eq!(1, primitives.points.len());
        assert_eq!(1, primitives.points[0].type_index);
        assert_eq!(Some("amenity"), primitives.points[0].tag_value().map(|t| t.tag.as_str()));
    }

    #[test]
    fn shadow_levels_are_tracked() {
        let features = vec![
            MapFeature::new(1, line(2)).with_type("highway", "primary"),
            MapFeature::new(2, line(2)).with_type("highway", "residential"),
            MapFeature::new(3, line(2)).with_type("highway", "footway"),
        ];

        let primitives = obtain_primitives(&environment(), &area(), &features, None).unwrap();

        assert_eq!(3, primitives.lines.len());
        assert_eq!(Some((40, 60)), primitives.shadow_levels);
        assert!(primitives.casts_shadow(40.));
        assert!(!primitives.casts_shadow(10.));

        let ids: Vec<u64> = primitives.lines.iter().map(|p| p.feature.id).collect();
        assert_eq!(vec![3, 2, 1], ids);
    }

    #[test]
    fn aborting() {
        let features = vec![MapFeature::new(1, line(2)).with_type("highway", "primary")];
        let aborted = AtomicBool::new(true);

        assert!(obtain_primitives(&environment(), &area(), &features, Some(&aborted)).is_none());
    }

    #[test]
    fn area_scale_is_pixels_at_zoom() {
        assert_eq!(1. / 65536., area_scale(15));
        assert_eq!(1., area_scale(23));
        assert_eq!(1., area_scale(25));
    }
}
