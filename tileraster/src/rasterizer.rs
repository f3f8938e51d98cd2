//! Drawing sorted primitives onto a [`Canvas`].

use std::collections::HashMap;

use geo::Contains;
use geo_types::{Coord, LineString, Point, Polygon, Rect, coord};
use log::{debug, trace, warn};

use crate::canvas::Canvas;
use crate::context::{
    QueryController, RasterizerEnvironment, RenderArea, ShadowMode, is_aborted,
};
use crate::evaluator::{EvaluationResult, StyleEvaluator};
use crate::feature::{MapFeature, TagValue};
use crate::paint::{BlurLooper, DashPattern, FillRule, LineCap, MapPath, Paint, PaintStyle};
use crate::primitives::{Primitive, Primitives, obtain_primitives};
use crate::style::RulesetType;
use crate::value::{ValueDefId, builtin};

/// Stroke layers of a line, in the order they are drawn. Named after the style output suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSet {
    /// `__1`
    Minus2,
    /// `_0`
    Minus1,
    /// No suffix. Also the fill of polygons.
    Zero,
    /// `_2`. Also the outline of polygons.
    One,
    /// `_3`
    Three,
}

impl ValueSet {
    pub const LINE_LAYERS: [ValueSet; 5] = [
        ValueSet::Minus2,
        ValueSet::Minus1,
        ValueSet::Zero,
        ValueSet::One,
        ValueSet::Three,
    ];

    /// Color, stroke width, cap and path effect.
    fn definitions(self) -> [ValueDefId; 4] {
        match self {
            ValueSet::Zero => [
                builtin::OUTPUT_COLOR,
                builtin::OUTPUT_STROKE_WIDTH,
                builtin::OUTPUT_CAP,
                builtin::OUTPUT_PATH_EFFECT,
            ],
            ValueSet::One => [
                builtin::OUTPUT_COLOR_2,
                builtin::OUTPUT_STROKE_WIDTH_2,
                builtin::OUTPUT_CAP_2,
                builtin::OUTPUT_PATH_EFFECT_2,
            ],
            ValueSet::Minus1 => [
                builtin::OUTPUT_COLOR_0,
                builtin::OUTPUT_STROKE_WIDTH_0,
                builtin::OUTPUT_CAP_0,
                builtin::OUTPUT_PATH_EFFECT_0,
            ],
            ValueSet::Minus2 => [
                builtin::OUTPUT_COLOR__1,
                builtin::OUTPUT_STROKE_WIDTH__1,
                builtin::OUTPUT_CAP__1,
                builtin::OUTPUT_PATH_EFFECT__1,
            ],
            ValueSet::Three => [
                builtin::OUTPUT_COLOR_3,
                builtin::OUTPUT_STROKE_WIDTH_3,
                builtin::OUTPUT_CAP_3,
                builtin::OUTPUT_PATH_EFFECT_3,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OneWay {
    Forward,
    Reverse,
}

const LEFT: u8 = 1;
const RIGHT: u8 = 2;
const TOP: u8 = 4;
const BOTTOM: u8 = 8;

/// Evaluators and the result reused for every primitive of a pass.
struct Scratch<'a> {
    polygon: StyleEvaluator<'a>,
    line: StyleEvaluator<'a>,
    result: EvaluationResult,
}

impl<'a> Scratch<'a> {
    fn new(environment: &'a RasterizerEnvironment) -> Self {
        let style = environment.style.as_ref();
        let density = environment.config.display_density;
        Self {
            polygon: StyleEvaluator::new(style, RulesetType::Polygon, density),
            line: StyleEvaluator::new(style, RulesetType::Line, density),
            result: EvaluationResult::new(),
        }
    }
}

/// Draws primitives of a single [`RenderArea`]. Holds the paint being set up and a cache of
/// dash patterns, so it should not be shared between threads, but it is cheap to create.
pub struct Rasterizer<'e> {
    environment: &'e RasterizerEnvironment,
    area: RenderArea,
    viewport: Rect<f32>,
    paint: Paint,
    path_effects: HashMap<String, Option<DashPattern>>,
}

impl<'e> Rasterizer<'e> {
    pub fn new(environment: &'e RasterizerEnvironment, area: RenderArea) -> Self {
        Self {
            environment,
            area,
            viewport: area.viewport(),
            paint: Paint::default(),
            path_effects: HashMap::new(),
        }
    }

    pub fn area(&self) -> &RenderArea {
        &self.area
    }

    /// See [`crate::obtain_primitives`].
    pub fn obtain_primitives<'f>(
        &self,
        features: &'f [MapFeature],
        controller: Option<&dyn QueryController>,
    ) -> Option<Primitives<'f>> {
        obtain_primitives(self.environment, &self.area, features, controller)
    }

    /// Draw polygons, then line shadows if they have a pass of their own, then lines. Returns
    /// `false` if aborted.
    pub fn rasterize(
        &mut self,
        canvas: &mut dyn Canvas,
        primitives: &Primitives<'_>,
        fill_background: bool,
        controller: Option<&dyn QueryController>,
    ) -> bool {
        let environment = self.environment;
        let config = &environment.config;
        let mut scratch = Scratch::new(environment);

        if fill_background {
            let min = self.viewport.min();
            let max = self.viewport.max();
            let mut background: MapPath = [
                min,
                coord! { x: max.x, y: min.y },
                max,
                coord! { x: min.x, y: max.y },
                min,
            ]
            .into_iter()
            .collect();
            background.fill_rule = FillRule::Winding;
            canvas.draw_path(&background, &Paint::fill(config.default_color));
        }

        let min_size = config.polygon_min_size_to_display;
        for primitive in &primitives.polygons {
            if is_aborted(controller) {
                return false;
            }

            // Sorted by size, so all the remaining ones are too small as well.
            if primitive.z_order < min_size {
                trace!("Remaining polygons are smaller than {min_size}.");
                break;
            }

            if !self.rasterize_polygon(canvas, primitive, &mut scratch, controller) {
                return false;
            }
        }

        if config.shadow_mode.has_shadow_pass() {
            for primitive in &primitives.lines {
                if is_aborted(controller) {
                    return false;
                }

                if primitives.casts_shadow(primitive.z_order)
                    && !self.rasterize_line(canvas, primitive, &mut scratch, true, controller)
                {
                    return false;
                }
            }
        }

        for primitive in &primitives.lines {
            if is_aborted(controller) {
                return false;
            }

            if !self.rasterize_line(canvas, primitive, &mut scratch, false, controller) {
                return false;
            }
        }

        true
    }

    fn evaluate<'a>(
        &self,
        evaluator: &mut StyleEvaluator<'a>,
        feature: &'a MapFeature,
        tag_value: &TagValue,
        layer: Option<i32>,
        result: &mut EvaluationResult,
    ) -> bool {
        let zoom = i32::from(self.area.zoom.get());

        evaluator.reset();
        evaluator.set_feature(Some(feature));
        self.environment.apply_context(evaluator);
        evaluator.set_string_value(builtin::INPUT_TAG, &tag_value.tag);
        evaluator.set_string_value(builtin::INPUT_VALUE, &tag_value.value);
        evaluator.set_integer_value(builtin::INPUT_MINZOOM, zoom);
        evaluator.set_integer_value(builtin::INPUT_MAXZOOM, zoom);
        if let Some(layer) = layer {
            evaluator.set_integer_value(builtin::INPUT_LAYER, layer);
        }

        evaluator.evaluate(Some(result), true)
    }

    /// Canvas positions of the points, or `None` if aborted on the way.
    fn project(
        &self,
        points: &[Coord<i32>],
        controller: Option<&dyn QueryController>,
    ) -> Option<Vec<Coord<f32>>> {
        points
            .iter()
            .map(|point| (!is_aborted(controller)).then(|| self.area.project(*point)))
            .collect()
    }

    /// Returns `false` if aborted.
    fn rasterize_polygon<'a>(
        &mut self,
        canvas: &mut dyn Canvas,
        primitive: &Primitive<'a>,
        scratch: &mut Scratch<'a>,
        controller: Option<&dyn QueryController>,
    ) -> bool {
        let feature = primitive.feature;
        if feature.points.len() <= 2 {
            warn!(
                "Feature #{} is drawn as a polygon, but has {} vertices.",
                feature.id,
                feature.points.len()
            );
            return true;
        }
        if !feature.is_closed_figure(false) {
            warn!("Feature #{} is drawn as a polygon, but is not closed.", feature.id);
            return true;
        }
        if !feature.is_closed_figure(true) {
            warn!(
                "Feature #{} is drawn as a polygon, but its inner ring is not closed.",
                feature.id
            );
            return true;
        }

        let Some(tag_value) = primitive.tag_value() else {
            return true;
        };

        if !self.evaluate(&mut scratch.polygon, feature, tag_value, None, &mut scratch.result) {
            trace!("No polygon rule for {}={}.", tag_value.tag, tag_value.value);
            return true;
        }
        if !self.update_paint(&scratch.result, ValueSet::Zero, true) {
            return true;
        }

        let Some(vertices) = self.project(&feature.points, controller) else {
            return false;
        };

        if !self.polygon_intersects(&vertices) {
            trace!("Polygon #{} is outside of the viewport.", feature.id);
            return true;
        }

        let mut path: MapPath = vertices.into_iter().collect();
        if !feature.inner_rings.is_empty() {
            path.fill_rule = FillRule::EvenOdd;
            for ring in &feature.inner_rings {
                let Some(ring) = self.project(ring, controller) else {
                    return false;
                };
                let mut points = ring.into_iter();
                if let Some(first) = points.next() {
                    path.move_to(first);
                    points.for_each(|point| path.line_to(point));
                }
            }
        }

        canvas.draw_path(&path, &self.paint);
        if self.update_paint(&scratch.result, ValueSet::One, false) {
            canvas.draw_path(&path, &self.paint);
        }
        true
    }

    /// Returns `false` if aborted.
    fn rasterize_line<'a>(
        &mut self,
        canvas: &mut dyn Canvas,
        primitive: &Primitive<'a>,
        scratch: &mut Scratch<'a>,
        shadow_only: bool,
        controller: Option<&dyn QueryController>,
    ) -> bool {
        let feature = primitive.feature;
        if feature.points.len() < 2 {
            warn!(
                "Feature #{} is drawn as a line, but has {} vertices.",
                feature.id,
                feature.points.len()
            );
            return true;
        }

        let Some(tag_value) = primitive.tag_value() else {
            return true;
        };

        let layer = Some(feature.simple_layer_value());
        if !self.evaluate(&mut scratch.line, feature, tag_value, layer, &mut scratch.result) {
            trace!("No line rule for {}={}.", tag_value.tag, tag_value.value);
            return true;
        }
        let result = &scratch.result;
        if !self.update_paint(result, ValueSet::Zero, false) {
            return true;
        }

        let shadow_radius = result
            .get_integer(builtin::OUTPUT_SHADOW_RADIUS)
            .unwrap_or(0);
        if shadow_only && shadow_radius == 0 {
            return true;
        }
        let shadow_color = self.shadow_color(result);

        let Some(vertices) = self.project(&feature.points, controller) else {
            return false;
        };

        if !self.line_intersects(&vertices) {
            trace!("Line #{} is outside of the viewport.", feature.id);
            return true;
        }

        let path: MapPath = vertices.into_iter().collect();

        if shadow_only {
            self.rasterize_line_shadow(canvas, &path, shadow_color, shadow_radius);
            return true;
        }

        for value_set in ValueSet::LINE_LAYERS {
            if self.update_paint(result, value_set, false) {
                canvas.draw_path(&path, &self.paint);
            }
        }

        let one_way_paints = match self.one_way(feature, tag_value) {
            Some(OneWay::Forward) => self.environment.one_way_paints(),
            Some(OneWay::Reverse) => self.environment.reverse_one_way_paints(),
            None => &[],
        };
        for paint in one_way_paints {
            canvas.draw_path(&path, paint);
        }
        true
    }

    fn rasterize_line_shadow(
        &mut self,
        canvas: &mut dyn Canvas,
        path: &MapPath,
        color: u32,
        radius: i32,
    ) {
        if radius <= 0 {
            return;
        }

        match self.environment.config.shadow_mode {
            ShadowMode::Blur => {
                self.paint.looper = Some(BlurLooper {
                    radius: radius as f32,
                    color,
                });
            }
            ShadowMode::SolidOutline => {
                self.paint.looper = None;
                self.paint.stroke_width += radius as f32 * 2.;
                self.paint.color_filter = Some(color);
            }
            ShadowMode::Off | ShadowMode::BlurLooper => return,
        }

        canvas.draw_path(path, &self.paint);
    }

    fn shadow_color(&self, result: &EvaluationResult) -> u32 {
        match result.get_color(builtin::OUTPUT_SHADOW_COLOR) {
            Some(color) if color != 0 => color,
            _ => self.environment.config.shadow_color,
        }
    }

    fn one_way(&self, feature: &MapFeature, tag_value: &TagValue) -> Option<OneWay> {
        if self.area.zoom.get() < self.environment.config.one_way_min_zoom
            || tag_value.tag != "highway"
        {
            return None;
        }

        if feature.contains_type("oneway", "yes", true) {
            Some(OneWay::Forward)
        } else if feature.contains_type("oneway", "-1", true) {
            Some(OneWay::Reverse)
        } else {
            None
        }
    }

    /// Set up the paint from one value set of the result. Returns `false` if the value set
    /// should not be drawn.
    pub fn update_paint(
        &mut self,
        result: &EvaluationResult,
        value_set: ValueSet,
        is_area: bool,
    ) -> bool {
        let [color, stroke_width, cap, path_effect] = value_set.definitions();
        let mut paint = Paint::default();

        if is_area {
            paint.style = PaintStyle::Fill;
        } else {
            let width = result.get_float(stroke_width).unwrap_or(0.);
            if !(width > 0.) {
                return false;
            }

            paint.style = PaintStyle::Stroke;
            paint.stroke_width = width;
            paint.cap = result
                .get_string(cap)
                .map(LineCap::from_name)
                .unwrap_or_default();
            paint.dash = result
                .get_string(path_effect)
                .and_then(|effect| self.path_effect(effect));
        }

        paint.color = result.get_color(color).unwrap_or(0);
        if paint.color == 0 {
            debug!("{value_set:?} has no color.");
            return false;
        }

        if value_set == ValueSet::Zero {
            paint.shader = result
                .get_string(builtin::OUTPUT_SHADER)
                .filter(|shader| !shader.is_empty())
                .map(str::to_owned);

            if self.environment.config.shadow_mode == ShadowMode::BlurLooper {
                let shadow_color = self.shadow_color(result);
                let radius = result
                    .get_integer(builtin::OUTPUT_SHADOW_RADIUS)
                    .unwrap_or(0);
                if shadow_color != 0 && radius > 0 {
                    paint.looper = Some(BlurLooper {
                        radius: radius as f32,
                        color: shadow_color,
                    });
                }
            }
        }

        self.paint = paint;
        true
    }

    /// The paint set up by the last successful [`Self::update_paint`].
    pub fn paint(&self) -> &Paint {
        &self.paint
    }

    fn path_effect(&mut self, effect: &str) -> Option<DashPattern> {
        if let Some(pattern) = self.path_effects.get(effect) {
            return pattern.clone();
        }

        let pattern = DashPattern::parse(effect, self.environment.config.display_density);
        self.path_effects
            .insert(effect.to_owned(), pattern.clone());
        pattern
    }

    fn out_flags(&self, vertex: Coord<f32>) -> u8 {
        let min = self.viewport.min();
        let max = self.viewport.max();
        let mut flags = 0;
        if vertex.x < min.x {
            flags |= LEFT;
        }
        if vertex.x > max.x {
            flags |= RIGHT;
        }
        if vertex.y < min.y {
            flags |= TOP;
        }
        if vertex.y > max.y {
            flags |= BOTTOM;
        }
        flags
    }

    fn is_inside(&self, vertex: Coord<f32>) -> bool {
        let min = self.viewport.min();
        let max = self.viewport.max();
        vertex.x >= min.x && vertex.y >= min.y && vertex.x < max.x && vertex.y < max.y
    }

    /// A vertex inside the viewport, or two consecutive ones which are not both beyond the
    /// same edge.
    fn line_intersects(&self, vertices: &[Coord<f32>]) -> bool {
        let mut previous = None;
        for vertex in vertices {
            if self.is_inside(*vertex) {
                return true;
            }

            let flags = self.out_flags(*vertex);
            if previous.is_some_and(|previous| previous & flags == 0) {
                return true;
            }
            previous = Some(flags);
        }
        false
    }

    /// Like [`Self::line_intersects`], but a polygon can also cover the viewport without any of
    /// its edges crossing it.
    fn polygon_intersects(&self, vertices: &[Coord<f32>]) -> bool {
        if vertices.iter().any(|vertex| self.is_inside(*vertex)) {
            return true;
        }

        let flags: Vec<u8> = vertices.iter().map(|vertex| self.out_flags(*vertex)).collect();
        if flags.iter().fold(LEFT | RIGHT | TOP | BOTTOM, |all, f| all & f) != 0 {
            return false;
        }

        let polygon = Polygon::new(
            vertices
                .iter()
                .map(|vertex| (f64::from(vertex.x), f64::from(vertex.y)))
                .collect::<LineString<f64>>(),
            Vec::new(),
        );
        let min = self.viewport.min();
        let max = self.viewport.max();
        let corners = [
            (min.x, min.y),
            (max.x, min.y),
            (max.x, max.y),
            (min.x, max.y),
        ];
        if corners
            .iter()
            .any(|&(x, y)| polygon.contains(&Point::new(f64::from(x), f64::from(y))))
        {
            return true;
        }

        flags.windows(2).any(|pair| pair[0] & pair[1] == 0)
    }
}

/// Obtain primitives of the features and draw them. Returns `false` if aborted.
pub fn rasterize_map(
    environment: &RasterizerEnvironment,
    area: RenderArea,
    features: &[MapFeature],
    canvas: &mut dyn Canvas,
    fill_background: bool,
    controller: Option<&dyn QueryController>,
) -> bool {
    let mut rasterizer = Rasterizer::new(environment, area);
    let Some(primitives) = rasterizer.obtain_primitives(features, controller) else {
        return false;
    };
    rasterizer.rasterize(canvas, &primitives, fill_background, controller)
}
