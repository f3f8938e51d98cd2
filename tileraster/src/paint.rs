//! Paint state and paths, independent of any drawing backend.

use geo_types::Coord;

use crate::style::parse_complex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaintStyle {
    #[default]
    Fill,
    Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    /// Parses style's cap names, anything unknown being [`LineCap::Butt`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "ROUND" => LineCap::Round,
            "SQUARE" => LineCap::Square,
            _ => LineCap::Butt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    Winding,
    EvenOdd,
}

/// Alternating on/off lengths of a dashed stroke.
#[derive(Debug, Clone, PartialEq)]
pub struct DashPattern {
    pub intervals: Vec<f32>,
    pub phase: f32,
}

impl DashPattern {
    pub fn new(intervals: Vec<f32>, phase: f32) -> Self {
        Self { intervals, phase }
    }

    /// Parse an underscore-separated list of lengths, e.g. `4_2` or `2:1_3`. Lengths which are
    /// not numbers count as zero.
    pub fn parse(effect: &str, density: f32) -> Option<Self> {
        if effect.is_empty() {
            return None;
        }

        let intervals: Vec<f32> = effect
            .split('_')
            .map(|interval| match parse_complex(interval) {
                Some(complex) => complex.evaluate_float(density),
                None => interval.trim().parse().unwrap_or(0.),
            })
            .collect();

        Some(Self::new(intervals, 0.))
    }
}

/// Draws the blurred copy of the shape beneath it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlurLooper {
    pub radius: f32,
    /// ARGB.
    pub color: u32,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Paint {
    pub style: PaintStyle,
    /// ARGB.
    pub color: u32,
    pub stroke_width: f32,
    pub cap: LineCap,
    pub dash: Option<DashPattern>,
    /// Name of a bitmap shader. Resolving it is up to the canvas.
    pub shader: Option<String>,
    pub looper: Option<BlurLooper>,
    /// Replaces the color of whatever is drawn, keeping its alpha (src-in).
    pub color_filter: Option<u32>,
}

impl Paint {
    pub fn stroke(color: u32, width: f32) -> Self {
        Self {
            style: PaintStyle::Stroke,
            color,
            stroke_width: width,
            ..Default::default()
        }
    }

    pub fn fill(color: u32) -> Self {
        Self {
            style: PaintStyle::Fill,
            color,
            ..Default::default()
        }
    }

    pub fn with_dash(mut self, dash: DashPattern) -> Self {
        self.dash = Some(dash);
        self
    }

    pub fn with_cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self
    }
}

/// Pixel-space path made of polylines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapPath {
    contours: Vec<Vec<Coord<f32>>>,
    pub fill_rule: FillRule,
}

impl MapPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, point: Coord<f32>) {
        self.contours.push(vec![point]);
    }

    /// Continues the last contour, or starts one if there is none.
    pub fn line_to(&mut self, point: Coord<f32>) {
        match self.contours.last_mut() {
            Some(contour) => contour.push(point),
            None => self.move_to(point),
        }
    }

    pub fn contours(&self) -> &[Vec<Coord<f32>>] {
        &self.contours
    }

    pub fn is_empty(&self) -> bool {
        self.contours.iter().all(|contour| contour.len() < 2)
    }
}

impl FromIterator<Coord<f32>> for MapPath {
    fn from_iter<T: IntoIterator<Item = Coord<f32>>>(iter: T) -> Self {
        let mut path = MapPath::new();
        let mut points = iter.into_iter();
        if let Some(first) = points.next() {
            path.move_to(first);
            points.for_each(|point| path.line_to(point));
        }
        path
    }
}

/// Split an ARGB color into its RGBA bytes.
pub fn argb_to_rgba(argb: u32) -> [u8; 4] {
    let [a, r, g, b] = argb.to_be_bytes();
    [r, g, b, a]
}
