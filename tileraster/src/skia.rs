//! Software canvas backed by tiny-skia.

use log::trace;
use tiny_skia::{
    FillRule as SkiaFillRule, LineCap as SkiaLineCap, Paint as SkiaPaint, Path, PathBuilder,
    Pixmap, Stroke, StrokeDash, Transform,
};

use crate::canvas::Canvas;
use crate::paint::{BlurLooper, FillRule, LineCap, MapPath, Paint, PaintStyle, argb_to_rgba};

/// Number of strokes a blur is approximated with.
const BLUR_STEPS: u8 = 3;

fn to_skia_paint(argb: u32) -> SkiaPaint<'static> {
    let [r, g, b, a] = argb_to_rgba(argb);
    let mut paint = SkiaPaint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

fn to_skia_line_cap(cap: LineCap) -> SkiaLineCap {
    match cap {
        LineCap::Butt => SkiaLineCap::Butt,
        LineCap::Round => SkiaLineCap::Round,
        LineCap::Square => SkiaLineCap::Square,
    }
}

fn to_skia_fill_rule(fill_rule: FillRule) -> SkiaFillRule {
    match fill_rule {
        FillRule::Winding => SkiaFillRule::Winding,
        FillRule::EvenOdd => SkiaFillRule::EvenOdd,
    }
}

fn to_skia_stroke(paint: &Paint, width: f32) -> Stroke {
    Stroke {
        width,
        line_cap: to_skia_line_cap(paint.cap),
        dash: paint
            .dash
            .as_ref()
            .and_then(|dash| StrokeDash::new(dash.intervals.clone(), dash.phase)),
        ..Default::default()
    }
}

fn to_skia_path(path: &MapPath) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for contour in path.contours() {
        let mut points = contour.iter();
        if let Some(first) = points.next() {
            builder.move_to(first.x, first.y);
            for point in points {
                builder.line_to(point.x, point.y);
            }
        }
    }
    builder.finish()
}

/// Color of a paint after its color filter, which keeps the RGB of the filter and multiplies
/// the alphas.
fn filtered_color(paint: &Paint) -> u32 {
    match paint.color_filter {
        Some(filter) => {
            let [fa, fr, fg, fb] = filter.to_be_bytes();
            let [pa, ..] = paint.color.to_be_bytes();
            let alpha = (u16::from(fa) * u16::from(pa) / 255) as u8;
            u32::from_be_bytes([alpha, fr, fg, fb])
        }
        None => paint.color,
    }
}

/// Renders into a [`Pixmap`]. Shaders are not supported and blurs are approximated with a few
/// translucent strokes.
pub struct PixmapCanvas {
    pixmap: Pixmap,
}

impl PixmapCanvas {
    /// `None` if any of the dimensions is zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Pixmap::new(width, height).map(Self::from_pixmap)
    }

    pub fn from_pixmap(pixmap: Pixmap) -> Self {
        Self { pixmap }
    }

    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn into_pixmap(self) -> Pixmap {
        self.pixmap
    }

    /// ARGB color of a pixel, premultiplied.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        let pixel = self.pixmap.pixel(x, y)?;
        Some(u32::from_be_bytes([
            pixel.alpha(),
            pixel.red(),
            pixel.green(),
            pixel.blue(),
        ]))
    }

    /// Hand the pixels over to egui, e.g. to be uploaded as a texture.
    #[cfg(feature = "egui")]
    pub fn to_color_image(&self) -> egui::ColorImage {
        egui::ColorImage::from_rgba_premultiplied(
            [self.pixmap.width() as usize, self.pixmap.height() as usize],
            self.pixmap.data(),
        )
    }

    fn draw_looper(&mut self, path: &Path, paint: &Paint, looper: &BlurLooper) {
        let [r, g, b, a] = argb_to_rgba(looper.color);
        let mut skia_paint = to_skia_paint(0);
        skia_paint.set_color_rgba8(r, g, b, a / BLUR_STEPS);

        for step in (1..=BLUR_STEPS).rev() {
            let spread = looper.radius * f32::from(step) / f32::from(BLUR_STEPS);
            let stroke = to_skia_stroke(paint, paint.stroke_width + 2. * spread);
            self.pixmap
                .stroke_path(path, &skia_paint, &stroke, Transform::identity(), None);
        }
    }
}

impl Canvas for PixmapCanvas {
    fn draw_path(&mut self, path: &MapPath, paint: &Paint) {
        let Some(skia_path) = to_skia_path(path) else {
            trace!("Skipping empty path.");
            return;
        };

        if paint.shader.is_some() {
            trace!("Shaders are not supported, using plain color.");
        }

        if let Some(looper) = &paint.looper {
            self.draw_looper(&skia_path, paint, looper);
        }

        let skia_paint = to_skia_paint(filtered_color(paint));
        match paint.style {
            PaintStyle::Fill => {
                self.pixmap.fill_path(
                    &skia_path,
                    &skia_paint,
                    to_skia_fill_rule(path.fill_rule),
                    Transform::identity(),
                    None,
                );
            }
            PaintStyle::Stroke => {
                let stroke = to_skia_stroke(paint, paint.stroke_width);
                self.pixmap.stroke_path(
                    &skia_path,
                    &skia_paint,
                    &stroke,
                    Transform::identity(),
                    None,
                );
            }
        }
    }
}
