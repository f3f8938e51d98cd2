//! Drawing backends.

use crate::paint::{MapPath, Paint};

/// Something the rasterizer draws onto. Paths are already in pixel space.
pub trait Canvas {
    fn draw_path(&mut self, path: &MapPath, paint: &Paint);
}

impl<T: Canvas + ?Sized> Canvas for &mut T {
    fn draw_path(&mut self, path: &MapPath, paint: &Paint) {
        (**self).draw_path(path, paint);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub path: MapPath,
    pub paint: Paint,
}

/// Canvas which only remembers what was drawn on it.
#[derive(Debug, Default, Clone)]
pub struct RecordingCanvas {
    pub calls: Vec<DrawCall>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paints of all drawn paths, in order.
    pub fn paints(&self) -> impl Iterator<Item = &Paint> {
        self.calls.iter().map(|call| &call.paint)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl Canvas for RecordingCanvas {
    fn draw_path(&mut self, path: &MapPath, paint: &Paint) {
        self.calls.push(DrawCall {
            path: path.clone(),
            paint: paint.clone(),
        });
    }
}
