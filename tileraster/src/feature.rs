//! Vector map features, as delivered by the map data layer.

use geo_types::Coord;

/// A single `tag=value` pair describing what a feature is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagValue {
    pub tag: String,
    pub value: String,
}

impl TagValue {
    pub fn new(tag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            value: value.into(),
        }
    }

    fn is(&self, tag: &str, value: &str) -> bool {
        self.tag == tag && self.value == value
    }
}

/// Immutable vector geometry with its types. Coordinates are in the 31-bit integer space, see
/// [`crate::position_to_31`].
#[derive(Debug, Clone, Default)]
pub struct MapFeature {
    pub id: u64,
    /// Outer ring of a polygon, or the points of a line or a point.
    pub points: Vec<Coord<i32>>,
    /// Holes of a polygon.
    pub inner_rings: Vec<Vec<Coord<i32>>>,
    /// Types, each styled independently.
    pub types: Vec<TagValue>,
    /// Types which are not styled on their own, but can be queried by style rules.
    pub additional_types: Vec<TagValue>,
    pub is_area: bool,
}

impl MapFeature {
    pub fn new(id: u64, points: Vec<Coord<i32>>) -> Self {
        Self {
            id,
            points,
            ..Default::default()
        }
    }

    pub fn with_type(mut self, tag: &str, value: &str) -> Self {
        self.types.push(TagValue::new(tag, value));
        self
    }

    pub fn with_additional_type(mut self, tag: &str, value: &str) -> Self {
        self.additional_types.push(TagValue::new(tag, value));
        self
    }

    pub fn with_inner_ring(mut self, ring: Vec<Coord<i32>>) -> Self {
        self.inner_rings.push(ring);
        self
    }

    pub fn area(mut self) -> Self {
        self.is_area = true;
        self
    }

    /// Whether the outer ring (and optionally all the inner ones) ends where it starts.
    pub fn is_closed_figure(&self, check_inner: bool) -> bool {
        let closed = |ring: &[Coord<i32>]| match (ring.first(), ring.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        };

        closed(&self.points) && (!check_inner || self.inner_rings.iter().all(|ring| closed(ring)))
    }

    pub fn contains_type(&self, tag: &str, value: &str, check_additional: bool) -> bool {
        self.types.iter().any(|t| t.is(tag, value))
            || (check_additional && self.additional_types.iter().any(|t| t.is(tag, value)))
    }

    /// Layer the feature is on. Explicit `layer` tag wins, tunnels are below and bridges are
    /// above everything else.
    pub fn simple_layer_value(&self) -> i32 {
        let all = || self.types.iter().chain(&self.additional_types);

        if let Some(layer) = all().find(|t| t.tag == "layer") {
            return layer.value.trim_start_matches('+').parse().unwrap_or(0);
        }

        if all().any(|t| t.is("tunnel", "yes")) {
            -1
        } else if all().any(|t| t.is("bridge", "yes")) {
            1
        } else {
            0
        }
    }
}
