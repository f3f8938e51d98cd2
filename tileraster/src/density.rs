//! Thinning out dense road networks.

use std::collections::{HashMap, VecDeque};

use log::trace;

use crate::context::{QueryController, RasterizerConfig, is_aborted};
use crate::primitives::Primitive;

/// Cell of a grid at `zoom`, which a 31-bit point falls into.
fn cell_id(x: i32, y: i32, zoom: u32) -> u64 {
    let shift = 31 - zoom;
    let x = (x.max(0) as u64) >> shift;
    let y = (y.max(0) as u64) >> shift;
    (x << zoom) | y
}

/// Limit the number of roads passing through each cell of a grid a few zoom levels deeper than
/// the rendered one. Lines are visited from the end, so the ones sorted last get the cells first.
/// Lines which are not roads always pass, and the relative order of lines is kept.
///
/// Returns `None` if aborted.
pub fn filter_lines_by_density<'f>(
    lines: Vec<Primitive<'f>>,
    zoom: u8,
    config: &RasterizerConfig,
    controller: Option<&dyn QueryController>,
) -> Option<Vec<Primitive<'f>>> {
    let limit = config.roads_density_limit_per_tile;
    if config.road_density_zoom_tile == 0 || limit == 0 {
        return Some(lines);
    }

    let grid_zoom = (u32::from(zoom) + u32::from(config.road_density_zoom_tile)).min(31);
    let mut density: HashMap<u64, u32> = HashMap::new();
    let mut accepted = VecDeque::with_capacity(lines.len());

    for primitive in lines.into_iter().rev() {
        if is_aborted(controller) {
            return None;
        }

        let is_road = primitive
            .tag_value()
            .is_some_and(|type_| type_.tag == "highway");

        let mut accept = !is_road;
        if is_road {
            let mut previous = None;
            for point in &primitive.feature.points {
                if is_aborted(controller) {
                    return None;
                }

                let id = cell_id(point.x, point.y, grid_zoom);
                if previous == Some(id) {
                    continue;
                }
                previous = Some(id);

                let count = density.entry(id).or_default();
                if *count < limit {
                    *count += 1;
                    accept = true;
                }
            }
        }

        if accept {
            accepted.push_front(primitive);
        } else {
            trace!("Road #{} is filtered out by density.", primitive.feature.id);
        }
    }

    Some(accepted.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::MapFeature;
    use crate::primitives::PrimitiveKind;
    use geo_types::coord;
    use std::cell::Cell;

    const CELL: i32 = 1 << 13;

    fn config(limit: u32) -> RasterizerConfig {
        RasterizerConfig {
            road_density_zoom_tile: 2,
            roads_density_limit_per_tile: limit,
            ..Default::default()
        }
    }

    fn road(id: u64, tag: &str, cells: &[(i32, i32)]) -> MapFeature {
        let points = cells
            .iter()
            .map(|(x, y)| coord! { x: x * CELL + 1, y: y * CELL + 1 })
            .collect();
        MapFeature::new(id, points).with_type(tag, "residential")
    }

    fn lines(features: &[MapFeature]) -> Vec<Primitive<'_>> {
        features
            .iter()
            .enumerate()
            .map(|(i, feature)| Primitive {
                feature,
                kind: PrimitiveKind::Line,
                z_order: i as f64,
                type_index: 0,
            })
            .collect()
    }

    fn ids(lines: &[Primitive<'_>]) -> Vec<u64> {
        lines.iter().map(|p| p.feature.id).collect()
    }

    #[test]
    fn disabled_filter_passes_everything() {
        let features = vec![
            road(1, "highway", &[(0, 0), (0, 0)]),
            road(2, "highway", &[(0, 0)]),
        ];

        let filtered =
            filter_lines_by_density(lines(&features), 16, &config(0), None).unwrap();
        assert_eq!(vec![1, 2], ids(&filtered));

        let no_offset = RasterizerConfig {
            roads_density_limit_per_tile: 1,
            ..Default::default()
        };
        let filtered = filter_lines_by_density(lines(&features), 16, &no_offset, None).unwrap();
        assert_eq!(vec![1, 2], ids(&filtered));
    }

    #[test]
    fn last_roads_win_cells() {
        let _ = env_logger::try_init();

        // Grid zoom is 16 + 2, so a cell is 2^13 units wide.
        let features = vec![
            road(1, "highway", &[(5, 5), (5, 6)]),
            road(2, "highway", &[(5, 5)]),
            road(3, "railway", &[(5, 5)]),
            road(4, "highway", &[(5, 5), (7, 7)]),
        ];

        let filtered = filter_lines_by_density(lines(&features), 16, &config(1), None).unwrap();

        // Road 4 takes (5, 5), road 2 finds it full, road 1 still gets (5, 6).
        assert_eq!(vec![1, 3, 4], ids(&filtered));
    }

    #[test]
    fn repeated_cells_count_once() {
        let features = vec![
            road(1, "highway", &[(1, 1)]),
            road(2, "highway", &[(1, 1), (1, 1), (1, 1)]),
        ];

        let filtered = filter_lines_by_density(lines(&features), 16, &config(2), None).unwrap();
        assert_eq!(vec![1, 2], ids(&filtered));

        let filtered = filter_lines_by_density(lines(&features), 16, &config(1), None).unwrap();
        assert_eq!(vec![2], ids(&filtered));
    }

    #[test]
    fn filtering_is_deterministic() {
        let features: Vec<MapFeature> = (0..20)
            .map(|i| road(i, "highway", &[(i as i32 % 3, 0), (i as i32 % 5, 1)]))
            .collect();

        let first = filter_lines_by_density(lines(&features), 16, &config(1), None).unwrap();
        let second = filter_lines_by_density(lines(&features), 16, &config(1), None).unwrap();

        assert_eq!(ids(&first), ids(&second));
        assert!(first.len() < features.len());
    }

    struct AbortAfter {
        polls: Cell<usize>,
        limit: usize,
    }

    impl QueryController for AbortAfter {
        fn is_aborted(&self) -> bool {
            self.polls.set(self.polls.get() + 1);
            self.polls.get() > self.limit
        }
    }

    #[test]
    fn aborting_inside_a_long_road() {
        let cells: Vec<(i32, i32)> = (0..1000).map(|i| (i % 40, i / 40)).collect();
        let features = vec![road(1, "highway", &cells)];

        let controller = AbortAfter {
            polls: Cell::new(0),
            limit: usize::MAX,
        };
        let filtered =
            filter_lines_by_density(lines(&features), 16, &config(4), Some(&controller));
        assert_eq!(Some(vec![1]), filtered.as_deref().map(ids));
        assert!(controller.polls.get() > 1000);

        let controller = AbortAfter {
            polls: Cell::new(0),
            limit: 10,
        };
        assert!(
            filter_lines_by_density(lines(&features), 16, &config(4), Some(&controller))
                .is_none()
        );
    }

    #[test]
    fn first_cell_of_the_world_is_counted() {
        let features = vec![
            road(1, "highway", &[(0, 0)]),
            road(2, "highway", &[(0, 0)]),
        ];

        let filtered = filter_lines_by_density(lines(&features), 16, &config(1), None).unwrap();
        assert_eq!(vec![2], ids(&filtered));
    }

    #[test]
    fn cell_ids() {
        assert_eq!(0, cell_id(0, 0, 0));
        assert_eq!((1 << 1) | 1, cell_id(1 << 30, 1 << 30, 1));
        assert_eq!(
            (5u64 << 18) | 6,
            cell_id(5 * CELL + 1, 6 * CELL + 100, 18)
        );
    }
}
