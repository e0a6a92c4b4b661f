//! Rectangle and radius queries over cells and their occupants.

use std::collections::HashMap;

use tilegrid_core::{CellBounds, Coord, EntityId, EntityKind, GridError};

use crate::Grid;

/// Buffers reused across queries and ticks so the hot paths avoid allocating.
#[derive(Debug, Default)]
pub(crate) struct Scratch {
    pub(crate) by_kind: HashMap<Option<EntityKind>, Vec<EntityId>>,
    pub(crate) region_occupants: Vec<EntityId>,
    pub(crate) tick_order: Vec<EntityId>,
}

impl Grid {
    /// Square bounds reaching `radius` cells around `center`, before clamping.
    ///
    /// The center must lie on the grid; the square itself may overhang it.
    pub fn make_bounds(&self, center: Coord, radius: i32) -> Result<CellBounds, GridError> {
        if radius < 0 {
            return Err(GridError::NegativeRadius { radius });
        }
        if !self.in_bounds(center) {
            return Err(GridError::OutOfBounds { coord: center });
        }
        CellBounds::around(center, radius)
    }

    /// Clamps the rectangle to the grid, or `None` if they do not overlap.
    #[must_use]
    pub fn clamp(&self, bounds: CellBounds) -> Option<CellBounds> {
        bounds.intersect(&self.bounds())
    }

    /// Cells inside the rectangle after clamping, in row-major order.
    pub fn cells_in_range(&self, bounds: CellBounds) -> Result<Vec<Coord>, GridError> {
        bounds.validate()?;
        Ok(self
            .clamp(bounds)
            .map(|clamped| clamped.iter().collect())
            .unwrap_or_default())
    }

    /// Cells within `radius` of `center` on both axes, clamped to the grid.
    pub fn cells_in_radius(&self, center: Coord, radius: i32) -> Result<Vec<Coord>, GridError> {
        let bounds = self.make_bounds(center, radius)?;
        self.cells_in_range(bounds)
    }

    /// Entities standing inside the rectangle, optionally restricted to a kind.
    ///
    /// Results follow row-major cell order, then arrival order within a cell.
    pub fn entities_in_range(
        &self,
        bounds: CellBounds,
        kind: Option<EntityKind>,
    ) -> Result<Vec<EntityId>, GridError> {
        bounds.validate()?;
        let mut found = Vec::new();
        if let Some(clamped) = self.clamp(bounds) {
            self.gather(clamped, kind, &mut found);
        }
        Ok(found)
    }

    /// Entities within `radius` of `center`, optionally restricted to a kind.
    pub fn entities_in_radius(
        &self,
        center: Coord,
        radius: i32,
        kind: Option<EntityKind>,
    ) -> Result<Vec<EntityId>, GridError> {
        let bounds = self.make_bounds(center, radius)?;
        self.entities_in_range(bounds, kind)
    }

    /// Same as [`Grid::entities_in_range`] but fills a buffer owned by the grid.
    ///
    /// Each kind filter has its own buffer, overwritten by the next call with
    /// the same filter.
    pub fn entities_in_range_buffered(
        &mut self,
        bounds: CellBounds,
        kind: Option<EntityKind>,
    ) -> Result<&[EntityId], GridError> {
        bounds.validate()?;
        let mut buffer = self.scratch.by_kind.remove(&kind).unwrap_or_default();
        buffer.clear();
        if let Some(clamped) = self.clamp(bounds) {
            self.gather(clamped, kind, &mut buffer);
        }
        Ok(self.scratch.by_kind.entry(kind).or_insert(buffer).as_slice())
    }

    fn gather(&self, bounds: CellBounds, kind: Option<EntityKind>, out: &mut Vec<EntityId>) {
        for coord in bounds.iter() {
            let Some(cell) = self.cell(coord) else {
                continue;
            };
            out.extend(cell.occupants().iter().copied().filter(|id| {
                kind.map_or(true, |kind| {
                    self.entity(*id).is_some_and(|entity| entity.kind() == kind)
                })
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Config, Entity};

    fn populated() -> Grid {
        let mut grid = Grid::new(8, 8, Config::default()).expect("grid");
        let mut events = Vec::new();
        let placements = [
            (1, EntityKind::Player, Coord::new(2, 2)),
            (2, EntityKind::Monster, Coord::new(3, 2)),
            (3, EntityKind::Monster, Coord::new(7, 7)),
            (4, EntityKind::Npc, Coord::new(2, 3)),
        ];
        for (id, kind, at) in placements {
            grid.place(Entity::new(EntityId::new(id), kind, 1.0, 2), at, &mut events)
                .expect("place");
        }
        grid
    }

    fn bounds(min: (i32, i32), max: (i32, i32)) -> CellBounds {
        CellBounds::new(Coord::new(min.0, min.1), Coord::new(max.0, max.1)).expect("bounds")
    }

    #[test]
    fn make_bounds_validates_arguments() {
        let grid = populated();
        assert_eq!(
            grid.make_bounds(Coord::new(4, 4), -1),
            Err(GridError::NegativeRadius { radius: -1 })
        );
        assert_eq!(
            grid.make_bounds(Coord::new(0, 4), 1),
            Err(GridError::OutOfBounds {
                coord: Coord::new(0, 4)
            })
        );
        assert_eq!(
            grid.make_bounds(Coord::new(1, 1), 2),
            Ok(bounds((-1, -1), (3, 3)))
        );
    }

    #[test]
    fn cell_queries_clamp_to_the_grid() {
        let grid = populated();
        let cells = grid.cells_in_radius(Coord::new(8, 8), 1).expect("cells");
        assert_eq!(
            cells,
            vec![
                Coord::new(7, 7),
                Coord::new(8, 7),
                Coord::new(7, 8),
                Coord::new(8, 8)
            ]
        );
        assert!(grid
            .cells_in_range(bounds((20, 20), (30, 30)))
            .expect("empty")
            .is_empty());
    }

    #[test]
    fn zero_radius_covers_only_the_center() {
        let grid = populated();
        assert_eq!(
            grid.cells_in_radius(Coord::new(5, 5), 0),
            Ok(vec![Coord::new(5, 5)])
        );
    }

    #[test]
    fn entity_queries_filter_by_kind() {
        let grid = populated();
        let area = bounds((1, 1), (4, 4));

        assert_eq!(
            grid.entities_in_range(area, None),
            Ok(vec![EntityId::new(1), EntityId::new(2), EntityId::new(4)])
        );
        assert_eq!(
            grid.entities_in_range(area, Some(EntityKind::Monster)),
            Ok(vec![EntityId::new(2)])
        );
        assert_eq!(
            grid.entities_in_radius(Coord::new(7, 7), 1, Some(EntityKind::Monster)),
            Ok(vec![EntityId::new(3)])
        );
    }

    #[test]
    fn buffered_query_matches_allocating_query() {
        let mut grid = populated();
        let area = bounds((1, 1), (8, 8));
        let expected = grid
            .entities_in_range(area, Some(EntityKind::Monster))
            .expect("query");

        let first = grid
            .entities_in_range_buffered(area, Some(EntityKind::Monster))
            .expect("buffered")
            .to_vec();
        assert_eq!(first, expected);

        let narrowed = grid
            .entities_in_range_buffered(bounds((6, 6), (8, 8)), Some(EntityKind::Monster))
            .expect("buffered");
        assert_eq!(narrowed, &[EntityId::new(3)]);
    }
}
