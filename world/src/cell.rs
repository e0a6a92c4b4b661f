//! Single grid tile bookkeeping.

use thiserror::Error;
use tilegrid_core::{EntityId, RegionId, VOID_HEIGHT};

/// Reasons a cell refuses an occupant change.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum OccupancyError {
    /// The entity is already listed as an occupant.
    #[error("entity {0} already occupies the cell")]
    AlreadyPresent(EntityId),
    /// The entity is not listed as an occupant.
    #[error("entity {0} does not occupy the cell")]
    Absent(EntityId),
}

/// Reasons a cell refuses a region link change.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RegionLinkError {
    /// The region already covers the cell.
    #[error("{0} already covers the cell")]
    AlreadyLinked(RegionId),
    /// The region does not cover the cell.
    #[error("{0} does not cover the cell")]
    NotLinked(RegionId),
}

/// One addressable tile of the grid.
///
/// Occupants and regions are stored as identifiers referring back into the
/// grid's registries; the cell never owns entities or regions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    height: i16,
    hazard: bool,
    occupants: Vec<EntityId>,
    regions: Vec<RegionId>,
}

impl Cell {
    /// Creates an empty cell with the provided floor height.
    #[must_use]
    pub const fn new(height: i16) -> Self {
        Self {
            height,
            hazard: false,
            occupants: Vec::new(),
            regions: Vec::new(),
        }
    }

    /// Floor height, or [`VOID_HEIGHT`] for holes.
    #[must_use]
    pub const fn height(&self) -> i16 {
        self.height
    }

    /// Entities currently standing in the cell, in arrival order.
    #[must_use]
    pub fn occupants(&self) -> &[EntityId] {
        &self.occupants
    }

    /// Regions covering the cell, in registration order.
    #[must_use]
    pub fn regions(&self) -> &[RegionId] {
        &self.regions
    }

    /// Reports whether the runtime hazard flag is raised.
    #[must_use]
    pub const fn is_hazard(&self) -> bool {
        self.hazard
    }

    /// True iff the cell has no floor.
    #[must_use]
    pub const fn is_void(&self) -> bool {
        self.height == VOID_HEIGHT
    }

    /// Entities may pass through the cell.
    #[must_use]
    pub const fn is_walkable(&self) -> bool {
        !self.is_void() && !self.hazard
    }

    /// Entities may end a move in the cell.
    #[must_use]
    pub fn is_standable(&self) -> bool {
        self.is_walkable() && self.occupants.is_empty()
    }

    pub(crate) fn set_height(&mut self, height: i16) {
        self.height = height;
    }

    pub(crate) fn set_hazard(&mut self, hazard: bool) {
        self.hazard = hazard;
    }

    pub(crate) fn place(&mut self, entity: EntityId) -> Result<(), OccupancyError> {
        if self.occupants.contains(&entity) {
            return Err(OccupancyError::AlreadyPresent(entity));
        }
        self.occupants.push(entity);
        Ok(())
    }

    pub(crate) fn remove(&mut self, entity: EntityId) -> Result<(), OccupancyError> {
        let index = self
            .occupants
            .iter()
            .position(|occupant| *occupant == entity)
            .ok_or(OccupancyError::Absent(entity))?;
        let _ = self.occupants.remove(index);
        Ok(())
    }

    pub(crate) fn add_region(&mut self, region: RegionId) -> Result<(), RegionLinkError> {
        if self.regions.contains(&region) {
            return Err(RegionLinkError::AlreadyLinked(region));
        }
        self.regions.push(region);
        Ok(())
    }

    pub(crate) fn remove_region(&mut self, region: RegionId) -> Result<(), RegionLinkError> {
        let index = self
            .regions
            .iter()
            .position(|linked| *linked == region)
            .ok_or(RegionLinkError::NotLinked(region))?;
        let _ = self.regions.remove(index);
        Ok(())
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn place_rejects_duplicates() {
        let mut cell = Cell::default();
        let entity = EntityId::new(4);

        assert_eq!(cell.place(entity), Ok(()));
        assert_eq!(cell.place(entity), Err(OccupancyError::AlreadyPresent(entity)));
        assert_eq!(cell.occupants(), &[entity]);
    }

    #[test]
    fn remove_rejects_absent_entity() {
        let mut cell = Cell::default();
        assert_eq!(
            cell.remove(EntityId::new(1)),
            Err(OccupancyError::Absent(EntityId::new(1)))
        );
    }

    #[test]
    fn standability_requires_empty_walkable_floor() {
        let mut cell = Cell::default();
        assert!(cell.is_standable());

        cell.place(EntityId::new(1)).expect("place");
        assert!(cell.is_walkable());
        assert!(!cell.is_standable());

        cell.remove(EntityId::new(1)).expect("remove");
        cell.set_hazard(true);
        assert!(!cell.is_walkable());
        assert!(!cell.is_standable());
    }

    #[test]
    fn void_cells_are_never_walkable() {
        let cell = Cell::new(VOID_HEIGHT);
        assert!(cell.is_void());
        assert!(!cell.is_walkable());
        assert!(!cell.is_standable());
    }

    #[test]
    fn region_links_report_distinct_failures() {
        let mut cell = Cell::default();
        let region = RegionId::new(2);

        assert_eq!(cell.add_region(region), Ok(()));
        assert_eq!(
            cell.add_region(region),
            Err(RegionLinkError::AlreadyLinked(region))
        );
        assert_eq!(cell.remove_region(region), Ok(()));
        assert_eq!(
            cell.remove_region(region),
            Err(RegionLinkError::NotLinked(region))
        );
        assert!(cell.regions().is_empty());
    }
}
