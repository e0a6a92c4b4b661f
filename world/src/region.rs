//! Area-effect region state and lifecycle.

use std::collections::BTreeMap;

use log::{debug, warn};
use tilegrid_core::{
    AreaEffect, CellBounds, Coord, EntityId, Event, GridError, RegionId, RegionShape,
};

use crate::{cell_index, Grid};

/// Area-effect group bound to a fixed set of cells at creation time.
#[derive(Debug)]
pub struct Region {
    id: RegionId,
    shape: RegionShape,
    bounds: CellBounds,
    cells: Vec<Coord>,
    effect: Box<dyn AreaEffect>,
}

impl Region {
    /// Identifier assigned by the grid.
    #[must_use]
    pub const fn id(&self) -> RegionId {
        self.id
    }

    /// Shape the region was created from.
    #[must_use]
    pub const fn shape(&self) -> RegionShape {
        self.shape
    }

    /// Bounding box of the covered cells after clamping to the grid.
    #[must_use]
    pub const fn bounds(&self) -> CellBounds {
        self.bounds
    }

    /// Covered cells in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }
}

/// Registry that stores regions and manages identifier allocation.
#[derive(Debug)]
pub(crate) struct RegionRegistry {
    entries: BTreeMap<RegionId, Region>,
    next_region_id: RegionId,
}

impl RegionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_region_id: RegionId::new(0),
        }
    }

    fn allocate(&mut self) -> RegionId {
        let id = self.next_region_id;
        self.next_region_id = RegionId::new(id.get().saturating_add(1));
        id
    }

    pub(crate) fn get(&self, id: RegionId) -> Option<&Region> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: RegionId) -> Option<&mut Region> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Region> {
        self.entries.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Grid {
    /// Binds a new region to the grid.
    ///
    /// The shape is resolved once against the grid bounds. Every entity already
    /// standing in the covered cells receives an entered notification before
    /// this returns.
    pub fn create_region(
        &mut self,
        shape: RegionShape,
        effect: Box<dyn AreaEffect>,
        out: &mut Vec<Event>,
    ) -> Result<RegionId, GridError> {
        let bounds = self.resolve_shape(shape)?;
        let cells: Vec<Coord> = bounds.iter().collect();
        let id = self.regions.allocate();

        for coord in &cells {
            if let Some(index) = cell_index(self.width, self.height, *coord) {
                if let Err(error) = self.cells[index].add_region(id) {
                    warn!("linking {id} to {coord} failed: {error}");
                }
            }
        }

        let mut region = Region {
            id,
            shape,
            bounds,
            cells,
            effect,
        };
        debug!("created {id} covering {bounds}");
        out.push(Event::RegionCreated { region: id, bounds });

        for coord in &region.cells {
            let Some(index) = cell_index(self.width, self.height, *coord) else {
                continue;
            };
            for &entity in self.cells[index].occupants() {
                out.push(Event::RegionEntered { region: id, entity });
                region.effect.on_enter(id, entity, out);
            }
        }

        let _ = self.regions.entries.insert(id, region);
        Ok(id)
    }

    /// Unbinds a region, notifying every current occupant that it left.
    ///
    /// The region's effect is handed back to the caller.
    pub fn remove_region(
        &mut self,
        id: RegionId,
        out: &mut Vec<Event>,
    ) -> Result<Box<dyn AreaEffect>, GridError> {
        let Some(mut region) = self.regions.entries.remove(&id) else {
            warn!("cannot remove unknown {id}");
            return Err(GridError::UnknownRegion { region: id });
        };

        for coord in &region.cells {
            let Some(index) = cell_index(self.width, self.height, *coord) else {
                continue;
            };
            for &entity in self.cells[index].occupants() {
                out.push(Event::RegionLeft { region: id, entity });
                region.effect.on_leave(id, entity, out);
            }
            if let Err(error) = self.cells[index].remove_region(id) {
                warn!("unlinking {id} from {coord} failed: {error}");
            }
        }

        debug!("removed {id}");
        out.push(Event::RegionRemoved { region: id });
        Ok(region.effect)
    }

    /// Looks up an active region.
    #[must_use]
    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id)
    }

    /// Iterates active regions in identifier order.
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    /// Number of active regions.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Regions whose bounding box overlaps the provided rectangle.
    pub fn regions_in_range(&self, bounds: CellBounds) -> Result<Vec<RegionId>, GridError> {
        bounds.validate()?;
        Ok(self
            .regions
            .values()
            .filter(|region| region.bounds.intersect(&bounds).is_some())
            .map(Region::id)
            .collect())
    }

    /// Entities currently standing inside the region, in cell order.
    pub fn region_occupants(&self, id: RegionId) -> Result<Vec<EntityId>, GridError> {
        let region = self
            .regions
            .get(id)
            .ok_or(GridError::UnknownRegion { region: id })?;
        let mut occupants = Vec::new();
        collect_occupants(self, &region.cells, &mut occupants);
        Ok(occupants)
    }

    /// Runs every active region's per-tick hook once, in identifier order.
    pub fn update_regions(&mut self, dt: std::time::Duration, out: &mut Vec<Event>) {
        let mut occupants = std::mem::take(&mut self.scratch.region_occupants);
        for region in self.regions.entries.values_mut() {
            occupants.clear();
            for coord in &region.cells {
                if let Some(index) = cell_index(self.width, self.height, *coord) {
                    occupants.extend_from_slice(self.cells[index].occupants());
                }
            }
            region.effect.update(region.id, dt, &occupants, out);
        }
        self.scratch.region_occupants = occupants;
    }

    /// Notifies regions about an entity crossing from one set of cells' regions to another.
    pub(crate) fn dispatch_region_transition(
        &mut self,
        entity: EntityId,
        left: &[RegionId],
        entered: &[RegionId],
        out: &mut Vec<Event>,
    ) {
        for &id in left.iter().filter(|id| !entered.contains(id)) {
            out.push(Event::RegionLeft { region: id, entity });
            if let Some(region) = self.regions.get_mut(id) {
                region.effect.on_leave(id, entity, out);
            }
        }
        for &id in entered.iter().filter(|id| !left.contains(id)) {
            out.push(Event::RegionEntered { region: id, entity });
            if let Some(region) = self.regions.get_mut(id) {
                region.effect.on_enter(id, entity, out);
            }
        }
    }

    fn resolve_shape(&self, shape: RegionShape) -> Result<CellBounds, GridError> {
        let requested = match shape {
            RegionShape::Rect(bounds) => {
                bounds.validate()?;
                bounds
            }
            RegionShape::Radius { center, radius } => self.make_bounds(center, radius)?,
        };
        self.clamp(requested).ok_or(GridError::OutOfBounds {
            coord: requested.min(),
        })
    }
}

fn collect_occupants(grid: &Grid, cells: &[Coord], out: &mut Vec<EntityId>) {
    for coord in cells {
        if let Some(cell) = grid.cell(*coord) {
            out.extend_from_slice(cell.occupants());
        }
    }
}
