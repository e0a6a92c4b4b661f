#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative grid state management for Tilegrid.
//!
//! The [`Grid`] owns every cell, the id-keyed entity registry and the active
//! regions. Cells refer back into those registries by identifier only, so the
//! grid is the single owner of all simulation state and the only place where
//! cross-component invariants are enforced.

mod cell;
mod entity;
mod movement;
mod pathfinding;
mod range;
mod region;
mod topology;
mod visibility;

use std::collections::BTreeMap;

use log::{debug, error, warn};
use tilegrid_core::{CellBounds, Command, Coord, EntityId, Event, GridError, Path};

pub use cell::{Cell, OccupancyError, RegionLinkError};
pub use entity::{step_cooldown, Entity, EntityIds};
pub use pathfinding::PathfindingConfig;
pub use region::Region;
pub use topology::{Topology, TopologyError};
pub use visibility::VisibilityReport;

use pathfinding::SearchOutcome;
use range::Scratch;
use region::RegionRegistry;

/// Tunables applied to a grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pathfinding: PathfindingConfig,
}

impl Config {
    /// Creates a configuration using the provided pathfinding limits.
    #[must_use]
    pub const fn new(pathfinding: PathfindingConfig) -> Self {
        Self { pathfinding }
    }

    /// Limits applied to every path search.
    #[must_use]
    pub const fn pathfinding(&self) -> PathfindingConfig {
        self.pathfinding
    }
}

/// A placement the grid refused, handing the entity back to the caller.
#[derive(Debug)]
pub struct PlacementRejected {
    /// Entity that was not placed.
    pub entity: Entity,
    /// Reason the placement failed.
    pub error: GridError,
}

/// Represents the authoritative tile grid.
#[derive(Debug)]
pub struct Grid {
    width: u32,
    height: u32,
    bounds: CellBounds,
    cells: Vec<Cell>,
    entities: BTreeMap<EntityId, Entity>,
    regions: RegionRegistry,
    orphans: Vec<Entity>,
    scratch: Scratch,
    config: Config,
}

impl Grid {
    /// Creates a flat, fully walkable grid.
    pub fn new(width: u32, height: u32, config: Config) -> Result<Self, GridError> {
        let invalid = GridError::InvalidDimensions { width, height };
        if width == 0 || height == 0 {
            return Err(invalid);
        }
        let (Ok(max_x), Ok(max_y)) = (i32::try_from(width), i32::try_from(height)) else {
            return Err(invalid);
        };
        let bounds = CellBounds::new(Coord::new(1, 1), Coord::new(max_x, max_y))?;
        let capacity = usize::try_from(u64::from(width) * u64::from(height)).map_err(|_| invalid)?;

        Ok(Self {
            width,
            height,
            bounds,
            cells: vec![Cell::default(); capacity],
            entities: BTreeMap::new(),
            regions: RegionRegistry::new(),
            orphans: Vec::new(),
            scratch: Scratch::default(),
            config,
        })
    }

    /// Number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Rectangle spanning the whole grid.
    #[must_use]
    pub const fn bounds(&self) -> CellBounds {
        self.bounds
    }

    /// Configuration the grid was built with.
    #[must_use]
    pub const fn config(&self) -> Config {
        self.config
    }

    /// Reports whether the coordinate addresses a cell.
    #[must_use]
    pub fn in_bounds(&self, coord: Coord) -> bool {
        cell_index(self.width, self.height, coord).is_some()
    }

    /// Looks up the cell at the coordinate.
    #[must_use]
    pub fn cell(&self, coord: Coord) -> Option<&Cell> {
        cell_index(self.width, self.height, coord).map(|index| &self.cells[index])
    }

    /// Reports whether an entity may end a move at the coordinate.
    #[must_use]
    pub fn is_standable(&self, coord: Coord) -> bool {
        self.cell(coord).is_some_and(Cell::is_standable)
    }

    /// Reports whether an entity may pass through the coordinate.
    #[must_use]
    pub fn is_walkable(&self, coord: Coord) -> bool {
        self.cell(coord).is_some_and(Cell::is_walkable)
    }

    /// Changes a cell's floor height; [`tilegrid_core::VOID_HEIGHT`] carves a hole.
    pub fn set_height(&mut self, coord: Coord, height: i16) -> Result<(), GridError> {
        let index = self.index_of(coord)?;
        self.cells[index].set_height(height);
        Ok(())
    }

    /// Raises or clears the runtime hazard flag that makes a cell unwalkable.
    pub fn set_blocked(&mut self, coord: Coord, blocked: bool) -> Result<(), GridError> {
        let index = self.index_of(coord)?;
        self.cells[index].set_hazard(blocked);
        Ok(())
    }

    /// Looks up a placed entity.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Mutable access to a placed entity's externally supplied stats.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Iterates placed entities in identifier order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Number of placed entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Drains entities that were lost by a corrupt move.
    ///
    /// Such entities are no longer simulated; callers decide whether to place
    /// them again or discard them.
    pub fn take_orphans(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.orphans)
    }

    /// Places an unplaced entity onto the cell at `at`.
    pub fn place(
        &mut self,
        mut entity: Entity,
        at: Coord,
        out: &mut Vec<Event>,
    ) -> Result<(), PlacementRejected> {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            warn!("rejected placing entity {id}: already placed");
            return Err(PlacementRejected {
                entity,
                error: GridError::EntityAlreadyPlaced { entity: id },
            });
        }

        let index = match self.index_of(at) {
            Ok(index) => index,
            Err(error) => {
                warn!("rejected placing entity {id}: {error}");
                return Err(PlacementRejected { entity, error });
            }
        };

        if let Err(conflict) = self.cells[index].place(id) {
            warn!("rejected placing entity {id} at {at}: {conflict}");
            return Err(PlacementRejected {
                entity,
                error: GridError::AlreadyOccupant { entity: id, cell: at },
            });
        }

        entity.set_coords(Some(at));
        let _ = self.entities.insert(id, entity);
        out.push(Event::EntityPlaced { entity: id, at });

        let regions = self.cells[index].regions().to_vec();
        self.dispatch_region_transition(id, &[], &regions, out);
        Ok(())
    }

    /// Removes a placed entity and returns it to the caller.
    ///
    /// The returned entity has no coordinates, no path and an empty watch list.
    pub fn remove(&mut self, id: EntityId, out: &mut Vec<Event>) -> Result<Entity, GridError> {
        let Some(mut entity) = self.entities.remove(&id) else {
            warn!("rejected removing entity {id}: not placed");
            return Err(GridError::EntityNotPlaced { entity: id });
        };

        if let Some(from) = entity.coords() {
            match cell_index(self.width, self.height, from) {
                Some(index) => {
                    if let Err(conflict) = self.cells[index].remove(id) {
                        error!("entity {id} missing from its cell {from}: {conflict}");
                    }
                    let regions = self.cells[index].regions().to_vec();
                    self.dispatch_region_transition(id, &regions, &[], out);
                }
                None => error!("entity {id} recorded outside the grid at {from}"),
            }
            out.push(Event::EntityRemoved { entity: id, from });
        }

        entity.set_coords(None);
        let _ = entity.replace_path(None);
        entity.cooldown_mut().settle();
        entity.reset_watch();
        Ok(entity)
    }

    /// Moves an entity between two cells.
    ///
    /// `wants_to_stand` requires the destination to be standable; otherwise it
    /// only has to be walkable. Moving to the current cell is a no-op.
    pub fn move_entity(
        &mut self,
        id: EntityId,
        from: Coord,
        to: Coord,
        wants_to_stand: bool,
        out: &mut Vec<Event>,
    ) -> Result<(), GridError> {
        if from == to {
            return Ok(());
        }

        let Some(actual) = self.entities.get(&id).and_then(Entity::coords) else {
            warn!("rejected moving entity {id}: not placed");
            return Err(GridError::EntityNotPlaced { entity: id });
        };
        if actual != from {
            warn!("rejected moving entity {id} from {from}: it stands at {actual}");
            return Err(GridError::PositionMismatch {
                entity: id,
                expected: from,
                actual,
            });
        }

        let from_index = self.index_of(from)?;
        let to_index = self.index_of(to)?;
        let destination = &self.cells[to_index];
        let accepted = if wants_to_stand {
            destination.is_standable()
        } else {
            destination.is_walkable()
        };
        if !accepted {
            debug!("entity {id} cannot enter {to}");
            return Err(GridError::DestinationBlocked { cell: to });
        }

        if let Err(conflict) = self.cells[from_index].remove(id) {
            warn!("rejected moving entity {id} out of {from}: {conflict}");
            return Err(GridError::NotOccupant { entity: id, cell: from });
        }

        if let Err(conflict) = self.cells[to_index].place(id) {
            error!("entity {id} left {from} but could not enter {to}: {conflict}");
            self.orphan(id, from_index, from, out);
            return Err(GridError::CorruptPlacement { entity: id, cell: to });
        }

        if let Some(entity) = self.entities.get_mut(&id) {
            entity.set_coords(Some(to));
        }
        out.push(Event::EntityMoved {
            entity: id,
            from,
            to,
        });

        let left = self.cells[from_index].regions().to_vec();
        let entered = self.cells[to_index].regions().to_vec();
        self.dispatch_region_transition(id, &left, &entered, out);
        Ok(())
    }

    /// Teleports an entity to a standable cell, aborting its path first.
    pub fn warp(&mut self, id: EntityId, to: Coord, out: &mut Vec<Event>) -> Result<(), GridError> {
        let from = self
            .entities
            .get(&id)
            .and_then(Entity::coords)
            .ok_or(GridError::EntityNotPlaced { entity: id })?;
        if from != to && !self.is_standable(to) {
            let _ = self.index_of(to)?;
            return Err(GridError::DestinationBlocked { cell: to });
        }
        self.clear_path(id, out)?;
        self.move_entity(id, from, to, true, out)
    }

    /// Computes a path between two cells without installing it.
    ///
    /// Returns `Ok(None)` when no step toward the target is possible or when
    /// start and target coincide. The path may end short of the target at the
    /// closest standable cell along the chosen route.
    pub fn find_path(&self, start: Coord, target: Coord) -> Result<Option<Path>, GridError> {
        let _ = self.index_of(start)?;
        let _ = self.index_of(target)?;
        if start == target {
            return Ok(None);
        }

        let outcome = pathfinding::search(
            start,
            target,
            self.config.pathfinding(),
            |cell| self.is_walkable(cell),
            |cell| self.is_standable(cell),
        );

        Ok(match outcome {
            SearchOutcome::Reached(cells) => Path::from_cells(cells),
            SearchOutcome::Unreachable => None,
            SearchOutcome::BudgetExhausted => {
                warn!(
                    "path search {start} -> {target} exceeded {} expansions",
                    self.config.pathfinding().max_expansions()
                );
                None
            }
        })
    }

    /// Finds a path from the entity's cell to `target` and installs it.
    ///
    /// Returns whether a path was installed. A failed search clears any
    /// previous path.
    pub fn find_and_set_path(
        &mut self,
        id: EntityId,
        target: Coord,
        out: &mut Vec<Event>,
    ) -> Result<bool, GridError> {
        let start = self
            .entities
            .get(&id)
            .and_then(Entity::coords)
            .ok_or(GridError::EntityNotPlaced { entity: id })?;
        let path = self.find_path(start, target)?;
        let installed = path.is_some();
        self.set_path(id, path, out)?;
        Ok(installed)
    }

    /// Installs a precomputed path, replacing the active one.
    ///
    /// The path must start at the entity's current cell.
    pub fn set_path(
        &mut self,
        id: EntityId,
        path: Option<Path>,
        out: &mut Vec<Event>,
    ) -> Result<(), GridError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GridError::EntityNotPlaced { entity: id })?;
        if let (Some(path), Some(actual)) = (path.as_ref(), entity.coords()) {
            if path.origin() != actual {
                return Err(GridError::PositionMismatch {
                    entity: id,
                    expected: path.origin(),
                    actual,
                });
            }
        }

        if entity.path().is_none() && path.is_none() {
            return Ok(());
        }
        if let Some(path) = path.as_ref() {
            debug!(
                "entity {id} walks {} cells toward {}",
                path.len() - 1,
                path.destination()
            );
        }
        let old = entity.replace_path(path.clone());
        out.push(Event::PathUpdated {
            entity: id,
            old,
            new: path,
        });
        Ok(())
    }

    /// Aborts the entity's active path, if any.
    pub fn clear_path(&mut self, id: EntityId, out: &mut Vec<Event>) -> Result<(), GridError> {
        self.set_path(id, None, out)
    }

    /// Unregisters an entity that no longer occupies any cell.
    ///
    /// Subscribers see the same teardown as [`Grid::remove`], preceded by the
    /// path abort.
    fn orphan(&mut self, id: EntityId, from_index: usize, from: Coord, out: &mut Vec<Event>) {
        let Some(mut lost) = self.entities.remove(&id) else {
            return;
        };

        let regions = self.cells[from_index].regions().to_vec();
        self.dispatch_region_transition(id, &regions, &[], out);
        if let Some(old) = lost.replace_path(None) {
            out.push(Event::PathUpdated {
                entity: id,
                old: Some(old),
                new: None,
            });
        }
        out.push(Event::EntityRemoved { entity: id, from });

        lost.set_coords(None);
        lost.cooldown_mut().settle();
        lost.reset_watch();
        self.orphans.push(lost);
    }

    fn index_of(&self, coord: Coord) -> Result<usize, GridError> {
        cell_index(self.width, self.height, coord).ok_or(GridError::OutOfBounds { coord })
    }
}

/// Maps a 1-based coordinate onto the flat cell array.
pub(crate) fn cell_index(width: u32, height: u32, coord: Coord) -> Option<usize> {
    let x = u32::try_from(coord.x()).ok()?;
    let y = u32::try_from(coord.y()).ok()?;
    if x == 0 || y == 0 || x > width || y > height {
        return None;
    }
    let row = usize::try_from(y - 1).ok()?;
    let column = usize::try_from(x - 1).ok()?;
    let width = usize::try_from(width).ok()?;
    row.checked_mul(width)?.checked_add(column)
}

/// Applies a marshalled command to the grid.
///
/// Rejections are reported as [`Event::CommandRejected`] rather than returned,
/// so a batch of commands always runs to completion.
pub fn apply(grid: &mut Grid, command: Command, out_events: &mut Vec<Event>) {
    let result = match command {
        Command::FindPathTo { entity, target } => grid
            .find_and_set_path(entity, target, out_events)
            .map(|_| ()),
        Command::ClearPath { entity } => grid.clear_path(entity, out_events),
        Command::Warp { entity, to } => grid.warp(entity, to, out_events),
        Command::SetBlocked { cell, blocked } => grid.set_blocked(cell, blocked),
        Command::Tick { dt } => {
            out_events.push(Event::TimeAdvanced { dt });
            let _moved = grid.update_entity_movement(dt, out_events);
            grid.update_regions(dt, out_events);
            Ok(())
        }
    };

    if let Err(reason) = result {
        out_events.push(Event::CommandRejected { reason });
    }
}

/// Query functions that provide read-only access to the grid state.
pub mod query {
    use std::time::Duration;

    use super::Grid;
    use tilegrid_core::{Coord, EntityId, EntityKind, RegionId};

    /// Captures a read-only view of the placed entities.
    #[must_use]
    pub fn entity_view(grid: &Grid) -> EntityView {
        let snapshots = grid
            .entities()
            .filter_map(|entity| {
                Some(EntitySnapshot {
                    id: entity.id(),
                    kind: entity.kind(),
                    cell: entity.coords()?,
                    destination: entity.path().map(|path| path.destination()),
                    path_cursor: entity.path_cursor(),
                    cooldown: entity.cooldown(),
                    vision_range: entity.vision_range(),
                })
            })
            .collect();
        EntityView { snapshots }
    }

    /// Entities standing in the cell, or an empty slice outside the grid.
    #[must_use]
    pub fn occupants_at(grid: &Grid, coord: Coord) -> &[EntityId] {
        grid.cell(coord).map_or(&[], |cell| cell.occupants())
    }

    /// Regions covering the cell, or an empty slice outside the grid.
    #[must_use]
    pub fn regions_at(grid: &Grid, coord: Coord) -> &[RegionId] {
        grid.cell(coord).map_or(&[], |cell| cell.regions())
    }

    /// Captures a read-only view of one cell.
    #[must_use]
    pub fn cell_view(grid: &Grid, coord: Coord) -> Option<CellView> {
        let cell = grid.cell(coord)?;
        Some(CellView {
            coord,
            height: cell.height(),
            walkable: cell.is_walkable(),
            standable: cell.is_standable(),
            occupants: cell.occupants().to_vec(),
            regions: cell.regions().to_vec(),
        })
    }

    /// Total number of occupant slots across all cells.
    #[must_use]
    pub fn occupant_total(grid: &Grid) -> usize {
        grid.bounds()
            .iter()
            .map(|coord| occupants_at(grid, coord).len())
            .sum()
    }

    /// Read-only snapshot describing all placed entities.
    #[derive(Clone, Debug)]
    pub struct EntityView {
        snapshots: Vec<EntitySnapshot>,
    }

    impl EntityView {
        /// Iterator over the captured snapshots in identifier order.
        pub fn iter(&self) -> impl Iterator<Item = &EntitySnapshot> {
            self.snapshots.iter()
        }

        /// Consumes the view, yielding the underlying snapshots.
        #[must_use]
        pub fn into_vec(self) -> Vec<EntitySnapshot> {
            self.snapshots
        }
    }

    /// Immutable representation of a single cell.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct CellView {
        /// Location of the cell.
        pub coord: Coord,
        /// Floor height.
        pub height: i16,
        /// Whether entities may pass through.
        pub walkable: bool,
        /// Whether entities may end a move here.
        pub standable: bool,
        /// Occupants in arrival order.
        pub occupants: Vec<EntityId>,
        /// Covering regions in registration order.
        pub regions: Vec<RegionId>,
    }

    /// Immutable representation of a single entity's state used for queries.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct EntitySnapshot {
        /// Identifier of the entity.
        pub id: EntityId,
        /// Category of the entity.
        pub kind: EntityKind,
        /// Cell currently occupied.
        pub cell: Coord,
        /// Final cell of the active path, if any.
        pub destination: Option<Coord>,
        /// Position within the active path, if any.
        pub path_cursor: Option<usize>,
        /// Time left before the next step.
        pub cooldown: Duration,
        /// Vision radius in cells.
        pub vision_range: u32,
    }
}
