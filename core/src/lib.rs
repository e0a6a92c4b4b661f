#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Tilegrid simulation.
//!
//! This crate defines the vocabulary that connects adapters, the authoritative
//! grid, and pure systems. Adapters submit [`Command`] values describing
//! desired mutations, the grid executes those commands via its `apply` entry
//! point (or through its direct placement and movement functions), and then
//! broadcasts [`Event`] values for downstream consumers. Area-effect behaviour
//! plugs into the grid through the [`AreaEffect`] trait.

use std::{collections::BTreeSet, fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Height value marking a cell as void: an impassable hole with no floor.
pub const VOID_HEIGHT: i16 = i16::MIN;

/// Commands that express the mutations external collaborators may marshal
/// onto the simulation tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Computes a path from the entity's cell toward the target and installs it.
    FindPathTo {
        /// Entity that should start walking.
        entity: EntityId,
        /// Requested destination cell.
        target: Coord,
    },
    /// Aborts the entity's active path, if any.
    ClearPath {
        /// Entity whose path should be dropped.
        entity: EntityId,
    },
    /// Teleports an entity to a standable cell, aborting its path.
    Warp {
        /// Entity being teleported.
        entity: EntityId,
        /// Destination cell.
        to: Coord,
    },
    /// Toggles the runtime hazard flag that makes a cell unwalkable.
    SetBlocked {
        /// Cell whose hazard flag changes.
        cell: Coord,
        /// Whether the cell should reject traversal.
        blocked: bool,
    },
    /// Advances the simulation clock, running movement and region updates.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
}

/// Events broadcast by the grid after mutating state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that an entity entered the grid.
    EntityPlaced {
        /// Entity that was placed.
        entity: EntityId,
        /// Cell the entity occupies.
        at: Coord,
    },
    /// Confirms that an entity left the grid.
    EntityRemoved {
        /// Entity that was removed.
        entity: EntityId,
        /// Cell the entity occupied before removal.
        from: Coord,
    },
    /// Confirms that an entity moved between two cells.
    EntityMoved {
        /// Entity that moved.
        entity: EntityId,
        /// Cell the entity occupied before moving.
        from: Coord,
        /// Cell the entity occupies after moving.
        to: Coord,
    },
    /// Reports that an entity's active path changed.
    PathUpdated {
        /// Entity whose path changed.
        entity: EntityId,
        /// Path that was active before the change.
        old: Option<Path>,
        /// Path that is active after the change.
        new: Option<Path>,
    },
    /// Confirms that a region was bound to the grid.
    RegionCreated {
        /// Identifier assigned to the region.
        region: RegionId,
        /// Bounding box of the cells covered by the region.
        bounds: CellBounds,
    },
    /// Confirms that a region was unbound from the grid.
    RegionRemoved {
        /// Identifier of the removed region.
        region: RegionId,
    },
    /// Reports that an entity now stands inside a region.
    RegionEntered {
        /// Region that was entered.
        region: RegionId,
        /// Entity that entered.
        entity: EntityId,
    },
    /// Reports that an entity no longer stands inside a region.
    RegionLeft {
        /// Region that was left.
        region: RegionId,
        /// Entity that left.
        entity: EntityId,
    },
    /// Outcome produced by a region's area effect for one of its occupants.
    AreaEffect {
        /// Region whose effect fired.
        region: RegionId,
        /// Entity affected by the effect.
        entity: EntityId,
        /// Concrete outcome for battle logic to resolve.
        effect: AreaEffectKind,
    },
    /// Reports that a marshalled command could not be executed.
    CommandRejected {
        /// Reason the grid refused the command.
        reason: GridError,
    },
}

/// Outcomes area effects hand to external battle logic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AreaEffectKind {
    /// Damage dealt to the occupant.
    Damage {
        /// Amount of damage applied.
        amount: u32,
    },
    /// Request to teleport the occupant.
    Warp {
        /// Cell the occupant should be moved to.
        destination: Coord,
    },
}

/// Behaviour attached to a region.
///
/// The grid invokes these hooks synchronously while it mutates occupancy, so
/// implementations only record state and push events; they never touch the
/// grid directly.
pub trait AreaEffect: fmt::Debug {
    /// Called when an entity starts standing in one of the region's cells.
    fn on_enter(&mut self, _region: RegionId, _entity: EntityId, _out: &mut Vec<Event>) {}

    /// Called when an entity stops standing in the region.
    fn on_leave(&mut self, _region: RegionId, _entity: EntityId, _out: &mut Vec<Event>) {}

    /// Called once per tick with the entities currently inside the region.
    fn update(
        &mut self,
        _region: RegionId,
        _dt: Duration,
        _occupants: &[EntityId],
        _out: &mut Vec<Event>,
    ) {
    }
}

/// Errors raised by grid operations.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// Grid dimensions must both be at least one.
    #[error("grid dimensions {width}x{height} are invalid")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The coordinate lies outside the grid.
    #[error("cell {coord} lies outside the grid")]
    OutOfBounds {
        /// Offending coordinate.
        coord: Coord,
    },
    /// The rectangle's minimum corner exceeds its maximum corner.
    #[error("bounds {min}..={max} are malformed")]
    InvalidBounds {
        /// Requested minimum corner.
        min: Coord,
        /// Requested maximum corner.
        max: Coord,
    },
    /// A radius query was given a negative radius.
    #[error("radius {radius} is negative")]
    NegativeRadius {
        /// Offending radius.
        radius: i32,
    },
    /// The entity id is already registered with the grid.
    #[error("entity {entity} is already placed")]
    EntityAlreadyPlaced {
        /// Conflicting entity.
        entity: EntityId,
    },
    /// The entity id is not registered with the grid.
    #[error("entity {entity} is not placed")]
    EntityNotPlaced {
        /// Missing entity.
        entity: EntityId,
    },
    /// The cell already lists the entity as an occupant.
    #[error("entity {entity} already occupies {cell}")]
    AlreadyOccupant {
        /// Conflicting entity.
        entity: EntityId,
        /// Cell that already holds the entity.
        cell: Coord,
    },
    /// The cell does not list the entity as an occupant.
    #[error("entity {entity} does not occupy {cell}")]
    NotOccupant {
        /// Missing entity.
        entity: EntityId,
        /// Cell that was expected to hold the entity.
        cell: Coord,
    },
    /// The caller's idea of the entity's position disagrees with the grid.
    #[error("entity {entity} stands at {actual}, not {expected}")]
    PositionMismatch {
        /// Entity being moved.
        entity: EntityId,
        /// Position supplied by the caller.
        expected: Coord,
        /// Position recorded by the grid.
        actual: Coord,
    },
    /// The destination cell cannot currently accept the entity.
    #[error("cell {cell} cannot be entered")]
    DestinationBlocked {
        /// Rejected destination.
        cell: Coord,
    },
    /// A move vacated the source cell but could not occupy the destination.
    ///
    /// The entity is left unplaced; callers must stop simulating it.
    #[error("entity {entity} was lost while moving into {cell}")]
    CorruptPlacement {
        /// Entity that was left unplaced.
        entity: EntityId,
        /// Destination that refused the entity.
        cell: Coord,
    },
    /// No region with the identifier is active.
    #[error("region {region} does not exist")]
    UnknownRegion {
        /// Missing region.
        region: RegionId,
    },
}

impl GridError {
    /// Reports whether the error signals a broken occupancy invariant.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::CorruptPlacement { .. })
    }
}

/// Location of a single grid cell. Valid grid coordinates are 1-based.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    x: i32,
    y: i32,
}

impl Coord {
    /// Creates a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Column of the cell.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Row of the cell.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Returns the neighbouring coordinate in the provided direction.
    #[must_use]
    pub fn step(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }

    /// Grid distance allowing diagonal moves (the larger of the axis deltas).
    #[must_use]
    pub fn chebyshev_distance(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Computes the Manhattan distance between two coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Eight-way step directions. Rows grow toward the south.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Toward decreasing rows.
    North,
    /// Toward increasing columns and decreasing rows.
    NorthEast,
    /// Toward increasing columns.
    East,
    /// Toward increasing columns and rows.
    SouthEast,
    /// Toward increasing rows.
    South,
    /// Toward decreasing columns and increasing rows.
    SouthWest,
    /// Toward decreasing columns.
    West,
    /// Toward decreasing columns and rows.
    NorthWest,
}

impl Direction {
    /// Builds the direction matching the signs of the provided deltas.
    ///
    /// Returns `None` when both deltas are zero.
    #[must_use]
    pub fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Some(Self::North),
            (1, -1) => Some(Self::NorthEast),
            (1, 0) => Some(Self::East),
            (1, 1) => Some(Self::SouthEast),
            (0, 1) => Some(Self::South),
            (-1, 1) => Some(Self::SouthWest),
            (-1, 0) => Some(Self::West),
            (-1, -1) => Some(Self::NorthWest),
            _ => None,
        }
    }

    /// Direction of a single step between two adjacent cells.
    #[must_use]
    pub fn between(from: Coord, to: Coord) -> Option<Self> {
        if from.chebyshev_distance(to) != 1 {
            return None;
        }
        Self::from_delta(to.x() - from.x(), to.y() - from.y())
    }

    /// Unit offset applied by a step in this direction.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::NorthEast => (1, -1),
            Self::East => (1, 0),
            Self::SouthEast => (1, 1),
            Self::South => (0, 1),
            Self::SouthWest => (-1, 1),
            Self::West => (-1, 0),
            Self::NorthWest => (-1, -1),
        }
    }

    /// Reports whether the direction moves along both axes.
    #[must_use]
    pub const fn is_diagonal(self) -> bool {
        matches!(
            self,
            Self::NorthEast | Self::SouthEast | Self::SouthWest | Self::NorthWest
        )
    }
}

/// Inclusive axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellBounds {
    min: Coord,
    max: Coord,
}

impl CellBounds {
    /// Creates bounds spanning `min..=max` on both axes.
    pub fn new(min: Coord, max: Coord) -> Result<Self, GridError> {
        let bounds = Self { min, max };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Square bounds reaching `radius` cells from the center in every direction.
    pub fn around(center: Coord, radius: i32) -> Result<Self, GridError> {
        if radius < 0 {
            return Err(GridError::NegativeRadius { radius });
        }

        Ok(Self {
            min: Coord::new(
                center.x().saturating_sub(radius),
                center.y().saturating_sub(radius),
            ),
            max: Coord::new(
                center.x().saturating_add(radius),
                center.y().saturating_add(radius),
            ),
        })
    }

    /// Rejects bounds whose minimum corner exceeds the maximum corner.
    ///
    /// Deserialised bounds bypass [`CellBounds::new`], so consumers re-check them.
    pub fn validate(&self) -> Result<(), GridError> {
        if self.min.x() > self.max.x() || self.min.y() > self.max.y() {
            return Err(GridError::InvalidBounds {
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Upper-left corner.
    #[must_use]
    pub const fn min(&self) -> Coord {
        self.min
    }

    /// Lower-right corner.
    #[must_use]
    pub const fn max(&self) -> Coord {
        self.max
    }

    /// Number of columns spanned.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.max.x().abs_diff(self.min.x()) + 1
    }

    /// Number of rows spanned.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.max.y().abs_diff(self.min.y()) + 1
    }

    /// Reports whether the coordinate lies inside the bounds.
    #[must_use]
    pub fn contains(&self, coord: Coord) -> bool {
        (self.min.x()..=self.max.x()).contains(&coord.x())
            && (self.min.y()..=self.max.y()).contains(&coord.y())
    }

    /// Overlap of two bounds, if any.
    #[must_use]
    pub fn intersect(&self, other: &CellBounds) -> Option<CellBounds> {
        let min = Coord::new(self.min.x().max(other.min.x()), self.min.y().max(other.min.y()));
        let max = Coord::new(self.max.x().min(other.max.x()), self.max.y().min(other.max.y()));
        CellBounds::new(min, max).ok()
    }

    /// Chebyshev distance from the coordinate to the nearest covered cell.
    #[must_use]
    pub fn chebyshev_distance_to(&self, coord: Coord) -> u32 {
        let clamped = Coord::new(
            coord.x().clamp(self.min.x(), self.max.x()),
            coord.y().clamp(self.min.y(), self.max.y()),
        );
        clamped.chebyshev_distance(coord)
    }

    /// Iterates the covered coordinates in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Coord> {
        let (min, max) = (self.min, self.max);
        (min.y()..=max.y()).flat_map(move |y| (min.x()..=max.x()).map(move |x| Coord::new(x, y)))
    }
}

impl fmt::Display for CellBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// Geometric description of a region before it is resolved against a grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionShape {
    /// Explicit rectangle, clamped to the grid.
    Rect(CellBounds),
    /// Square reaching `radius` cells around the center, clamped to the grid.
    Radius {
        /// Center cell of the square.
        center: Coord,
        /// Number of cells reached in every direction.
        radius: i32,
    },
}

/// Unique identifier assigned to an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier assigned to a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(u32);

impl RegionId {
    /// Creates a new region identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

/// Broad category of an entity, used to filter typed range queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Player-controlled character.
    Player,
    /// Hostile creature.
    Monster,
    /// Non-hostile character.
    Npc,
}

/// Precomputed walk through the grid.
///
/// `cells` lists every traversed cell starting with the origin; `corners`
/// holds the origin, every cell where the step direction changes, and the
/// final cell.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    corners: Vec<Coord>,
    cells: Vec<Coord>,
}

impl Path {
    /// Builds a path from the full traversed-cell sequence.
    ///
    /// Sequences with fewer than two cells describe no movement and yield `None`.
    #[must_use]
    pub fn from_cells(cells: Vec<Coord>) -> Option<Self> {
        let (&first, &last) = (cells.first()?, cells.last()?);
        if cells.len() < 2 {
            return None;
        }

        let mut corners = vec![first];
        let mut previous: Option<Direction> = None;
        for pair in cells.windows(2) {
            let direction = Direction::between(pair[0], pair[1]);
            if previous.is_some() && direction != previous {
                corners.push(pair[0]);
            }
            previous = direction;
        }
        corners.push(last);

        Some(Self { corners, cells })
    }

    /// Direction-change waypoints including both endpoints.
    #[must_use]
    pub fn corners(&self) -> &[Coord] {
        &self.corners
    }

    /// Every traversed cell, origin first.
    #[must_use]
    pub fn cells(&self) -> &[Coord] {
        &self.cells
    }

    /// Number of traversed cells, origin included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false: empty paths are never constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell the path starts from.
    #[must_use]
    pub fn origin(&self) -> Coord {
        self.cells[0]
    }

    /// Cell the path ends at.
    #[must_use]
    pub fn destination(&self) -> Coord {
        self.cells[self.cells.len() - 1]
    }
}

/// Three-way comparison of two snapshots of a watched set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetDiff<T> {
    /// Members present only in the new snapshot.
    pub entered: Vec<T>,
    /// Members present in both snapshots.
    pub stayed: Vec<T>,
    /// Members present only in the old snapshot.
    pub left: Vec<T>,
}

impl<T: Ord + Copy> SetDiff<T> {
    /// Computes `new − old`, `new ∩ old` and `old − new`, each in ascending order.
    #[must_use]
    pub fn between(old: &BTreeSet<T>, new: &BTreeSet<T>) -> Self {
        Self {
            entered: new.difference(old).copied().collect(),
            stayed: new.intersection(old).copied().collect(),
            left: old.difference(new).copied().collect(),
        }
    }

    /// Reports whether nothing entered or left.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.entered.is_empty() && self.left.is_empty()
    }
}

impl<T> Default for SetDiff<T> {
    fn default() -> Self {
        Self {
            entered: Vec::new(),
            stayed: Vec::new(),
            left: Vec::new(),
        }
    }
}
