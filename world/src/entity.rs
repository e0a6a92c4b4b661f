//! Movable occupants and their movement bookkeeping.

use std::{collections::BTreeSet, f64::consts::SQRT_2, time::Duration};

use tilegrid_core::{Coord, Direction, EntityId, EntityKind, Path, RegionId};

/// Hands out entity identifiers in increasing order.
#[derive(Debug, Default)]
pub struct EntityIds {
    next: u32,
}

impl EntityIds {
    /// Creates a sequence starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { next: 0 }
    }

    /// Allocates the next unused identifier.
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId::new(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Movable occupant of the grid.
///
/// An entity is owned by the caller while unplaced and by the grid's
/// registry while placed; its identifier survives both transitions.
#[derive(Clone, Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    coords: Option<Coord>,
    route: Option<Route>,
    cooldown: Cooldown,
    movespeed: f32,
    vision_range: u32,
    visible_entities: BTreeSet<EntityId>,
    visible_regions: BTreeSet<RegionId>,
}

impl Entity {
    /// Creates an unplaced entity.
    #[must_use]
    pub fn new(id: EntityId, kind: EntityKind, movespeed: f32, vision_range: u32) -> Self {
        Self {
            id,
            kind,
            coords: None,
            route: None,
            cooldown: Cooldown::default(),
            movespeed,
            vision_range,
            visible_entities: BTreeSet::new(),
            visible_regions: BTreeSet::new(),
        }
    }

    /// Identifier of the entity.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Category used by typed range queries.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Cell currently occupied, or `None` while unplaced.
    #[must_use]
    pub const fn coords(&self) -> Option<Coord> {
        self.coords
    }

    /// Active path, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.route.as_ref().map(|route| &route.path)
    }

    /// Index of the current cell within the active path.
    #[must_use]
    pub fn path_cursor(&self) -> Option<usize> {
        self.route.as_ref().map(|route| route.cursor)
    }

    /// Time left before the entity may take its next step.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown.remaining()
    }

    /// Movement speed in cells per second.
    #[must_use]
    pub const fn movespeed(&self) -> f32 {
        self.movespeed
    }

    /// Vision radius measured in cells.
    #[must_use]
    pub const fn vision_range(&self) -> u32 {
        self.vision_range
    }

    /// Entities seen during the last visibility refresh.
    #[must_use]
    pub fn visible_entities(&self) -> &BTreeSet<EntityId> {
        &self.visible_entities
    }

    /// Regions seen during the last visibility refresh.
    #[must_use]
    pub fn visible_regions(&self) -> &BTreeSet<RegionId> {
        &self.visible_regions
    }

    /// Updates the movement speed supplied by external stat logic.
    pub fn set_movespeed(&mut self, movespeed: f32) {
        self.movespeed = movespeed;
    }

    /// Updates the vision radius supplied by external stat logic.
    pub fn set_vision_range(&mut self, vision_range: u32) {
        self.vision_range = vision_range;
    }

    pub(crate) fn set_coords(&mut self, coords: Option<Coord>) {
        self.coords = coords;
    }

    pub(crate) fn replace_path(&mut self, path: Option<Path>) -> Option<Path> {
        let previous = self.route.take().map(|route| route.path);
        self.route = path.map(|path| Route { path, cursor: 0 });
        previous
    }

    pub(crate) fn next_step(&self) -> Option<PathStep> {
        let route = self.route.as_ref()?;
        let cells = route.path.cells();
        let from = *cells.get(route.cursor)?;
        let to = *cells.get(route.cursor + 1)?;
        Some(PathStep {
            from,
            to,
            diagonal: Direction::between(from, to).is_some_and(Direction::is_diagonal),
            is_last: route.cursor + 2 == cells.len(),
        })
    }

    pub(crate) fn advance_cursor(&mut self) {
        if let Some(route) = self.route.as_mut() {
            route.cursor += 1;
        }
    }

    pub(crate) fn cooldown_mut(&mut self) -> &mut Cooldown {
        &mut self.cooldown
    }

    pub(crate) fn reset_watch(&mut self) {
        self.visible_entities.clear();
        self.visible_regions.clear();
    }

    pub(crate) fn replace_watch(
        &mut self,
        entities: BTreeSet<EntityId>,
        regions: BTreeSet<RegionId>,
    ) -> (BTreeSet<EntityId>, BTreeSet<RegionId>) {
        (
            std::mem::replace(&mut self.visible_entities, entities),
            std::mem::replace(&mut self.visible_regions, regions),
        )
    }
}

#[derive(Clone, Debug)]
struct Route {
    path: Path,
    cursor: usize,
}

/// Next hop of an active path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PathStep {
    pub(crate) from: Coord,
    pub(crate) to: Coord,
    pub(crate) diagonal: bool,
    pub(crate) is_last: bool,
}

/// Signed movement cooldown tracked in nanoseconds.
///
/// Positive values are time still owed before the next step; negative values
/// are banked time the entity may spend on steps this tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Cooldown {
    nanos: i128,
}

impl Cooldown {
    pub(crate) fn elapse(&mut self, dt: Duration) {
        self.nanos -= i128::try_from(dt.as_nanos()).unwrap_or(i128::MAX);
    }

    pub(crate) fn charge(&mut self, cost: Duration) {
        self.nanos += i128::try_from(cost.as_nanos()).unwrap_or(i128::MAX);
    }

    pub(crate) const fn is_pending(&self) -> bool {
        self.nanos > 0
    }

    pub(crate) const fn allows_step(&self) -> bool {
        self.nanos < 0
    }

    /// Drops banked time so idle entities cannot hoard steps.
    pub(crate) fn settle(&mut self) {
        self.nanos = self.nanos.max(0);
    }

    fn remaining(&self) -> Duration {
        u64::try_from(self.nanos).map_or(Duration::ZERO, Duration::from_nanos)
    }
}

/// Cooldown incurred by a single step at the provided speed.
///
/// Diagonal steps cost √2 times an orthogonal step. The cost is rounded up to
/// a whole nanosecond so that `n` steps never cost less than `n / movespeed`
/// seconds. Returns `None` when the speed cannot move the entity.
#[must_use]
pub fn step_cooldown(movespeed: f32, diagonal: bool) -> Option<Duration> {
    if !movespeed.is_finite() || movespeed <= 0.0 {
        return None;
    }
    let multiplier = if diagonal { SQRT_2 } else { 1.0 };
    let nanos = (multiplier * NANOS_PER_SECOND / f64::from(movespeed)).ceil();
    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos as u64))
}

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut ids = EntityIds::new();
        assert_eq!(ids.allocate(), EntityId::new(0));
        assert_eq!(ids.allocate(), EntityId::new(1));
        assert_eq!(ids.allocate(), EntityId::new(2));
    }

    #[test]
    fn diagonal_step_costs_sqrt_two() {
        let straight = step_cooldown(2.0, false).expect("straight");
        let diagonal = step_cooldown(2.0, true).expect("diagonal");

        assert_eq!(straight, Duration::from_millis(500));
        let ratio = diagonal.as_secs_f64() / straight.as_secs_f64();
        assert!((ratio - SQRT_2).abs() < 1e-6, "ratio was {ratio}");
    }

    #[test]
    fn fractional_costs_round_up_to_whole_nanoseconds() {
        assert_eq!(
            step_cooldown(3.0, false),
            Some(Duration::from_nanos(333_333_334))
        );
        assert_eq!(
            step_cooldown(7.0, false),
            Some(Duration::from_nanos(142_857_143))
        );
        assert_eq!(
            step_cooldown(1.0, true),
            Some(Duration::from_nanos(1_414_213_563))
        );
        assert_eq!(step_cooldown(4.0, false), Some(Duration::from_millis(250)));
    }

    #[test]
    fn non_positive_speed_has_no_cooldown() {
        assert_eq!(step_cooldown(0.0, false), None);
        assert_eq!(step_cooldown(-1.0, true), None);
        assert_eq!(step_cooldown(f32::NAN, false), None);
    }

    #[test]
    fn cooldown_gate_opens_only_with_banked_time() {
        let mut cooldown = Cooldown::default();
        assert!(!cooldown.is_pending());
        assert!(!cooldown.allows_step());

        cooldown.elapse(Duration::from_millis(100));
        assert!(cooldown.allows_step());

        cooldown.charge(Duration::from_millis(500));
        assert!(cooldown.is_pending());
        assert_eq!(cooldown.remaining(), Duration::from_millis(400));

        cooldown.elapse(Duration::from_secs(1));
        cooldown.settle();
        assert_eq!(cooldown, Cooldown::default());
    }

    #[test]
    fn next_step_walks_the_path() {
        let mut entity = Entity::new(EntityId::new(1), EntityKind::Player, 1.0, 3);
        let path = Path::from_cells(vec![Coord::new(1, 1), Coord::new(2, 2), Coord::new(3, 2)])
            .expect("path");
        assert!(entity.replace_path(Some(path)).is_none());

        let first = entity.next_step().expect("first step");
        assert_eq!(first.to, Coord::new(2, 2));
        assert!(first.diagonal);
        assert!(!first.is_last);

        entity.advance_cursor();
        let second = entity.next_step().expect("second step");
        assert_eq!(second.from, Coord::new(2, 2));
        assert!(!second.diagonal);
        assert!(second.is_last);

        entity.advance_cursor();
        assert!(entity.next_step().is_none());
        assert_eq!(entity.path_cursor(), Some(2));
    }
}
