use std::time::Duration;

use anyhow::{Context, Result};
use log::error;
use tilegrid_core::{AreaEffectKind, Command, Event, VOID_HEIGHT};
use tilegrid_system_observers::Observers;
use tilegrid_world::{self as world, Config, Entity, EntityIds, Grid, VisibilityReport};

use crate::scenario::{coord, Scenario};

/// Grid plus the systems and queued commands that drive it tick by tick.
#[derive(Debug)]
pub(crate) struct Simulation {
    grid: Grid,
    observers: Observers,
    tick: Duration,
    pending: Vec<Command>,
}

impl Simulation {
    /// Builds the grid described by the scenario, pushing setup events to `out`.
    pub(crate) fn from_scenario(scenario: &Scenario, out: &mut Vec<Event>) -> Result<Self> {
        let config = Config::new(scenario.grid.pathfinding());
        let mut grid = Grid::new(scenario.grid.width, scenario.grid.height, config)
            .context("scenario grid has invalid dimensions")?;

        for &cell in &scenario.grid.void {
            grid.set_height(coord(cell), VOID_HEIGHT)
                .with_context(|| format!("void cell {cell:?} lies outside the grid"))?;
        }
        for &cell in &scenario.grid.hazards {
            grid.set_blocked(coord(cell), true)
                .with_context(|| format!("hazard cell {cell:?} lies outside the grid"))?;
        }

        let mut ids = EntityIds::new();
        let mut pending = Vec::new();
        for config in &scenario.entities {
            let entity = Entity::new(ids.allocate(), config.kind, config.speed, config.vision);
            let id = entity.id();
            grid.place(entity, coord(config.at), out)
                .map_err(|rejected| rejected.error)
                .with_context(|| format!("cannot place entity {id} at {:?}", config.at))?;
            if let Some(target) = config.target {
                pending.push(Command::FindPathTo {
                    entity: id,
                    target: coord(target),
                });
            }
        }

        for (index, region) in scenario.regions.iter().enumerate() {
            let shape = region.shape()?;
            let _ = grid
                .create_region(shape, region.effect(), out)
                .with_context(|| format!("cannot create region {index}"))?;
        }

        Ok(Self {
            grid,
            observers: Observers::new(),
            tick: scenario.run.tick(),
            pending,
        })
    }

    pub(crate) fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Runs one tick.
    ///
    /// Queued commands are applied first, then time advances and visibility is
    /// refreshed. Warp requests raised during the tick run at the start of the
    /// next one.
    pub(crate) fn step(&mut self, events: &mut Vec<Event>, reports: &mut Vec<VisibilityReport>) {
        let start = events.len();
        for command in self.pending.drain(..) {
            world::apply(&mut self.grid, command, events);
        }
        world::apply(&mut self.grid, Command::Tick { dt: self.tick }, events);
        self.observers.handle(&events[start..], &mut self.grid, reports);

        self.pending.extend(events[start..].iter().filter_map(|event| match event {
            Event::AreaEffect {
                entity,
                effect: AreaEffectKind::Warp { destination },
                ..
            } => Some(Command::Warp {
                entity: *entity,
                to: *destination,
            }),
            _ => None,
        }));

        for orphan in self.grid.take_orphans() {
            error!("entity {} was lost and left the simulation", orphan.id());
        }
    }
}

/// Renders an event as a single human-readable line.
pub(crate) fn describe(event: &Event) -> String {
    match event {
        Event::TimeAdvanced { dt } => format!("time advanced by {dt:?}"),
        Event::EntityPlaced { entity, at } => format!("entity {entity} placed at {at}"),
        Event::EntityRemoved { entity, from } => format!("entity {entity} removed from {from}"),
        Event::EntityMoved { entity, from, to } => format!("entity {entity} moved {from} -> {to}"),
        Event::PathUpdated {
            entity,
            new: Some(path),
            ..
        } => {
            let corners = path
                .corners()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            format!("entity {entity} follows path via {corners}")
        }
        Event::PathUpdated {
            entity, new: None, ..
        } => format!("entity {entity} has no path"),
        Event::RegionCreated { region, bounds } => format!("{region} created over {bounds}"),
        Event::RegionRemoved { region } => format!("{region} removed"),
        Event::RegionEntered { region, entity } => format!("entity {entity} entered {region}"),
        Event::RegionLeft { region, entity } => format!("entity {entity} left {region}"),
        Event::AreaEffect {
            region,
            entity,
            effect: AreaEffectKind::Damage { amount },
        } => format!("{region} deals {amount} damage to entity {entity}"),
        Event::AreaEffect {
            region,
            entity,
            effect: AreaEffectKind::Warp { destination },
        } => format!("{region} warps entity {entity} to {destination}"),
        Event::CommandRejected { reason } => format!("command rejected: {reason}"),
    }
}

/// Renders a visibility change as a single human-readable line.
pub(crate) fn describe_report(report: &VisibilityReport) -> String {
    let list = |ids: &[tilegrid_core::EntityId]| {
        ids.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    };
    format!(
        "entity {} sees +[{}] -[{}], regions +{} -{}",
        report.entity,
        list(&report.entities.entered),
        list(&report.entities.left),
        report.regions.entered.len(),
        report.regions.left.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilegrid_core::{Coord, EntityId};

    const COURTYARD: &str = include_str!("../scenarios/courtyard.toml");

    fn run(ticks: u32) -> (Simulation, Vec<Event>) {
        let scenario = Scenario::parse(COURTYARD).expect("bundled scenario parses");
        let mut events = Vec::new();
        let mut simulation = Simulation::from_scenario(&scenario, &mut events).expect("builds");
        let mut reports = Vec::new();
        for _ in 0..ticks {
            simulation.step(&mut events, &mut reports);
        }
        (simulation, events)
    }

    #[test]
    fn bundled_scenario_sets_up_every_entity_and_region() {
        let (simulation, events) = run(0);
        assert_eq!(simulation.grid().entity_count(), 3);
        assert_eq!(simulation.grid().region_count(), 3);
        assert!(events
            .iter()
            .all(|event| !matches!(event, Event::CommandRejected { .. })));
    }

    #[test]
    fn warp_requests_are_carried_out_on_the_next_tick() {
        let (simulation, events) = run(40);
        let monster = EntityId::new(1);

        let requested = events.iter().any(|event| {
            matches!(
                event,
                Event::AreaEffect {
                    entity,
                    effect: AreaEffectKind::Warp { .. },
                    ..
                } if *entity == monster
            )
        });
        assert!(requested, "monster should walk through the warp gate");
        assert_eq!(
            simulation.grid().entity(monster).and_then(Entity::coords),
            Some(Coord::new(2, 2))
        );
    }

    #[test]
    fn player_crosses_the_wall_gap() {
        let (simulation, _) = run(40);
        assert_eq!(
            simulation
                .grid()
                .entity(EntityId::new(0))
                .and_then(Entity::coords),
            Some(Coord::new(14, 2))
        );
    }

    #[test]
    fn descriptions_name_the_actors() {
        let line = describe(&Event::EntityMoved {
            entity: EntityId::new(3),
            from: Coord::new(1, 1),
            to: Coord::new(2, 2),
        });
        assert_eq!(line, "entity #3 moved (1, 1) -> (2, 2)");
    }
}
