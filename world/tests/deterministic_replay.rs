use std::time::Duration;

use tilegrid_core::{
    AreaEffect, AreaEffectKind, CellBounds, Command, Coord, EntityId, EntityKind, Event, RegionId,
    RegionShape, VOID_HEIGHT,
};
use tilegrid_world::{self as world, query, Config, Entity, Grid};

#[derive(Debug)]
struct Stamp;

impl AreaEffect for Stamp {
    fn on_enter(&mut self, region: RegionId, entity: EntityId, out: &mut Vec<Event>) {
        out.push(Event::AreaEffect {
            region,
            entity,
            effect: AreaEffectKind::Damage { amount: 1 },
        });
    }
}

#[test]
fn deterministic_replay_produces_expected_outcome() {
    let first = replay(scripted_commands());
    let second = replay(scripted_commands());

    assert_eq!(first, second, "replay diverged between runs");

    let cells: Vec<_> = first
        .entities
        .iter()
        .map(|snapshot| (snapshot.id, snapshot.cell))
        .collect();
    assert_eq!(
        cells,
        vec![
            (EntityId::new(1), Coord::new(10, 1)),
            (EntityId::new(2), Coord::new(11, 2)),
            (EntityId::new(3), Coord::new(8, 5)),
        ]
    );
    assert!(first
        .entities
        .iter()
        .all(|snapshot| snapshot.destination.is_none()));

    let entered: Vec<_> = first
        .events
        .iter()
        .filter_map(|event| match event {
            Event::RegionEntered { entity, .. } => Some(*entity),
            _ => None,
        })
        .collect();
    // Entity 2 reaches the region at 3.5s, entity 1 at 4.0s.
    assert_eq!(entered, vec![EntityId::new(2), EntityId::new(1)]);
}

#[test]
fn replayed_path_bends_around_the_wall() {
    let outcome = replay(scripted_commands());
    let corners = outcome
        .events
        .iter()
        .find_map(|event| match event {
            Event::PathUpdated {
                entity,
                new: Some(path),
                ..
            } if *entity == EntityId::new(1) => Some(path.corners().to_vec()),
            _ => None,
        })
        .expect("entity 1 received a path");

    assert_eq!(
        corners,
        vec![Coord::new(2, 4), Coord::new(5, 1), Coord::new(10, 1)]
    );
}

fn replay(commands: Vec<Command>) -> ReplayOutcome {
    let mut grid = Grid::new(12, 8, Config::default()).expect("grid");
    let mut log = Vec::new();

    for y in 2..=8 {
        grid.set_height(Coord::new(6, y), VOID_HEIGHT)
            .expect("wall");
    }

    let placements = [
        (1, EntityKind::Player, 2.0, Coord::new(2, 4)),
        (2, EntityKind::Monster, 1.0, Coord::new(11, 7)),
        (3, EntityKind::Npc, 1.0, Coord::new(8, 5)),
    ];
    for (id, kind, speed, at) in placements {
        grid.place(Entity::new(EntityId::new(id), kind, speed, 4), at, &mut log)
            .expect("placement");
    }

    let bounds = CellBounds::new(Coord::new(9, 1), Coord::new(12, 3)).expect("bounds");
    let _ = grid
        .create_region(RegionShape::Rect(bounds), Box::new(Stamp), &mut log)
        .expect("region");

    for command in commands {
        world::apply(&mut grid, command, &mut log);
    }

    ReplayOutcome {
        entities: query::entity_view(&grid).into_vec(),
        events: log,
    }
}

fn scripted_commands() -> Vec<Command> {
    let mut commands = vec![
        Command::FindPathTo {
            entity: EntityId::new(1),
            target: Coord::new(10, 1),
        },
        Command::FindPathTo {
            entity: EntityId::new(2),
            target: Coord::new(11, 2),
        },
    ];
    commands.extend((0..10).map(|_| Command::Tick {
        dt: Duration::from_millis(500),
    }));
    commands
}

#[derive(Debug, PartialEq, Eq)]
struct ReplayOutcome {
    entities: Vec<query::EntitySnapshot>,
    events: Vec<Event>,
}
