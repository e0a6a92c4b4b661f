#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Concrete area effects that regions can carry.
//!
//! Effects never touch the grid. They describe outcomes as
//! [`Event::AreaEffect`] values that battle logic or the driver acts on.

use std::{collections::BTreeMap, time::Duration};

use log::debug;
use tilegrid_core::{AreaEffect, AreaEffectKind, Coord, EntityId, Event, RegionId};

/// Deals fixed damage to every occupant each time a full interval elapses
/// while they stand inside the region.
#[derive(Debug)]
pub struct DamageOverTime {
    amount: u32,
    interval: Duration,
    timers: BTreeMap<EntityId, Duration>,
}

impl DamageOverTime {
    /// Creates an effect dealing `amount` damage per `interval`.
    ///
    /// A zero interval never fires.
    #[must_use]
    pub fn new(amount: u32, interval: Duration) -> Self {
        Self {
            amount,
            interval,
            timers: BTreeMap::new(),
        }
    }

    /// Damage dealt per interval.
    #[must_use]
    pub const fn amount(&self) -> u32 {
        self.amount
    }

    /// Time an occupant must stay inside between hits.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Time accumulated toward the next hit for the occupant.
    #[must_use]
    pub fn pending(&self, entity: EntityId) -> Option<Duration> {
        self.timers.get(&entity).copied()
    }
}

impl AreaEffect for DamageOverTime {
    fn on_enter(&mut self, _region: RegionId, entity: EntityId, _out: &mut Vec<Event>) {
        let _ = self.timers.insert(entity, Duration::ZERO);
    }

    fn on_leave(&mut self, _region: RegionId, entity: EntityId, _out: &mut Vec<Event>) {
        let _ = self.timers.remove(&entity);
    }

    fn update(
        &mut self,
        region: RegionId,
        dt: Duration,
        occupants: &[EntityId],
        out: &mut Vec<Event>,
    ) {
        self.timers.retain(|entity, _| occupants.contains(entity));
        if self.interval.is_zero() {
            return;
        }

        for &entity in occupants {
            let elapsed = self.timers.entry(entity).or_default();
            *elapsed += dt;
            while *elapsed >= self.interval {
                *elapsed -= self.interval;
                out.push(Event::AreaEffect {
                    region,
                    entity,
                    effect: AreaEffectKind::Damage {
                        amount: self.amount,
                    },
                });
            }
        }
    }
}

/// Requests that anything stepping into the region be teleported.
#[derive(Debug)]
pub struct WarpTrigger {
    destination: Coord,
}

impl WarpTrigger {
    /// Creates a trigger sending occupants to `destination`.
    #[must_use]
    pub const fn new(destination: Coord) -> Self {
        Self { destination }
    }

    /// Cell occupants are sent to.
    #[must_use]
    pub const fn destination(&self) -> Coord {
        self.destination
    }
}

impl AreaEffect for WarpTrigger {
    fn on_enter(&mut self, region: RegionId, entity: EntityId, out: &mut Vec<Event>) {
        debug!("{region} sends entity {entity} to {}", self.destination);
        out.push(Event::AreaEffect {
            region,
            entity,
            effect: AreaEffectKind::Warp {
                destination: self.destination,
            },
        });
    }
}

/// Effect with no behaviour; the region only matters for visibility and enter/leave events.
#[derive(Debug, Default)]
pub struct Inert;

impl AreaEffect for Inert {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_accumulates_across_partial_ticks() {
        let mut effect = DamageOverTime::new(5, Duration::from_millis(300));
        let region = RegionId::new(0);
        let entity = EntityId::new(1);
        let mut out = Vec::new();

        effect.on_enter(region, entity, &mut out);
        effect.update(region, Duration::from_millis(200), &[entity], &mut out);
        assert!(out.is_empty());

        effect.update(region, Duration::from_millis(200), &[entity], &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(effect.pending(entity), Some(Duration::from_millis(100)));

        effect.update(region, Duration::from_millis(700), &[entity], &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(effect.pending(entity), Some(Duration::from_millis(200)));
    }

    #[test]
    fn leaving_resets_the_accumulator() {
        let mut effect = DamageOverTime::new(1, Duration::from_secs(1));
        let region = RegionId::new(0);
        let entity = EntityId::new(1);
        let mut out = Vec::new();

        effect.on_enter(region, entity, &mut out);
        effect.update(region, Duration::from_millis(900), &[entity], &mut out);
        effect.on_leave(region, entity, &mut out);
        assert_eq!(effect.pending(entity), None);

        effect.on_enter(region, entity, &mut out);
        effect.update(region, Duration::from_millis(900), &[entity], &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_interval_never_fires() {
        let mut effect = DamageOverTime::new(9, Duration::ZERO);
        let mut out = Vec::new();
        effect.update(
            RegionId::new(0),
            Duration::from_secs(10),
            &[EntityId::new(1)],
            &mut out,
        );
        assert!(out.is_empty());
        assert_eq!(effect.amount(), 9);
        assert_eq!(effect.interval(), Duration::ZERO);
    }

    #[test]
    fn warp_trigger_fires_on_enter_only() {
        let mut effect = WarpTrigger::new(Coord::new(1, 1));
        let mut out = Vec::new();
        effect.update(
            RegionId::new(2),
            Duration::from_secs(1),
            &[EntityId::new(3)],
            &mut out,
        );
        assert!(out.is_empty());

        effect.on_enter(RegionId::new(2), EntityId::new(3), &mut out);
        assert_eq!(
            out,
            vec![Event::AreaEffect {
                region: RegionId::new(2),
                entity: EntityId::new(3),
                effect: AreaEffectKind::Warp {
                    destination: effect.destination()
                },
            }]
        );
    }
}
