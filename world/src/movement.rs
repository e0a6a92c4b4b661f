//! Per-tick path following.

use std::time::Duration;

use log::{debug, error};
use tilegrid_core::{EntityId, Event, GridError};

use crate::{step_cooldown, Entity, Grid};

impl Grid {
    /// Advances every placed entity along its path by `dt`.
    ///
    /// Entities are processed in ascending identifier order. Returns the
    /// entities whose cell changed, in that same order.
    pub fn update_entity_movement(&mut self, dt: Duration, out: &mut Vec<Event>) -> Vec<EntityId> {
        let mut order = std::mem::take(&mut self.scratch.tick_order);
        order.clear();
        order.extend(self.entities.keys().copied());

        let mut moved = Vec::new();
        for &id in &order {
            let before = self.entities.get(&id).and_then(Entity::coords);
            if let Err(error) = self.advance_entity(id, dt, out) {
                error!("movement of entity {id} failed: {error}");
            }
            let after = self.entities.get(&id).and_then(Entity::coords);
            if after.is_some() && before != after {
                moved.push(id);
            }
        }

        self.scratch.tick_order = order;
        moved
    }

    fn advance_entity(
        &mut self,
        id: EntityId,
        dt: Duration,
        out: &mut Vec<Event>,
    ) -> Result<(), GridError> {
        let Some(entity) = self.entities.get_mut(&id) else {
            return Ok(());
        };
        entity.cooldown_mut().elapse(dt);
        if entity.path().is_none() {
            entity.cooldown_mut().settle();
            return Ok(());
        }
        if entity.cooldown_mut().is_pending() {
            return Ok(());
        }

        loop {
            let Some(entity) = self.entities.get_mut(&id) else {
                return Ok(());
            };
            let Some(step) = entity.next_step() else {
                break;
            };
            if !entity.cooldown_mut().allows_step() {
                return Ok(());
            }
            let Some(cost) = step_cooldown(entity.movespeed(), step.diagonal) else {
                debug!(
                    "entity {id} cannot move at speed {}; aborting path",
                    entity.movespeed()
                );
                return self.clear_path(id, out);
            };

            match self.move_entity(id, step.from, step.to, step.is_last, out) {
                Ok(()) => {}
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    debug!("entity {id} stopped at {}: {error}", step.from);
                    return self.clear_path(id, out);
                }
            }

            if let Some(entity) = self.entities.get_mut(&id) {
                entity.advance_cursor();
                entity.cooldown_mut().charge(cost);
            }
        }

        self.clear_path(id, out)?;
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.cooldown_mut().settle();
        }
        Ok(())
    }
}
