#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Visibility system that refreshes every observer's watched sets once per tick.

use log::warn;
use tilegrid_core::{EntityId, Event};
use tilegrid_world::{Entity, Grid, VisibilityReport};

/// Recomputes line-of-sight for placed entities and publishes the changes.
#[derive(Debug, Default)]
pub struct Observers {
    scratch_ids: Vec<EntityId>,
}

impl Observers {
    /// Creates a system with an empty scratch buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes grid events and refreshes visibility when a tick was observed.
    ///
    /// Only reports where something entered or left view are pushed to `out`.
    pub fn handle(&mut self, events: &[Event], grid: &mut Grid, out: &mut Vec<VisibilityReport>) {
        if !events
            .iter()
            .any(|event| matches!(event, Event::TimeAdvanced { .. }))
        {
            return;
        }

        self.refresh(grid, out);
    }

    /// Refreshes every placed entity in identifier order.
    pub fn refresh(&mut self, grid: &mut Grid, out: &mut Vec<VisibilityReport>) {
        self.scratch_ids.clear();
        self.scratch_ids.extend(grid.entities().map(Entity::id));

        for &id in &self.scratch_ids {
            match grid.recalculate_observers(id) {
                Ok(report) if report.is_unchanged() => {}
                Ok(report) => out.push(report),
                Err(error) => warn!("skipping visibility refresh for entity {id}: {error}"),
            }
        }
    }
}
