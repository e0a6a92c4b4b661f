//! Watched-set recalculation for entity line-of-sight.

use std::collections::BTreeSet;

use log::debug;
use tilegrid_core::{CellBounds, EntityId, GridError, RegionId, SetDiff};

use crate::Grid;

/// Changes to one entity's watched sets produced by a visibility refresh.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityReport {
    /// Entity whose view was refreshed.
    pub entity: EntityId,
    /// Other entities that came into view, stayed visible, or dropped out.
    pub entities: SetDiff<EntityId>,
    /// Regions that came into view, stayed visible, or dropped out.
    pub regions: SetDiff<RegionId>,
}

impl VisibilityReport {
    /// Reports whether neither watched set changed.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.entities.is_unchanged() && self.regions.is_unchanged()
    }
}

impl Grid {
    /// Recomputes what the entity can see and records the new watched sets.
    ///
    /// Entities count as visible when they stand within `vision_range` cells
    /// on both axes; regions when their bounding box does. The entity never
    /// sees itself.
    pub fn recalculate_observers(&mut self, id: EntityId) -> Result<VisibilityReport, GridError> {
        let entity = self
            .entities
            .get(&id)
            .ok_or(GridError::EntityNotPlaced { entity: id })?;
        let at = entity.coords().ok_or(GridError::EntityNotPlaced { entity: id })?;
        let range = entity.vision_range();
        let radius = i32::try_from(range).unwrap_or(i32::MAX);

        let mut entities = BTreeSet::new();
        if let Some(scan) = self.clamp(CellBounds::around(at, radius)?) {
            for coord in scan.iter() {
                if coord.chebyshev_distance(at) > range {
                    continue;
                }
                let Some(cell) = self.cell(coord) else {
                    continue;
                };
                entities.extend(cell.occupants().iter().copied().filter(|other| *other != id));
            }
        }

        let regions: BTreeSet<RegionId> = self
            .regions
            .values()
            .filter(|region| region.bounds().chebyshev_distance_to(at) <= range)
            .map(|region| region.id())
            .collect();

        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GridError::EntityNotPlaced { entity: id })?;
        let (old_entities, old_regions) = entity.replace_watch(entities, regions);
        let report = VisibilityReport {
            entity: id,
            entities: SetDiff::between(&old_entities, entity.visible_entities()),
            regions: SetDiff::between(&old_regions, entity.visible_regions()),
        };

        if !report.is_unchanged() {
            debug!(
                "entity {id} view changed: +{} -{} entities, +{} -{} regions",
                report.entities.entered.len(),
                report.entities.left.len(),
                report.regions.entered.len(),
                report.regions.left.len()
            );
        }
        Ok(report)
    }
}
