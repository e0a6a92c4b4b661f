use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tilegrid_core::{AreaEffect, CellBounds, Coord, EntityKind, RegionShape};
use tilegrid_system_area_effects::{DamageOverTime, Inert, WarpTrigger};
use tilegrid_world::PathfindingConfig;

/// Scenario file format understood by this build.
const SUPPORTED_SCENARIO_VERSION: u32 = 1;

/// Declarative description of a grid, its population and the run length.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    version: u32,
    pub(crate) grid: GridConfig,
    pub(crate) run: RunConfig,
    #[serde(default)]
    pub(crate) entities: Vec<EntityConfig>,
    #[serde(default)]
    pub(crate) regions: Vec<RegionConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct GridConfig {
    pub(crate) width: u32,
    pub(crate) height: u32,
    #[serde(default)]
    pub(crate) void: Vec<[i32; 2]>,
    #[serde(default)]
    pub(crate) hazards: Vec<[i32; 2]>,
    #[serde(default)]
    max_expansions: Option<usize>,
}

impl GridConfig {
    pub(crate) fn pathfinding(&self) -> PathfindingConfig {
        self.max_expansions
            .map_or_else(PathfindingConfig::default, PathfindingConfig::new)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RunConfig {
    tick_ms: u64,
    pub(crate) ticks: u32,
}

impl RunConfig {
    pub(crate) fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntityConfig {
    pub(crate) kind: EntityKind,
    pub(crate) at: [i32; 2],
    pub(crate) speed: f32,
    pub(crate) vision: u32,
    #[serde(default)]
    pub(crate) target: Option<[i32; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RegionConfig {
    shape: ShapeConfig,
    effect: EffectConfig,
}

impl RegionConfig {
    pub(crate) fn shape(&self) -> Result<RegionShape> {
        match self.shape {
            ShapeConfig::Rect { min, max } => {
                let bounds = CellBounds::new(coord(min), coord(max))
                    .with_context(|| format!("region rectangle {min:?}..{max:?} is malformed"))?;
                Ok(RegionShape::Rect(bounds))
            }
            ShapeConfig::Radius { center, radius } => Ok(RegionShape::Radius {
                center: coord(center),
                radius,
            }),
        }
    }

    pub(crate) fn effect(&self) -> Box<dyn AreaEffect> {
        match self.effect {
            EffectConfig::Damage {
                amount,
                interval_ms,
            } => Box::new(DamageOverTime::new(
                amount,
                Duration::from_millis(interval_ms),
            )),
            EffectConfig::Warp { destination } => Box::new(WarpTrigger::new(coord(destination))),
            EffectConfig::Inert => Box::new(Inert),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ShapeConfig {
    Rect { min: [i32; 2], max: [i32; 2] },
    Radius { center: [i32; 2], radius: i32 },
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum EffectConfig {
    Damage { amount: u32, interval_ms: u64 },
    Warp { destination: [i32; 2] },
    Inert,
}

impl Scenario {
    /// Reads and validates a scenario file.
    pub(crate) fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario at {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("failed to load scenario {}", path.display()))
    }

    pub(crate) fn parse(contents: &str) -> Result<Self> {
        let scenario: Self =
            toml::from_str(contents).context("failed to parse scenario toml contents")?;
        if scenario.version != SUPPORTED_SCENARIO_VERSION {
            bail!(
                "unsupported scenario version {}; expected {}",
                scenario.version,
                SUPPORTED_SCENARIO_VERSION
            );
        }
        if scenario.run.tick_ms == 0 {
            bail!("scenario tick length must be positive");
        }
        Ok(scenario)
    }
}

pub(crate) fn coord([x, y]: [i32; 2]) -> Coord {
    Coord::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        version = 1

        [grid]
        width = 6
        height = 4
        void = [[3, 1], [3, 2]]

        [run]
        tick_ms = 250
        ticks = 8

        [[entities]]
        kind = "player"
        at = [1, 1]
        speed = 2.0
        vision = 3
        target = [6, 1]

        [[regions]]
        shape = { kind = "radius", center = [5, 3], radius = 1 }
        effect = { kind = "damage", amount = 2, interval_ms = 500 }
    "#;

    #[test]
    fn parses_a_complete_scenario() {
        let scenario = Scenario::parse(MINIMAL).expect("scenario parses");

        assert_eq!(scenario.grid.width, 6);
        assert_eq!(scenario.grid.void.len(), 2);
        assert!(scenario.grid.hazards.is_empty());
        assert_eq!(scenario.grid.pathfinding(), PathfindingConfig::default());
        assert_eq!(scenario.run.tick(), Duration::from_millis(250));
        assert_eq!(scenario.run.ticks, 8);

        let entity = &scenario.entities[0];
        assert_eq!(entity.kind, EntityKind::Player);
        assert_eq!(entity.at, [1, 1]);
        assert_eq!(entity.speed, 2.0);
        assert_eq!(entity.vision, 3);
        assert_eq!(entity.target, Some([6, 1]));

        assert_eq!(
            scenario.regions[0].shape().expect("shape"),
            RegionShape::Radius {
                center: Coord::new(5, 3),
                radius: 1
            }
        );
        let _effect = scenario.regions[0].effect();
    }

    #[test]
    fn rejects_unsupported_versions() {
        let contents = MINIMAL.replace("version = 1", "version = 7");
        let error = Scenario::parse(&contents).expect_err("version mismatch");
        assert!(error.to_string().contains("unsupported scenario version 7"));
    }

    #[test]
    fn rejects_unknown_effects() {
        let contents = MINIMAL.replace("kind = \"damage\"", "kind = \"freeze\"");
        assert!(Scenario::parse(&contents).is_err());
    }

    #[test]
    fn rejects_inverted_rectangles() {
        let contents = MINIMAL.replace(
            "shape = { kind = \"radius\", center = [5, 3], radius = 1 }",
            "shape = { kind = \"rect\", min = [4, 4], max = [2, 2] }",
        );
        let scenario = Scenario::parse(&contents).expect("syntax is valid");
        assert!(scenario.regions[0].shape().is_err());
    }

    #[test]
    fn honours_custom_search_budget() {
        let contents = MINIMAL.replace("height = 4", "height = 4\nmax_expansions = 32");
        let scenario = Scenario::parse(&contents).expect("scenario parses");
        assert_eq!(scenario.grid.pathfinding(), PathfindingConfig::new(32));
    }
}
