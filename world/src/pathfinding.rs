//! Greedy backtracking pathfinder used by the grid.

use std::collections::HashSet;

use tilegrid_core::{Coord, Direction};

const DEFAULT_MAX_EXPANSIONS: usize = 65_536;

/// Limits applied to a single path search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathfindingConfig {
    max_expansions: usize,
}

impl PathfindingConfig {
    /// Creates a configuration allowing at most `max_expansions` cell visits per search.
    #[must_use]
    pub const fn new(max_expansions: usize) -> Self {
        Self { max_expansions }
    }

    /// Maximum number of cells a search may step into before giving up.
    #[must_use]
    pub const fn max_expansions(&self) -> usize {
        self.max_expansions
    }
}

impl Default for PathfindingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EXPANSIONS)
    }
}

/// Result of a single path search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SearchOutcome {
    /// The target was reached; the cells were trimmed back to a standable tail.
    Reached(Vec<Coord>),
    /// No greedy step sequence reaches the target.
    Unreachable,
    /// The expansion budget ran out before the search concluded.
    BudgetExhausted,
}

/// Walks from `start` toward `target`, preferring diagonal, then horizontal,
/// then vertical steps, and backtracking out of dead ends.
///
/// Every step moves strictly closer on at least one axis and never further on
/// the other, so the search depth is bounded by the Manhattan distance. Whether
/// a cell leads to the target depends only on the cell, which lets dead ends be
/// remembered without changing which path is chosen.
pub(crate) fn search<W, S>(
    start: Coord,
    target: Coord,
    config: PathfindingConfig,
    mut is_walkable: W,
    mut is_standable: S,
) -> SearchOutcome
where
    W: FnMut(Coord) -> bool,
    S: FnMut(Coord) -> bool,
{
    let mut cells = vec![start];
    let mut stack = vec![Frame::at(start, target)];
    let mut dead_ends: HashSet<Coord> = HashSet::new();
    let mut expansions = 0usize;

    loop {
        let Some(frame) = stack.last_mut() else {
            return SearchOutcome::Unreachable;
        };

        if frame.cell == target {
            trim_to_standable(&mut cells, &mut is_standable);
            return SearchOutcome::Reached(cells);
        }

        let mut advance = None;
        while let Some(direction) = frame.next_candidate() {
            let next = frame.cell.step(direction);
            if dead_ends.contains(&next) || !is_walkable(next) {
                continue;
            }
            advance = Some(next);
            break;
        }

        match advance {
            Some(next) => {
                expansions += 1;
                if expansions > config.max_expansions {
                    return SearchOutcome::BudgetExhausted;
                }
                cells.push(next);
                stack.push(Frame::at(next, target));
            }
            None => {
                if let Some(failed) = stack.pop() {
                    let _ = dead_ends.insert(failed.cell);
                }
                if !stack.is_empty() {
                    let _ = cells.pop();
                }
            }
        }
    }
}

fn trim_to_standable<S>(cells: &mut Vec<Coord>, is_standable: &mut S)
where
    S: FnMut(Coord) -> bool,
{
    while cells.len() > 1 {
        match cells.last() {
            Some(&tail) if !is_standable(tail) => {
                let _ = cells.pop();
            }
            _ => break,
        }
    }
}

#[derive(Debug)]
struct Frame {
    cell: Coord,
    candidates: [Option<Direction>; 3],
    next: usize,
}

impl Frame {
    fn at(cell: Coord, target: Coord) -> Self {
        let dx = target.x() - cell.x();
        let dy = target.y() - cell.y();
        let diagonal = if dx != 0 && dy != 0 {
            Direction::from_delta(dx, dy)
        } else {
            None
        };
        Self {
            cell,
            candidates: [
                diagonal,
                Direction::from_delta(dx, 0),
                Direction::from_delta(0, dy),
            ],
            next: 0,
        }
    }

    fn next_candidate(&mut self) -> Option<Direction> {
        while self.next < self.candidates.len() {
            let candidate = self.candidates[self.next];
            self.next += 1;
            if candidate.is_some() {
                return candidate;
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(width: i32, height: i32) -> impl FnMut(Coord) -> bool {
        move |cell| (1..=width).contains(&cell.x()) && (1..=height).contains(&cell.y())
    }

    fn reached(outcome: SearchOutcome) -> Vec<Coord> {
        match outcome {
            SearchOutcome::Reached(cells) => cells,
            other => panic!("expected a path, got {other:?}"),
        }
    }

    #[test]
    fn prefers_diagonal_steps() {
        let cells = reached(search(
            Coord::new(1, 1),
            Coord::new(4, 3),
            PathfindingConfig::default(),
            open(10, 10),
            |_| true,
        ));
        assert_eq!(
            cells,
            vec![
                Coord::new(1, 1),
                Coord::new(2, 2),
                Coord::new(3, 3),
                Coord::new(4, 3)
            ]
        );
    }

    #[test]
    fn falls_back_to_horizontal_then_vertical() {
        let blocked = [Coord::new(2, 2)];
        let mut walkable = open(5, 5);
        let cells = reached(search(
            Coord::new(1, 1),
            Coord::new(3, 3),
            PathfindingConfig::default(),
            move |cell| walkable(cell) && !blocked.contains(&cell),
            |_| true,
        ));
        assert_eq!(
            cells,
            vec![
                Coord::new(1, 1),
                Coord::new(2, 1),
                Coord::new(3, 2),
                Coord::new(3, 3)
            ]
        );
    }

    #[test]
    fn backtracks_out_of_dead_ends() {
        // Column 3 is a wall except at row 3; the diagonal opening dead-ends at (2, 2).
        let mut walkable = open(5, 5);
        let cells = reached(search(
            Coord::new(1, 3),
            Coord::new(5, 2),
            PathfindingConfig::default(),
            move |cell| walkable(cell) && (cell.x() != 3 || cell.y() == 3),
            |_| true,
        ));
        assert_eq!(
            cells,
            vec![
                Coord::new(1, 3),
                Coord::new(2, 3),
                Coord::new(3, 3),
                Coord::new(4, 2),
                Coord::new(5, 2)
            ]
        );
    }

    #[test]
    fn reports_unreachable_when_wall_blocks_every_greedy_route() {
        let mut walkable = open(5, 5);
        let outcome = search(
            Coord::new(1, 3),
            Coord::new(5, 3),
            PathfindingConfig::default(),
            move |cell| walkable(cell) && cell.x() != 3,
            |_| true,
        );
        assert_eq!(outcome, SearchOutcome::Unreachable);
    }

    #[test]
    fn trims_occupied_tail_cells() {
        let occupied = [Coord::new(4, 1), Coord::new(5, 1)];
        let cells = reached(search(
            Coord::new(1, 1),
            Coord::new(5, 1),
            PathfindingConfig::default(),
            open(5, 5),
            |cell| !occupied.contains(&cell),
        ));
        assert_eq!(cells.last(), Some(&Coord::new(3, 1)));
        assert_eq!(cells.len(), 3);
    }

    #[test]
    fn trimming_keeps_the_start_cell() {
        let cells = reached(search(
            Coord::new(1, 1),
            Coord::new(2, 1),
            PathfindingConfig::default(),
            open(5, 5),
            |_| false,
        ));
        assert_eq!(cells, vec![Coord::new(1, 1)]);
    }

    #[test]
    fn budget_caps_the_search() {
        let outcome = search(
            Coord::new(1, 1),
            Coord::new(9, 9),
            PathfindingConfig::new(3),
            open(10, 10),
            |_| true,
        );
        assert_eq!(outcome, SearchOutcome::BudgetExhausted);
    }

    #[test]
    fn identical_inputs_yield_identical_paths() {
        let run = || {
            let mut walkable = open(12, 12);
            search(
                Coord::new(2, 11),
                Coord::new(11, 2),
                PathfindingConfig::default(),
                move |cell| walkable(cell) && !(cell.x() == 6 && cell.y() > 3),
                |_| true,
            )
        };
        assert_eq!(run(), run());
    }
}
