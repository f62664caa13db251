//! Walkable area and grid pathfinding.
//!
//! The walkable area is a rectangle minus a set of circle and box
//! obstacles. Paths are searched on a uniform grid with 8-neighbour A*,
//! using integer costs (10 straight, 14 diagonal) so ordering is exact and
//! the search is deterministic across platforms.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::zone::Rect;

/// A blocked region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Obstacle {
    /// Pillars, trees, rocks.
    Circle {
        /// Center.
        center: Vec2,
        /// Radius.
        radius: f32,
    },
    /// Buildings, walls.
    Box {
        /// Bounds.
        rect: Rect,
    },
}

impl Obstacle {
    /// True if a body of `radius` at `point` overlaps the obstacle.
    #[must_use]
    pub fn blocks(&self, point: Vec2, radius: f32) -> bool {
        match self {
            Self::Circle {
                center,
                radius: obstacle_radius,
            } => point.distance(*center) < radius + obstacle_radius,
            Self::Box { rect } => {
                let closest = point.clamp(rect.min, rect.max);
                point.distance_squared(closest) < radius * radius
                    || (radius == 0.0 && rect.contains(point))
            }
        }
    }
}

/// Navigable area of a shard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavArea {
    /// Outer bounds.
    pub bounds: Rect,
    /// Blocked regions.
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,
    /// Grid cell size used by the path search.
    #[serde(default = "default_cell_size")]
    pub cell_size: f32,
    /// Body radius kept clear of obstacles.
    #[serde(default)]
    pub agent_radius: f32,
}

fn default_cell_size() -> f32 {
    1.0
}

type Cell = (i32, i32);

const STRAIGHT_COST: u32 = 10;
const DIAGONAL_COST: u32 = 14;
const NEIGHBOURS: [(i32, i32, u32); 8] = [
    (1, 0, STRAIGHT_COST),
    (-1, 0, STRAIGHT_COST),
    (0, 1, STRAIGHT_COST),
    (0, -1, STRAIGHT_COST),
    (1, 1, DIAGONAL_COST),
    (1, -1, DIAGONAL_COST),
    (-1, 1, DIAGONAL_COST),
    (-1, -1, DIAGONAL_COST),
];

impl NavArea {
    /// An obstacle-free area.
    #[must_use]
    pub fn open(bounds: Rect) -> Self {
        Self {
            bounds,
            obstacles: Vec::new(),
            cell_size: default_cell_size(),
            agent_radius: 0.0,
        }
    }

    /// Adds an obstacle.
    #[must_use]
    pub fn with_obstacle(mut self, obstacle: Obstacle) -> Self {
        self.obstacles.push(obstacle);
        self
    }

    /// True if a body can stand at `point`.
    #[must_use]
    pub fn is_walkable(&self, point: Vec2) -> bool {
        point.is_finite()
            && self.bounds.contains(point)
            && !self
                .obstacles
                .iter()
                .any(|o| o.blocks(point, self.agent_radius))
    }

    /// Closest walkable point to `point`.
    ///
    /// Searches rings of grid cells outward and falls back to the clamped
    /// point if nothing walkable is found nearby.
    #[must_use]
    pub fn nearest_walkable(&self, point: Vec2) -> Vec2 {
        let clamped = if point.is_finite() {
            point.clamp(self.bounds.min, self.bounds.max)
        } else {
            self.bounds.min
        };
        if self.is_walkable(clamped) {
            return clamped;
        }
        let step = self.cell_size.max(0.1);
        for ring in 1..=64_i32 {
            let mut best: Option<(f32, Vec2)> = None;
            for dx in -ring..=ring {
                for dy in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    #[allow(clippy::cast_precision_loss)]
                    let candidate = clamped + Vec2::new(dx as f32, dy as f32) * step;
                    if !self.is_walkable(candidate) {
                        continue;
                    }
                    let distance = candidate.distance_squared(clamped);
                    if best.map_or(true, |(d, _)| distance < d) {
                        best = Some((distance, candidate));
                    }
                }
            }
            if let Some((_, found)) = best {
                return found;
            }
        }
        clamped
    }

    fn cell_of(&self, point: Vec2) -> Cell {
        let scaled = (point - self.bounds.min) / self.cell_size;
        // grid coordinates are far inside i32 range for any sane map
        #[allow(clippy::cast_possible_truncation)]
        (scaled.x.round() as i32, scaled.y.round() as i32)
    }

    fn center_of(&self, cell: Cell) -> Vec2 {
        #[allow(clippy::cast_precision_loss)]
        let offset = Vec2::new(cell.0 as f32, cell.1 as f32) * self.cell_size;
        self.bounds.min + offset
    }

    fn heuristic(a: Cell, b: Cell) -> u32 {
        let dx = a.0.abs_diff(b.0);
        let dy = a.1.abs_diff(b.1);
        let (long, short) = if dx > dy { (dx, dy) } else { (dy, dx) };
        DIAGONAL_COST * short + STRAIGHT_COST * (long - short)
    }

    /// Finds a walkable path from `start` to `goal`.
    ///
    /// The returned waypoints exclude the start and end exactly at `goal`.
    /// Returns `None` if the goal is blocked or the search exceeds
    /// `max_iterations` expansions.
    #[must_use]
    pub fn find_path(&self, start: Vec2, goal: Vec2, max_iterations: usize) -> Option<Vec<Vec2>> {
        if !self.is_walkable(goal) {
            return None;
        }
        if self.segment_is_clear(start, goal) {
            return Some(vec![goal]);
        }

        let start_cell = self.cell_of(start);
        let goal_cell = self.cell_of(goal);

        let mut open = BinaryHeap::new();
        let mut came_from: HashMap<Cell, Cell> = HashMap::new();
        let mut best_cost: HashMap<Cell, u32> = HashMap::new();
        best_cost.insert(start_cell, 0);
        open.push(Reverse((Self::heuristic(start_cell, goal_cell), 0_u32, start_cell)));

        let mut iterations = 0;
        while let Some(Reverse((_, cost, cell))) = open.pop() {
            if cell == goal_cell {
                let mut path = vec![goal];
                let mut current = cell;
                while let Some(previous) = came_from.get(&current) {
                    if *previous != start_cell {
                        path.push(self.center_of(*previous));
                    }
                    current = *previous;
                }
                path.reverse();
                trace!(waypoints = path.len(), iterations, "path found");
                return Some(path);
            }
            if best_cost.get(&cell).is_some_and(|best| cost > *best) {
                continue;
            }
            iterations += 1;
            if iterations > max_iterations {
                trace!(iterations, "path search gave up");
                return None;
            }
            for (dx, dy, step_cost) in NEIGHBOURS {
                let next = (cell.0 + dx, cell.1 + dy);
                if next != goal_cell && !self.is_walkable(self.center_of(next)) {
                    continue;
                }
                let next_cost = cost + step_cost;
                if best_cost.get(&next).map_or(true, |best| next_cost < *best) {
                    best_cost.insert(next, next_cost);
                    came_from.insert(next, cell);
                    open.push(Reverse((
                        next_cost + Self::heuristic(next, goal_cell),
                        next_cost,
                        next,
                    )));
                }
            }
        }
        None
    }

    /// True if every point on the straight segment is walkable, sampled at
    /// half the cell size.
    #[must_use]
    pub fn segment_is_clear(&self, from: Vec2, to: Vec2) -> bool {
        let length = from.distance(to);
        let step = (self.cell_size * 0.5).max(0.05);
        // sample count is bounded by map size / step
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let samples = (length / step).ceil() as u32;
        (0..=samples.max(1)).all(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / samples.max(1) as f32;
            self.is_walkable(from.lerp(to, t))
        })
    }
}
