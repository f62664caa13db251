//! Safe zones, PvP zones and player spawn points.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Smallest corner.
    pub min: Vec2,
    /// Largest corner.
    pub max: Vec2,
}

impl Rect {
    /// Creates a rectangle from two arbitrary corners.
    #[must_use]
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// True if `point` lies inside or on the border.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Zone layout of one shard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zones {
    /// Nobody inside can attack or be attacked.
    pub safe: Vec<Rect>,
    /// Players inside may attack each other.
    pub pvp: Vec<Rect>,
    /// Default player respawn locations.
    pub spawn_points: Vec<Vec2>,
}

impl Zones {
    /// True if `point` is inside any safe zone.
    #[must_use]
    pub fn is_safe(&self, point: Vec2) -> bool {
        self.safe.iter().any(|r| r.contains(point))
    }

    /// True if `point` is inside any PvP zone.
    #[must_use]
    pub fn is_pvp(&self, point: Vec2) -> bool {
        self.pvp.iter().any(|r| r.contains(point))
    }

    /// Spawn point closest to `point`. Ties go to the first listed.
    #[must_use]
    pub fn nearest_spawn(&self, point: Vec2) -> Option<Vec2> {
        let mut best: Option<(f32, Vec2)> = None;
        for spawn in &self.spawn_points {
            let distance = spawn.distance_squared(point);
            if best.map_or(true, |(d, _)| distance < d) {
                best = Some((distance, *spawn));
            }
        }
        best.map(|(_, spawn)| spawn)
    }
}
