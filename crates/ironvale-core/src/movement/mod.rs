//! Movement components.
//!
//! Movement is composed into an entity rather than being part of it. A
//! component never holds a reference back to its owner: every operation
//! that touches the body receives the owner's [`Transform`] explicitly.
//!
//! Two strategies exist:
//!
//! - [`PathAgent`] for server-driven bodies (monsters, NPCs, summons). The
//!   server plans and walks the path, so its positions are trusted.
//! - [`RubberbandAgent`] for players. The client moves freely and reports
//!   its position; the server accepts or corrects each report.

mod agent;
pub mod nav;
mod rubberband;

use glam::Vec2;
use serde::{Deserialize, Serialize};

pub use agent::PathAgent;
pub use nav::{NavArea, Obstacle};
pub use rubberband::{MovePermission, ReportOutcome, RubberbandAgent};

/// Position and facing of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World position.
    pub position: Vec2,
    /// Unit facing direction.
    pub look_direction: Vec2,
}

impl Transform {
    /// A transform at `position` facing +Y.
    #[must_use]
    pub const fn at(position: Vec2) -> Self {
        Self {
            position,
            look_direction: Vec2::Y,
        }
    }

    /// Turns to face `point`. Facing is unchanged if `point` is the
    /// current position.
    pub fn look_at(&mut self, point: Vec2) {
        if let Some(direction) = (point - self.position).try_normalize() {
            self.look_direction = direction;
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::at(Vec2::ZERO)
    }
}

/// Navigation capability of an entity.
pub trait Movement {
    /// Current velocity in meters per second.
    fn velocity(&self) -> Vec2;

    /// True while the body is in motion.
    fn is_moving(&self) -> bool {
        self.velocity().length_squared() > 0.0
    }

    /// Sets the movement speed.
    fn set_speed(&mut self, speed: f32);

    /// Stops immediately, without sliding out.
    fn reset(&mut self);

    /// Relocates the body instantly. Observers must be told reliably.
    fn warp(&mut self, transform: &mut Transform, position: Vec2);

    /// True if the component can plan a route at all.
    fn can_navigate(&self) -> bool;

    /// Starts moving towards `destination`, stopping `stopping_distance`
    /// short of it. Returns false if no route exists.
    fn navigate(&mut self, from: Vec2, destination: Vec2, stopping_distance: f32) -> bool;

    /// True if a body may be placed at `position`.
    fn is_valid_spawn_point(&self, position: Vec2) -> bool;

    /// Closest reachable point to `position`.
    fn nearest_valid_destination(&self, position: Vec2) -> Vec2;

    /// Integrates motion over `dt` seconds.
    fn advance(&mut self, transform: &mut Transform, dt: f32);
}

/// The movement component of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum Locomotion {
    /// Server-driven pathing.
    Path(PathAgent),
    /// Client-driven rubberbanding.
    Rubberband(RubberbandAgent),
}

impl Locomotion {
    /// The rubberband agent, if this is a player body.
    #[must_use]
    pub fn as_rubberband(&self) -> Option<&RubberbandAgent> {
        match self {
            Self::Rubberband(agent) => Some(agent),
            Self::Path(_) => None,
        }
    }

    /// The rubberband agent, mutable.
    pub fn as_rubberband_mut(&mut self) -> Option<&mut RubberbandAgent> {
        match self {
            Self::Rubberband(agent) => Some(agent),
            Self::Path(_) => None,
        }
    }

    /// The path agent, if this is a server-driven body.
    #[must_use]
    pub fn as_path(&self) -> Option<&PathAgent> {
        match self {
            Self::Path(agent) => Some(agent),
            Self::Rubberband(_) => None,
        }
    }

    fn inner(&self) -> &dyn Movement {
        match self {
            Self::Path(agent) => agent,
            Self::Rubberband(agent) => agent,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Movement {
        match self {
            Self::Path(agent) => agent,
            Self::Rubberband(agent) => agent,
        }
    }
}

impl Movement for Locomotion {
    fn velocity(&self) -> Vec2 {
        self.inner().velocity()
    }

    fn is_moving(&self) -> bool {
        self.inner().is_moving()
    }

    fn set_speed(&mut self, speed: f32) {
        self.inner_mut().set_speed(speed);
    }

    fn reset(&mut self) {
        self.inner_mut().reset();
    }

    fn warp(&mut self, transform: &mut Transform, position: Vec2) {
        self.inner_mut().warp(transform, position);
    }

    fn can_navigate(&self) -> bool {
        self.inner().can_navigate()
    }

    fn navigate(&mut self, from: Vec2, destination: Vec2, stopping_distance: f32) -> bool {
        self.inner_mut().navigate(from, destination, stopping_distance)
    }

    fn is_valid_spawn_point(&self, position: Vec2) -> bool {
        self.inner().is_valid_spawn_point(position)
    }

    fn nearest_valid_destination(&self, position: Vec2) -> Vec2 {
        self.inner().nearest_valid_destination(position)
    }

    fn advance(&mut self, transform: &mut Transform, dt: f32) {
        self.inner_mut().advance(transform, dt);
    }
}
