//! Server-driven movement for monsters, NPCs and summons.
//!
//! The agent plans a path over the walkable area and walks its waypoints
//! at the owner's speed until it is within the stopping distance.

use std::collections::VecDeque;
use std::sync::Arc;

use glam::Vec2;
use tracing::debug;

use super::{Movement, NavArea, Transform};

/// Server-driven body that walks A* waypoints at its speed.
#[derive(Debug, Clone, PartialEq)]
pub struct PathAgent {
    nav: Arc<NavArea>,
    speed: f32,
    max_iterations: usize,
    velocity: Vec2,
    waypoints: VecDeque<Vec2>,
    destination: Option<Vec2>,
    stopping_distance: f32,
}

impl PathAgent {
    /// Creates an idle agent.
    #[must_use]
    pub fn new(nav: Arc<NavArea>, speed: f32, max_iterations: usize) -> Self {
        Self {
            nav,
            speed,
            max_iterations,
            velocity: Vec2::ZERO,
            waypoints: VecDeque::new(),
            destination: None,
            stopping_distance: 0.0,
        }
    }

    /// Final destination of the current route.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec2> {
        self.destination
    }

    /// Current movement speed.
    #[must_use]
    pub const fn speed(&self) -> f32 {
        self.speed
    }

    fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
        self.waypoints.clear();
        self.destination = None;
    }
}

impl Movement for PathAgent {
    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn is_moving(&self) -> bool {
        self.destination.is_some()
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    fn reset(&mut self) {
        self.stop();
    }

    fn warp(&mut self, transform: &mut Transform, position: Vec2) {
        self.stop();
        transform.position = position;
    }

    fn can_navigate(&self) -> bool {
        true
    }

    fn navigate(&mut self, from: Vec2, destination: Vec2, stopping_distance: f32) -> bool {
        if from.distance(destination) <= stopping_distance {
            self.stop();
            return true;
        }
        match self.nav.find_path(from, destination, self.max_iterations) {
            Some(path) => {
                self.waypoints = path.into();
                self.destination = Some(destination);
                self.stopping_distance = stopping_distance.max(0.0);
                true
            }
            None => {
                debug!(?from, ?destination, "no path");
                self.stop();
                false
            }
        }
    }

    fn is_valid_spawn_point(&self, position: Vec2) -> bool {
        self.nav.is_walkable(position)
    }

    fn nearest_valid_destination(&self, position: Vec2) -> Vec2 {
        self.nav.nearest_walkable(position)
    }

    fn advance(&mut self, transform: &mut Transform, dt: f32) {
        let Some(destination) = self.destination else {
            self.velocity = Vec2::ZERO;
            return;
        };
        let mut budget = self.speed * dt;
        let start = transform.position;
        while budget > 0.0 {
            if transform.position.distance(destination) <= self.stopping_distance {
                break;
            }
            let Some(waypoint) = self.waypoints.front().copied() else {
                break;
            };
            let to_waypoint = waypoint - transform.position;
            let distance = to_waypoint.length();
            if distance <= budget {
                transform.position = waypoint;
                budget -= distance;
                self.waypoints.pop_front();
            } else {
                transform.position += to_waypoint / distance * budget;
                budget = 0.0;
            }
        }
        transform.look_at(destination);

        let arrived = transform.position.distance(destination) <= self.stopping_distance
            || self.waypoints.is_empty();
        if arrived {
            self.stop();
        } else if dt > 0.0 {
            self.velocity = (transform.position - start) / dt;
        }
    }
}
