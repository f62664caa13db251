//! Player movement driven by client position reports.
//!
//! The client moves its own body and reports where it is. The server checks
//! each report against the walkable area and the distance the player could
//! have covered, and warps the client back when a report is rejected.

use std::sync::Arc;

use glam::Vec2;
use tracing::debug;

use super::{Movement, NavArea, Transform};

/// Whether the owner's state lets a reported position through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePermission {
    /// Idle or moving: reports are checked against the tolerance.
    Allowed,
    /// Casting a skill that forbids movement: the trailing slide is held
    /// without correction unless it exceeds the tolerance.
    HoldSilently,
    /// Dead, stunned or busy: every report is rejected and corrected.
    Denied,
}

/// What happened to a position report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportOutcome {
    /// The position was taken over.
    Accepted,
    /// Arrived faster than the send interval allows. Ignored.
    Dropped,
    /// Not taken over, no correction needed.
    Held,
    /// Not taken over. The client must be warped to this position.
    Corrected(Vec2),
}

/// Player body moved by client reports.
///
/// The server never simulates player motion. It keeps the last accepted
/// position and derives velocity from successive reports.
#[derive(Debug, Clone, PartialEq)]
pub struct RubberbandAgent {
    nav: Arc<NavArea>,
    speed: f32,
    send_interval: f32,
    tolerance_factor: f32,
    velocity: Vec2,
    last_report: Option<f64>,
    idle_time: f32,
    navigate_request: Option<(Vec2, f32)>,
    last_navigate: Option<Vec2>,
}

impl RubberbandAgent {
    /// Creates an agent with the given send interval and tolerance factor.
    #[must_use]
    pub fn new(nav: Arc<NavArea>, speed: f32, send_interval: f32, tolerance_factor: f32) -> Self {
        Self {
            nav,
            speed,
            send_interval,
            tolerance_factor,
            velocity: Vec2::ZERO,
            last_report: None,
            idle_time: 0.0,
            navigate_request: None,
            last_navigate: None,
        }
    }

    /// Maximum accepted divergence between server and client position.
    #[must_use]
    pub fn tolerance(&self) -> f32 {
        self.tolerance_factor * self.speed
    }

    /// Validates a client position report.
    pub fn report(
        &mut self,
        transform: &mut Transform,
        position: Vec2,
        look_direction: Vec2,
        now: f64,
        permission: MovePermission,
    ) -> ReportOutcome {
        let elapsed = match self.last_report {
            Some(last) if now - last < f64::from(self.send_interval) * 0.5 => {
                return ReportOutcome::Dropped;
            }
            Some(last) => now - last,
            None => f64::from(self.send_interval),
        };
        self.last_report = Some(now);

        let divergence = transform.position.distance(position);
        match permission {
            MovePermission::Denied => {
                self.velocity = Vec2::ZERO;
                ReportOutcome::Corrected(transform.position)
            }
            MovePermission::HoldSilently => {
                if divergence > self.tolerance() {
                    ReportOutcome::Corrected(transform.position)
                } else {
                    ReportOutcome::Held
                }
            }
            MovePermission::Allowed => {
                if divergence > self.tolerance() {
                    debug!(divergence, tolerance = self.tolerance(), "rejected position report");
                    self.velocity = Vec2::ZERO;
                    return ReportOutcome::Corrected(transform.position);
                }
                if !self.nav.is_walkable(position) {
                    let valid = self.nav.nearest_walkable(position);
                    self.velocity = Vec2::ZERO;
                    transform.position = valid;
                    return ReportOutcome::Corrected(valid);
                }
                // elapsed is at least half a send interval
                #[allow(clippy::cast_possible_truncation)]
                let seconds = elapsed as f32;
                self.velocity = (position - transform.position) / seconds.max(f32::EPSILON);
                if divergence > f32::EPSILON {
                    self.idle_time = 0.0;
                }
                transform.position = position;
                if let Some(look) = look_direction.try_normalize() {
                    transform.look_direction = look;
                }
                ReportOutcome::Accepted
            }
        }
    }

    /// Removes the pending navigation request for the owning client.
    pub fn take_navigate_request(&mut self) -> Option<(Vec2, f32)> {
        self.navigate_request.take()
    }
}

impl Movement for RubberbandAgent {
    fn velocity(&self) -> Vec2 {
        self.velocity
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed.max(0.0);
    }

    fn reset(&mut self) {
        self.velocity = Vec2::ZERO;
        self.navigate_request = None;
        self.last_navigate = None;
    }

    fn warp(&mut self, transform: &mut Transform, position: Vec2) {
        self.reset();
        self.idle_time = 0.0;
        transform.position = position;
    }

    fn can_navigate(&self) -> bool {
        true
    }

    /// The server cannot move a client-driven body. The request is handed
    /// to the owning client, deduplicated while the destination stays put.
    fn navigate(&mut self, _from: Vec2, destination: Vec2, stopping_distance: f32) -> bool {
        let repeated = self
            .last_navigate
            .is_some_and(|last| last.distance(destination) < 0.5);
        if !repeated {
            self.navigate_request = Some((destination, stopping_distance));
            self.last_navigate = Some(destination);
        }
        true
    }

    fn is_valid_spawn_point(&self, position: Vec2) -> bool {
        self.nav.is_walkable(position)
    }

    fn nearest_valid_destination(&self, position: Vec2) -> Vec2 {
        self.nav.nearest_walkable(position)
    }

    fn advance(&mut self, _transform: &mut Transform, dt: f32) {
        self.idle_time += dt;
        if self.idle_time >= self.send_interval * 2.0 {
            self.velocity = Vec2::ZERO;
            self.last_navigate = None;
        }
    }
}
