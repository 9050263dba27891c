#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Decides which path overlays are hidden because their robot has nearly
//! reached its goal.

use std::collections::{BTreeMap, BTreeSet};

use fleet_console_core::{CoordinateTransform, GoalMarker, RobotId, RobotState};
use glam::DVec2;
use thiserror::Error;

/// Pixel distance below which a path is hidden unless configured otherwise.
pub const DEFAULT_HIDE_THRESHOLD_PX: f64 = 30.0;

/// Hides the path of a robot whose rendered position is close to its goal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProximityPolicy {
    hide_threshold_px: f64,
}

impl ProximityPolicy {
    /// Creates a policy hiding paths closer than `hide_threshold_px` to their goal.
    pub fn new(hide_threshold_px: f64) -> Result<Self, ProximityError> {
        if !hide_threshold_px.is_finite() || hide_threshold_px < 0.0 {
            return Err(ProximityError::InvalidThreshold { hide_threshold_px });
        }
        Ok(Self { hide_threshold_px })
    }

    /// Distance in pixels below which paths are hidden.
    #[must_use]
    pub const fn hide_threshold_px(&self) -> f64 {
        self.hide_threshold_px
    }

    /// Reports whether the path of a robot at `robot_pixel` should be drawn.
    ///
    /// Robots without a goal always show their path.
    #[must_use]
    pub fn path_visible(&self, robot_pixel: DVec2, goal_pixel: Option<DVec2>) -> bool {
        match goal_pixel {
            Some(goal) => robot_pixel.distance(goal) >= self.hide_threshold_px,
            None => true,
        }
    }

    /// Robots whose paths must not be drawn this frame.
    #[must_use]
    pub fn suppressed_paths<'a>(
        &self,
        robots: impl IntoIterator<Item = &'a RobotState>,
        goals: impl IntoIterator<Item = &'a GoalMarker>,
        transform: &CoordinateTransform,
    ) -> BTreeSet<RobotId> {
        let goals: BTreeMap<RobotId, DVec2> = goals
            .into_iter()
            .map(|goal| (goal.robot, goal.pixel))
            .collect();

        robots
            .into_iter()
            .filter(|robot| {
                let pixel = transform.map_to_pixel(robot.position);
                !self.path_visible(pixel, goals.get(&robot.id).copied())
            })
            .map(|robot| robot.id)
            .collect()
    }
}

impl Default for ProximityPolicy {
    fn default() -> Self {
        Self {
            hide_threshold_px: DEFAULT_HIDE_THRESHOLD_PX,
        }
    }
}

/// Reasons a proximity policy is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ProximityError {
    /// The threshold is negative or not finite.
    #[error("path hide threshold must be a non-negative finite number (received {hide_threshold_px})")]
    InvalidThreshold {
        /// Requested threshold in pixels.
        hide_threshold_px: f64,
    },
}
