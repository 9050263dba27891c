//! Conversion of feed snapshots into keyed console state.

use std::collections::BTreeMap;

use fleet_console_core::{
    CellState, CoordinateTransform, DetectedObject, GoalMarker, GoalReport, GridError, GridReport,
    MarkerColor, ObjectId, ObjectKind, ObjectReport, PathRecord, PathReport, RobotId,
    RobotReport, RobotState,
};
use glam::DVec2;

/// Occupancy map accepted by the console.
#[derive(Debug)]
pub(crate) struct LoadedGrid {
    pub(crate) transform: CoordinateTransform,
    pub(crate) cells: Vec<CellState>,
}

impl LoadedGrid {
    pub(crate) fn from_report(report: &GridReport, cell_size_px: f64) -> Result<Self, GridError> {
        let transform = CoordinateTransform::new(
            report.width,
            report.height,
            report.resolution,
            cell_size_px,
        )?;
        let expected = u64::from(report.width) * u64::from(report.height);
        let actual = report.occupancy.len() as u64;
        if expected != actual {
            return Err(GridError::OccupancyMismatch {
                width: report.width,
                height: report.height,
                expected,
                actual,
            });
        }

        Ok(Self {
            transform,
            cells: report
                .occupancy
                .iter()
                .map(|value| CellState::from_value(*value))
                .collect(),
        })
    }
}

/// Metric goal kept independently of the grid so markers survive a reload.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct GoalTarget {
    pub(crate) map: DVec2,
    pub(crate) theta: f64,
}

pub(crate) fn robots_from_reports(reports: Vec<RobotReport>) -> BTreeMap<RobotId, RobotState> {
    reports
        .into_iter()
        .map(|report| {
            (
                report.id,
                RobotState {
                    id: report.id,
                    position: DVec2::new(report.x, report.y),
                    theta: report.theta,
                },
            )
        })
        .collect()
}

pub(crate) fn goal_targets_from_reports(reports: &[GoalReport]) -> BTreeMap<RobotId, GoalTarget> {
    reports
        .iter()
        .map(|report| {
            (
                report.id,
                GoalTarget {
                    map: DVec2::new(report.x_goal, report.y_goal),
                    theta: report.theta_goal,
                },
            )
        })
        .collect()
}

pub(crate) fn goal_marker(
    robot: RobotId,
    target: GoalTarget,
    transform: &CoordinateTransform,
) -> GoalMarker {
    GoalMarker {
        robot,
        map: target.map,
        pixel: transform.map_to_pixel(target.map),
        theta: target.theta,
        color: MarkerColor::for_robot(robot),
    }
}

pub(crate) fn goal_markers(
    targets: &BTreeMap<RobotId, GoalTarget>,
    transform: &CoordinateTransform,
) -> BTreeMap<RobotId, GoalMarker> {
    targets
        .iter()
        .map(|(robot, target)| (*robot, goal_marker(*robot, *target, transform)))
        .collect()
}

/// Groups waypoint pairs by robot, preserving report order.
///
/// Axis arrays of unequal length are truncated to the shorter one. Returns the
/// grouped waypoints and the number of reports that had to be truncated.
pub(crate) fn waypoints_from_reports(
    reports: Vec<PathReport>,
) -> (BTreeMap<RobotId, Vec<DVec2>>, usize) {
    let mut grouped: BTreeMap<RobotId, Vec<DVec2>> = BTreeMap::new();
    let mut truncated = 0;
    for report in reports {
        if report.x.len() != report.y.len() {
            truncated += 1;
        }
        grouped.entry(report.id).or_default().extend(
            report
                .x
                .iter()
                .zip(report.y.iter())
                .map(|(x, y)| DVec2::new(*x, *y)),
        );
    }
    (grouped, truncated)
}

pub(crate) fn path_records(
    waypoints: &BTreeMap<RobotId, Vec<DVec2>>,
    transform: &CoordinateTransform,
) -> BTreeMap<RobotId, PathRecord> {
    waypoints
        .iter()
        .map(|(robot, points)| {
            (
                *robot,
                PathRecord {
                    robot: *robot,
                    points: points
                        .iter()
                        .map(|point| transform.map_to_pixel(*point))
                        .collect(),
                    color: MarkerColor::for_robot(*robot),
                },
            )
        })
        .collect()
}

pub(crate) fn objects_from_reports(
    reports: Vec<ObjectReport>,
) -> BTreeMap<ObjectId, DetectedObject> {
    reports
        .into_iter()
        .map(|report| {
            let kind = ObjectKind::from_tag(&report.kind);
            let appearance = kind.appearance();
            (
                report.id,
                DetectedObject {
                    id: report.id,
                    position: DVec2::new(report.x, report.y),
                    kind,
                    appearance,
                },
            )
        })
        .collect()
}
