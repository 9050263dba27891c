//! Pure projections from console state to layer primitives.

use std::collections::BTreeMap;

use fleet_console_core::{heading_direction, CoordinateTransform, RobotId};
use glam::DVec2;

use crate::{Color, Primitive, SceneState, Stroke};

const ROBOT_RADIUS: f64 = 12.0;
const HEADING_ARROW_LENGTH: f64 = 15.0;
const GOAL_RADIUS: f64 = 8.0;
const GOAL_OPACITY: f32 = 0.6;
const PATH_OPACITY: f32 = 0.7;
const OBJECT_OPACITY: f32 = 0.75;
const LINE_WIDTH: f64 = 2.0;
const DASH_LENGTH: f64 = 5.0;
const LABEL_SIZE: f64 = 12.0;
const CONFIRMATION_SIZE: f64 = 14.0;
const TOOLTIP_OFFSET: DVec2 = DVec2::new(20.0, 20.0);
const CONFIRMATION_RISE: f64 = 30.0;
const GRID_LINE_MIN_CELL_PX: f64 = 2.0;
const GRID_LINE_WIDTH: f64 = 0.5;

const SELECTED_ROBOT_COLOR: Color = Color::from_rgb_u8(0xFF, 0x44, 0x44);
const ROBOT_COLOR: Color = Color::from_rgb_u8(0x44, 0x44, 0xFF);
const OUTLINE_COLOR: Color = Color::from_rgb_u8(0x00, 0x00, 0x00);
const ROBOT_LABEL_COLOR: Color = Color::from_rgb_u8(0xFF, 0xFF, 0xFF);
const GRID_LINE_COLOR: Color = Color::from_rgb_u8(0xDD, 0xDD, 0xDD);
const LABEL_TAG_COLOR: Color = Color::new(1.0, 1.0, 1.0, 0.8);
const TOOLTIP_BACKGROUND: Color = Color::new(0.0, 0.0, 0.0, 0.6);
const CONFIRMATION_BACKGROUND: Color = Color::from_rgb_u8(0x21, 0x96, 0xF3);
const STATUS_COLOR: Color = Color::from_rgb_u8(0xB0, 0x1E, 0x1E);
const STATUS_ORIGIN: DVec2 = DVec2::new(10.0, 20.0);
const STATUS_LINE_HEIGHT: f64 = 18.0;

fn robot_pixels(state: &SceneState<'_>, transform: &CoordinateTransform) -> BTreeMap<RobotId, DVec2> {
    state
        .robots
        .iter()
        .map(|robot| (robot.id, transform.map_to_pixel(robot.position)))
        .collect()
}

fn transform(state: &SceneState<'_>) -> Option<CoordinateTransform> {
    state.grid.as_ref().map(|grid| grid.transform())
}

pub(crate) fn grid(state: &SceneState<'_>) -> Vec<Primitive> {
    let Some(grid) = state.grid.as_ref() else {
        return Vec::new();
    };
    let transform = grid.transform();
    let extent = transform.pixel_extent();
    let mut primitives = vec![Primitive::Raster {
        origin: DVec2::ZERO,
        size: extent,
        revision: grid.revision(),
    }];

    let cell = transform.cell_size_px();
    if cell > GRID_LINE_MIN_CELL_PX {
        let stroke = Stroke::new(GRID_LINE_COLOR, GRID_LINE_WIDTH);
        for column in 0..=transform.grid_width() {
            let x = f64::from(column) * cell;
            primitives.push(Primitive::Line {
                from: DVec2::new(x, 0.0),
                to: DVec2::new(x, extent.y),
                stroke,
            });
        }
        for row in 0..=transform.grid_height() {
            let y = f64::from(row) * cell;
            primitives.push(Primitive::Line {
                from: DVec2::new(0.0, y),
                to: DVec2::new(extent.x, y),
                stroke,
            });
        }
    }
    primitives
}

pub(crate) fn paths(state: &SceneState<'_>) -> Vec<Primitive> {
    if !state.paths_visible {
        return Vec::new();
    }
    let Some(transform) = transform(state) else {
        return Vec::new();
    };
    let robots = robot_pixels(state, &transform);

    // A robot missing from the latest poll keeps its path; one never seen has none yet.
    state
        .paths
        .iter()
        .filter(|path| {
            robots.contains_key(&path.robot) || state.seen_robots.contains(&path.robot)
        })
        .filter(|path| !state.suppressed_paths.contains(&path.robot))
        .filter(|path| path.points.len() >= 2)
        .map(|path| Primitive::Polyline {
            points: path.points.clone(),
            stroke: Stroke::new(Color::from_marker(path.color).with_alpha(PATH_OPACITY), LINE_WIDTH),
        })
        .collect()
}

pub(crate) fn robots(state: &SceneState<'_>) -> Vec<Primitive> {
    let Some(transform) = transform(state) else {
        return Vec::new();
    };
    let mut primitives = Vec::with_capacity(state.robots.len() * 3);

    for robot in &state.robots {
        let center = transform.map_to_pixel(robot.position);
        let fill = if state.selection == Some(robot.id) {
            SELECTED_ROBOT_COLOR
        } else {
            ROBOT_COLOR
        };
        let outline = Stroke::new(OUTLINE_COLOR, LINE_WIDTH);
        primitives.push(Primitive::Circle {
            center,
            radius: ROBOT_RADIUS,
            fill,
            outline: Some(outline),
        });
        primitives.push(Primitive::Line {
            from: center,
            to: center + heading_direction(robot.theta) * HEADING_ARROW_LENGTH,
            stroke: outline,
        });
        primitives.push(Primitive::Text {
            position: center - DVec2::splat(3.0),
            text: robot.id.to_string(),
            size: LABEL_SIZE,
            color: ROBOT_LABEL_COLOR,
            background: None,
        });
    }
    primitives
}

pub(crate) fn goals(state: &SceneState<'_>) -> Vec<Primitive> {
    let Some(transform) = transform(state) else {
        return Vec::new();
    };
    let robots = robot_pixels(state, &transform);
    let mut primitives = Vec::with_capacity(state.goals.len() * 2);

    for goal in &state.goals {
        // Markers staged before the first robot poll wait for the robot.
        let Some(robot) = robots.get(&goal.robot) else {
            continue;
        };
        let color = Color::from_marker(goal.color);
        primitives.push(Primitive::Circle {
            center: goal.pixel,
            radius: GOAL_RADIUS,
            fill: color.with_alpha(GOAL_OPACITY),
            outline: None,
        });
        primitives.push(Primitive::DashedLine {
            from: *robot,
            to: goal.pixel,
            stroke: Stroke::new(color, LINE_WIDTH),
            dash: DASH_LENGTH,
            gap: DASH_LENGTH,
        });
    }
    primitives
}

pub(crate) fn objects(state: &SceneState<'_>) -> Vec<Primitive> {
    let Some(transform) = transform(state) else {
        return Vec::new();
    };
    let mut primitives = Vec::with_capacity(state.objects.len() * 2);

    for object in &state.objects {
        let center = transform.map_to_pixel(object.position);
        let radius = object.appearance.radius();
        primitives.push(Primitive::Circle {
            center,
            radius,
            fill: Color::from_marker(object.appearance.color()).with_alpha(OBJECT_OPACITY),
            outline: Some(Stroke::new(OUTLINE_COLOR, 1.0)),
        });
        primitives.push(Primitive::Text {
            position: center + DVec2::new(radius + 2.0, -10.0),
            text: object.kind.tag().to_owned(),
            size: LABEL_SIZE,
            color: OUTLINE_COLOR,
            background: Some(LABEL_TAG_COLOR),
        });
    }
    primitives
}

pub(crate) fn tooltip(state: &SceneState<'_>) -> Vec<Primitive> {
    let mut primitives = Vec::new();

    if let Some(pointer) = state.pointer {
        if let Some(map) = pointer.map {
            primitives.push(Primitive::Text {
                position: pointer.screen + TOOLTIP_OFFSET,
                text: format_map_coordinate(map),
                size: LABEL_SIZE,
                color: ROBOT_LABEL_COLOR,
                background: Some(TOOLTIP_BACKGROUND),
            });
        }
    }

    if let Some(confirmation) = &state.confirmation {
        primitives.push(Primitive::Text {
            position: confirmation.anchor - DVec2::new(0.0, CONFIRMATION_RISE),
            text: confirmation.message.clone(),
            size: CONFIRMATION_SIZE,
            color: ROBOT_LABEL_COLOR,
            background: Some(CONFIRMATION_BACKGROUND),
        });
    }

    for (index, line) in state.status.iter().enumerate() {
        primitives.push(Primitive::Text {
            position: STATUS_ORIGIN + DVec2::new(0.0, index as f64 * STATUS_LINE_HEIGHT),
            text: line.clone(),
            size: CONFIRMATION_SIZE,
            color: STATUS_COLOR,
            background: Some(LABEL_TAG_COLOR),
        });
    }
    primitives
}

/// Formats a metric coordinate the way the pointer tooltip shows it.
#[must_use]
pub fn format_map_coordinate(map: DVec2) -> String {
    format!("({:.2}, {:.2})", map.x, map.y)
}
