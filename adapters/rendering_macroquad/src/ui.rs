//! Immediate-mode control panel for the Macroquad rendering backend.
//!
//! This module hosts all uses of `macroquad::ui` so the rest of the adapter can
//! remain agnostic of Macroquad's UI types.

use fleet_console_core::{
    heading_from_screen, heading_to_screen, OperatorInput, PlacementMode, ZoomDirection,
};
use fleet_console_rendering::ControlState;
use macroquad::{
    color::{Color, WHITE},
    math::{RectOffset, Vec2},
    ui::{hash, Ui},
};

const HEADING_RANGE_DEGREES: f32 = 180.0;
const HEADING_EPSILON_DEGREES: f32 = 0.5;

/// Outcome of drawing the control panel during the current frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ControlPanelUiResult {
    /// Gestures requested through panel widgets, in widget order.
    pub actions: Vec<OperatorInput>,
}

/// Snapshot of the control panel's layout and data for the current frame.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ControlPanelUiContext<'a> {
    /// Top-left corner of the panel in screen coordinates.
    pub origin: Vec2,
    /// Panel dimensions in screen space.
    pub size: Vec2,
    /// Background colour applied to the window skin.
    pub background: Color,
    /// Controls mirrored from the console.
    pub controls: &'a ControlState,
}

/// Renders the panel widgets and reports the gestures they produced.
///
/// `heading_degrees` holds the slider position between frames and is
/// resynchronised from the console whenever the operator is not dragging it.
/// The slider shows the on-screen angle, not the feed heading.
pub(crate) fn draw_control_panel_ui(
    ui: &mut Ui,
    context: ControlPanelUiContext<'_>,
    heading_degrees: &mut f32,
) -> ControlPanelUiResult {
    let mut skin = ui.default_skin();
    skin.margin = 0.0;

    let window_style = ui
        .style_builder()
        .color(context.background)
        .color_hovered(context.background)
        .color_clicked(context.background)
        .color_selected(context.background)
        .color_selected_hovered(context.background)
        .color_inactive(context.background)
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(16.0, 16.0, 16.0, 16.0))
        .build();
    skin.window_style = window_style;

    let label_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .margin(RectOffset::new(0.0, 0.0, 4.0, 4.0))
        .build();
    skin.label_style = label_style;

    let button_style = ui
        .style_builder()
        .text_color(WHITE)
        .text_color_hovered(WHITE)
        .text_color_clicked(WHITE)
        .color(Color::from_rgba(70, 70, 70, 255))
        .color_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_clicked(Color::from_rgba(56, 56, 56, 255))
        .color_selected(Color::from_rgba(70, 70, 70, 255))
        .color_selected_hovered(Color::from_rgba(96, 96, 96, 255))
        .color_inactive(Color::from_rgba(56, 56, 56, 200))
        .margin(RectOffset::new(0.0, 0.0, 6.0, 6.0))
        .build();
    skin.button_style = button_style;

    ui.push_skin(&skin);

    let controls = context.controls;
    let mut actions = Vec::new();
    let _ = ui.window(hash!("control_panel"), context.origin, context.size, |ui| {
        ui.label(None, "View");
        if ui.button(None, "Zoom in") {
            actions.push(OperatorInput::ZoomButton {
                direction: ZoomDirection::In,
            });
        }
        if ui.button(None, "Zoom out") {
            actions.push(OperatorInput::ZoomButton {
                direction: ZoomDirection::Out,
            });
        }
        if ui.button(None, "Reset zoom") {
            actions.push(OperatorInput::ResetZoom);
        }
        let paths_label = if controls.paths_visible {
            "Hide paths"
        } else {
            "Show paths"
        };
        if ui.button(None, paths_label) {
            actions.push(OperatorInput::TogglePaths);
        }

        ui.separator();
        ui.label(None, "Robots");
        let selection_label = match controls.selection {
            Some(robot) => format!("Selected: Robot {robot}"),
            None => "Selected: none".to_owned(),
        };
        ui.label(None, &selection_label);
        for robot in &controls.robots {
            let marker = if controls.selection == Some(*robot) {
                ">"
            } else {
                " "
            };
            if ui.button(None, format!("{marker} Robot {robot}").as_str()) {
                actions.push(OperatorInput::SelectRobot {
                    robot: Some(*robot),
                });
            }
        }
        if controls.selection.is_some() && ui.button(None, "Deselect") {
            actions.push(OperatorInput::SelectRobot { robot: None });
        }

        ui.separator();
        ui.label(None, "Placement");
        let (mode_label, toggled) = match controls.mode {
            PlacementMode::Goal => ("Mode: goal", PlacementMode::InitialPosition),
            PlacementMode::InitialPosition => ("Mode: initial position", PlacementMode::Goal),
        };
        ui.label(None, mode_label);
        if ui.button(None, "Switch mode") {
            actions.push(OperatorInput::SetPlacementMode { mode: toggled });
        }
        ui.slider(
            hash!("heading"),
            "Heading",
            -HEADING_RANGE_DEGREES..HEADING_RANGE_DEGREES,
            heading_degrees,
        );
        if let Some(theta) = heading_change(controls.heading, *heading_degrees) {
            actions.push(OperatorInput::SetPlacementHeading { theta });
        }

        ui.separator();
        ui.label(None, "Commands");
        if ui.button(None, "Stop robot") {
            actions.push(OperatorInput::StopSelectedRobot);
        }
        if ui.button(None, "Clear selected goal") {
            actions.push(OperatorInput::ClearSelectedGoal);
        }
        if ui.button(None, "Clear all goals") {
            actions.push(OperatorInput::ClearAllGoals);
        }
        if ui.button(None, "Clear all objects") {
            actions.push(OperatorInput::ClearAllObjects);
        }
    });

    ui.pop_skin();

    ControlPanelUiResult { actions }
}

/// Slider position in degrees for a placement heading in radians.
pub(crate) fn slider_degrees(theta: f64) -> f32 {
    wrap_degrees(heading_to_screen(theta).to_degrees()) as f32
}

/// Placement heading in radians when the slider moved away from `theta`.
pub(crate) fn heading_change(theta: f64, slider: f32) -> Option<f64> {
    let moved = wrap_degrees(f64::from(slider) - f64::from(slider_degrees(theta)));
    if moved.abs() < f64::from(HEADING_EPSILON_DEGREES) {
        return None;
    }
    let heading = heading_from_screen(f64::from(slider).to_radians()).to_degrees();
    Some(wrap_degrees(heading).to_radians())
}

/// Wraps an angle into `[-180, 180)`.
fn wrap_degrees(degrees: f64) -> f64 {
    (degrees + 180.0).rem_euclid(360.0) - 180.0
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn slider_shows_the_mirrored_screen_angle() {
        assert!((slider_degrees(0.0) + 180.0).abs() < 1e-4);
        assert!((slider_degrees(FRAC_PI_2) - 90.0).abs() < 1e-4);
        assert!((slider_degrees(-FRAC_PI_2) + 90.0).abs() < 1e-4);
    }

    #[test]
    fn slider_jitter_is_not_reported() {
        assert_eq!(heading_change(FRAC_PI_2, 90.2), None);
        assert_eq!(heading_change(0.0, 179.8), None);
    }

    #[test]
    fn slider_moves_are_converted_back_to_feed_headings() {
        let theta = heading_change(0.0, 45.0).expect("heading changed");
        assert!((theta - 135.0_f64.to_radians()).abs() < 1e-9);

        let theta = heading_change(0.0, 0.0).expect("heading changed");
        assert!((theta + 180.0_f64.to_radians()).abs() < 1e-9);
    }
}
