#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Translates operator gestures into console commands and fleet commands.

use fleet_console_core::{
    Command, CoordinateTransform, OperatorInput, PlacementMode, RobotId, SinkCommand, Viewport,
};
use glam::DVec2;
use tracing::debug;

/// Console state the interaction handler needs to interpret gestures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InteractionContext {
    /// Current pan and zoom state.
    pub viewport: Viewport,
    /// Transform of the loaded grid, if any.
    pub transform: Option<CoordinateTransform>,
    /// Robot targeted by operator commands.
    pub selection: Option<RobotId>,
    /// Meaning of map clicks.
    pub mode: PlacementMode,
    /// Heading carried by placement commands, in radians.
    pub heading: f64,
}

impl InteractionContext {
    /// Converts a screen position into the metric frame, once a grid is loaded.
    #[must_use]
    pub fn screen_to_map(&self, screen: DVec2) -> Option<DVec2> {
        let transform = self.transform?;
        Some(transform.pixel_to_map(self.viewport.to_world_pixel(screen)))
    }
}

/// Pure system that maps operator gestures onto commands.
#[derive(Debug, Default)]
pub struct Interaction;

impl Interaction {
    /// Interprets the frame's gestures in order.
    ///
    /// Gestures earlier in the batch affect later ones: a selection followed
    /// by a click targets the newly selected robot. `timestamp_ms` stamps the
    /// placement commands forwarded to the fleet.
    pub fn handle(
        &mut self,
        inputs: &[OperatorInput],
        context: &InteractionContext,
        timestamp_ms: u64,
        out: &mut Vec<Command>,
        sink: &mut Vec<SinkCommand>,
    ) {
        let mut context = *context;

        for input in inputs {
            match input {
                OperatorInput::PointerMoved { screen } => {
                    out.push(Command::MovePointer { screen: *screen });
                }
                OperatorInput::Click { screen } => {
                    place(&context, *screen, timestamp_ms, out, sink);
                }
                OperatorInput::Wheel { pointer, direction } => {
                    let _ = context.viewport.zoom_at(*pointer, *direction);
                    out.push(Command::ZoomAtPointer {
                        pointer: *pointer,
                        direction: *direction,
                    });
                }
                OperatorInput::Drag { delta } => {
                    context.viewport.pan(*delta);
                    out.push(Command::Pan { delta: *delta });
                }
                OperatorInput::ZoomButton { direction } => {
                    let _ = context.viewport.zoom_step(*direction);
                    out.push(Command::ZoomStep {
                        direction: *direction,
                    });
                }
                OperatorInput::ResetZoom => {
                    context.viewport.reset();
                    out.push(Command::ResetView);
                }
                OperatorInput::SelectRobot { robot } => {
                    context.selection = *robot;
                    out.push(Command::SelectRobot { robot: *robot });
                }
                OperatorInput::SetPlacementMode { mode } => {
                    context.mode = *mode;
                    out.push(Command::SetPlacementMode { mode: *mode });
                }
                OperatorInput::SetPlacementHeading { theta } => {
                    context.heading = *theta;
                    out.push(Command::SetPlacementHeading { theta: *theta });
                }
                OperatorInput::ClearSelectedGoal => {
                    if let Some(robot) = context.selection {
                        out.push(Command::ClearGoal { robot });
                    }
                }
                OperatorInput::ClearAllGoals => out.push(Command::ClearAllGoals),
                OperatorInput::ClearAllObjects => {
                    out.push(Command::ClearAllObjects);
                    sink.push(SinkCommand::ClearAllObjects);
                }
                OperatorInput::TogglePaths => out.push(Command::TogglePaths),
                OperatorInput::StopSelectedRobot => {
                    if let Some(robot) = context.selection {
                        sink.push(SinkCommand::StopRobot { robot });
                    }
                }
            }
        }
    }
}

fn place(
    context: &InteractionContext,
    screen: DVec2,
    timestamp: u64,
    out: &mut Vec<Command>,
    sink: &mut Vec<SinkCommand>,
) {
    let Some(robot) = context.selection else {
        debug!("click ignored: no robot selected");
        return;
    };
    let Some(map) = context.screen_to_map(screen) else {
        debug!("click ignored: no grid loaded");
        return;
    };
    let theta = context.heading;

    match context.mode {
        PlacementMode::Goal => {
            out.push(Command::StageGoal { robot, map, theta });
            sink.push(SinkCommand::SetGoal {
                robot,
                x: map.x,
                y: map.y,
                theta,
                timestamp,
            });
        }
        PlacementMode::InitialPosition => {
            sink.push(SinkCommand::SetInitialPosition {
                robot,
                x: map.x,
                y: map.y,
                theta,
                timestamp,
            });
            out.push(Command::ShowConfirmation {
                message: format!("Initial position set for Robot {robot}"),
                anchor: screen,
            });
        }
    }
}
