#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for fleet console adapters.
//!
//! The scene is an ordered stack of layers. Each layer declares the slices of
//! console state it depends on and is rebuilt only when one of them changes,
//! so a robot poll never touches the pre-rasterised grid. Backends draw the
//! resulting primitives through the current [`Viewport`].

mod layers;
mod project;
mod raster;

use std::{collections::BTreeSet, time::Duration};

use anyhow::Result as AnyResult;
use fleet_console_core::{
    Confirmation, DetectedObject, GoalMarker, GridView, MarkerColor, MousePosition,
    OperatorInput, PathRecord, PlacementMode, RobotId, RobotState, Viewport, ViewportLimits,
};
use glam::DVec2;
use thiserror::Error;

pub use layers::{Layer, LayerId, LayerSpace, SceneLayers, StateSlice};
pub use project::format_map_coordinate;
pub use raster::{
    cell_color, GridRaster, FREE_CELL_COLOR, OCCUPIED_CELL_COLOR, UNKNOWN_CELL_COLOR,
};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Creates an opaque color from a robot or object marker color.
    #[must_use]
    pub const fn from_marker(color: MarkerColor) -> Self {
        Self::from_rgb_u8(color.red(), color.green(), color.blue())
    }

    /// Returns the same color with the provided opacity.
    #[must_use]
    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }

    /// Byte RGBA representation used for bitmaps.
    #[must_use]
    pub fn to_rgba_u8(self) -> [u8; 4] {
        [
            to_byte(self.red),
            to_byte(self.green),
            to_byte(self.blue),
            to_byte(self.alpha),
        ]
    }
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Line style of an outline or polyline.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stroke {
    /// Line color.
    pub color: Color,
    /// Line width in layer units.
    pub width: f64,
}

impl Stroke {
    /// Creates a stroke.
    #[must_use]
    pub const fn new(color: Color, width: f64) -> Self {
        Self { color, width }
    }
}

/// Backend-agnostic drawing instruction.
///
/// Coordinates are pixel space for world layers and screen space for the
/// tooltip layer.
#[derive(Clone, Debug, PartialEq)]
pub enum Primitive {
    /// The cached grid bitmap stretched over a rectangle.
    Raster {
        /// Top-left corner.
        origin: DVec2,
        /// Size of the stretched bitmap.
        size: DVec2,
        /// Grid revision the bitmap must match.
        revision: u64,
    },
    /// A filled circle.
    Circle {
        /// Center of the circle.
        center: DVec2,
        /// Radius of the circle.
        radius: f64,
        /// Fill color.
        fill: Color,
        /// Optional outline.
        outline: Option<Stroke>,
    },
    /// A straight segment.
    Line {
        /// Start of the segment.
        from: DVec2,
        /// End of the segment.
        to: DVec2,
        /// Line style.
        stroke: Stroke,
    },
    /// A dashed straight segment.
    DashedLine {
        /// Start of the segment.
        from: DVec2,
        /// End of the segment.
        to: DVec2,
        /// Line style.
        stroke: Stroke,
        /// Length of each dash.
        dash: f64,
        /// Length of each gap.
        gap: f64,
    },
    /// Connected segments through every point.
    Polyline {
        /// Points in drawing order.
        points: Vec<DVec2>,
        /// Line style.
        stroke: Stroke,
    },
    /// A text label.
    Text {
        /// Top-left corner of the label.
        position: DVec2,
        /// Label contents.
        text: String,
        /// Font size.
        size: f64,
        /// Text color.
        color: Color,
        /// Optional tag drawn behind the text.
        background: Option<Color>,
    },
}

/// Console state consumed when rebuilding layers.
#[derive(Clone, Debug, Default)]
pub struct SceneState<'a> {
    /// Loaded occupancy map.
    pub grid: Option<GridView<'a>>,
    /// Robots from the latest poll.
    pub robots: Vec<RobotState>,
    /// Every robot observed during the session.
    pub seen_robots: BTreeSet<RobotId>,
    /// Selected robot.
    pub selection: Option<RobotId>,
    /// Goal markers.
    pub goals: Vec<GoalMarker>,
    /// Path polylines.
    pub paths: Vec<PathRecord>,
    /// Whether path overlays are drawn.
    pub paths_visible: bool,
    /// Robots whose paths are hidden because they are close to their goal.
    pub suppressed_paths: BTreeSet<RobotId>,
    /// Detected objects.
    pub objects: Vec<DetectedObject>,
    /// Pointer position.
    pub pointer: Option<MousePosition>,
    /// Transient confirmation message.
    pub confirmation: Option<Confirmation>,
    /// Status lines describing feed and sink errors.
    pub status: Vec<String>,
}

/// Operator controls shown next to the map.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct ControlState {
    /// Robots that can be selected.
    pub robots: Vec<RobotId>,
    /// Selected robot.
    pub selection: Option<RobotId>,
    /// Meaning of map clicks.
    pub mode: PlacementMode,
    /// Heading carried by placement commands, in radians.
    pub heading: f64,
    /// Whether path overlays are drawn.
    pub paths_visible: bool,
}

/// Describes everything a backend draws in a frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Layer stack.
    pub layers: SceneLayers,
    /// Pan and zoom applied to world layers.
    pub viewport: Viewport,
    /// Operator controls.
    pub controls: ControlState,
}

impl Scene {
    /// Creates an empty scene with a default viewport.
    #[must_use]
    pub fn new(limits: ViewportLimits) -> Self {
        Self {
            layers: SceneLayers::new(),
            viewport: Viewport::new(limits),
            controls: ControlState::default(),
        }
    }
}

/// Operator gestures gathered by adapters before updating the scene.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct FrameInput {
    /// Gestures in the order they occurred.
    pub actions: Vec<OperatorInput>,
}

/// Top-level description handed to a backend.
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Title used by the created window.
    pub window_title: String,
    /// Solid color used to clear each frame.
    pub clear_color: Color,
    /// Scene content that should be displayed.
    pub scene: Scene,
}

impl Presentation {
    /// Constructs a new presentation descriptor.
    #[must_use]
    pub fn new<T>(window_title: T, clear_color: Color, scene: Scene) -> Self
    where
        T: Into<String>,
    {
        Self {
            window_title: window_title.into(),
            clear_color,
            scene,
        }
    }
}

/// Rendering backend capable of presenting fleet console scenes.
pub trait RenderingBackend {
    /// Runs the rendering backend until it is requested to exit.
    ///
    /// The provided `update_scene` closure receives the frame delta and the
    /// gestures captured by the adapter, and mutates the scene before it is
    /// rendered. An error from the closure stops the backend and is returned
    /// from `run`.
    fn run<F>(self, presentation: Presentation, update_scene: F) -> AnyResult<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) -> AnyResult<()> + 'static;
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum RenderingError {
    /// The window must have a visible area.
    #[error("window dimensions must be positive (received {width}x{height})")]
    InvalidWindowSize {
        /// Requested width in pixels.
        width: i32,
        /// Requested height in pixels.
        height: i32,
    },
}
