#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Macroquad-backed rendering adapter for the fleet console.
//!
//! Macroquad's optional audio stack depends on native ALSA development
//! libraries, which are unavailable in the containerised CI environment, so
//! the adapter depends on macroquad without its default `audio` feature.
//!
//! World layers are drawn through the scene viewport and the tooltip layer is
//! drawn in screen space. The grid bitmap is uploaded to the GPU once per grid
//! revision. All UI-specific calls live inside the local `ui` module.

mod ui;

use self::ui::{draw_control_panel_ui, slider_degrees, ControlPanelUiContext, ControlPanelUiResult};
use anyhow::{Context, Result};
use fleet_console_core::{OperatorInput, Viewport, ZoomDirection};
use fleet_console_rendering::{
    Color, FrameInput, GridRaster, Layer, LayerSpace, Presentation, Primitive, RenderingBackend,
    RenderingError, Scene,
};
use glam::DVec2;
use macroquad::math::Vec2 as MacroquadVec2;
use macroquad::{
    input::{
        is_key_pressed, is_mouse_button_down, is_mouse_button_pressed, is_mouse_button_released,
        mouse_position, mouse_wheel, KeyCode, MouseButton,
    },
    texture::{DrawTextureParams, FilterMode, Texture2D},
};
use std::{sync::mpsc, time::Duration};

/// Width of the control panel docked to the right edge of the window.
const PANEL_WIDTH: f32 = 240.0;
/// Pointer travel below which a press and release count as a click.
const CLICK_SLOP_PX: f64 = 4.0;
/// Padding around text drawn on a tag.
const TEXT_TAG_PADDING: f32 = 3.0;

/// Panel gestures latched until the next frame's input is gathered.
#[doc(hidden)]
#[derive(Clone, Debug, Default)]
pub struct ControlPanelRequests {
    pending: Vec<OperatorInput>,
}

impl ControlPanelRequests {
    /// Records gestures produced by panel widgets this frame.
    pub fn register(&mut self, actions: Vec<OperatorInput>) {
        self.pending.extend(actions);
    }

    /// Returns the latched gestures, clearing them so each fires once.
    pub fn take(&mut self) -> Vec<OperatorInput> {
        std::mem::take(&mut self.pending)
    }
}

/// Snapshot of edge-triggered keyboard shortcuts observed during a single frame.
#[derive(Clone, Copy, Debug, Default)]
struct KeyboardShortcuts {
    /// `Q` or `Escape` to quit the render loop.
    quit_requested: bool,
    /// `+` zooms in by one button step.
    zoom_in: bool,
    /// `-` zooms out by one button step.
    zoom_out: bool,
    /// `0` restores the default view.
    reset_zoom: bool,
    /// `P` toggles path overlays.
    toggle_paths: bool,
    /// `Delete` clears the selected robot's goal.
    clear_goal: bool,
}

impl KeyboardShortcuts {
    fn poll() -> Self {
        Self {
            quit_requested: is_key_pressed(KeyCode::Escape) || is_key_pressed(KeyCode::Q),
            zoom_in: is_key_pressed(KeyCode::Equal) || is_key_pressed(KeyCode::KpAdd),
            zoom_out: is_key_pressed(KeyCode::Minus) || is_key_pressed(KeyCode::KpSubtract),
            reset_zoom: is_key_pressed(KeyCode::Key0) || is_key_pressed(KeyCode::Kp0),
            toggle_paths: is_key_pressed(KeyCode::P),
            clear_goal: is_key_pressed(KeyCode::Delete),
        }
    }

    fn actions(&self) -> Vec<OperatorInput> {
        let mut actions = Vec::new();
        if self.zoom_in {
            actions.push(OperatorInput::ZoomButton {
                direction: ZoomDirection::In,
            });
        }
        if self.zoom_out {
            actions.push(OperatorInput::ZoomButton {
                direction: ZoomDirection::Out,
            });
        }
        if self.reset_zoom {
            actions.push(OperatorInput::ResetZoom);
        }
        if self.toggle_paths {
            actions.push(OperatorInput::TogglePaths);
        }
        if self.clear_goal {
            actions.push(OperatorInput::ClearSelectedGoal);
        }
        actions
    }
}

/// Rendering backend implemented on top of macroquad.
#[derive(Debug)]
pub struct MacroquadBackend {
    swap_interval: Option<i32>,
    window_width: i32,
    window_height: i32,
}

impl Default for MacroquadBackend {
    fn default() -> Self {
        Self {
            swap_interval: None,
            window_width: 1280,
            window_height: 800,
        }
    }
}

impl MacroquadBackend {
    /// Returns a backend that requests the platform's default swap interval.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the backend to request a specific swap interval from the platform.
    #[must_use]
    pub fn with_swap_interval(mut self, swap_interval: Option<i32>) -> Self {
        self.swap_interval = swap_interval;
        self
    }

    /// Configures the backend to either synchronise presentation with the display refresh rate
    /// or render as fast as possible.
    #[must_use]
    pub fn with_vsync(self, enabled: bool) -> Self {
        let swap_interval = if enabled { Some(1) } else { Some(0) };
        self.with_swap_interval(swap_interval)
    }

    /// Configures the initial window size in pixels.
    pub fn with_window_size(mut self, width: i32, height: i32) -> Result<Self, RenderingError> {
        if width <= 0 || height <= 0 {
            return Err(RenderingError::InvalidWindowSize { width, height });
        }
        self.window_width = width;
        self.window_height = height;
        Ok(self)
    }
}

impl RenderingBackend for MacroquadBackend {
    fn run<F>(self, presentation: Presentation, mut update_scene: F) -> Result<()>
    where
        F: FnMut(Duration, FrameInput, &mut Scene) -> Result<()> + 'static,
    {
        let Self {
            swap_interval,
            window_width,
            window_height,
        } = self;

        let Presentation {
            window_title,
            clear_color,
            scene,
        } = presentation;

        let mut config = macroquad::window::Conf {
            window_title,
            window_width,
            window_height,
            ..macroquad::window::Conf::default()
        };
        if let Some(swap_interval) = swap_interval {
            config.platform.swap_interval = Some(swap_interval);
        }

        let (failure_sender, failure_receiver) = mpsc::channel::<Result<()>>();

        macroquad::Window::from_config(config, async move {
            let mut scene = scene;
            let background = to_macroquad_color(clear_color);
            let panel_background = macroquad::color::Color::from_rgba(38, 50, 56, 255);
            let mut panel_requests = ControlPanelRequests::default();
            let mut pointer = PointerTracker::default();
            let mut raster_texture: Option<RasterTexture> = None;
            let mut console_heading = scene.controls.heading;
            let mut heading_degrees = slider_degrees(console_heading);

            loop {
                let keyboard = KeyboardShortcuts::poll();
                if keyboard.quit_requested {
                    break;
                }

                macroquad::window::clear_background(background);

                let screen_width = macroquad::window::screen_width();
                let screen_height = macroquad::window::screen_height();
                let map_width = (screen_width - PANEL_WIDTH).max(0.0);

                let dt_seconds = macroquad::time::get_frame_time();
                let frame_dt = Duration::from_secs_f32(dt_seconds.max(0.0));

                let mut frame_input = FrameInput {
                    actions: panel_requests.take(),
                };
                pointer.observe(PointerSample::poll(map_width), &mut frame_input.actions);
                frame_input.actions.extend(keyboard.actions());

                if let Err(error) = update_scene(frame_dt, frame_input, &mut scene) {
                    let _ = failure_sender.send(Err(error));
                    return;
                }

                if let Err(error) = sync_raster_texture(&mut raster_texture, scene.layers.raster())
                {
                    let _ = failure_sender.send(Err(error));
                    return;
                }

                for layer in scene.layers.iter() {
                    let projection = match layer.id().space() {
                        LayerSpace::World => LayerProjection::from_viewport(&scene.viewport),
                        LayerSpace::Screen => LayerProjection::IDENTITY,
                    };
                    draw_layer(layer, projection, raster_texture.as_ref());
                }

                if scene.controls.heading != console_heading {
                    console_heading = scene.controls.heading;
                    heading_degrees = slider_degrees(console_heading);
                }

                if map_width < screen_width {
                    macroquad::shapes::draw_rectangle(
                        map_width,
                        0.0,
                        PANEL_WIDTH,
                        screen_height,
                        panel_background,
                    );
                    let mut control_panel_ui = macroquad::ui::root_ui();
                    let ControlPanelUiResult { actions } = draw_control_panel_ui(
                        &mut control_panel_ui,
                        ControlPanelUiContext {
                            origin: MacroquadVec2::new(map_width, 0.0),
                            size: MacroquadVec2::new(PANEL_WIDTH, screen_height),
                            background: panel_background,
                            controls: &scene.controls,
                        },
                        &mut heading_degrees,
                    );
                    panel_requests.register(actions);
                }

                macroquad::window::next_frame().await;
            }
        });

        failure_receiver.recv().unwrap_or_else(|_| Ok(()))?;

        Ok(())
    }
}

/// Mouse state sampled once per frame.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PointerSample {
    position: DVec2,
    pressed: bool,
    down: bool,
    released: bool,
    wheel: f64,
    over_map: bool,
}

impl PointerSample {
    fn poll(map_width: f32) -> Self {
        let (x, y) = mouse_position();
        let (_, wheel) = mouse_wheel();
        Self {
            position: DVec2::new(f64::from(x), f64::from(y)),
            pressed: is_mouse_button_pressed(MouseButton::Left),
            down: is_mouse_button_down(MouseButton::Left),
            released: is_mouse_button_released(MouseButton::Left),
            wheel: f64::from(wheel),
            over_map: x < map_width,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Press {
    origin: DVec2,
    last: DVec2,
    dragging: bool,
}

/// Turns raw mouse samples into pointer, wheel, drag and click gestures.
///
/// A press that travels further than [`CLICK_SLOP_PX`] becomes a drag and
/// never produces a click. A press released over the panel is dropped.
#[derive(Clone, Copy, Debug, Default)]
struct PointerTracker {
    last_position: Option<DVec2>,
    press: Option<Press>,
}

impl PointerTracker {
    fn observe(&mut self, sample: PointerSample, actions: &mut Vec<OperatorInput>) {
        let position = sample.position;
        if sample.over_map && self.last_position != Some(position) {
            actions.push(OperatorInput::PointerMoved { screen: position });
        }
        self.last_position = Some(position);

        if sample.over_map {
            if let Some(direction) = ZoomDirection::from_scroll(sample.wheel) {
                actions.push(OperatorInput::Wheel {
                    pointer: position,
                    direction,
                });
            }
        }

        if sample.pressed && sample.over_map {
            self.press = Some(Press {
                origin: position,
                last: position,
                dragging: false,
            });
        }

        if let Some(press) = self.press.as_mut() {
            if sample.down || sample.released {
                if !press.dragging && position.distance(press.origin) > CLICK_SLOP_PX {
                    press.dragging = true;
                }
                if press.dragging && position != press.last {
                    actions.push(OperatorInput::Drag {
                        delta: position - press.last,
                    });
                    press.last = position;
                }
            }
        }

        if sample.released {
            if let Some(press) = self.press.take() {
                if !press.dragging && sample.over_map {
                    actions.push(OperatorInput::Click { screen: position });
                }
            }
        }
    }
}

/// Mapping from layer coordinates onto the screen.
#[derive(Clone, Copy, Debug, PartialEq)]
struct LayerProjection {
    scale: f64,
    offset: DVec2,
}

impl LayerProjection {
    const IDENTITY: Self = Self {
        scale: 1.0,
        offset: DVec2::ZERO,
    };

    fn from_viewport(viewport: &Viewport) -> Self {
        Self {
            scale: viewport.scale(),
            offset: viewport.offset(),
        }
    }

    fn point(&self, position: DVec2) -> MacroquadVec2 {
        let screen = self.offset + position * self.scale;
        MacroquadVec2::new(screen.x as f32, screen.y as f32)
    }

    fn length(&self, length: f64) -> f32 {
        (length * self.scale) as f32
    }
}

/// GPU copy of the grid bitmap.
#[derive(Debug)]
struct RasterTexture {
    revision: u64,
    texture: Texture2D,
}

fn sync_raster_texture(cache: &mut Option<RasterTexture>, raster: Option<&GridRaster>) -> Result<()> {
    let Some(raster) = raster else {
        if let Some(stale) = cache.take() {
            stale.texture.delete();
        }
        return Ok(());
    };
    if cache.as_ref().map(|cached| cached.revision) == Some(raster.revision()) {
        return Ok(());
    }

    let width = u16::try_from(raster.width())
        .with_context(|| format!("grid width {} exceeds texture limits", raster.width()))?;
    let height = u16::try_from(raster.height())
        .with_context(|| format!("grid height {} exceeds texture limits", raster.height()))?;
    let texture = Texture2D::from_rgba8(width, height, raster.rgba());
    texture.set_filter(FilterMode::Nearest);

    if let Some(stale) = cache.replace(RasterTexture {
        revision: raster.revision(),
        texture,
    }) {
        stale.texture.delete();
    }
    Ok(())
}

fn draw_layer(layer: &Layer, projection: LayerProjection, raster: Option<&RasterTexture>) {
    for primitive in layer.primitives() {
        draw_primitive(primitive, projection, raster);
    }
}

fn draw_primitive(
    primitive: &Primitive,
    projection: LayerProjection,
    raster: Option<&RasterTexture>,
) {
    match primitive {
        Primitive::Raster {
            origin,
            size,
            revision,
        } => {
            let Some(raster) = raster.filter(|raster| raster.revision == *revision) else {
                return;
            };
            let top_left = projection.point(*origin);
            let params = DrawTextureParams {
                dest_size: Some(MacroquadVec2::new(
                    projection.length(size.x),
                    projection.length(size.y),
                )),
                ..DrawTextureParams::default()
            };
            macroquad::texture::draw_texture_ex(
                raster.texture,
                top_left.x,
                top_left.y,
                macroquad::color::WHITE,
                params,
            );
        }
        Primitive::Circle {
            center,
            radius,
            fill,
            outline,
        } => {
            let center = projection.point(*center);
            let radius = projection.length(*radius);
            macroquad::shapes::draw_circle(center.x, center.y, radius, to_macroquad_color(*fill));
            if let Some(stroke) = outline {
                macroquad::shapes::draw_circle_lines(
                    center.x,
                    center.y,
                    radius,
                    projection.length(stroke.width),
                    to_macroquad_color(stroke.color),
                );
            }
        }
        Primitive::Line { from, to, stroke } => {
            draw_segment(*from, *to, projection, stroke.width, stroke.color);
        }
        Primitive::DashedLine {
            from,
            to,
            stroke,
            dash,
            gap,
        } => {
            for (start, end) in dash_segments(*from, *to, *dash, *gap) {
                draw_segment(start, end, projection, stroke.width, stroke.color);
            }
        }
        Primitive::Polyline { points, stroke } => {
            for pair in points.windows(2) {
                draw_segment(pair[0], pair[1], projection, stroke.width, stroke.color);
            }
        }
        Primitive::Text {
            position,
            text,
            size,
            color,
            background,
        } => {
            let top_left = projection.point(*position);
            let font_size = projection.length(*size).max(1.0);
            let dimensions =
                macroquad::text::measure_text(text, None, font_size.round() as u16, 1.0);
            if let Some(background) = background {
                macroquad::shapes::draw_rectangle(
                    top_left.x - TEXT_TAG_PADDING,
                    top_left.y - TEXT_TAG_PADDING,
                    dimensions.width + TEXT_TAG_PADDING * 2.0,
                    dimensions.height + TEXT_TAG_PADDING * 2.0,
                    to_macroquad_color(*background),
                );
            }
            let _ = macroquad::text::draw_text(
                text,
                top_left.x,
                top_left.y + dimensions.offset_y,
                font_size,
                to_macroquad_color(*color),
            );
        }
    }
}

fn draw_segment(from: DVec2, to: DVec2, projection: LayerProjection, width: f64, color: Color) {
    let start = projection.point(from);
    let end = projection.point(to);
    macroquad::shapes::draw_line(
        start.x,
        start.y,
        end.x,
        end.y,
        projection.length(width),
        to_macroquad_color(color),
    );
}

/// Splits a segment into alternating dash and gap runs, returning the dashes.
fn dash_segments(from: DVec2, to: DVec2, dash: f64, gap: f64) -> Vec<(DVec2, DVec2)> {
    let length = from.distance(to);
    if length <= f64::EPSILON {
        return Vec::new();
    }
    if dash <= 0.0 || gap < 0.0 {
        return vec![(from, to)];
    }

    let direction = (to - from) / length;
    let mut segments = Vec::new();
    let mut travelled = 0.0;
    while travelled < length {
        let end = (travelled + dash).min(length);
        segments.push((from + direction * travelled, from + direction * end));
        travelled = end + gap;
    }
    segments
}

fn to_macroquad_color(color: Color) -> macroquad::color::Color {
    macroquad::color::Color::new(color.red, color.green, color.blue, color.alpha)
}
