//! Pan and zoom state of the map view.

use glam::DVec2;
use thiserror::Error;

/// Direction of a zoom gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoomDirection {
    /// Magnifies the map.
    In,
    /// Shrinks the map.
    Out,
}

impl ZoomDirection {
    /// Interprets a vertical scroll amount, where positive values scroll away
    /// from the operator. Returns `None` for a zero scroll.
    #[must_use]
    pub fn from_scroll(amount: f64) -> Option<Self> {
        if amount > 0.0 {
            Some(Self::In)
        } else if amount < 0.0 {
            Some(Self::Out)
        } else {
            None
        }
    }
}

/// Bounds and step sizes applied to viewport zoom operations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportLimits {
    min_scale: f64,
    max_scale: f64,
    zoom_speed: f64,
    button_step: f64,
}

impl ViewportLimits {
    /// Smallest scale allowed by default.
    pub const DEFAULT_MIN_SCALE: f64 = 0.1;
    /// Largest scale allowed by default.
    pub const DEFAULT_MAX_SCALE: f64 = 3.0;
    /// Relative scale change applied per wheel notch by default.
    pub const DEFAULT_ZOOM_SPEED: f64 = 0.1;
    /// Scale factor applied by the zoom buttons by default.
    pub const DEFAULT_BUTTON_STEP: f64 = 1.2;

    /// Creates validated viewport limits.
    pub fn new(
        min_scale: f64,
        max_scale: f64,
        zoom_speed: f64,
        button_step: f64,
    ) -> Result<Self, ViewportError> {
        if !min_scale.is_finite() || !max_scale.is_finite() || min_scale <= 0.0 {
            return Err(ViewportError::InvalidScaleBounds {
                min_scale,
                max_scale,
            });
        }
        if max_scale < min_scale {
            return Err(ViewportError::InvalidScaleBounds {
                min_scale,
                max_scale,
            });
        }
        if !zoom_speed.is_finite() || zoom_speed <= 0.0 {
            return Err(ViewportError::InvalidZoomSpeed { zoom_speed });
        }
        if !button_step.is_finite() || button_step <= 1.0 {
            return Err(ViewportError::InvalidButtonStep { button_step });
        }

        Ok(Self {
            min_scale,
            max_scale,
            zoom_speed,
            button_step,
        })
    }

    /// Smallest permitted scale.
    #[must_use]
    pub const fn min_scale(&self) -> f64 {
        self.min_scale
    }

    /// Largest permitted scale.
    #[must_use]
    pub const fn max_scale(&self) -> f64 {
        self.max_scale
    }

    /// Relative scale change applied per wheel notch.
    #[must_use]
    pub const fn zoom_speed(&self) -> f64 {
        self.zoom_speed
    }

    /// Scale factor applied by the zoom buttons.
    #[must_use]
    pub const fn button_step(&self) -> f64 {
        self.button_step
    }

    fn clamp(&self, scale: f64) -> f64 {
        scale.clamp(self.min_scale, self.max_scale)
    }
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self {
            min_scale: Self::DEFAULT_MIN_SCALE,
            max_scale: Self::DEFAULT_MAX_SCALE,
            zoom_speed: Self::DEFAULT_ZOOM_SPEED,
            button_step: Self::DEFAULT_BUTTON_STEP,
        }
    }
}

/// Affine view transform mapping pixel space onto the screen.
///
/// `screen = offset + pixel * scale`. The scale always lies within the
/// configured [`ViewportLimits`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    scale: f64,
    offset: DVec2,
    limits: ViewportLimits,
}

impl Viewport {
    /// Creates a viewport at the minimum scale with a zero offset.
    #[must_use]
    pub fn new(limits: ViewportLimits) -> Self {
        Self {
            scale: limits.min_scale(),
            offset: DVec2::ZERO,
            limits,
        }
    }

    /// Current scale factor.
    #[must_use]
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Screen position of the pixel-space origin.
    #[must_use]
    pub const fn offset(&self) -> DVec2 {
        self.offset
    }

    /// Limits governing zoom operations.
    #[must_use]
    pub const fn limits(&self) -> ViewportLimits {
        self.limits
    }

    /// Zooms one wheel notch while keeping the point under `pointer` fixed.
    ///
    /// Returns `true` when the scale or offset changed.
    pub fn zoom_at(&mut self, pointer: DVec2, direction: ZoomDirection) -> bool {
        let factor = 1.0 + self.limits.zoom_speed();
        let requested = match direction {
            ZoomDirection::In => self.scale * factor,
            ZoomDirection::Out => self.scale / factor,
        };
        let new_scale = self.limits.clamp(requested);
        let anchored = (pointer - self.offset) / self.scale;
        let new_offset = pointer - anchored * new_scale;

        let changed = new_scale != self.scale || new_offset != self.offset;
        self.scale = new_scale;
        self.offset = new_offset;
        changed
    }

    /// Applies a zoom button press. The offset is left untouched.
    ///
    /// Returns `true` when the scale changed.
    pub fn zoom_step(&mut self, direction: ZoomDirection) -> bool {
        let requested = match direction {
            ZoomDirection::In => self.scale * self.limits.button_step(),
            ZoomDirection::Out => self.scale / self.limits.button_step(),
        };
        let new_scale = self.limits.clamp(requested);
        let changed = new_scale != self.scale;
        self.scale = new_scale;
        changed
    }

    /// Moves the view by a screen-space delta. Panning is unbounded.
    pub fn pan(&mut self, delta: DVec2) {
        self.offset += delta;
    }

    /// Restores unit scale and a zero offset.
    pub fn reset(&mut self) {
        self.scale = self.limits.clamp(1.0);
        self.offset = DVec2::ZERO;
    }

    /// Converts a screen position into pixel space.
    #[must_use]
    pub fn to_world_pixel(&self, screen: DVec2) -> DVec2 {
        (screen - self.offset) / self.scale
    }

    /// Converts a pixel-space position onto the screen.
    #[must_use]
    pub fn to_screen(&self, world_pixel: DVec2) -> DVec2 {
        self.offset + world_pixel * self.scale
    }
}

/// Reasons viewport limits are rejected.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ViewportError {
    /// The scale bounds are not positive, finite and ordered.
    #[error("scale bounds must satisfy 0 < min <= max (received {min_scale}..={max_scale})")]
    InvalidScaleBounds {
        /// Requested lower bound.
        min_scale: f64,
        /// Requested upper bound.
        max_scale: f64,
    },
    /// The wheel zoom speed is not a positive finite number.
    #[error("zoom speed must be a positive finite number (received {zoom_speed})")]
    InvalidZoomSpeed {
        /// Requested zoom speed.
        zoom_speed: f64,
    },
    /// The button zoom factor does not enlarge the view.
    #[error("button zoom step must be greater than one (received {button_step})")]
    InvalidButtonStep {
        /// Requested button factor.
        button_step: f64,
    },
}
