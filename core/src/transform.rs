//! Conversions between world-metric, map-cell and pixel coordinates.
//!
//! The pixel x-axis runs opposite to the metric x-axis because the feed
//! reports positions in the sensor frame. Every conversion in the console goes
//! through [`CoordinateTransform`] so that the inversion is applied in exactly
//! one place.

use std::f64::consts::PI;

use glam::DVec2;
use thiserror::Error;

/// Converts positions between the metric frame of the feed and the pixel
/// frame used when drawing the map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateTransform {
    grid_width: u32,
    grid_height: u32,
    resolution: f64,
    cell_size_px: f64,
}

impl CoordinateTransform {
    /// Creates a transform for a grid with the provided dimensions.
    ///
    /// Returns an error when the grid has no area, or when the resolution or
    /// the cell size is not a positive finite number.
    pub fn new(
        grid_width: u32,
        grid_height: u32,
        resolution: f64,
        cell_size_px: f64,
    ) -> Result<Self, TransformError> {
        if grid_width == 0 || grid_height == 0 {
            return Err(TransformError::EmptyGrid {
                width: grid_width,
                height: grid_height,
            });
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(TransformError::InvalidResolution { resolution });
        }
        if !cell_size_px.is_finite() || cell_size_px <= 0.0 {
            return Err(TransformError::InvalidCellSize { cell_size_px });
        }

        Ok(Self {
            grid_width,
            grid_height,
            resolution,
            cell_size_px,
        })
    }

    /// Number of cells along the x-axis.
    #[must_use]
    pub const fn grid_width(&self) -> u32 {
        self.grid_width
    }

    /// Number of cells along the y-axis.
    #[must_use]
    pub const fn grid_height(&self) -> u32 {
        self.grid_height
    }

    /// Metric length of a single cell edge.
    #[must_use]
    pub const fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Pixel length of a single cell edge before viewport scaling.
    #[must_use]
    pub const fn cell_size_px(&self) -> f64 {
        self.cell_size_px
    }

    /// Converts a world-metric position into pixel space.
    #[must_use]
    pub fn map_to_pixel(&self, map: DVec2) -> DVec2 {
        DVec2::new(
            (f64::from(self.grid_width) - map.x / self.resolution) * self.cell_size_px,
            (map.y / self.resolution) * self.cell_size_px,
        )
    }

    /// Converts a pixel-space position back into the world-metric frame.
    #[must_use]
    pub fn pixel_to_map(&self, pixel: DVec2) -> DVec2 {
        DVec2::new(
            (f64::from(self.grid_width) - pixel.x / self.cell_size_px) * self.resolution,
            (pixel.y / self.cell_size_px) * self.resolution,
        )
    }

    /// Raster column holding occupancy column `column`.
    ///
    /// Columns are mirrored so the raster lines up with [`Self::map_to_pixel`].
    #[must_use]
    pub const fn raster_column(&self, column: u32) -> u32 {
        self.grid_width.saturating_sub(column).saturating_sub(1)
    }

    /// Size of the whole map in pixel space.
    #[must_use]
    pub fn pixel_extent(&self) -> DVec2 {
        DVec2::new(
            f64::from(self.grid_width) * self.cell_size_px,
            f64::from(self.grid_height) * self.cell_size_px,
        )
    }

}

/// Converts a heading reported by the feed into the angle used on screen.
///
/// Mirrors the x-axis inversion applied by [`CoordinateTransform::map_to_pixel`].
#[must_use]
pub fn heading_to_screen(theta: f64) -> f64 {
    PI - theta
}

/// Converts an on-screen angle back into a feed heading.
#[must_use]
pub fn heading_from_screen(angle: f64) -> f64 {
    PI - angle
}

/// Unit vector in pixel space pointing along the provided feed heading.
#[must_use]
pub fn heading_direction(theta: f64) -> DVec2 {
    let angle = heading_to_screen(theta);
    DVec2::new(angle.cos(), angle.sin())
}

/// Reasons a coordinate transform cannot be constructed.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum TransformError {
    /// The grid has zero cells along at least one axis.
    #[error("grid dimensions must be positive (received {width}x{height})")]
    EmptyGrid {
        /// Reported width in cells.
        width: u32,
        /// Reported height in cells.
        height: u32,
    },
    /// The grid resolution is zero, negative or not finite.
    #[error("grid resolution must be a positive finite number (received {resolution})")]
    InvalidResolution {
        /// Reported metric length of a cell edge.
        resolution: f64,
    },
    /// The configured pixel size of a cell is zero, negative or not finite.
    #[error("cell size must be a positive finite number of pixels (received {cell_size_px})")]
    InvalidCellSize {
        /// Configured pixel length of a cell edge.
        cell_size_px: f64,
    },
}

/// Reasons a grid report cannot be loaded.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum GridError {
    /// The grid dimensions cannot produce a valid transform.
    #[error(transparent)]
    Transform(#[from] TransformError),
    /// The occupancy payload does not match the reported dimensions.
    #[error("occupancy holds {actual} cells but a {width}x{height} grid requires {expected}")]
    OccupancyMismatch {
        /// Reported width in cells.
        width: u32,
        /// Reported height in cells.
        height: u32,
        /// Number of cells implied by the dimensions.
        expected: u64,
        /// Number of cells delivered by the feed.
        actual: u64,
    },
}
