//! Offscreen rasterisation of the occupancy map.

use fleet_console_core::{CellState, GridView};

use crate::Color;

/// Fill of traversable cells.
pub const FREE_CELL_COLOR: Color = Color::from_rgb_u8(0xE4, 0xF8, 0xFF);
/// Fill of blocked cells.
pub const OCCUPIED_CELL_COLOR: Color = Color::from_rgb_u8(0x00, 0x00, 0x00);
/// Fill of unobserved cells.
pub const UNKNOWN_CELL_COLOR: Color = Color::from_rgb_u8(0xA8, 0xA8, 0xA8);

/// RGBA bitmap holding one texel per occupancy cell.
///
/// Texel columns are mirrored so that drawing the bitmap at the pixel-space
/// origin, stretched by the cell size, lines up with projected positions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridRaster {
    width: u32,
    height: u32,
    revision: u64,
    rgba: Vec<u8>,
}

impl GridRaster {
    /// Rasterises the provided grid. Cost is proportional to the cell count.
    #[must_use]
    pub fn from_grid(grid: &GridView<'_>) -> Self {
        let transform = grid.transform();
        let width = transform.grid_width();
        let height = transform.grid_height();
        let mut rgba = vec![0; width as usize * height as usize * 4];

        for (column, row, state) in grid.iter() {
            let mirrored = transform.raster_column(column);
            let offset = (row as usize * width as usize + mirrored as usize) * 4;
            if let Some(texel) = rgba.get_mut(offset..offset + 4) {
                texel.copy_from_slice(&cell_color(state).to_rgba_u8());
            }
        }

        Self {
            width,
            height,
            revision: grid.revision(),
            rgba,
        }
    }

    /// Width of the bitmap in texels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the bitmap in texels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Revision of the grid the bitmap was built from.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Row-major RGBA bytes.
    #[must_use]
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }
}

/// Fill used for a cell state.
#[must_use]
pub const fn cell_color(state: CellState) -> Color {
    match state {
        CellState::Free => FREE_CELL_COLOR,
        CellState::Occupied => OCCUPIED_CELL_COLOR,
        CellState::Unknown => UNKNOWN_CELL_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_console_core::CoordinateTransform;

    fn texel(raster: &GridRaster, x: u32, y: u32) -> &[u8] {
        let offset = (y * raster.width() + x) as usize * 4;
        &raster.rgba()[offset..offset + 4]
    }

    #[test]
    fn columns_are_mirrored_into_the_bitmap() {
        let transform = CoordinateTransform::new(3, 2, 1.0, 5.0).expect("valid transform");
        let cells = [
            CellState::Occupied,
            CellState::Free,
            CellState::Free,
            CellState::Free,
            CellState::Free,
            CellState::Unknown,
        ];
        let raster = GridRaster::from_grid(&GridView::new(transform, &cells, 4));

        assert_eq!(raster.revision(), 4);
        assert_eq!(raster.rgba().len(), 3 * 2 * 4);
        assert_eq!(texel(&raster, 2, 0), [0, 0, 0, 255]);
        assert_eq!(texel(&raster, 0, 1), [0xA8, 0xA8, 0xA8, 255]);
        assert_eq!(texel(&raster, 0, 0), [0xE4, 0xF8, 0xFF, 255]);
    }
}
