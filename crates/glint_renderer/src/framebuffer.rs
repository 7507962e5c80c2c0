//! Pixel storage for render output.
//!
//! The framebuffer holds linear-light colors; conversion to 8-bit RGBA
//! happens at the output boundary. File encoding is left to callers
//! (an `image::RgbaImage` adapter is provided).

use glint_math::Vec3;

use crate::tile::Tile;

/// Vertical orientation of the pixel rows in memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOrder {
    /// Row 0 is the top of the image (the default)
    TopDown,
    /// Row 0 is the bottom, as bitmap encoders expect
    BottomUp,
}

/// Flat width x height buffer of linear RGB colors.
///
/// During a parallel render each tile owns exclusive access to its
/// rectangle; tiles never overlap, so no pixel is written twice.
pub struct Framebuffer {
    width: u32,
    height: u32,
    order: RowOrder,
    pixels: Vec<Vec3>,
}

impl Framebuffer {
    /// Create a buffer filled with black, top-down row order.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_row_order(width, height, RowOrder::TopDown)
    }

    pub fn with_row_order(width: u32, height: u32, order: RowOrder) -> Self {
        Self {
            width,
            height,
            order,
            pixels: vec![Vec3::ZERO; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        let row = match self.order {
            RowOrder::TopDown => y,
            RowOrder::BottomUp => self.height - 1 - y,
        };
        (row * self.width + x) as usize
    }

    /// Get the pixel at (x, y), with y measured from the image top.
    pub fn get(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[self.index(x, y)]
    }

    /// Set the pixel at (x, y), with y measured from the image top.
    pub fn set(&mut self, x: u32, y: u32, color: Vec3) {
        let i = self.index(x, y);
        self.pixels[i] = color;
    }

    /// Blit a rendered tile (row-major within the tile) into place.
    pub fn write_tile(&mut self, tile: &Tile, colors: &[Vec3]) {
        debug_assert_eq!(colors.len(), tile.pixel_count() as usize);
        for local_y in 0..tile.height {
            for local_x in 0..tile.width {
                let color = colors[(local_y * tile.width + local_x) as usize];
                self.set(tile.x + local_x, tile.y + local_y, color);
            }
        }
    }

    /// Convert to packed RGBA8 bytes in stored row order.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for color in &self.pixels {
            bytes.extend_from_slice(&color_to_rgba(*color));
        }
        bytes
    }

    /// Adapter for external image encoders.
    pub fn to_image(&self) -> image::RgbaImage {
        image::RgbaImage::from_raw(self.width, self.height, self.to_rgba8())
            .expect("buffer length matches dimensions")
    }
}

/// Clamp a linear color to [0, 1] and pack it as opaque RGBA8.
///
/// No gamma ramp is applied; colors are stored the way the shader
/// produced them.
pub fn color_to_rgba(color: Vec3) -> [u8; 4] {
    let quantize = |c: f32| (255.0 * c.clamp(0.0, 1.0)) as u8;
    [quantize(color.x), quantize(color.y), quantize(color.z), 255]
}
