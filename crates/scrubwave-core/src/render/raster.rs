//! RGBA pixel buffer output

use crate::types::Rgba;

/// Row-major RGBA8 image with a transparent background
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
    drawn: bool,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
            drawn: false,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, `width * height * 4` long
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// True when no pixel has been written, whatever its color
    pub fn is_blank(&self) -> bool {
        !self.drawn
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = self.offset(x, y);
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.data[offset..offset + 4]);
        Some(Rgba(px))
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset(x, y);
        self.data[offset..offset + 4].copy_from_slice(&color.0);
        self.drawn = true;
    }

    /// Fill rows `top..=bottom` of column `x`, clamped to the image
    ///
    /// Reversed bounds are swapped, so at least one pixel is always drawn
    /// for an in-bounds column.
    pub fn fill_column(&mut self, x: u32, top: u32, bottom: u32, color: Rgba) {
        if self.height == 0 {
            return;
        }
        let (top, bottom) = if top <= bottom { (top, bottom) } else { (bottom, top) };
        let last = self.height - 1;
        for y in top.min(last)..=bottom.min(last) {
            self.set_pixel(x, y, color);
        }
    }

    /// Binary PPM (P6), alpha composited over white
    pub fn to_ppm(&self) -> Vec<u8> {
        let header = format!("P6\n{} {}\n255\n", self.width, self.height);
        let mut out = Vec::with_capacity(header.len() + self.data.len() / 4 * 3);
        out.extend_from_slice(header.as_bytes());
        for px in self.data.chunks_exact(4) {
            let alpha = px[3] as u32;
            for &channel in &px[..3] {
                let blended = (channel as u32 * alpha + 255 * (255 - alpha)) / 255;
                out.push(blended as u8);
            }
        }
        out
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }
}
