use std::path::Path;

use anyhow::Result;

use crate::{error::GfxError, resources::load_binary};

/// Tightly packed RGBA8 pixels kept in CPU memory.
///
/// Bitmaps feed the heightmap terrain and anything else that wants to look at
/// pixels without a round trip through the GPU.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitMap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl BitMap {
    pub const CHANNELS: usize = 4;

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = load_binary(path)?;
        let img = image::load_from_memory(&bytes).map_err(|e| GfxError::decode(path, e))?;
        let rgba = img.to_rgba8();
        Ok(Self {
            width: rgba.width(),
            height: rgba.height(),
            data: rgba.into_raw(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// RGBA of the pixel at (x, y), clamped to the edges.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let x = x.min(self.width.saturating_sub(1)) as usize;
        let y = y.min(self.height.saturating_sub(1)) as usize;
        let i = (y * self.width as usize + x) * Self::CHANNELS;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// Red channel bilinearly sampled at normalized (u, v), in 0..=1.
    pub fn sample_red(&self, u: f32, v: f32) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        let fx = u.clamp(0.0, 1.0) * (self.width - 1) as f32;
        let fy = v.clamp(0.0, 1.0) * (self.height - 1) as f32;
        let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
        let (tx, ty) = (fx - x0 as f32, fy - y0 as f32);
        let r = |x: u32, y: u32| self.pixel(x, y)[0] as f32 / 255.0;
        let top = r(x0, y0) * (1.0 - tx) + r(x0 + 1, y0) * tx;
        let bottom = r(x0, y0 + 1) * (1.0 - tx) + r(x0 + 1, y0 + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}
