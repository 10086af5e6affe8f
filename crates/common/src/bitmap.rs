//! RGBA pixel storage shared by canvas surfaces and video frames.

use crate::error::{MediafyError, MediafyResult};
use crate::geometry::{PixelRect, Size};
use parking_lot::RwLock;
use std::sync::Arc;

/// An RGBA8 pixel buffer, row-major, no padding.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitmap {
    size: Size,
    pixels: Vec<u8>,
}

/// Bitmap shared between an element and the contexts drawing on it.
pub type SharedBitmap = Arc<RwLock<Bitmap>>;

impl Bitmap {
    /// Longest side a bitmap may have.
    pub const MAX_SIDE: u32 = 32_767;
    /// Largest pixel count a bitmap may have.
    pub const MAX_AREA: u64 = 16_384 * 16_384;

    /// Whether a bitmap of `size` is within the allocation limits.
    pub fn fits(size: Size) -> bool {
        size.width <= Self::MAX_SIDE && size.height <= Self::MAX_SIDE && size.area() <= Self::MAX_AREA
    }

    /// Byte length for `size`, or `InvalidValue` over the limits.
    fn checked_len(size: Size) -> MediafyResult<usize> {
        size.rgba_len()
            .filter(|_| Self::fits(size))
            .ok_or_else(|| {
                MediafyError::invalid(format!(
                    "{}x{} exceeds the maximum bitmap size",
                    size.width, size.height
                ))
            })
    }

    /// Create a transparent black bitmap.
    pub fn new(width: u32, height: u32) -> MediafyResult<Self> {
        let size = Size::new(width, height);
        let len = Self::checked_len(size)?;
        Ok(Self {
            size,
            pixels: vec![0; len],
        })
    }

    /// Wrap existing RGBA data.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> MediafyResult<Self> {
        let size = Size::new(width, height);
        let len = Self::checked_len(size)?;
        if pixels.len() != len {
            return Err(MediafyError::invalid(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                len,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self { size, pixels })
    }

    /// Create a bitmap filled with a single color.
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> MediafyResult<Self> {
        let size = Size::new(width, height);
        let len = Self::checked_len(size)?;
        let pixels = color.iter().copied().cycle().take(len).collect();
        Ok(Self { size, pixels })
    }

    pub fn shared(self) -> SharedBitmap {
        Arc::new(RwLock::new(self))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.size.height
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// Reallocate to a new size; all pixels become transparent black.
    /// Over the limits the bitmap is left untouched.
    pub fn reset(&mut self, width: u32, height: u32) -> MediafyResult<()> {
        let size = Size::new(width, height);
        let len = Self::checked_len(size)?;
        self.size = size;
        self.pixels.clear();
        self.pixels.resize(len, 0);
        Ok(())
    }

    /// Replace the whole contents with another bitmap.
    pub fn replace(&mut self, other: Bitmap) {
        *self = other;
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.size.width as usize + x as usize) * 4
    }

    /// Get a pixel, or transparent black outside the bitmap.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        if x >= self.size.width || y >= self.size.height {
            return [0, 0, 0, 0];
        }
        let idx = self.offset(x, y);
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    /// Copy out a region. Pixels outside the bitmap read as transparent black.
    pub fn read_region(&self, rect: PixelRect) -> MediafyResult<Vec<u8>> {
        let len = Self::checked_len(Size::new(rect.width, rect.height))?;
        let mut data = Vec::with_capacity(len);
        for py in 0..rect.height as i64 {
            for px in 0..rect.width as i64 {
                let cx = rect.x as i64 + px;
                let cy = rect.y as i64 + py;
                if cx >= 0 && cy >= 0 {
                    data.extend_from_slice(&self.pixel(cx as u32, cy as u32));
                } else {
                    data.extend_from_slice(&[0, 0, 0, 0]);
                }
            }
        }
        Ok(data)
    }

    /// Overwrite a region with raw RGBA data of `width` x `height`, no blending.
    pub fn write_region(&mut self, x: i32, y: i32, width: u32, height: u32, data: &[u8]) {
        let Some(clip) = PixelRect::new(x, y, width, height).clip(self.size) else {
            return;
        };
        for cy in clip.y..clip.y + clip.height as i32 {
            for cx in clip.x..clip.x + clip.width as i32 {
                let src = (((cy - y) as usize * width as usize) + (cx - x) as usize) * 4;
                let dst = self.offset(cx as u32, cy as u32);
                if src + 4 <= data.len() {
                    self.pixels[dst..dst + 4].copy_from_slice(&data[src..src + 4]);
                }
            }
        }
    }

    /// Set a region to transparent black.
    pub fn clear_region(&mut self, rect: PixelRect) {
        let Some(clip) = rect.clip(self.size) else {
            return;
        };
        for cy in clip.y as u32..clip.y as u32 + clip.height {
            let start = self.offset(clip.x as u32, cy);
            let end = start + clip.width as usize * 4;
            self.pixels[start..end].fill(0);
        }
    }

    /// Source-over fill of a region with a solid color.
    pub fn fill_region(&mut self, rect: PixelRect, color: [u8; 4], global_alpha: f64) {
        let Some(clip) = rect.clip(self.size) else {
            return;
        };
        for cy in clip.y as u32..clip.y as u32 + clip.height {
            for cx in clip.x as u32..clip.x as u32 + clip.width {
                let idx = self.offset(cx, cy);
                blend_over(&mut self.pixels[idx..idx + 4], color, global_alpha);
            }
        }
    }

    /// Source-over composite of `src` with its top-left corner at (x, y).
    pub fn composite(&mut self, src: &Bitmap, x: i32, y: i32, global_alpha: f64) {
        let Some(clip) = PixelRect::new(x, y, src.width(), src.height()).clip(self.size) else {
            return;
        };
        for cy in clip.y..clip.y + clip.height as i32 {
            for cx in clip.x..clip.x + clip.width as i32 {
                let color = src.pixel((cx - x) as u32, (cy - y) as u32);
                let idx = self.offset(cx as u32, cy as u32);
                blend_over(&mut self.pixels[idx..idx + 4], color, global_alpha);
            }
        }
    }
}

/// Blend `color` over a destination pixel (non-premultiplied RGBA).
fn blend_over(dst: &mut [u8], color: [u8; 4], global_alpha: f64) {
    let src_a = color[3] as f64 / 255.0 * global_alpha;
    if src_a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f64 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    for i in 0..3 {
        let c = (color[i] as f64 * src_a + dst[i] as f64 * dst_a * (1.0 - src_a)) / out_a;
        dst[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
