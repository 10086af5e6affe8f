//! Geometric primitives.

use serde::{Deserialize, Serialize};

/// Integer size of a pixel surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const ZERO: Size = Size { width: 0, height: 0 };

    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Byte length of an RGBA8 buffer with this size, `None` on overflow.
    #[inline]
    pub fn rgba_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(4)
    }

    /// Pixel count.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A 2D rectangle in canvas space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const ZERO: Rect = Rect { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width as f64, size.height as f64)
    }

    #[inline]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0.0 || self.height == 0.0
    }

    #[inline]
    pub fn area(&self) -> f64 {
        (self.width * self.height).abs()
    }

    /// Flip negative extents so width and height are non-negative.
    pub fn normalized(&self) -> Rect {
        let (x, width) = if self.width < 0.0 {
            (self.x + self.width, -self.width)
        } else {
            (self.x, self.width)
        };
        let (y, height) = if self.height < 0.0 {
            (self.y + self.height, -self.height)
        } else {
            (self.y, self.height)
        };
        Rect::new(x, y, width, height)
    }

    /// Smallest pixel rectangle covering this rectangle.
    pub fn to_pixel_rect(&self) -> PixelRect {
        let r = self.normalized();
        let left = r.x.floor();
        let top = r.y.floor();
        let right = r.right().ceil();
        let bottom = r.bottom().ceil();
        PixelRect {
            x: left as i32,
            y: top as i32,
            width: (right - left).max(0.0) as u32,
            height: (bottom - top).max(0.0) as u32,
        }
    }
}

/// Integer rectangle for pixel operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[inline]
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    #[inline]
    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    /// Intersect with a surface of the given size.
    pub fn clip(&self, bounds: Size) -> Option<PixelRect> {
        let left = (self.x as i64).max(0);
        let top = (self.y as i64).max(0);
        let right = self.right().min(bounds.width as i64);
        let bottom = self.bottom().min(bounds.height as i64);

        if right > left && bottom > top {
            Some(PixelRect::new(
                left as i32,
                top as i32,
                (right - left) as u32,
                (bottom - top) as u32,
            ))
        } else {
            None
        }
    }

    #[inline]
    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x as f64, self.y as f64, self.width as f64, self.height as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_negative_extent() {
        let r = Rect::new(10.0, 10.0, -4.0, -6.0).normalized();
        assert_eq!(r, Rect::new(6.0, 4.0, 4.0, 6.0));
    }

    #[test]
    fn test_to_pixel_rect_covers_fractions() {
        let p = Rect::new(0.5, 1.25, 2.0, 2.0).to_pixel_rect();
        assert_eq!(p, PixelRect::new(0, 1, 3, 3));
    }

    #[test]
    fn test_clip() {
        let bounds = Size::new(10, 10);
        assert_eq!(
            PixelRect::new(-2, 8, 5, 5).clip(bounds),
            Some(PixelRect::new(0, 8, 3, 2))
        );
        assert_eq!(PixelRect::new(12, 0, 5, 5).clip(bounds), None);
    }

    #[test]
    fn test_rgba_len_overflow() {
        assert_eq!(Size::new(300, 150).rgba_len(), Some(180_000));
        assert_eq!(Size::new(0, 7).rgba_len(), Some(0));
        assert_eq!(Size::new(u32::MAX, u32::MAX).rgba_len(), None);
        assert_eq!(Size::new(u32::MAX, u32::MAX).area(), u32::MAX as u64 * u32::MAX as u64);
    }

    #[test]
    fn test_serde_shapes() {
        let rect: Rect = serde_json::from_str(r#"{"x":1.5,"y":-2,"width":30,"height":40}"#).unwrap();
        assert_eq!(rect, Rect::new(1.5, -2.0, 30.0, 40.0));

        let size = serde_json::to_value(Size::new(640, 480)).unwrap();
        assert_eq!(size, serde_json::json!({"width": 640, "height": 480}));
        assert_eq!(serde_json::from_value::<Size>(size).unwrap(), Size::new(640, 480));
    }
}
