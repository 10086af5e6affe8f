//! Rectangle value object used for drawing and clearing regions.

use crate::media_object::ElementWrapper;
use common::{MediafyResult, Rect};
use serde::{Deserialize, Serialize};

/// A rectangle: position plus extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Coords {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// The full extent of a wrapped element, at the origin.
    pub fn of<W: ElementWrapper>(wrapper: &W) -> MediafyResult<Self> {
        let (width, height) = wrapper.object().dimensions()?;
        Ok(Self::new(0.0, 0.0, width, height))
    }

    /// Move by `[dx, dy]`; deltas may be negative.
    pub fn translate(&mut self, [dx, dy]: [f64; 2]) -> &mut Self {
        self.x += dx;
        self.y += dy;
        self
    }

    /// Multiply width and height by `factor`. Position is unchanged.
    pub fn scale(&mut self, factor: f64) -> &mut Self {
        self.width *= factor;
        self.height *= factor;
        self
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }
}

impl From<Rect> for Coords {
    fn from(r: Rect) -> Self {
        Self::new(r.x, r.y, r.width, r.height)
    }
}

impl From<Coords> for Rect {
    fn from(c: Coords) -> Self {
        c.to_rect()
    }
}
