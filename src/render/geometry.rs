//! Rectangle and size types shared by the engine boundary and the painter
//!
//! Logical page coordinates use [`RectF`] (document units), device and screen
//! coordinates use [`RectI`] (pixels). Both are `x, y, dx, dy` with y growing
//! downwards.

/// Integer size in device pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SizeI {
    pub dx: i32,
    pub dy: i32,
}

impl SizeI {
    #[must_use]
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.dx <= 0 || self.dy <= 0
    }
}

/// Rectangle in device pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RectI {
    pub x: i32,
    pub y: i32,
    pub dx: i32,
    pub dy: i32,
}

impl RectI {
    #[must_use]
    pub const fn new(x: i32, y: i32, dx: i32, dy: i32) -> Self {
        Self { x, y, dx, dy }
    }

    #[must_use]
    pub const fn from_size(size: SizeI) -> Self {
        Self::new(0, 0, size.dx, size.dy)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.dx <= 0 || self.dy <= 0
    }

    #[must_use]
    pub const fn size(&self) -> SizeI {
        SizeI::new(self.dx, self.dy)
    }

    #[must_use]
    pub const fn offset(self, x: i32, y: i32) -> Self {
        Self::new(self.x + x, self.y + y, self.dx, self.dy)
    }

    /// Intersection of two rectangles; empty (zero sized) when they don't overlap
    #[must_use]
    pub fn intersect(&self, other: &RectI) -> RectI {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.dx).min(other.x + other.dx);
        let y1 = (self.y + self.dy).min(other.y + other.dy);
        if x1 <= x0 || y1 <= y0 {
            return RectI::default();
        }
        RectI::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Grow the rectangle around its center by `fuzz` times its own size
    #[must_use]
    pub fn inflate_by_factor(&self, fuzz: f32) -> RectI {
        let grow_x = (self.dx as f32 * fuzz * 0.5) as i32;
        let grow_y = (self.dy as f32 * fuzz * 0.5) as i32;
        RectI::new(
            self.x - grow_x,
            self.y - grow_y,
            (self.dx as f32 * (fuzz + 1.0)) as i32,
            (self.dy as f32 * (fuzz + 1.0)) as i32,
        )
    }
}

/// Rectangle in logical (document) or transformed floating point units
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectF {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

impl RectF {
    #[must_use]
    pub const fn new(x: f64, y: f64, dx: f64, dy: f64) -> Self {
        Self { x, y, dx, dy }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.dx > 0.0 && self.dy > 0.0)
    }

    #[must_use]
    pub fn intersect(&self, other: &RectF) -> RectF {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.dx).min(other.x + other.dx);
        let y1 = (self.y + self.dy).min(other.y + other.dy);
        if x1 <= x0 || y1 <= y0 {
            return RectF::default();
        }
        RectF::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Snap the edges to the nearest device pixel
    #[must_use]
    pub fn round(&self) -> RectI {
        let x0 = self.x.round() as i32;
        let y0 = self.y.round() as i32;
        let x1 = (self.x + self.dx).round() as i32;
        let y1 = (self.y + self.dy).round() as i32;
        RectI::new(x0, y0, x1 - x0, y1 - y0)
    }
}

impl From<RectI> for RectF {
    fn from(r: RectI) -> Self {
        RectF::new(
            f64::from(r.x),
            f64::from(r.y),
            f64::from(r.dx),
            f64::from(r.dy),
        )
    }
}
