use crate::color::Color;

/// Shape drawn at the open ends of a stroked contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineCap {
    /// The stroke ends exactly at the endpoint.
    Butt,
    /// A half circle centred on the endpoint.
    #[default]
    Round,
    /// The stroke is extended by half its width past the endpoint.
    Square,
}

/// Shape drawn where two stroked segments meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineJoin {
    /// Sharp corner, replaced by a bevel past the miter limit.
    #[default]
    Miter,
    /// Circular arc around the corner.
    Round,
    /// Straight edge between the two offset points.
    Bevel,
}

#[derive(Clone, Debug, Copy, PartialEq)]
pub struct Stroke {
    /// Full stroke width. Offsets are computed from half of it.
    pub weight: f32,
    pub color: Color,
    pub cap: LineCap,
    pub join: LineJoin,
    /// Ratio of miter length to half-width above which a miter becomes a bevel.
    pub miter_limit: f32,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            weight: 1.0,
            color: Color::BLACK,
            cap: LineCap::default(),
            join: LineJoin::default(),
            miter_limit: 10.0,
        }
    }
}

impl Stroke {
    #[inline]
    pub fn new(weight: impl Into<f32>, color: impl Into<Color>) -> Self {
        Self {
            weight: weight.into(),
            color: color.into(),
            ..Default::default()
        }
    }

    #[inline]
    pub fn with_cap(mut self, cap: LineCap) -> Self {
        self.cap = cap;
        self
    }

    #[inline]
    pub fn with_join(mut self, join: LineJoin) -> Self {
        self.join = join;
        self
    }

    /// Sets the miter limit, clamped to at least 1.
    #[inline]
    pub fn with_miter_limit(mut self, limit: f32) -> Self {
        self.miter_limit = limit.max(1.0);
        self
    }

    #[inline]
    pub fn half_width(&self) -> f32 {
        self.weight * 0.5
    }

    /// True if width is zero or color is transparent
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.weight <= 0.0 || self.color == Color::TRANSPARENT
    }
}
