use crate::error::{GeometryError, GeometryResult};

/// Largest number of distinct vertices a single block may address with 16-bit indices.
pub const MAX_INDEX_LIMIT: usize = 1 << 16;

/// Whether strokes and points share the fill stream (2D) or use their own streams (3D).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dimension {
    #[default]
    TwoD,
    ThreeD,
}

/// Immutable tessellation settings threaded through every tessellate and aggregate pass.
///
/// # Examples
///
/// ```
/// use tessera::TessConfig;
///
/// let config = TessConfig::default().with_bezier_detail(8).with_index_limit(1024);
/// assert!(config.validate().is_ok());
/// assert!(TessConfig::default().with_index_limit(70_000).validate().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessConfig {
    /// Number of line segments each quadratic or cubic segment is flattened into.
    pub bezier_detail: u32,
    /// Number of line segments between two Catmull-Rom curve vertices.
    pub curve_detail: u32,
    /// Catmull-Rom tightness, `0.0` is the classic spline and `1.0` gives straight lines.
    pub curve_tightness: f32,
    /// Maximum vertices a block may address. A new block starts before reaching it.
    pub index_limit: usize,
    /// Miter limit applied to strokes that do not set their own.
    pub miter_limit: f32,
    /// Turns below this angle (radians) are joined with a plain bevel edge.
    pub small_angle_threshold: f32,
    /// Tolerance handed to the general polygon tessellator.
    pub fill_tolerance: f32,
    /// Largest texture dimension accepted from the texture provider.
    pub max_texture_size: u32,
    pub dimension: Dimension,
}

impl Default for TessConfig {
    fn default() -> Self {
        Self {
            bezier_detail: 20,
            curve_detail: 20,
            curve_tightness: 0.0,
            index_limit: MAX_INDEX_LIMIT,
            miter_limit: 10.0,
            small_angle_threshold: 1e-3,
            fill_tolerance: 0.1,
            max_texture_size: 8192,
            dimension: Dimension::TwoD,
        }
    }
}

impl TessConfig {
    pub fn three_d() -> Self {
        Self {
            dimension: Dimension::ThreeD,
            ..Self::default()
        }
    }

    pub fn with_bezier_detail(mut self, detail: u32) -> Self {
        self.bezier_detail = detail;
        self
    }

    pub fn with_curve_detail(mut self, detail: u32) -> Self {
        self.curve_detail = detail;
        self
    }

    pub fn with_curve_tightness(mut self, tightness: f32) -> Self {
        self.curve_tightness = tightness;
        self
    }

    pub fn with_index_limit(mut self, limit: usize) -> Self {
        self.index_limit = limit;
        self
    }

    pub fn with_miter_limit(mut self, limit: f32) -> Self {
        self.miter_limit = limit;
        self
    }

    pub fn with_max_texture_size(mut self, size: u32) -> Self {
        self.max_texture_size = size;
        self
    }

    pub fn with_dimension(mut self, dimension: Dimension) -> Self {
        self.dimension = dimension;
        self
    }

    #[inline]
    pub fn is_2d(&self) -> bool {
        self.dimension == Dimension::TwoD
    }

    pub fn validate(&self) -> GeometryResult<()> {
        if self.index_limit < 4 || self.index_limit > MAX_INDEX_LIMIT {
            return Err(GeometryError::InvalidConfig(
                "index_limit must be between 4 and 65536",
            ));
        }
        if self.bezier_detail == 0 || self.curve_detail == 0 {
            return Err(GeometryError::InvalidConfig("curve detail must be at least 1"));
        }
        if !(self.fill_tolerance > 0.0) {
            return Err(GeometryError::InvalidConfig("fill_tolerance must be positive"));
        }
        if !(self.miter_limit >= 1.0) {
            return Err(GeometryError::InvalidConfig("miter_limit must be at least 1"));
        }
        if self.small_angle_threshold < 0.0 {
            return Err(GeometryError::InvalidConfig(
                "small_angle_threshold must not be negative",
            ));
        }
        Ok(())
    }
}
