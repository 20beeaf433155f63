use crate::stroker::StrokeStats;

/// Counters for the last tessellation pass of a tree.
///
/// Reset at the start of every full tessellation. Useful for checking which tessellation
/// branch a shape took and for profiling how much work a pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TessMetrics {
    /// Leaves tessellated in the pass.
    pub leaves: u32,
    /// Fills triangulated as a fan because the outline is known to be convex.
    pub convex_fills: u32,
    /// Fills handed to the general winding-rule tessellator.
    pub general_fills: u32,
    /// Fills decomposed directly from triangle, strip, fan or quad vertices.
    pub direct_fills: u32,
    /// Contours passed to the offset-curve stroker.
    pub stroked_contours: u32,
    /// 3D line quads emitted.
    pub line_segments: u32,
    /// Point sprites emitted.
    pub points: u32,
    /// Contours the general tessellator rejected as degenerate.
    pub skipped_contours: u32,
    pub stroke: StrokeStats,
}

impl TessMetrics {
    /// Merge another pass's counts into this accumulator.
    pub fn accumulate(&mut self, other: &Self) {
        self.leaves += other.leaves;
        self.convex_fills += other.convex_fills;
        self.general_fills += other.general_fills;
        self.direct_fills += other.direct_fills;
        self.stroked_contours += other.stroked_contours;
        self.line_segments += other.line_segments;
        self.points += other.points;
        self.skipped_contours += other.skipped_contours;
        self.stroke.accumulate(&other.stroke);
    }
}
