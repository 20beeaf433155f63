//! Offset-curve stroking.
//!
//! A flattened contour plus a [`Stroke`] style becomes a set of closed outline contours whose
//! non-zero fill covers exactly the stroked area. The outline is later handed to the fill
//! tessellator, so the stroker never emits triangles itself.

use std::f32::consts::{PI, TAU};

use lyon::math::{vector, Point, Vector};

use crate::config::TessConfig;
use crate::stroke::{LineCap, LineJoin, Stroke};

/// Upper bound on the number of segments used for one round join, cap or point.
pub const MAX_ROUND_SEGMENTS: usize = 127;

const COINCIDENT_EPSILON: f32 = 1e-6;

/// Number of segments used to approximate a circular arc of `angle` radians.
///
/// Grows with the square root of the radius so large arcs stay smooth without
/// over-tessellating small ones.
///
/// ```
/// use tessera::stroker::round_segment_count;
///
/// assert_eq!(round_segment_count(4.0, std::f32::consts::PI), 7);
/// assert_eq!(round_segment_count(1.0e6, std::f32::consts::TAU), 127);
/// assert_eq!(round_segment_count(0.0, 1.0), 1);
/// ```
pub fn round_segment_count(radius: f32, angle: f32) -> usize {
    let segments = (radius.max(0.0).sqrt() * angle.abs()).ceil();
    if !segments.is_finite() {
        return MAX_ROUND_SEGMENTS;
    }
    (segments as usize).clamp(1, MAX_ROUND_SEGMENTS)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutlineCommand {
    MoveTo(Point),
    LineTo(Point),
    Close,
}

/// Counters describing which join and cap branches produced an outline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StrokeStats {
    pub miter_joins: u32,
    pub bevel_joins: u32,
    pub round_joins: u32,
    /// Miter joins that exceeded the miter limit and were emitted as bevels.
    pub miter_fallbacks: u32,
    /// Segments emitted for round joins and round caps.
    pub arc_segments: u32,
    pub caps: u32,
}

impl StrokeStats {
    pub fn accumulate(&mut self, other: &Self) {
        self.miter_joins += other.miter_joins;
        self.bevel_joins += other.bevel_joins;
        self.round_joins += other.round_joins;
        self.miter_fallbacks += other.miter_fallbacks;
        self.arc_segments += other.arc_segments;
        self.caps += other.caps;
    }
}

/// Closed outline produced by stroking one or more contours.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrokeOutline {
    pub commands: Vec<OutlineCommand>,
    pub stats: StrokeStats,
}

impl StrokeOutline {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Splits the command list back into point lists, one per closed contour.
    pub fn contours(&self) -> Vec<Vec<Point>> {
        let mut out = Vec::new();
        let mut current: Vec<Point> = Vec::new();
        for command in &self.commands {
            match command {
                OutlineCommand::MoveTo(p) => {
                    if !current.is_empty() {
                        out.push(std::mem::take(&mut current));
                    }
                    current.push(*p);
                }
                OutlineCommand::LineTo(p) => current.push(*p),
                OutlineCommand::Close => {
                    if !current.is_empty() {
                        out.push(std::mem::take(&mut current));
                    }
                }
            }
        }
        if !current.is_empty() {
            out.push(current);
        }
        out
    }

    fn push_contour(&mut self, points: &[Point]) {
        let mut iter = points.iter();
        let Some(first) = iter.next() else {
            return;
        };
        self.commands.push(OutlineCommand::MoveTo(*first));
        let mut last = *first;
        for p in iter {
            if !coincident(*p, last) {
                self.commands.push(OutlineCommand::LineTo(*p));
                last = *p;
            }
        }
        self.commands.push(OutlineCommand::Close);
    }
}

/// Strokes a single flattened contour and appends its outline to `out`.
pub fn stroke_contour(
    points: &[Point],
    closed: bool,
    stroke: &Stroke,
    config: &TessConfig,
    out: &mut StrokeOutline,
) {
    let hw = stroke.half_width();
    if !(hw > 0.0) {
        return;
    }

    let mut pts = coalesce(points);
    let mut closed = closed;
    if closed && pts.len() > 1 && coincident(pts[0], pts[pts.len() - 1]) {
        pts.pop();
    }
    if closed && pts.len() < 3 {
        closed = false;
    }

    let mut builder = SideBuilder {
        hw,
        stroke,
        config,
        stats: StrokeStats::default(),
    };

    match pts.len() {
        0 => {}
        1 => builder.dot(pts[0], out),
        _ if closed => builder.closed(&pts, out),
        _ => builder.open(&pts, out),
    }

    out.stats.accumulate(&builder.stats);
}

struct SideBuilder<'a> {
    hw: f32,
    stroke: &'a Stroke,
    config: &'a TessConfig,
    stats: StrokeStats,
}

impl SideBuilder<'_> {
    fn dot(&mut self, center: Point, out: &mut StrokeOutline) {
        let hw = self.hw;
        match self.stroke.cap {
            LineCap::Butt => {}
            LineCap::Square => {
                self.stats.caps += 1;
                out.push_contour(&[
                    center + vector(-hw, -hw),
                    center + vector(hw, -hw),
                    center + vector(hw, hw),
                    center + vector(-hw, hw),
                ]);
            }
            LineCap::Round => {
                self.stats.caps += 1;
                let segments = round_segment_count(hw, TAU).max(3);
                self.stats.arc_segments += segments as u32;
                let ring: Vec<Point> = (0..segments)
                    .map(|i| {
                        let a = TAU * i as f32 / segments as f32;
                        center + vector(a.cos(), a.sin()) * hw
                    })
                    .collect();
                out.push_contour(&ring);
            }
        }
    }

    fn open(&mut self, pts: &[Point], out: &mut StrokeOutline) {
        let n = pts.len();
        let dirs: Vec<Vector> = (0..n - 1).map(|i| direction(pts[i], pts[i + 1])).collect();
        let hw = self.hw;

        let mut left = Vec::with_capacity(n * 3);
        let mut right = Vec::with_capacity(n * 3);
        left.push(pts[0] + left_normal(dirs[0]) * hw);
        right.push(pts[0] - left_normal(dirs[0]) * hw);
        for i in 1..n - 1 {
            self.join(&mut left, pts[i], dirs[i - 1], dirs[i], 1.0);
            self.join(&mut right, pts[i], dirs[i - 1], dirs[i], -1.0);
        }
        let last_dir = dirs[n - 2];
        left.push(pts[n - 1] + left_normal(last_dir) * hw);
        right.push(pts[n - 1] - left_normal(last_dir) * hw);

        let mut outline = left;
        self.cap(&mut outline, pts[n - 1], last_dir);
        outline.extend(right.into_iter().rev());
        self.cap(&mut outline, pts[0], -dirs[0]);
        out.push_contour(&outline);
    }

    fn closed(&mut self, pts: &[Point], out: &mut StrokeOutline) {
        let n = pts.len();
        let dirs: Vec<Vector> = (0..n).map(|i| direction(pts[i], pts[(i + 1) % n])).collect();

        let mut left = Vec::with_capacity(n * 3);
        let mut right = Vec::with_capacity(n * 3);
        for i in 0..n {
            let incoming = dirs[(i + n - 1) % n];
            self.join(&mut left, pts[i], incoming, dirs[i], 1.0);
            self.join(&mut right, pts[i], incoming, dirs[i], -1.0);
        }
        right.reverse();
        out.push_contour(&left);
        out.push_contour(&right);
    }

    /// Emits the offset points around an interior vertex on one side of the path.
    fn join(&mut self, side: &mut Vec<Point>, p: Point, d0: Vector, d1: Vector, s: f32) {
        let hw = self.hw;
        let n0 = left_normal(d0) * s;
        let n1 = left_normal(d1) * s;
        let cross = d0.cross(d1);
        let turn = cross.abs().atan2(d0.dot(d1));

        let a = p + n0 * hw;
        let b = p + n1 * hw;

        if turn < self.config.small_angle_threshold {
            side.push(a);
            if !coincident(a, b) {
                side.push(b);
            }
            return;
        }

        if s * cross > 0.0 {
            // Inner side. Pivoting through the vertex keeps short segments covered.
            side.push(a);
            side.push(p);
            side.push(b);
            return;
        }

        match self.stroke.join {
            LineJoin::Bevel => {
                self.stats.bevel_joins += 1;
                side.push(a);
                side.push(b);
            }
            LineJoin::Round => {
                self.stats.round_joins += 1;
                let sweep = n0.cross(n1).atan2(n0.dot(n1));
                self.arc(side, p, n0, sweep, true);
            }
            LineJoin::Miter => {
                let miter_distance = hw / (turn * 0.5).cos();
                if !miter_distance.is_finite() || miter_distance > hw * self.stroke.miter_limit {
                    self.stats.miter_fallbacks += 1;
                    self.stats.bevel_joins += 1;
                    side.push(a);
                    side.push(b);
                } else {
                    self.stats.miter_joins += 1;
                    side.push(a);
                    side.push(p + unit(n0 + n1) * miter_distance);
                    side.push(b);
                }
            }
        }
    }

    /// Appends a cap at an open end. `dir` points away from the path.
    fn cap(&mut self, outline: &mut Vec<Point>, p: Point, dir: Vector) {
        let hw = self.hw;
        let l = left_normal(dir);
        match self.stroke.cap {
            LineCap::Butt => {}
            LineCap::Square => {
                self.stats.caps += 1;
                let tip = p + dir * hw;
                outline.push(tip + l * hw);
                outline.push(tip - l * hw);
            }
            LineCap::Round => {
                self.stats.caps += 1;
                self.arc(outline, p, l, -PI, false);
            }
        }
    }

    /// Fans an arc of radius `hw` starting at unit vector `from` and sweeping `sweep` radians.
    fn arc(
        &mut self,
        out: &mut Vec<Point>,
        center: Point,
        from: Vector,
        sweep: f32,
        endpoints: bool,
    ) {
        let hw = self.hw;
        let segments = round_segment_count(hw, sweep);
        self.stats.arc_segments += segments as u32;
        let start = from.y.atan2(from.x);
        let (first, last) = if endpoints { (0, segments) } else { (1, segments - 1) };
        for i in first..=last {
            let a = start + sweep * i as f32 / segments as f32;
            out.push(center + vector(a.cos(), a.sin()) * hw);
        }
    }
}

fn coalesce(points: &[Point]) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map(|last| !coincident(*last, *p)).unwrap_or(true) {
            out.push(*p);
        }
    }
    out
}

#[inline]
fn coincident(a: Point, b: Point) -> bool {
    (a - b).square_length() <= COINCIDENT_EPSILON * COINCIDENT_EPSILON
}

#[inline]
fn direction(from: Point, to: Point) -> Vector {
    unit(to - from)
}

/// Unit vector along `v`, or +x for a zero vector.
#[inline]
fn unit(v: Vector) -> Vector {
    v.try_normalize().unwrap_or(vector(1.0, 0.0))
}

#[inline]
fn left_normal(d: Vector) -> Vector {
    vector(-d.y, d.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyon::math::point;
    use crate::color::Color;

    fn pts(coords: &[[f32; 2]]) -> Vec<Point> {
        coords.iter().map(|c| point(c[0], c[1])).collect()
    }

    fn square() -> Vec<Point> {
        pts(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0]])
    }

    fn shoelace(points: &[Point]) -> f32 {
        let n = points.len();
        let mut sum = 0.0;
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            sum += a.x * b.y - b.x * a.y;
        }
        sum * 0.5
    }

    fn stroke(weight: f32, cap: LineCap, join: LineJoin) -> Stroke {
        Stroke::new(weight, Color::BLACK).with_cap(cap).with_join(join)
    }

    #[test]
    fn closed_square_with_miter_joins_has_no_arcs() {
        let mut out = StrokeOutline::default();
        let style = stroke(4.0, LineCap::Butt, LineJoin::Miter);
        stroke_contour(&square(), true, &style, &TessConfig::default(), &mut out);

        assert_eq!(out.stats.miter_joins, 4);
        assert_eq!(out.stats.round_joins, 0);
        assert_eq!(out.stats.arc_segments, 0);
        assert_eq!(out.stats.caps, 0);

        let contours = out.contours();
        assert_eq!(contours.len(), 2);
        let outer_area = contours
            .iter()
            .map(|c| shoelace(c).abs())
            .fold(0.0f32, f32::max);
        assert!((outer_area - 196.0).abs() < 1e-3, "outer area {outer_area}");
    }

    #[test]
    fn closed_outline_contours_are_all_closed() {
        let mut out = StrokeOutline::default();
        let style = stroke(2.0, LineCap::Round, LineJoin::Round);
        stroke_contour(&square(), true, &style, &TessConfig::default(), &mut out);

        let moves = out
            .commands
            .iter()
            .filter(|c| matches!(c, OutlineCommand::MoveTo(_)))
            .count();
        let closes = out
            .commands
            .iter()
            .filter(|c| matches!(c, OutlineCommand::Close))
            .count();
        assert_eq!(moves, closes);
        assert_eq!(out.commands.last(), Some(&OutlineCommand::Close));
        assert_eq!(out.stats.caps, 0);
        assert_eq!(out.stats.round_joins, 4);
    }

    #[test]
    fn spike_with_tight_miter_limit_falls_back_to_bevel() {
        let mut out = StrokeOutline::default();
        let style = stroke(2.0, LineCap::Butt, LineJoin::Miter).with_miter_limit(4.0);
        let spike = pts(&[[0.0, 0.0], [10.0, 0.0], [0.0, 0.3]]);
        stroke_contour(&spike, false, &style, &TessConfig::default(), &mut out);

        assert_eq!(out.stats.miter_fallbacks, 1);
        assert_eq!(out.stats.miter_joins, 0);
        for contour in out.contours() {
            for p in contour {
                assert!(p.x.is_finite() && p.y.is_finite());
                let dx = p.x - 10.0;
                let dy = p.y;
                assert!(dx <= 1.0 * 4.0 + 1e-3, "point {p:?} overshoots the miter limit");
                assert!(dy.abs() < 20.0);
            }
        }
    }

    #[test]
    fn right_angle_miter_reaches_the_corner() {
        let mut out = StrokeOutline::default();
        let style = stroke(2.0, LineCap::Butt, LineJoin::Miter);
        let corner = pts(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]);
        stroke_contour(&corner, false, &style, &TessConfig::default(), &mut out);

        assert_eq!(out.stats.miter_joins, 1);
        let has_miter_point = out.contours()[0]
            .iter()
            .any(|p| (p.x - 11.0).abs() < 1e-4 && (p.y + 1.0).abs() < 1e-4);
        assert!(has_miter_point);
    }

    #[test]
    fn square_cap_extends_by_half_width() {
        let mut out = StrokeOutline::default();
        let style = stroke(4.0, LineCap::Square, LineJoin::Miter);
        let line = pts(&[[0.0, 0.0], [10.0, 0.0]]);
        stroke_contour(&line, false, &style, &TessConfig::default(), &mut out);

        let contour = &out.contours()[0];
        let min_x = contour.iter().map(|p| p.x).fold(f32::MAX, f32::min);
        let max_x = contour.iter().map(|p| p.x).fold(f32::MIN, f32::max);
        assert_eq!(min_x, -2.0);
        assert_eq!(max_x, 12.0);
        assert_eq!(out.stats.caps, 2);
        assert!((shoelace(contour).abs() - 56.0).abs() < 1e-3);
    }

    #[test]
    fn butt_cap_adds_no_geometry() {
        let mut out = StrokeOutline::default();
        let style = stroke(4.0, LineCap::Butt, LineJoin::Miter);
        let line = pts(&[[0.0, 0.0], [10.0, 0.0]]);
        stroke_contour(&line, false, &style, &TessConfig::default(), &mut out);
        assert_eq!(out.contours()[0].len(), 4);
        assert_eq!(out.stats.caps, 0);
    }

    #[test]
    fn round_cap_uses_sqrt_radius_segments() {
        let mut out = StrokeOutline::default();
        let style = stroke(8.0, LineCap::Round, LineJoin::Miter);
        let line = pts(&[[0.0, 0.0], [10.0, 0.0]]);
        stroke_contour(&line, false, &style, &TessConfig::default(), &mut out);
        let per_cap = round_segment_count(4.0, PI) as u32;
        assert_eq!(out.stats.arc_segments, per_cap * 2);
        // Two side points per end plus the interior arc points of each cap.
        assert_eq!(out.contours()[0].len(), 4 + 2 * (per_cap as usize - 1));
    }

    #[test]
    fn duplicate_points_and_zero_length_segments_are_skipped() {
        let mut out = StrokeOutline::default();
        let style = stroke(2.0, LineCap::Butt, LineJoin::Bevel);
        let points = pts(&[[0.0, 0.0], [0.0, 0.0], [5.0, 0.0], [5.0, 0.0], [10.0, 0.0]]);
        stroke_contour(&points, false, &style, &TessConfig::default(), &mut out);
        for contour in out.contours() {
            for p in contour {
                assert!(p.x.is_finite() && p.y.is_finite());
            }
        }
        assert_eq!(out.stats.bevel_joins, 0);
    }

    #[test]
    fn single_point_draws_a_cap_shaped_dot() {
        let config = TessConfig::default();
        let dot = [point(3.0, 3.0)];
        let mut round = StrokeOutline::default();
        let round_cap = stroke(4.0, LineCap::Round, LineJoin::Miter);
        stroke_contour(&dot, false, &round_cap, &config, &mut round);
        assert_eq!(round.contours().len(), 1);

        let mut butt = StrokeOutline::default();
        let butt_cap = stroke(4.0, LineCap::Butt, LineJoin::Miter);
        stroke_contour(&dot, false, &butt_cap, &config, &mut butt);
        assert!(butt.is_empty());
    }
}
