//! Primitive shapes regenerated into input geometry at every tessellation.

use std::f32::consts::{FRAC_PI_2, PI, TAU};

use crate::input::{InputGeometry, VertexAttrs, VertexRecord};
use crate::stroker::round_segment_count;
use crate::style::Style;
use crate::tessellator::{GeometryKind, StrokePath};

const MIN_ELLIPSE_SEGMENTS: usize = 20;
const MAX_ELLIPSE_SEGMENTS: usize = 720;
const ELLIPSE_ACCURACY: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArcMode {
    /// Filled like a pie, stroked along the arc only.
    #[default]
    Open,
    /// Closed by the chord between the arc endpoints.
    Chord,
    /// Closed through the centre.
    Pie,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Point([f32; 3]),
    Line([f32; 3], [f32; 3]),
    Triangle([[f32; 3]; 3]),
    Quad([[f32; 3]; 4]),
    /// Corner radii are top-left, top-right, bottom-right, bottom-left.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        radii: [f32; 4],
    },
    Ellipse {
        center: [f32; 2],
        width: f32,
        height: f32,
    },
    /// Angles in radians, measured from the positive x axis.
    Arc {
        center: [f32; 2],
        width: f32,
        height: f32,
        start: f32,
        stop: f32,
        mode: ArcMode,
    },
    RegularPolygon {
        center: [f32; 2],
        radius: f32,
        sides: u32,
    },
    /// Axis-aligned box centred on the origin.
    Box {
        width: f32,
        height: f32,
        depth: f32,
    },
    /// Sphere centred on the origin.
    Sphere {
        radius: f32,
        detail_u: u32,
        detail_v: u32,
    },
}

impl Primitive {
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Primitive::Rect {
            x,
            y,
            width,
            height,
            radii: [0.0; 4],
        }
    }

    pub fn rounded_rect(x: f32, y: f32, width: f32, height: f32, radius: f32) -> Self {
        Primitive::Rect {
            x,
            y,
            width,
            height,
            radii: [radius; 4],
        }
    }

    pub fn ellipse(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Primitive::Ellipse {
            center: [cx, cy],
            width,
            height,
        }
    }
}

/// Input geometry generated for a primitive.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PrimitiveGeometry {
    pub(crate) kind: GeometryKind,
    pub(crate) input: InputGeometry,
    pub(crate) closed: bool,
    /// Every vertex can be fanned from the first one.
    pub(crate) convex: bool,
    /// Stroke outline when it differs from the fill outline.
    pub(crate) stroke_override: Option<Vec<StrokePath>>,
    /// Texture coordinates are already normalized.
    pub(crate) normalized_uv: bool,
}

impl PrimitiveGeometry {
    fn new(kind: GeometryKind) -> Self {
        Self {
            kind,
            input: InputGeometry::new(),
            closed: true,
            convex: false,
            stroke_override: None,
            normalized_uv: true,
        }
    }
}

pub(crate) fn build(primitive: &Primitive, style: &Style) -> PrimitiveGeometry {
    let base = VertexAttrs {
        color: style.fill_color,
        material: style.material,
        ..VertexAttrs::default()
    };
    let flat = |p: [f32; 3], uv: [f32; 2]| VertexRecord {
        position: p,
        attrs: VertexAttrs {
            tex_coord: uv,
            ..base
        },
    };

    match *primitive {
        Primitive::Point(p) => {
            let mut geometry = PrimitiveGeometry::new(GeometryKind::Points);
            geometry.input.push_vertex(flat(p, [0.0, 0.0]));
            geometry
        }
        Primitive::Line(a, b) => {
            let mut geometry = PrimitiveGeometry::new(GeometryKind::Lines);
            geometry.closed = false;
            geometry.input.push_vertex(flat(a, [0.0, 0.0]));
            geometry.input.push_vertex(flat(b, [1.0, 0.0]));
            geometry
        }
        Primitive::Triangle(points) => {
            let mut geometry = PrimitiveGeometry::new(GeometryKind::Triangles);
            let uvs = [[0.0, 0.0], [1.0, 0.0], [0.5, 1.0]];
            for (p, uv) in points.iter().zip(uvs) {
                geometry.input.push_vertex(flat(*p, uv));
            }
            geometry
        }
        Primitive::Quad(points) => {
            let mut geometry = PrimitiveGeometry::new(GeometryKind::Quads);
            for (p, uv) in points.iter().zip(unit_square_uvs()) {
                geometry.input.push_vertex(flat(*p, uv));
            }
            geometry
        }
        Primitive::Rect {
            x,
            y,
            width,
            height,
            radii,
        } => rect(x, y, width, height, radii, &flat),
        Primitive::Ellipse {
            center,
            width,
            height,
        } => {
            let mut geometry = PrimitiveGeometry::new(GeometryKind::Polygon);
            geometry.convex = true;
            let (rx, ry) = (width.abs() * 0.5, height.abs() * 0.5);
            let segments = ellipse_segments(rx, ry);
            for i in 0..segments {
                let a = TAU * i as f32 / segments as f32;
                let (c, s) = (a.cos(), a.sin());
                geometry.input.push_vertex(flat(
                    [center[0] + rx * c, center[1] + ry * s, 0.0],
                    [0.5 + 0.5 * c, 0.5 + 0.5 * s],
                ));
            }
            geometry
        }
        Primitive::Arc {
            center,
            width,
            height,
            start,
            stop,
            mode,
        } => arc(center, width, height, start, stop, mode, &flat),
        Primitive::RegularPolygon {
            center,
            radius,
            sides,
        } => {
            let mut geometry = PrimitiveGeometry::new(GeometryKind::Polygon);
            geometry.convex = true;
            let sides = sides.max(3);
            for i in 0..sides {
                let a = -FRAC_PI_2 + TAU * i as f32 / sides as f32;
                let (c, s) = (a.cos(), a.sin());
                geometry.input.push_vertex(flat(
                    [center[0] + radius * c, center[1] + radius * s, 0.0],
                    [0.5 + 0.5 * c, 0.5 + 0.5 * s],
                ));
            }
            geometry
        }
        Primitive::Box {
            width,
            height,
            depth,
        } => cuboid(width, height, depth, &base),
        Primitive::Sphere {
            radius,
            detail_u,
            detail_v,
        } => sphere(radius, detail_u.max(3), detail_v.max(2), &base),
    }
}

fn unit_square_uvs() -> [[f32; 2]; 4] {
    [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]
}

fn ellipse_segments(rx: f32, ry: f32) -> usize {
    let diameter = 2.0 * (rx * rx + ry * ry).sqrt();
    let segments = (TAU * diameter / ELLIPSE_ACCURACY).ceil() as usize;
    segments.clamp(MIN_ELLIPSE_SEGMENTS, MAX_ELLIPSE_SEGMENTS)
}

fn rect(
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    radii: [f32; 4],
    flat: &impl Fn([f32; 3], [f32; 2]) -> VertexRecord,
) -> PrimitiveGeometry {
    let mut geometry = PrimitiveGeometry::new(GeometryKind::Polygon);
    geometry.convex = true;
    let max_radius = width.abs().min(height.abs()) * 0.5;
    let uv = |px: f32, py: f32| {
        let u = if width != 0.0 { (px - x) / width } else { 0.0 };
        let v = if height != 0.0 { (py - y) / height } else { 0.0 };
        [u, v]
    };

    if radii.iter().all(|r| *r <= 0.0) {
        for (p, t) in [[x, y], [x + width, y], [x + width, y + height], [x, y + height]]
            .iter()
            .zip(unit_square_uvs())
        {
            geometry.input.push_vertex(flat([p[0], p[1], 0.0], t));
        }
        return geometry;
    }

    // Corner centres and the angle each quarter arc starts at, clockwise on screen.
    let r: Vec<f32> = radii.iter().map(|r| r.clamp(0.0, max_radius)).collect();
    let corners = [
        ([x + r[0], y + r[0]], r[0], PI),
        ([x + width - r[1], y + r[1]], r[1], 1.5 * PI),
        ([x + width - r[2], y + height - r[2]], r[2], 0.0),
        ([x + r[3], y + height - r[3]], r[3], FRAC_PI_2),
    ];
    for (center, radius, start) in corners {
        if radius <= 0.0 {
            let px = center[0];
            let py = center[1];
            geometry.input.push_vertex(flat([px, py, 0.0], uv(px, py)));
            continue;
        }
        let segments = round_segment_count(radius, FRAC_PI_2).max(2);
        for i in 0..=segments {
            let a = start + FRAC_PI_2 * i as f32 / segments as f32;
            let px = center[0] + radius * a.cos();
            let py = center[1] + radius * a.sin();
            geometry.input.push_vertex(flat([px, py, 0.0], uv(px, py)));
        }
    }
    geometry
}

fn arc(
    center: [f32; 2],
    width: f32,
    height: f32,
    start: f32,
    stop: f32,
    mode: ArcMode,
    flat: &impl Fn([f32; 3], [f32; 2]) -> VertexRecord,
) -> PrimitiveGeometry {
    let mut geometry = PrimitiveGeometry::new(GeometryKind::Polygon);
    geometry.convex = true;
    if !(stop > start) {
        return geometry;
    }
    let sweep = (stop - start).min(TAU);
    let (rx, ry) = (width.abs() * 0.5, height.abs() * 0.5);
    let segments = ((ellipse_segments(rx, ry) as f32 * sweep / TAU).ceil() as usize).max(2);

    let arc_points: Vec<([f32; 3], [f32; 2])> = (0..=segments)
        .map(|i| {
            let a = start + sweep * i as f32 / segments as f32;
            let (c, s) = (a.cos(), a.sin());
            (
                [center[0] + rx * c, center[1] + ry * s, 0.0],
                [0.5 + 0.5 * c, 0.5 + 0.5 * s],
            )
        })
        .collect();

    if mode != ArcMode::Chord {
        geometry
            .input
            .push_vertex(flat([center[0], center[1], 0.0], [0.5, 0.5]));
    }
    for (p, uv) in &arc_points {
        geometry.input.push_vertex(flat(*p, *uv));
    }
    if mode == ArcMode::Open {
        geometry.stroke_override = Some(vec![StrokePath {
            points: arc_points.iter().map(|(p, _)| *p).collect(),
            closed: false,
        }]);
    }
    geometry
}

fn cuboid(width: f32, height: f32, depth: f32, base: &VertexAttrs) -> PrimitiveGeometry {
    let mut geometry = PrimitiveGeometry::new(GeometryKind::Quads);
    let (w, h, d) = (width * 0.5, height * 0.5, depth * 0.5);
    let faces: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[-w, -h, d], [w, -h, d], [w, h, d], [-w, h, d]]),
        ([0.0, 0.0, -1.0], [[w, -h, -d], [-w, -h, -d], [-w, h, -d], [w, h, -d]]),
        ([1.0, 0.0, 0.0], [[w, -h, d], [w, -h, -d], [w, h, -d], [w, h, d]]),
        ([-1.0, 0.0, 0.0], [[-w, -h, -d], [-w, -h, d], [-w, h, d], [-w, h, -d]]),
        ([0.0, 1.0, 0.0], [[-w, h, d], [w, h, d], [w, h, -d], [-w, h, -d]]),
        ([0.0, -1.0, 0.0], [[-w, -h, -d], [w, -h, -d], [w, -h, d], [-w, -h, d]]),
    ];
    for (normal, corners) in faces {
        for (p, uv) in corners.iter().zip(unit_square_uvs()) {
            geometry.input.push_vertex(VertexRecord {
                position: *p,
                attrs: VertexAttrs {
                    normal,
                    tex_coord: uv,
                    ..*base
                },
            });
        }
    }
    geometry
}

fn sphere(radius: f32, detail_u: u32, detail_v: u32, base: &VertexAttrs) -> PrimitiveGeometry {
    let mut geometry = PrimitiveGeometry::new(GeometryKind::Triangles);
    let point = |iu: u32, iv: u32| {
        let u = iu as f32 / detail_u as f32;
        let v = iv as f32 / detail_v as f32;
        let theta = u * TAU;
        let phi = v * PI;
        let n = [phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin()];
        VertexRecord {
            position: [n[0] * radius, n[1] * radius, n[2] * radius],
            attrs: VertexAttrs {
                normal: n,
                tex_coord: [u, v],
                ..*base
            },
        }
    };
    for iv in 0..detail_v {
        for iu in 0..detail_u {
            let a = point(iu, iv);
            let b = point(iu + 1, iv);
            let c = point(iu + 1, iv + 1);
            let d = point(iu, iv + 1);
            if iv > 0 {
                geometry.input.push_vertex(a);
                geometry.input.push_vertex(b);
                geometry.input.push_vertex(d);
            }
            if iv + 1 < detail_v {
                geometry.input.push_vertex(b);
                geometry.input.push_vertex(c);
                geometry.input.push_vertex(d);
            }
        }
    }
    geometry
}
