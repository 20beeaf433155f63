//! Conversion of input geometry into fill triangles, stroke geometry and point sprites.
//!
//! Every leaf shape is tessellated on its own into fresh index-cache blocks of the shared
//! [`TessGeometry`]. Block merging across leaves happens later, during aggregation.

use std::f32::consts::TAU;

use ahash::HashMap;
use lyon::lyon_tessellation::{
    BuffersBuilder, FillOptions, FillTessellator, FillVertex, FillVertexConstructor,
    VertexBuffers, VertexSource,
};
use lyon::math::{point, Point};
use lyon::path::EndpointId;
use smallvec::SmallVec;

use crate::color::Color;
use crate::config::TessConfig;
use crate::dirty::Stream;
use crate::error::{GeometryError, GeometryResult};
use crate::index_cache::VertexSpan;
use crate::input::{lerp3, Contour, InputGeometry, TessVertex, VertexAttrs};
use crate::metrics::TessMetrics;
use crate::output::{FillAttributes, LeafBlocks, TessGeometry};
use crate::stroke::LineCap;
use crate::stroker::{round_segment_count, stroke_contour, StrokeOutline};
use crate::style::{FillRule, Style, TextureMode};
use crate::sync::TextureInfo;

const CONVEX_EPSILON: f32 = 1e-6;

/// How the vertices of a geometry-family shape connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GeometryKind {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleFan,
    TriangleStrip,
    Quads,
    QuadStrip,
    /// Full command stream with curves and breaks.
    #[default]
    Polygon,
}

impl GeometryKind {
    /// Whether the kind accepts curve commands.
    #[inline]
    pub fn supports_curves(self) -> bool {
        self == GeometryKind::Polygon
    }
}

/// A polyline handed to the stroker.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokePath {
    pub points: Vec<[f32; 3]>,
    pub closed: bool,
}

/// Everything the tessellator needs to know about one leaf.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LeafShape<'a> {
    pub(crate) kind: GeometryKind,
    pub(crate) input: &'a InputGeometry,
    pub(crate) closed: bool,
    pub(crate) convex: bool,
    pub(crate) style: &'a Style,
    pub(crate) texture: Option<TextureInfo>,
    pub(crate) normalized_uv: bool,
    pub(crate) stroke_override: Option<&'a [StrokePath]>,
}

/// Output of a leaf: blocks and vertex ranges per stream plus the input to output vertex map.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LeafOutput {
    pub(crate) blocks: [LeafBlocks; 3],
    pub(crate) vertices: [Option<VertexSpan>; 3],
    /// Fill-stream vertices written by the fill itself.
    pub(crate) fill_part: Option<VertexSpan>,
    pub(crate) stroke_part: Option<(Stream, VertexSpan)>,
    pub(crate) point_part: Option<(Stream, VertexSpan)>,
    /// First fill-stream block of a textured 2D leaf's stroke, which must not share a draw call
    /// with the textured fill.
    pub(crate) first_stroke_block: Option<usize>,
    pub(crate) first_point_block: Option<usize>,
    /// Fill-stream vertices that are exact copies of each input vertex.
    pub(crate) tess_map: Vec<SmallVec<[usize; 2]>>,
    /// False when some fill vertex was interpolated and cannot follow per-vertex edits.
    pub(crate) exact_map: bool,
}

impl LeafOutput {
    #[inline]
    pub(crate) fn span(&self, stream: Stream) -> Option<VertexSpan> {
        self.vertices[stream as usize]
    }
}

#[derive(Debug, Clone)]
struct Mesh<V> {
    vertices: Vec<V>,
    triangles: Vec<u32>,
    /// Extra `(mesh vertex, input record)` pairs for input vertices merged into one output vertex.
    aliases: Vec<(usize, usize)>,
}

impl<V> Default for Mesh<V> {
    fn default() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            aliases: Vec::new(),
        }
    }
}

impl<V> Mesh<V> {
    fn new(vertices: Vec<V>, triangles: Vec<u32>) -> Self {
        Self {
            vertices,
            triangles,
            aliases: Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Writes fill vertices, applying texture scaling and laying out custom channels.
struct FillWriter {
    texture: Option<TextureInfo>,
    image_mode: bool,
    /// Color of every fill vertex of a textured shape.
    tint: Option<Color>,
    /// For each output custom channel: offset and width in the shape's custom values.
    custom_layout: Vec<Option<(usize, usize)>>,
}

impl FillWriter {
    fn new(shape: &LeafShape, attrs: &FillAttributes) -> Self {
        let mut offsets = Vec::with_capacity(shape.input.custom.len());
        let mut offset = 0;
        for custom in &shape.input.custom {
            offsets.push((custom.id, offset, custom.components));
            offset += custom.components;
        }
        let custom_layout = attrs
            .custom
            .iter()
            .map(|channel| {
                offsets
                    .iter()
                    .find(|(id, _, _)| *id == channel.id)
                    .map(|(_, offset, width)| (*offset, *width))
            })
            .collect();

        Self {
            texture: shape.texture,
            image_mode: shape.style.texture_mode == TextureMode::Image && !shape.normalized_uv,
            tint: shape.texture.map(|_| shape.style.tint_color()),
            custom_layout,
        }
    }

    /// Writes a vertex of the shape's own fill, which takes the tint when textured.
    fn write_fill(&self, attrs: &mut FillAttributes, v: &TessVertex) {
        self.write(attrs, v);
        if let (Some(tint), Some(color)) = (self.tint, attrs.colors.last_mut()) {
            *color = tint.to_array();
        }
    }

    fn write(&self, attrs: &mut FillAttributes, v: &TessVertex) {
        let a = &v.attrs;
        attrs.positions.push(v.position);
        attrs.colors.push(a.color.to_array());
        attrs.normals.push(a.normal);
        attrs
            .tex_coords
            .push(texture_coordinate(self.texture, self.image_mode, a.tex_coord));
        attrs.ambient.push(a.material.ambient.to_array());
        attrs.specular.push(a.material.specular.to_array());
        attrs.emissive.push(a.material.emissive.to_array());
        attrs.shininess.push(a.material.shininess);
        for (channel, layout) in attrs.custom.iter_mut().zip(&self.custom_layout) {
            let width = channel.components();
            match layout {
                Some((offset, len)) if offset + len <= v.custom.len() => {
                    let values = &v.custom[*offset..offset + len];
                    channel.values.extend(values.iter().take(width));
                    channel
                        .values
                        .extend(std::iter::repeat(0.0).take(width.saturating_sub(*len)));
                }
                _ => channel.values.extend(std::iter::repeat(0.0).take(width)),
            }
        }
    }
}

/// Output texture coordinate of an authored one: texel coordinates are normalized in image mode
/// and the result is scaled to the used part of the texture.
pub(crate) fn texture_coordinate(
    texture: Option<TextureInfo>,
    image_mode: bool,
    uv: [f32; 2],
) -> [f32; 2] {
    match texture {
        Some(info) => {
            let (mut u, mut v) = (uv[0], uv[1]);
            if image_mode {
                u /= info.width.max(1) as f32;
                v /= info.height.max(1) as f32;
            }
            [u * info.max_u, v * info.max_v]
        }
        None => uv,
    }
}

/// Builds [`TessVertex`]es for lyon output by looking up or interpolating the flattened input.
struct ContourVertexConverter<'a> {
    contours: &'a [Contour],
    endpoints: &'a HashMap<EndpointId, (usize, usize)>,
    fallback: VertexAttrs,
    /// Number of vertices built so far, which is the index of the next one.
    built: usize,
    aliases: &'a mut Vec<(usize, usize)>,
}

impl ContourVertexConverter<'_> {
    fn source(&self, id: EndpointId) -> Option<&TessVertex> {
        self.endpoints
            .get(&id)
            .map(|&(contour, vertex)| &self.contours[contour].vertices[vertex])
    }
}

impl FillVertexConstructor<TessVertex> for ContourVertexConverter<'_> {
    fn new_vertex(&mut self, vertex: FillVertex) -> TessVertex {
        let index = self.built;
        self.built += 1;
        let p = vertex.position();
        let mut sources = vertex.sources();
        match sources.next() {
            Some(VertexSource::Endpoint { id }) => {
                if let Some(source) = self.source(id).cloned() {
                    for other in sources {
                        if let VertexSource::Endpoint { id } = other {
                            if let Some(origin) = self.source(id).and_then(|v| v.origin) {
                                self.aliases.push((index, origin));
                            }
                        }
                    }
                    return source;
                }
            }
            Some(VertexSource::Edge { from, to, t }) => {
                if let (Some(a), Some(b)) = (self.source(from), self.source(to)) {
                    let mut v = a.lerp(b, t);
                    let z = lerp3(a.position, b.position, t)[2];
                    v.position = [p.x, p.y, z];
                    return v;
                }
            }
            None => {}
        }
        TessVertex::at([p.x, p.y, 0.0], self.fallback)
    }
}

struct OutlineVertexConverter;

impl FillVertexConstructor<[f32; 2]> for OutlineVertexConverter {
    fn new_vertex(&mut self, vertex: FillVertex) -> [f32; 2] {
        vertex.position().to_array()
    }
}

/// Stateful tessellator reused across leaves and passes.
pub struct Tessellator {
    fill: FillTessellator,
    config: TessConfig,
    metrics: TessMetrics,
}

impl Tessellator {
    pub fn new(config: TessConfig) -> Self {
        Self {
            fill: FillTessellator::new(),
            config,
            metrics: TessMetrics::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &TessConfig {
        &self.config
    }

    #[inline]
    pub fn metrics(&self) -> &TessMetrics {
        &self.metrics
    }

    pub fn reset_metrics(&mut self) {
        self.metrics = TessMetrics::default();
    }

    /// Tessellates one leaf into `geometry`, opening fresh blocks in every stream it writes to.
    pub(crate) fn tessellate_leaf(
        &mut self,
        shape: &LeafShape,
        geometry: &mut TessGeometry,
    ) -> GeometryResult<LeafOutput> {
        if let Some(info) = shape.texture {
            let limit = self.config.max_texture_size;
            if info.width > limit || info.height > limit {
                return Err(GeometryError::TextureTooLarge {
                    width: info.width,
                    height: info.height,
                    limit,
                });
            }
        }

        self.metrics.leaves += 1;
        let before = stream_counts(geometry);
        let mut out = LeafOutput {
            tess_map: vec![SmallVec::new(); shape.input.len()],
            exact_map: true,
            ..LeafOutput::default()
        };

        if shape.style.fill {
            let fill_start = geometry.fill.vertex_count();
            let mesh = self.fill_mesh(shape, &mut out);
            if !mesh.is_empty() {
                let writer = FillWriter::new(shape, &geometry.fill.attributes);
                emit_fill(geometry, &mut out, self.config.index_limit, &writer, &mesh);
            }
            out.fill_part = VertexSpan::between(fill_start, geometry.fill.vertex_count());
        }

        if shape.style.has_stroke() {
            if shape.kind == GeometryKind::Points {
                self.points(shape, geometry, &mut out);
            } else {
                let paths = match shape.stroke_override {
                    Some(paths) => paths.to_vec(),
                    None => stroke_paths(shape, &self.config),
                };
                if self.config.is_2d() {
                    self.stroke_2d(shape, &paths, geometry, &mut out);
                } else {
                    self.stroke_3d(shape, &paths, geometry, &mut out);
                }
            }
        }

        let after = stream_counts(geometry);
        for stream in Stream::ALL {
            let slot = stream as usize;
            out.vertices[slot] = VertexSpan::between(before[slot], after[slot]);
        }
        Ok(out)
    }

    fn fill_mesh(&mut self, shape: &LeafShape, out: &mut LeafOutput) -> Mesh<TessVertex> {
        let input = shape.input;
        let n = input.len() as u32;
        let direct = |triangles: Vec<u32>| {
            Mesh::new((0..input.len()).map(|i| input.tess_vertex(i)).collect(), triangles)
        };

        let mesh = match shape.kind {
            GeometryKind::Points
            | GeometryKind::Lines
            | GeometryKind::LineStrip
            | GeometryKind::LineLoop => return Mesh::default(),
            GeometryKind::Triangles => direct((0..n - n % 3).collect()),
            GeometryKind::TriangleFan => direct(fan_triangles(n)),
            GeometryKind::TriangleStrip => direct(strip_triangles(n)),
            GeometryKind::Quads => direct(
                (0..n / 4)
                    .flat_map(|q| quad_triangles([4 * q, 4 * q + 1, 4 * q + 2, 4 * q + 3]))
                    .collect(),
            ),
            GeometryKind::QuadStrip => direct(
                (1..n / 2)
                    .flat_map(|q| quad_triangles(quad_strip_quad(q)))
                    .collect(),
            ),
            GeometryKind::Polygon => return self.polygon_mesh(shape, out),
        };
        self.metrics.direct_fills += 1;
        mesh
    }

    fn polygon_mesh(&mut self, shape: &LeafShape, out: &mut LeafOutput) -> Mesh<TessVertex> {
        let contours: Vec<Contour> = shape
            .input
            .flatten(&self.config)
            .into_iter()
            .filter(|c| c.vertices.len() >= 3)
            .collect();
        if contours.is_empty() {
            return Mesh::default();
        }
        if !shape.input.is_straight() {
            out.exact_map = false;
        }

        if contours.len() == 1 {
            let mut vertices = contours[0].vertices.clone();
            if vertices.len() > 3 && coincident(&vertices[0], &vertices[vertices.len() - 1]) {
                vertices.pop();
                out.exact_map = false;
            }
            let positions: Vec<[f32; 3]> = vertices.iter().map(|v| v.position).collect();
            if shape.convex || is_convex(&positions) {
                self.metrics.convex_fills += 1;
                let triangles = fan_triangles(vertices.len() as u32);
                return Mesh::new(vertices, triangles);
            }
        }

        self.metrics.general_fills += 1;
        let mesh = self.general_fill(&contours, shape.style);
        let mut mapped = vec![false; shape.input.len()];
        let origins = mesh.vertices.iter().map(|v| v.origin);
        for origin in origins.chain(mesh.aliases.iter().map(|&(_, o)| Some(o))) {
            match origin.and_then(|o| mapped.get_mut(o)) {
                Some(slot) => *slot = true,
                None => out.exact_map = false,
            }
        }
        if mapped.contains(&false) {
            out.exact_map = false;
        }
        mesh
    }

    /// Winding-rule fill of any number of contours through lyon.
    fn general_fill(&mut self, contours: &[Contour], style: &Style) -> Mesh<TessVertex> {
        let mut builder = lyon::path::Path::builder();
        let mut endpoints: HashMap<EndpointId, (usize, usize)> = HashMap::default();
        for (c, contour) in contours.iter().enumerate() {
            for (k, v) in contour.vertices.iter().enumerate() {
                let p = point(v.position[0], v.position[1]);
                let id = if k == 0 {
                    builder.begin(p)
                } else {
                    builder.line_to(p)
                };
                endpoints.insert(id, (c, k));
            }
            builder.end(true);
        }
        let path = builder.build();

        let options = FillOptions::default()
            .with_tolerance(self.config.fill_tolerance)
            .with_fill_rule(lyon_fill_rule(style.fill_rule));
        let mut aliases = Vec::new();
        let converter = ContourVertexConverter {
            contours,
            endpoints: &endpoints,
            fallback: VertexAttrs {
                color: style.fill_color,
                material: style.material,
                ..VertexAttrs::default()
            },
            built: 0,
            aliases: &mut aliases,
        };
        let mut buffers: VertexBuffers<TessVertex, u32> = VertexBuffers::new();
        // Endpoint ids only reach the vertex constructor through the id-based entry point.
        let result = self.fill.tessellate_with_ids(
            path.id_iter(),
            &path,
            None,
            &options,
            &mut BuffersBuilder::new(&mut buffers, converter),
        );
        if let Err(err) = result {
            tracing::warn!(?err, contours = contours.len(), "skipping untessellatable fill");
            self.metrics.skipped_contours += contours.len() as u32;
            return Mesh::default();
        }
        Mesh {
            vertices: buffers.vertices,
            triangles: buffers.indices,
            aliases,
        }
    }

    /// Non-zero fill of a stroke outline.
    fn fill_outline(&mut self, outline: &StrokeOutline) -> Mesh<[f32; 2]> {
        let mut builder = lyon::path::Path::builder();
        for contour in outline.contours() {
            let mut points = contour.iter();
            let Some(first) = points.next() else {
                continue;
            };
            builder.begin(*first);
            for p in points {
                builder.line_to(*p);
            }
            builder.end(true);
        }
        let path = builder.build();
        let options = FillOptions::default()
            .with_tolerance(self.config.fill_tolerance)
            .with_fill_rule(lyon::lyon_tessellation::FillRule::NonZero);
        let mut buffers: VertexBuffers<[f32; 2], u32> = VertexBuffers::new();
        let result = self.fill.tessellate_path(
            &path,
            &options,
            &mut BuffersBuilder::new(&mut buffers, OutlineVertexConverter),
        );
        if let Err(err) = result {
            tracing::warn!(?err, "skipping untessellatable stroke outline");
            self.metrics.skipped_contours += 1;
            return Mesh::default();
        }
        Mesh::new(buffers.vertices, buffers.indices)
    }

    fn stroke_2d(
        &mut self,
        shape: &LeafShape,
        paths: &[StrokePath],
        geometry: &mut TessGeometry,
        out: &mut LeafOutput,
    ) {
        let stroke = &shape.style.stroke;
        let mut outline = StrokeOutline::default();
        for path in paths {
            let points: Vec<Point> = path.points.iter().map(|p| point(p[0], p[1])).collect();
            stroke_contour(&points, path.closed, stroke, &self.config, &mut outline);
            self.metrics.stroked_contours += 1;
        }
        self.metrics.stroke.accumulate(&outline.stats);
        if outline.is_empty() {
            return;
        }
        let mesh = self.fill_outline(&outline);
        if mesh.is_empty() {
            return;
        }

        let attrs = VertexAttrs {
            color: stroke.color,
            material: shape.style.material,
            ..VertexAttrs::default()
        };
        let start = geometry.fill.vertex_count();
        let first_block = self.split_for_texture(shape, geometry, out);
        let writer = FillWriter::new(shape, &geometry.fill.attributes);
        geometry.fill.append_mesh(
            &mut out.blocks[Stream::Fill as usize],
            self.config.index_limit,
            mesh.vertices.len(),
            &mesh.triangles,
            |fill, i| {
                let p = mesh.vertices[i];
                writer.write(fill, &TessVertex::at([p[0], p[1], 0.0], attrs));
            },
        );
        out.first_stroke_block = first_block;
        out.stroke_part = VertexSpan::between(start, geometry.fill.vertex_count())
            .map(|span| (Stream::Fill, span));
    }

    /// Forces a new fill block for a textured 2D leaf and returns its index.
    fn split_for_texture(
        &self,
        shape: &LeafShape,
        geometry: &TessGeometry,
        out: &mut LeafOutput,
    ) -> Option<usize> {
        if shape.style.texture.is_none() {
            return None;
        }
        let fill_blocks = &mut out.blocks[Stream::Fill as usize];
        fill_blocks.force_new_block();
        tracing::trace!(
            block = geometry.fill.cache.len(),
            "textured leaf splits before its stroke or points"
        );
        Some(geometry.fill.cache.len())
    }

    /// Shader-extruded line quads, one per segment, without joins or caps.
    fn stroke_3d(
        &mut self,
        shape: &LeafShape,
        paths: &[StrokePath],
        geometry: &mut TessGeometry,
        out: &mut LeafOutput,
    ) {
        let stroke = &shape.style.stroke;
        let hw = stroke.half_width();
        let color = stroke.color.to_array();
        let start = geometry.line.vertex_count();

        for path in paths {
            let n = path.points.len();
            if n < 2 {
                continue;
            }
            self.metrics.stroked_contours += 1;
            let mut segments: Vec<([f32; 3], [f32; 3])> =
                path.points.windows(2).map(|w| (w[0], w[1])).collect();
            if path.closed && n > 2 {
                segments.push((path.points[n - 1], path.points[0]));
            }
            segments.retain(|(a, b)| a != b);
            if segments.is_empty() {
                continue;
            }
            self.metrics.line_segments += segments.len() as u32;

            let triangles: Vec<u32> = (0..segments.len() as u32)
                .flat_map(|s| {
                    let b = 4 * s;
                    [b, b + 1, b + 2, b + 2, b + 1, b + 3]
                })
                .collect();
            geometry.line.append_mesh(
                &mut out.blocks[Stream::Line as usize],
                self.config.index_limit,
                segments.len() * 4,
                &triangles,
                |line, i| {
                    let (a, b) = segments[i / 4];
                    let (position, other, side) = match i % 4 {
                        0 => (a, b, hw),
                        1 => (a, b, -hw),
                        2 => (b, a, -hw),
                        _ => (b, a, hw),
                    };
                    line.positions.push(position);
                    line.colors.push(color);
                    line.directions.push([other[0], other[1], other[2], side]);
                },
            );
        }

        out.stroke_part = VertexSpan::between(start, geometry.line.vertex_count())
            .map(|span| (Stream::Line, span));
    }

    /// One sprite per input vertex: a square for square caps, a disc otherwise.
    fn points(&mut self, shape: &LeafShape, geometry: &mut TessGeometry, out: &mut LeafOutput) {
        let stroke = &shape.style.stroke;
        let hw = stroke.half_width();
        let sprite = sprite_mesh(hw, stroke.cap);
        let centers: Vec<[f32; 3]> = shape.input.vertices().iter().map(|v| v.position).collect();
        if centers.is_empty() {
            return;
        }
        self.metrics.points += centers.len() as u32;

        let per = sprite.vertices.len();
        let triangles: Vec<u32> = (0..centers.len() as u32)
            .flat_map(|c| sprite.triangles.iter().map(move |t| t + c * per as u32))
            .collect();
        let limit = self.config.index_limit;

        if self.config.is_2d() {
            let attrs = VertexAttrs {
                color: stroke.color,
                material: shape.style.material,
                ..VertexAttrs::default()
            };
            let start = geometry.fill.vertex_count();
            let first_block = self.split_for_texture(shape, geometry, out);
            let writer = FillWriter::new(shape, &geometry.fill.attributes);
            geometry.fill.append_mesh(
                &mut out.blocks[Stream::Fill as usize],
                limit,
                centers.len() * per,
                &triangles,
                |fill, i| {
                    let c = centers[i / per];
                    let o = sprite.vertices[i % per];
                    writer.write(fill, &TessVertex::at([c[0] + o[0], c[1] + o[1], c[2]], attrs));
                },
            );
            out.first_point_block = first_block;
            out.point_part = VertexSpan::between(start, geometry.fill.vertex_count())
                .map(|span| (Stream::Fill, span));
        } else {
            let color = stroke.color.to_array();
            let start = geometry.point.vertex_count();
            geometry.point.append_mesh(
                &mut out.blocks[Stream::Point as usize],
                limit,
                centers.len() * per,
                &triangles,
                |points, i| {
                    points.positions.push(centers[i / per]);
                    points.colors.push(color);
                    points.offsets.push(sprite.vertices[i % per]);
                },
            );
            out.point_part = VertexSpan::between(start, geometry.point.vertex_count())
                .map(|span| (Stream::Point, span));
        }
    }
}

fn emit_fill(
    geometry: &mut TessGeometry,
    out: &mut LeafOutput,
    limit: usize,
    writer: &FillWriter,
    mesh: &Mesh<TessVertex>,
) {
    let LeafOutput {
        blocks, tess_map, ..
    } = out;
    geometry.fill.append_mesh(
        &mut blocks[Stream::Fill as usize],
        limit,
        mesh.vertices.len(),
        &mesh.triangles,
        |fill, i| {
            let vertex = &mesh.vertices[i];
            let written = fill.positions.len();
            if let Some(slot) = vertex.origin.and_then(|o| tess_map.get_mut(o)) {
                slot.push(written);
            }
            for &(_, origin) in mesh.aliases.iter().filter(|(v, _)| *v == i) {
                if let Some(slot) = tess_map.get_mut(origin) {
                    slot.push(written);
                }
            }
            writer.write_fill(fill, vertex);
        },
    );
}

fn stream_counts(geometry: &TessGeometry) -> [usize; 3] {
    Stream::ALL.map(|stream| geometry.vertex_count(stream))
}

fn lyon_fill_rule(rule: FillRule) -> lyon::lyon_tessellation::FillRule {
    match rule {
        FillRule::EvenOdd => lyon::lyon_tessellation::FillRule::EvenOdd,
        FillRule::NonZero => lyon::lyon_tessellation::FillRule::NonZero,
    }
}

/// Triangles sharing the first vertex: `(0, i, i + 1)`.
pub(crate) fn fan_triangles(n: u32) -> Vec<u32> {
    (1..n.saturating_sub(1)).flat_map(|i| [0, i, i + 1]).collect()
}

/// Triangle strip with alternating winding so every triangle keeps the same orientation.
pub(crate) fn strip_triangles(n: u32) -> Vec<u32> {
    (1..n.saturating_sub(1))
        .flat_map(|i| {
            if i % 2 == 0 {
                [i, i - 1, i + 1]
            } else {
                [i, i + 1, i - 1]
            }
        })
        .collect()
}

fn quad_triangles([i0, i1, i2, i3]: [u32; 4]) -> [u32; 6] {
    [i0, i1, i3, i1, i2, i3]
}

/// Corners of quad `q` (starting at 1) of a quad strip, in outline order.
fn quad_strip_quad(q: u32) -> [u32; 4] {
    [2 * (q - 1), 2 * (q - 1) + 1, 2 * q + 1, 2 * q]
}

/// Stroke outlines implied by the shape's kind.
fn stroke_paths(shape: &LeafShape, config: &TessConfig) -> Vec<StrokePath> {
    let positions: Vec<[f32; 3]> = shape.input.vertices().iter().map(|v| v.position).collect();
    let n = positions.len();
    let pick = |indices: &[u32], closed: bool| StrokePath {
        points: indices.iter().map(|&i| positions[i as usize]).collect(),
        closed,
    };
    let per_triangle = |triangles: Vec<u32>| -> Vec<StrokePath> {
        triangles.chunks_exact(3).map(|t| pick(t, true)).collect()
    };

    match shape.kind {
        GeometryKind::Points => Vec::new(),
        GeometryKind::Lines => positions
            .chunks_exact(2)
            .map(|pair| StrokePath {
                points: pair.to_vec(),
                closed: false,
            })
            .collect(),
        GeometryKind::LineStrip => vec![StrokePath {
            points: positions,
            closed: false,
        }],
        GeometryKind::LineLoop => vec![StrokePath {
            points: positions,
            closed: true,
        }],
        GeometryKind::Triangles => per_triangle((0..(n - n % 3) as u32).collect()),
        GeometryKind::TriangleFan => per_triangle(fan_triangles(n as u32)),
        GeometryKind::TriangleStrip => per_triangle(strip_triangles(n as u32)),
        GeometryKind::Quads => (0..(n / 4) as u32)
            .map(|q| pick(&[4 * q, 4 * q + 1, 4 * q + 2, 4 * q + 3], true))
            .collect(),
        GeometryKind::QuadStrip => (1..(n / 2) as u32)
            .map(|q| pick(&quad_strip_quad(q), true))
            .collect(),
        GeometryKind::Polygon => shape
            .input
            .flatten(config)
            .into_iter()
            .map(|contour| StrokePath {
                points: contour.positions().collect(),
                closed: shape.closed,
            })
            .collect(),
    }
}

/// Number of outline vertices of a point sprite.
pub(crate) fn sprite_outline_count(hw: f32, cap: LineCap) -> usize {
    match cap {
        LineCap::Square => 4,
        _ => round_segment_count(hw, TAU).max(3),
    }
}

/// Sprite corner offsets and triangles for one point.
fn sprite_mesh(hw: f32, cap: LineCap) -> Mesh<[f32; 2]> {
    if cap == LineCap::Square {
        return Mesh::new(
            vec![[-hw, -hw], [hw, -hw], [hw, hw], [-hw, hw]],
            vec![0, 1, 2, 0, 2, 3],
        );
    }
    let segments = sprite_outline_count(hw, cap);
    let mut vertices = Vec::with_capacity(segments + 1);
    vertices.push([0.0, 0.0]);
    for i in 0..segments {
        let a = TAU * i as f32 / segments as f32;
        vertices.push([hw * a.cos(), hw * a.sin()]);
    }
    let n = segments as u32;
    let mut triangles: Vec<u32> = (1..n).flat_map(|i| [0, i, i + 1]).collect();
    triangles.extend([0, n, 1]);
    Mesh::new(vertices, triangles)
}

fn coincident(a: &TessVertex, b: &TessVertex) -> bool {
    let d = [
        a.position[0] - b.position[0],
        a.position[1] - b.position[1],
        a.position[2] - b.position[2],
    ];
    d[0] * d[0] + d[1] * d[1] + d[2] * d[2] <= CONVEX_EPSILON * CONVEX_EPSILON
}

/// True for a simple convex outline in the xy plane: every turn goes the same way and the
/// turns add up to one full revolution.
pub(crate) fn is_convex(points: &[[f32; 3]]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    let mut turning = 0.0f32;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        let d1 = [b[0] - a[0], b[1] - a[1]];
        let d2 = [c[0] - b[0], c[1] - b[1]];
        let cross = d1[0] * d2[1] - d1[1] * d2[0];
        let dot = d1[0] * d2[0] + d1[1] * d2[1];
        if cross.abs() > CONVEX_EPSILON {
            if sign == 0.0 {
                sign = cross.signum();
            } else if cross.signum() != sign {
                return false;
            }
        }
        turning += cross.atan2(dot);
    }
    sign != 0.0 && (turning.abs() - TAU).abs() < 1e-2
}
