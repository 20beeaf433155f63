use smallvec::SmallVec;

use crate::color::Color;
use crate::config::TessConfig;
use crate::error::{GeometryError, GeometryResult};
use crate::style::Material;

/// Scalar type of a custom vertex attribute. Values are stored as `f32` in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    Float,
    Int,
    Bool,
}

/// Shape of a custom attribute: its scalar kind and component count (1 to 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttributeDecl {
    pub kind: AttributeKind,
    pub components: u8,
}

impl AttributeDecl {
    pub fn new(kind: AttributeKind, components: u8) -> Self {
        Self { kind, components }
    }

    pub fn float(components: u8) -> Self {
        Self::new(AttributeKind::Float, components)
    }
}

/// A vertex as handed to the authoring API. Unset attributes fall back to the shape's style.
///
/// # Examples
///
/// ```
/// use tessera::{Color, Vertex};
///
/// let v = Vertex::new(10.0, 20.0).with_color(Color::rgb(255, 0, 0)).with_uv(0.5, 1.0);
/// assert_eq!(v.position, [10.0, 20.0, 0.0]);
/// assert_eq!(v.tex_coord, Some([0.5, 1.0]));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: Option<Color>,
    pub normal: Option<[f32; 3]>,
    pub tex_coord: Option<[f32; 2]>,
}

impl Vertex {
    pub fn new(x: f32, y: f32) -> Self {
        Self::new_3d(x, y, 0.0)
    }

    pub fn new_3d(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: [x, y, z],
            ..Default::default()
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    pub fn with_normal(mut self, normal: [f32; 3]) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn with_uv(mut self, u: f32, v: f32) -> Self {
        self.tex_coord = Some([u, v]);
        self
    }
}

impl From<[f32; 2]> for Vertex {
    fn from(p: [f32; 2]) -> Self {
        Vertex::new(p[0], p[1])
    }
}

impl From<[f32; 3]> for Vertex {
    fn from(p: [f32; 3]) -> Self {
        Vertex::new_3d(p[0], p[1], p[2])
    }
}

impl From<(f32, f32)> for Vertex {
    fn from((x, y): (f32, f32)) -> Self {
        Vertex::new(x, y)
    }
}

/// Per-vertex attributes shared by input records and tessellated vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexAttrs {
    pub color: Color,
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
    pub material: Material,
}

impl Default for VertexAttrs {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            normal: [0.0, 0.0, 1.0],
            tex_coord: [0.0, 0.0],
            material: Material::default(),
        }
    }
}

impl VertexAttrs {
    pub(crate) fn lerp(&self, other: &VertexAttrs, t: f32) -> VertexAttrs {
        let m0 = &self.material;
        let m1 = &other.material;
        VertexAttrs {
            color: self.color.lerp(other.color, t),
            normal: lerp3(self.normal, other.normal, t),
            tex_coord: [
                lerp(self.tex_coord[0], other.tex_coord[0], t),
                lerp(self.tex_coord[1], other.tex_coord[1], t),
            ],
            material: Material {
                ambient: m0.ambient.lerp(m1.ambient, t),
                specular: m0.specular.lerp(m1.specular, t),
                emissive: m0.emissive.lerp(m1.emissive, t),
                shininess: lerp(m0.shininess, m1.shininess, t),
            },
        }
    }
}

/// An authored vertex after style defaults were applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexRecord {
    pub position: [f32; 3],
    pub attrs: VertexAttrs,
}

/// How the vertex records of an [`InputGeometry`] connect. Each command consumes records in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathCommand {
    /// Starts a contour at the next record.
    MoveTo,
    LineTo,
    /// Consumes a control point and an end point.
    QuadTo,
    /// Consumes two control points and an end point.
    CubicTo,
    /// Catmull-Rom curve vertex. The first and last of a run only steer the curve.
    CurveTo,
    /// The next vertex starts a new contour. Consumes nothing.
    Break,
}

impl PathCommand {
    #[inline]
    pub fn vertex_count(self) -> usize {
        match self {
            PathCommand::MoveTo | PathCommand::LineTo | PathCommand::CurveTo => 1,
            PathCommand::QuadTo => 2,
            PathCommand::CubicTo => 3,
            PathCommand::Break => 0,
        }
    }
}

/// Compact vertex codes accepted by [`InputGeometry::from_codes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexCode {
    Vertex,
    QuadraticVertex,
    BezierVertex,
    CurveVertex,
    Break,
}

impl VertexCode {
    fn point_count(self) -> usize {
        match self {
            VertexCode::Vertex | VertexCode::CurveVertex => 1,
            VertexCode::QuadraticVertex => 2,
            VertexCode::BezierVertex => 3,
            VertexCode::Break => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CustomInput {
    pub(crate) id: u16,
    pub(crate) components: usize,
    pub(crate) current: SmallVec<[f32; 4]>,
    pub(crate) values: Vec<f32>,
}

/// Authored vertices and commands of one non-group shape.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputGeometry {
    pub(crate) vertices: Vec<VertexRecord>,
    pub(crate) commands: Vec<PathCommand>,
    pub(crate) custom: Vec<CustomInput>,
    has_current_point: bool,
    pending_break: bool,
}

impl InputGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a path from a flat point list and vertex codes.
    ///
    /// Every code must find the points it consumes, and curve segments need a current point.
    ///
    /// # Examples
    ///
    /// ```
    /// use tessera::{InputGeometry, VertexAttrs, VertexCode};
    ///
    /// let points = [[0.0, 0.0, 0.0], [5.0, 10.0, 0.0], [10.0, 0.0, 0.0]];
    /// let codes = [VertexCode::Vertex, VertexCode::QuadraticVertex];
    /// let input = InputGeometry::from_codes(&points, &codes, VertexAttrs::default()).unwrap();
    /// assert_eq!(input.len(), 3);
    ///
    /// let truncated = InputGeometry::from_codes(&points[..2], &codes, VertexAttrs::default());
    /// assert!(truncated.is_err());
    /// ```
    pub fn from_codes(
        points: &[[f32; 3]],
        codes: &[VertexCode],
        attrs: VertexAttrs,
    ) -> GeometryResult<Self> {
        let mut input = InputGeometry::new();
        let mut cursor = 0usize;
        let record = |p: [f32; 3]| VertexRecord { position: p, attrs };

        for (code_index, code) in codes.iter().copied().enumerate() {
            let required = code.point_count();
            let available = points.len() - cursor;
            if required > available {
                return Err(GeometryError::MalformedPath {
                    code_index,
                    required,
                    available,
                });
            }
            let p = &points[cursor..cursor + required];
            match code {
                VertexCode::Vertex => input.push_vertex(record(p[0])),
                VertexCode::CurveVertex => input.push_curve_vertex(record(p[0])),
                VertexCode::QuadraticVertex => {
                    input.push_quadratic(record(p[0]), record(p[1]))?
                }
                VertexCode::BezierVertex => {
                    input.push_cubic(record(p[0]), record(p[1]), record(p[2]))?
                }
                VertexCode::Break => input.push_break(),
            }
            cursor += required;
        }

        if cursor < points.len() {
            // Trailing points without codes are plain vertices.
            for p in &points[cursor..] {
                input.push_vertex(record(*p));
            }
        }

        Ok(input)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    #[inline]
    pub fn vertices(&self) -> &[VertexRecord] {
        &self.vertices
    }

    #[inline]
    pub fn commands(&self) -> &[PathCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.vertices.clear();
        self.commands.clear();
        for custom in &mut self.custom {
            custom.values.clear();
        }
        self.has_current_point = false;
        self.pending_break = false;
    }

    /// True when every command is a plain vertex, so records map one to one onto output.
    pub fn is_straight(&self) -> bool {
        self.commands
            .iter()
            .all(|c| matches!(c, PathCommand::MoveTo | PathCommand::LineTo | PathCommand::Break))
    }

    fn push_record(&mut self, record: VertexRecord) {
        self.vertices.push(record);
        for custom in &mut self.custom {
            custom.values.extend_from_slice(&custom.current);
        }
    }

    pub fn push_vertex(&mut self, record: VertexRecord) {
        let command = if !self.has_current_point || self.pending_break {
            PathCommand::MoveTo
        } else {
            PathCommand::LineTo
        };
        self.commands.push(command);
        self.push_record(record);
        self.has_current_point = true;
        self.pending_break = false;
    }

    pub fn push_quadratic(&mut self, ctrl: VertexRecord, to: VertexRecord) -> GeometryResult<()> {
        self.require_current_point("quadratic")?;
        self.commands.push(PathCommand::QuadTo);
        self.push_record(ctrl);
        self.push_record(to);
        Ok(())
    }

    pub fn push_cubic(
        &mut self,
        ctrl1: VertexRecord,
        ctrl2: VertexRecord,
        to: VertexRecord,
    ) -> GeometryResult<()> {
        self.require_current_point("cubic")?;
        self.commands.push(PathCommand::CubicTo);
        self.push_record(ctrl1);
        self.push_record(ctrl2);
        self.push_record(to);
        Ok(())
    }

    pub fn push_curve_vertex(&mut self, record: VertexRecord) {
        if self.pending_break {
            self.commands.push(PathCommand::Break);
        }
        self.commands.push(PathCommand::CurveTo);
        self.push_record(record);
        self.has_current_point = true;
        self.pending_break = false;
    }

    pub fn push_break(&mut self) {
        if self.has_current_point {
            self.pending_break = true;
        }
    }

    fn require_current_point(&self, command: &'static str) -> GeometryResult<()> {
        if !self.has_current_point || self.pending_break {
            return Err(GeometryError::MissingStartVertex { command });
        }
        Ok(())
    }

    /// Registers a custom attribute for this shape, backfilling earlier vertices with zeros.
    pub(crate) fn ensure_custom(&mut self, id: u16, components: usize) -> usize {
        if let Some(pos) = self.custom.iter().position(|c| c.id == id) {
            return pos;
        }
        let mut current = SmallVec::new();
        current.resize(components, 0.0);
        self.custom.push(CustomInput {
            id,
            components,
            current,
            values: vec![0.0; self.vertices.len() * components],
        });
        self.custom.len() - 1
    }

    /// Sets the attribute value used by vertices appended from now on.
    pub(crate) fn set_custom_current(&mut self, id: u16, values: &[f32]) {
        let pos = self.ensure_custom(id, values.len());
        self.custom[pos].current = SmallVec::from_slice(values);
    }

    pub(crate) fn set_custom_value(&mut self, id: u16, vertex: usize, values: &[f32]) {
        let pos = self.ensure_custom(id, values.len());
        let custom = &mut self.custom[pos];
        let start = vertex * custom.components;
        custom.values[start..start + custom.components].copy_from_slice(values);
    }

    fn custom_of(&self, vertex: usize) -> SmallVec<[f32; 8]> {
        let mut out = SmallVec::new();
        for custom in &self.custom {
            let start = vertex * custom.components;
            out.extend_from_slice(&custom.values[start..start + custom.components]);
        }
        out
    }

    pub(crate) fn tess_vertex(&self, index: usize) -> TessVertex {
        let record = &self.vertices[index];
        TessVertex {
            position: record.position,
            attrs: record.attrs,
            custom: self.custom_of(index),
            origin: Some(index),
        }
    }

    /// Flattens curves into contours of straight edges.
    pub fn flatten(&self, config: &TessConfig) -> Vec<Contour> {
        let mut contours: Vec<Contour> = Vec::new();
        let mut current: Option<Contour> = None;
        let mut curve_run: Vec<TessVertex> = Vec::new();
        let mut cursor = 0usize;

        for command in &self.commands {
            match command {
                PathCommand::Break => {
                    start_contour(&mut contours, &mut current);
                    curve_run.clear();
                }
                PathCommand::MoveTo => {
                    start_contour(&mut contours, &mut current);
                    curve_run.clear();
                    if let Some(contour) = current.as_mut() {
                        contour.vertices.push(self.tess_vertex(cursor));
                    }
                }
                PathCommand::LineTo => {
                    curve_run.clear();
                    let contour = current.get_or_insert_with(Contour::default);
                    contour.vertices.push(self.tess_vertex(cursor));
                }
                PathCommand::QuadTo => {
                    curve_run.clear();
                    let contour = current.get_or_insert_with(Contour::default);
                    if let Some(from) = contour.vertices.last().cloned() {
                        let ctrl = self.vertices[cursor].position;
                        let to = self.tess_vertex(cursor + 1);
                        let detail = config.bezier_detail;
                        for step in 1..=detail {
                            let t = step as f32 / detail as f32;
                            let p = quadratic_point(from.position, ctrl, to.position, t);
                            contour.vertices.push(blend(&from, &to, p, t, step == detail));
                        }
                    }
                }
                PathCommand::CubicTo => {
                    curve_run.clear();
                    let contour = current.get_or_insert_with(Contour::default);
                    if let Some(from) = contour.vertices.last().cloned() {
                        let c1 = self.vertices[cursor].position;
                        let c2 = self.vertices[cursor + 1].position;
                        let to = self.tess_vertex(cursor + 2);
                        let detail = config.bezier_detail;
                        for step in 1..=detail {
                            let t = step as f32 / detail as f32;
                            let p = cubic_point(from.position, c1, c2, to.position, t);
                            contour.vertices.push(blend(&from, &to, p, t, step == detail));
                        }
                    }
                }
                PathCommand::CurveTo => {
                    curve_run.push(self.tess_vertex(cursor));
                    let n = curve_run.len();
                    if n >= 4 {
                        let contour = current.get_or_insert_with(Contour::default);
                        let (p0, p1, p2, p3) = (
                            &curve_run[n - 4],
                            &curve_run[n - 3],
                            &curve_run[n - 2],
                            &curve_run[n - 1],
                        );
                        if n == 4 {
                            contour.vertices.push(p1.clone());
                        }
                        let detail = config.curve_detail;
                        for step in 1..=detail {
                            let t = step as f32 / detail as f32;
                            let p = catmull_rom_point(
                                [p0.position, p1.position, p2.position, p3.position],
                                config.curve_tightness,
                                t,
                            );
                            contour.vertices.push(blend(p1, p2, p, t, step == detail));
                        }
                    }
                }
            }
            cursor += command.vertex_count();
        }

        finish_contour(&mut contours, &mut current);
        contours
    }
}

fn finish_contour(contours: &mut Vec<Contour>, current: &mut Option<Contour>) {
    if let Some(done) = current.take() {
        if !done.vertices.is_empty() {
            contours.push(done);
        }
    }
}

fn start_contour(contours: &mut Vec<Contour>, current: &mut Option<Contour>) {
    finish_contour(contours, current);
    *current = Some(Contour::default());
}

/// A vertex on its way to an output stream, carrying every attribute it will be written with.
#[derive(Debug, Clone, PartialEq)]
pub struct TessVertex {
    pub position: [f32; 3],
    pub attrs: VertexAttrs,
    pub(crate) custom: SmallVec<[f32; 8]>,
    /// Input record this vertex is an exact copy of, if any.
    pub origin: Option<usize>,
}

impl TessVertex {
    pub fn at(position: [f32; 3], attrs: VertexAttrs) -> Self {
        Self {
            position,
            attrs,
            custom: SmallVec::new(),
            origin: None,
        }
    }

    pub(crate) fn lerp(&self, other: &TessVertex, t: f32) -> TessVertex {
        let custom = self
            .custom
            .iter()
            .zip(other.custom.iter())
            .map(|(a, b)| lerp(*a, *b, t))
            .collect();
        TessVertex {
            position: lerp3(self.position, other.position, t),
            attrs: self.attrs.lerp(&other.attrs, t),
            custom,
            origin: None,
        }
    }
}

fn blend(from: &TessVertex, to: &TessVertex, position: [f32; 3], t: f32, last: bool) -> TessVertex {
    if last {
        let mut v = to.clone();
        v.position = position;
        return v;
    }
    let mut v = from.lerp(to, t);
    v.position = position;
    v
}

/// One connected run of straight edges produced by [`InputGeometry::flatten`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contour {
    pub vertices: Vec<TessVertex>,
}

impl Contour {
    pub fn positions(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.vertices.iter().map(|v| v.position)
    }
}

#[inline]
pub(crate) fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub(crate) fn lerp3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [lerp(a[0], b[0], t), lerp(a[1], b[1], t), lerp(a[2], b[2], t)]
}

fn quadratic_point(p0: [f32; 3], c: [f32; 3], p1: [f32; 3], t: f32) -> [f32; 3] {
    let u = 1.0 - t;
    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = u * u * p0[i] + 2.0 * u * t * c[i] + t * t * p1[i];
    }
    out
}

fn cubic_point(p0: [f32; 3], c1: [f32; 3], c2: [f32; 3], p1: [f32; 3], t: f32) -> [f32; 3] {
    let u = 1.0 - t;
    let (b0, b1, b2, b3) = (u * u * u, 3.0 * u * u * t, 3.0 * u * t * t, t * t * t);
    let mut out = [0.0; 3];
    for i in 0..3 {
        out[i] = b0 * p0[i] + b1 * c1[i] + b2 * c2[i] + b3 * p1[i];
    }
    out
}

/// Cardinal spline point between `p[1]` and `p[2]`; tightness 0 gives Catmull-Rom.
fn catmull_rom_point(p: [[f32; 3]; 4], tightness: f32, t: f32) -> [f32; 3] {
    let s = tightness;
    let basis = [
        [(s - 1.0) / 2.0, (s + 3.0) / 2.0, (-3.0 - s) / 2.0, (1.0 - s) / 2.0],
        [1.0 - s, (-5.0 - s) / 2.0, s + 2.0, (s - 1.0) / 2.0],
        [(s - 1.0) / 2.0, 0.0, (1.0 - s) / 2.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
    ];
    let powers = [t * t * t, t * t, t, 1.0];
    let mut weights = [0.0f32; 4];
    for (row, power) in basis.iter().zip(powers.iter()) {
        for (w, b) in weights.iter_mut().zip(row.iter()) {
            *w += power * b;
        }
    }
    let mut out = [0.0; 3];
    for (k, w) in weights.iter().enumerate() {
        for i in 0..3 {
            out[i] += w * p[k][i];
        }
    }
    out
}
