use tessera::{NodeId, ShapeTree, Stream};

/// What to verify about one node after tessellation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Check {
    /// Exact number of vertices the node owns in a stream.
    Vertices(Stream, usize),
    /// The node owns at least this many vertices in a stream.
    MinVertices(Stream, usize),
    /// Number of indices across the node's blocks in a stream.
    Indices(Stream, usize),
    DrawCalls(Stream, usize),
    /// The node has no geometry in a stream.
    Empty(Stream),
    /// Fill color of the node's `n`-th fill vertex.
    FillColor { vertex: usize, rgba: [u8; 4] },
    /// World-space position of the node's `n`-th fill vertex.
    Position { vertex: usize, position: [f32; 3] },
}

/// A single expectation on the tessellated geometry of a scene node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryExpectation {
    pub node: NodeId,
    pub check: Check,
    /// Per-component tolerance for position checks (default 1e-3).
    pub tolerance: f32,
    /// Human-readable label for failure messages.
    pub label: &'static str,
}

impl GeometryExpectation {
    pub fn new(node: NodeId, check: Check, label: &'static str) -> Self {
        Self {
            node,
            check,
            tolerance: 1e-3,
            label,
        }
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }
}

/// Validates expectations against a tessellated tree.
///
/// Returns a list of human-readable failure descriptions. An empty list means all
/// expectations passed.
pub fn check_geometry(tree: &ShapeTree, expectations: &[GeometryExpectation]) -> Vec<String> {
    let mut failures = Vec::new();

    for expectation in expectations {
        let ranges = match tree.ranges(expectation.node) {
            Ok(ranges) => ranges,
            Err(err) => {
                failures.push(format!("[{}] {err}", expectation.label));
                continue;
            }
        };
        let geometry = tree.geometry();

        let failure = match expectation.check {
            Check::Vertices(stream, expected) => {
                let actual = ranges.vertices(stream).map_or(0, |span| span.count());
                (actual != expected).then(|| {
                    format!("{stream:?} vertices: expected {expected}, got {actual}")
                })
            }
            Check::MinVertices(stream, expected) => {
                let actual = ranges.vertices(stream).map_or(0, |span| span.count());
                (actual < expected).then(|| {
                    format!("{stream:?} vertices: expected at least {expected}, got {actual}")
                })
            }
            Check::Indices(stream, expected) => {
                let actual: usize = ranges.blocks(stream).map_or(0, |span| {
                    span.iter()
                        .filter_map(|block| geometry.cache(stream).get(block))
                        .map(|block| block.index_count)
                        .sum()
                });
                (actual != expected)
                    .then(|| format!("{stream:?} indices: expected {expected}, got {actual}"))
            }
            Check::DrawCalls(stream, expected) => {
                let actual = ranges.draw_calls(stream);
                (actual != expected)
                    .then(|| format!("{stream:?} draw calls: expected {expected}, got {actual}"))
            }
            Check::Empty(stream) => ranges
                .vertices(stream)
                .map(|span| format!("{stream:?} expected empty, got {} vertices", span.count())),
            Check::FillColor { vertex, rgba } => match ranges.vertices(Stream::Fill) {
                Some(span) if vertex < span.count() => {
                    let actual = geometry.fill.attributes.colors[span.first + vertex];
                    (actual != rgba).then(|| {
                        format!("fill vertex {vertex}: expected rgba{rgba:?}, got rgba{actual:?}")
                    })
                }
                _ => Some(format!("fill vertex {vertex} does not exist")),
            },
            Check::Position { vertex, position } => match ranges.vertices(Stream::Fill) {
                Some(span) if vertex < span.count() => {
                    let actual = geometry.fill.attributes.positions[span.first + vertex];
                    let close = actual
                        .iter()
                        .zip(position)
                        .all(|(a, e)| (a - e).abs() <= expectation.tolerance);
                    (!close).then(|| {
                        format!(
                            "fill vertex {vertex}: expected {position:?} ±{}, got {actual:?}",
                            expectation.tolerance
                        )
                    })
                }
                _ => Some(format!("fill vertex {vertex} does not exist")),
            },
        };

        if let Some(failure) = failure {
            failures.push(format!("[{}] {failure}", expectation.label));
        }
    }

    failures
}
