//! Aggregation of per-leaf index-cache blocks into tree-wide draw ranges.
//!
//! Leaves are rebased in tessellation order against one running vertex counter per stream,
//! starting a new draw block whenever the relative vertex count would reach the index limit.
//! Groups then merge the blocks of their children that ended up sharing a vertex offset, so a
//! whole subtree that fits below the limit draws with a single call.

use crate::config::TessConfig;
use crate::dirty::Stream;
use crate::index_cache::{BlockSpan, VertexSpan};
use crate::output::TessGeometry;
use crate::tessellator::LeafOutput;
use crate::transform::Transform;

/// Vertex and block ranges a node owns in one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamRange {
    pub vertices: Option<VertexSpan>,
    pub blocks: Option<BlockSpan>,
}

/// Ranges of a node in every stream of the shared output geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeRanges {
    streams: [StreamRange; 3],
}

impl NodeRanges {
    #[inline]
    pub fn stream(&self, stream: Stream) -> &StreamRange {
        &self.streams[stream as usize]
    }

    #[inline]
    pub(crate) fn stream_mut(&mut self, stream: Stream) -> &mut StreamRange {
        &mut self.streams[stream as usize]
    }

    #[inline]
    pub fn vertices(&self, stream: Stream) -> Option<VertexSpan> {
        self.stream(stream).vertices
    }

    #[inline]
    pub fn blocks(&self, stream: Stream) -> Option<BlockSpan> {
        self.stream(stream).blocks
    }

    /// Draw calls needed to render the node's geometry in `stream`.
    pub fn draw_calls(&self, stream: Stream) -> usize {
        self.blocks(stream).map_or(0, |span| span.count())
    }

    pub fn is_empty(&self) -> bool {
        Stream::ALL
            .iter()
            .all(|&stream| self.vertices(stream).is_none())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct RunningState {
    index_offset: usize,
    /// Vertex offset of the block currently being extended.
    vertex_offset: usize,
    /// Vertices rebased so far.
    vertex_abs: usize,
    /// Vertices addressed relative to `vertex_offset`.
    vertex_rel: usize,
}

/// One aggregation pass over freshly tessellated geometry.
pub(crate) struct Aggregator<'a> {
    geometry: &'a mut TessGeometry,
    limit: usize,
    split_textured: bool,
    state: [RunningState; 3],
}

impl<'a> Aggregator<'a> {
    pub(crate) fn new(geometry: &'a mut TessGeometry, config: &TessConfig) -> Self {
        Self {
            geometry,
            limit: config.index_limit,
            split_textured: config.is_2d(),
            state: [RunningState::default(); 3],
        }
    }

    /// Rebases a leaf's blocks onto the running counters and returns its ranges.
    ///
    /// Leaves must be passed in the order they were tessellated.
    pub(crate) fn rebase_leaf(&mut self, leaf: &LeafOutput, textured: bool) -> NodeRanges {
        let mut ranges = NodeRanges::default();
        for stream in Stream::ALL {
            let slot = stream as usize;
            let Some(span) = leaf.blocks[slot].span() else {
                continue;
            };
            for block in span.iter() {
                let forced = self.split_textured
                    && textured
                    && stream == Stream::Fill
                    && (leaf.first_stroke_block == Some(block)
                        || leaf.first_point_block == Some(block));
                self.rebase_block(stream, block, forced);
            }
            *ranges.stream_mut(stream) = StreamRange {
                vertices: leaf.span(stream),
                blocks: Some(span),
            };
        }
        ranges
    }

    fn rebase_block(&mut self, stream: Stream, block: usize, forced: bool) {
        let state = &mut self.state[stream as usize];
        let (vertex_count, index_count, index_offset) = {
            let b = &self.geometry.cache(stream).blocks()[block];
            (b.vertex_count, b.index_count, b.index_offset)
        };

        if forced || state.vertex_rel + vertex_count >= self.limit {
            if state.vertex_rel > 0 {
                tracing::trace!(
                    ?stream,
                    block,
                    forced,
                    vertex_offset = state.vertex_abs,
                    "starting a new draw block"
                );
            }
            state.vertex_rel = 0;
            state.vertex_offset = state.vertex_abs;
        }

        let shift = state.vertex_rel;
        if shift > 0 {
            let indices = self.geometry.indices_mut(stream);
            for index in &mut indices[index_offset..index_offset + index_count] {
                *index += shift as u16;
            }
        }

        let b = self.geometry.cache_mut(stream).block_mut(block);
        b.vertex_offset = state.vertex_offset;
        b.index_offset = state.index_offset;

        state.index_offset += index_count;
        state.vertex_abs += vertex_count;
        state.vertex_rel += vertex_count;
    }

    /// Builds a group's ranges from its children's, merging blocks that share a vertex offset.
    pub(crate) fn merge_group(&mut self, children: &[NodeRanges]) -> NodeRanges {
        let mut ranges = NodeRanges::default();
        for stream in Stream::ALL {
            let cache = self.geometry.cache_mut(stream);
            let mut first: Option<usize> = None;
            let mut last: Option<usize> = None;
            let mut vertices: Option<VertexSpan> = None;

            for child in children {
                let range = child.stream(stream);
                if let Some(span) = range.vertices {
                    vertices = Some(vertices.map_or(span, |v| v.union(span)));
                }
                let Some(blocks) = range.blocks else {
                    continue;
                };
                for block in blocks.iter() {
                    let source = cache.blocks()[block];
                    match last {
                        Some(current)
                            if cache.blocks()[current].vertex_offset == source.vertex_offset =>
                        {
                            cache.inc_counts(current, source.index_count, source.vertex_count);
                        }
                        _ => {
                            let copy = cache.add_copy(block);
                            first.get_or_insert(copy);
                            last = Some(copy);
                        }
                    }
                }
            }

            if let (Some(first), Some(last)) = (first, last) {
                *ranges.stream_mut(stream) = StreamRange {
                    vertices,
                    blocks: Some(BlockSpan { first, last }),
                };
            }
        }
        ranges
    }

    /// Applies `transform` to every vertex the node owns.
    pub(crate) fn bake(&mut self, ranges: &NodeRanges, transform: &Transform) {
        if transform.is_identity() {
            return;
        }
        for stream in Stream::ALL {
            if let Some(span) = ranges.vertices(stream) {
                self.geometry
                    .apply_affine(stream, span.first, span.last, transform);
            }
        }
    }
}
