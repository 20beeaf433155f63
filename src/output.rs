//! Output geometry: flat per-stream attribute arrays, 16-bit indices and the index cache.

use crate::dirty::{Channel, Stream};
use crate::index_cache::{BlockSpan, IndexCache};
use crate::input::AttributeDecl;
use crate::transform::Transform;

/// Values of one custom attribute for every fill vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomChannel {
    pub id: u16,
    pub name: String,
    pub decl: AttributeDecl,
    pub values: Vec<f32>,
}

impl CustomChannel {
    #[inline]
    pub fn components(&self) -> usize {
        self.decl.components as usize
    }
}

/// Attribute arrays of a stream, stored as one array per channel.
pub trait StreamAttributes {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Channels this stream uploads, in upload order.
    fn channels(&self) -> Vec<Channel>;

    /// Raw bytes of a channel and the size of one vertex's element in bytes.
    fn channel_bytes(&self, channel: Channel) -> Option<(&[u8], usize)>;

    /// Applies `transform` to vertices `first..=last` and returns the channels it touched.
    fn apply_affine(&mut self, first: usize, last: usize, transform: &Transform) -> Vec<Channel>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FillAttributes {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[u8; 4]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub ambient: Vec<[u8; 4]>,
    pub specular: Vec<[u8; 4]>,
    pub emissive: Vec<[u8; 4]>,
    pub shininess: Vec<f32>,
    pub custom: Vec<CustomChannel>,
}

impl FillAttributes {
    pub fn custom_channel(&self, id: u16) -> Option<&CustomChannel> {
        self.custom.iter().find(|c| c.id == id)
    }

    pub(crate) fn custom_channel_mut(&mut self, id: u16) -> Option<&mut CustomChannel> {
        self.custom.iter_mut().find(|c| c.id == id)
    }
}

impl StreamAttributes for FillAttributes {
    #[inline]
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.normals.clear();
        self.tex_coords.clear();
        self.ambient.clear();
        self.specular.clear();
        self.emissive.clear();
        self.shininess.clear();
        for custom in &mut self.custom {
            custom.values.clear();
        }
    }

    fn channels(&self) -> Vec<Channel> {
        let mut channels = vec![
            Channel::Position,
            Channel::Color,
            Channel::Normal,
            Channel::TexCoord,
            Channel::Ambient,
            Channel::Specular,
            Channel::Emissive,
            Channel::Shininess,
        ];
        channels.extend(self.custom.iter().map(|c| Channel::Custom(c.id)));
        channels
    }

    fn channel_bytes(&self, channel: Channel) -> Option<(&[u8], usize)> {
        match channel {
            Channel::Position => Some((bytemuck::cast_slice(&self.positions), 12)),
            Channel::Color => Some((bytemuck::cast_slice(&self.colors), 4)),
            Channel::Normal => Some((bytemuck::cast_slice(&self.normals), 12)),
            Channel::TexCoord => Some((bytemuck::cast_slice(&self.tex_coords), 8)),
            Channel::Ambient => Some((bytemuck::cast_slice(&self.ambient), 4)),
            Channel::Specular => Some((bytemuck::cast_slice(&self.specular), 4)),
            Channel::Emissive => Some((bytemuck::cast_slice(&self.emissive), 4)),
            Channel::Shininess => Some((bytemuck::cast_slice(&self.shininess), 4)),
            Channel::Custom(id) => self
                .custom_channel(id)
                .map(|c| (bytemuck::cast_slice(&c.values), c.components() * 4)),
            Channel::Direction | Channel::Offset => None,
        }
    }

    fn apply_affine(&mut self, first: usize, last: usize, transform: &Transform) -> Vec<Channel> {
        for p in &mut self.positions[first..=last] {
            *p = transform.apply_point(*p);
        }
        for n in &mut self.normals[first..=last] {
            *n = transform.apply_normal(*n);
        }
        vec![Channel::Position, Channel::Normal]
    }
}

/// 3D stroke quads. `directions` holds the opposite endpoint in xyz and a signed half-width in w.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineAttributes {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[u8; 4]>,
    pub directions: Vec<[f32; 4]>,
}

impl StreamAttributes for LineAttributes {
    #[inline]
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.directions.clear();
    }

    fn channels(&self) -> Vec<Channel> {
        vec![Channel::Position, Channel::Color, Channel::Direction]
    }

    fn channel_bytes(&self, channel: Channel) -> Option<(&[u8], usize)> {
        match channel {
            Channel::Position => Some((bytemuck::cast_slice(&self.positions), 12)),
            Channel::Color => Some((bytemuck::cast_slice(&self.colors), 4)),
            Channel::Direction => Some((bytemuck::cast_slice(&self.directions), 16)),
            _ => None,
        }
    }

    fn apply_affine(&mut self, first: usize, last: usize, transform: &Transform) -> Vec<Channel> {
        for p in &mut self.positions[first..=last] {
            *p = transform.apply_point(*p);
        }
        for d in &mut self.directions[first..=last] {
            let other = transform.apply_point([d[0], d[1], d[2]]);
            *d = [other[0], other[1], other[2], d[3]];
        }
        vec![Channel::Position, Channel::Direction]
    }
}

/// 3D point sprites. Every vertex of a sprite shares the centre position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointAttributes {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[u8; 4]>,
    pub offsets: Vec<[f32; 2]>,
}

impl StreamAttributes for PointAttributes {
    #[inline]
    fn len(&self) -> usize {
        self.positions.len()
    }

    fn clear(&mut self) {
        self.positions.clear();
        self.colors.clear();
        self.offsets.clear();
    }

    fn channels(&self) -> Vec<Channel> {
        vec![Channel::Position, Channel::Color, Channel::Offset]
    }

    fn channel_bytes(&self, channel: Channel) -> Option<(&[u8], usize)> {
        match channel {
            Channel::Position => Some((bytemuck::cast_slice(&self.positions), 12)),
            Channel::Color => Some((bytemuck::cast_slice(&self.colors), 4)),
            Channel::Offset => Some((bytemuck::cast_slice(&self.offsets), 8)),
            _ => None,
        }
    }

    fn apply_affine(&mut self, first: usize, last: usize, transform: &Transform) -> Vec<Channel> {
        for p in &mut self.positions[first..=last] {
            *p = transform.apply_point(*p);
        }
        vec![Channel::Position]
    }
}

/// Blocks a single leaf has opened in one stream during tessellation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LeafBlocks {
    pub(crate) first: Option<usize>,
    pub(crate) last: Option<usize>,
    current: Option<usize>,
}

impl LeafBlocks {
    /// The next append opens a new block even if the current one has room.
    pub(crate) fn force_new_block(&mut self) {
        self.current = None;
    }

    pub(crate) fn span(&self) -> Option<BlockSpan> {
        match (self.first, self.last) {
            (Some(first), Some(last)) => Some(BlockSpan { first, last }),
            _ => None,
        }
    }
}

/// One output stream: attributes, indices and the blocks addressing them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessStream<A> {
    pub attributes: A,
    pub indices: Vec<u16>,
    pub cache: IndexCache,
}

impl<A: StreamAttributes> TessStream<A> {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.attributes.len()
    }

    #[inline]
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
        self.indices.clear();
        self.cache.clear();
    }

    fn open_block(&mut self, leaf: &mut LeafBlocks) -> usize {
        let block = self.cache.add_new();
        if leaf.first.is_none() {
            leaf.first = Some(block);
        }
        leaf.last = Some(block);
        leaf.current = Some(block);
        tracing::trace!(block, "opened index block");
        block
    }

    /// Appends a mesh of `vertex_count` vertices whose `triangles` index into it.
    ///
    /// `write` pushes local vertex `i` onto the attribute arrays. The mesh goes into the leaf's
    /// current block when it fits below `limit`, into a fresh block otherwise, and is split
    /// triangle by triangle when it cannot fit in any single block. Split meshes duplicate
    /// vertices shared across the block boundary, so `write` may see the same `i` twice.
    pub(crate) fn append_mesh(
        &mut self,
        leaf: &mut LeafBlocks,
        limit: usize,
        vertex_count: usize,
        triangles: &[u32],
        mut write: impl FnMut(&mut A, usize),
    ) {
        if vertex_count == 0 || triangles.is_empty() {
            return;
        }

        let mut block = match leaf.current {
            Some(block) => block,
            None => self.open_block(leaf),
        };

        let used = self.cache.blocks()[block].vertex_count;
        if used + vertex_count >= limit && used > 0 && vertex_count < limit {
            block = self.open_block(leaf);
        }

        let used = self.cache.blocks()[block].vertex_count;
        if used + vertex_count < limit {
            for i in 0..vertex_count {
                write(&mut self.attributes, i);
            }
            self.indices
                .extend(triangles.iter().map(|&t| (used + t as usize) as u16));
            self.cache.inc_counts(block, triangles.len(), vertex_count);
            return;
        }

        self.partition(leaf, block, limit, vertex_count, triangles, &mut write);
    }

    fn partition(
        &mut self,
        leaf: &mut LeafBlocks,
        mut block: usize,
        limit: usize,
        vertex_count: usize,
        triangles: &[u32],
        write: &mut impl FnMut(&mut A, usize),
    ) {
        const UNMAPPED: u32 = u32::MAX;
        let mut local_to_block = vec![UNMAPPED; vertex_count];
        let mut touched: Vec<usize> = Vec::new();

        for tri in triangles.chunks_exact(3) {
            let used = self.cache.blocks()[block].vertex_count;
            let missing = tri
                .iter()
                .filter(|&&i| local_to_block[i as usize] == UNMAPPED)
                .count();
            if used + missing >= limit {
                for &i in &touched {
                    local_to_block[i] = UNMAPPED;
                }
                touched.clear();
                block = self.open_block(leaf);
            }

            let mut added = 0;
            for &i in tri {
                let i = i as usize;
                if local_to_block[i] == UNMAPPED {
                    let used = self.cache.blocks()[block].vertex_count + added;
                    local_to_block[i] = used as u32;
                    touched.push(i);
                    write(&mut self.attributes, i);
                    added += 1;
                }
                self.indices.push(local_to_block[i] as u16);
            }
            self.cache.inc_counts(block, 3, added);
        }
    }
}

/// Tessellated geometry of a whole shape tree, owned by its root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TessGeometry {
    pub fill: TessStream<FillAttributes>,
    pub line: TessStream<LineAttributes>,
    pub point: TessStream<PointAttributes>,
}

impl TessGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.fill.clear();
        self.line.clear();
        self.point.clear();
    }

    /// Empty geometry with the same custom channel declarations.
    pub(crate) fn empty_like(&self) -> Self {
        let mut geometry = Self::new();
        geometry.fill.attributes.custom = self
            .fill
            .attributes
            .custom
            .iter()
            .map(|channel| CustomChannel {
                values: Vec::new(),
                ..channel.clone()
            })
            .collect();
        geometry
    }

    pub fn cache(&self, stream: Stream) -> &IndexCache {
        match stream {
            Stream::Fill => &self.fill.cache,
            Stream::Line => &self.line.cache,
            Stream::Point => &self.point.cache,
        }
    }

    pub fn indices(&self, stream: Stream) -> &[u16] {
        match stream {
            Stream::Fill => &self.fill.indices,
            Stream::Line => &self.line.indices,
            Stream::Point => &self.point.indices,
        }
    }

    pub fn vertex_count(&self, stream: Stream) -> usize {
        match stream {
            Stream::Fill => self.fill.vertex_count(),
            Stream::Line => self.line.vertex_count(),
            Stream::Point => self.point.vertex_count(),
        }
    }

    pub fn channels(&self, stream: Stream) -> Vec<Channel> {
        match stream {
            Stream::Fill => self.fill.attributes.channels(),
            Stream::Line => self.line.attributes.channels(),
            Stream::Point => self.point.attributes.channels(),
        }
    }

    pub fn channel_bytes(&self, stream: Stream, channel: Channel) -> Option<(&[u8], usize)> {
        match stream {
            Stream::Fill => self.fill.attributes.channel_bytes(channel),
            Stream::Line => self.line.attributes.channel_bytes(channel),
            Stream::Point => self.point.attributes.channel_bytes(channel),
        }
    }

    /// Whether a channel holds exactly one element per vertex of the stream.
    pub(crate) fn channel_in_step(&self, stream: Stream, channel: Channel) -> bool {
        self.channel_bytes(stream, channel)
            .is_some_and(|(bytes, stride)| bytes.len() == stride * self.vertex_count(stream))
    }

    pub(crate) fn apply_affine(
        &mut self,
        stream: Stream,
        first: usize,
        last: usize,
        transform: &Transform,
    ) -> Vec<Channel> {
        match stream {
            Stream::Fill => self.fill.attributes.apply_affine(first, last, transform),
            Stream::Line => self.line.attributes.apply_affine(first, last, transform),
            Stream::Point => self.point.attributes.apply_affine(first, last, transform),
        }
    }

    pub(crate) fn colors_mut(&mut self, stream: Stream) -> &mut [[u8; 4]] {
        match stream {
            Stream::Fill => &mut self.fill.attributes.colors,
            Stream::Line => &mut self.line.attributes.colors,
            Stream::Point => &mut self.point.attributes.colors,
        }
    }

    pub(crate) fn indices_mut(&mut self, stream: Stream) -> &mut [u16] {
        match stream {
            Stream::Fill => &mut self.fill.indices,
            Stream::Line => &mut self.line.indices,
            Stream::Point => &mut self.point.indices,
        }
    }

    pub(crate) fn cache_mut(&mut self, stream: Stream) -> &mut IndexCache {
        match stream {
            Stream::Fill => &mut self.fill.cache,
            Stream::Line => &mut self.line.cache,
            Stream::Point => &mut self.point.cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_writer() -> impl FnMut(&mut PointAttributes, usize) {
        |attrs: &mut PointAttributes, i: usize| {
            attrs.positions.push([i as f32, 0.0, 0.0]);
            attrs.colors.push([0, 0, 0, 255]);
            attrs.offsets.push([0.0, 0.0]);
        }
    }

    #[test]
    fn meshes_share_a_block_while_they_fit() {
        let mut stream = TessStream::<PointAttributes>::default();
        let mut leaf = LeafBlocks::default();
        let mut write = point_writer();
        stream.append_mesh(&mut leaf, 16, 4, &[0, 1, 2, 0, 2, 3], &mut write);
        stream.append_mesh(&mut leaf, 16, 4, &[0, 1, 2, 0, 2, 3], &mut write);

        assert_eq!(stream.cache.len(), 1);
        assert_eq!(stream.indices[6..], [4, 5, 6, 4, 6, 7]);
        assert_eq!(leaf.span(), Some(BlockSpan::single(0)));
    }

    #[test]
    fn a_mesh_that_would_reach_the_limit_opens_a_new_block() {
        let mut stream = TessStream::<PointAttributes>::default();
        let mut leaf = LeafBlocks::default();
        let mut write = point_writer();
        for _ in 0..3 {
            stream.append_mesh(&mut leaf, 10, 4, &[0, 1, 2, 0, 2, 3], &mut write);
        }
        assert_eq!(stream.cache.len(), 2);
        let second = stream.cache.blocks()[1];
        assert_eq!(second.vertex_offset, 8);
        assert_eq!(second.vertex_count, 4);
        assert!(stream.indices.iter().all(|&i| (i as usize) < 10));
    }

    #[test]
    fn oversized_meshes_are_partitioned_with_duplicated_vertices() {
        let mut stream = TessStream::<PointAttributes>::default();
        let mut leaf = LeafBlocks::default();
        let mut write = point_writer();
        // Fan of 12 vertices, 10 triangles, into blocks of at most 5 vertices.
        let tris: Vec<u32> = (1..11).flat_map(|i| [0, i, i + 1]).collect();
        stream.append_mesh(&mut leaf, 6, 12, &tris, &mut write);

        assert!(stream.cache.len() > 1);
        let total: usize = stream.cache.blocks().iter().map(|b| b.vertex_count).sum();
        assert_eq!(total, stream.vertex_count());
        assert!(stream.vertex_count() > 12);
        for block in stream.cache.blocks() {
            assert!(block.vertex_count < 6);
            let slice = &stream.indices[block.index_offset..block.index_offset + block.index_count];
            assert!(slice.iter().all(|&i| (i as usize) < block.vertex_count));
        }
        assert_eq!(stream.index_count(), tris.len());
    }

    #[test]
    fn forced_split_starts_a_fresh_block() {
        let mut stream = TessStream::<PointAttributes>::default();
        let mut leaf = LeafBlocks::default();
        let mut write = point_writer();
        stream.append_mesh(&mut leaf, 100, 3, &[0, 1, 2], &mut write);
        leaf.force_new_block();
        stream.append_mesh(&mut leaf, 100, 3, &[0, 1, 2], &mut write);
        assert_eq!(leaf.span(), Some(BlockSpan { first: 0, last: 1 }));
        assert_eq!(stream.indices, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn affine_transform_touches_only_the_given_range() {
        let mut attrs = FillAttributes::default();
        for i in 0..4 {
            attrs.positions.push([i as f32, 0.0, 0.0]);
            attrs.normals.push([0.0, 0.0, 1.0]);
        }
        let channels = attrs.apply_affine(1, 2, &Transform::translation(0.0, 5.0, 0.0));
        assert_eq!(channels, vec![Channel::Position, Channel::Normal]);
        assert_eq!(attrs.positions[0], [0.0, 0.0, 0.0]);
        assert_eq!(attrs.positions[1], [1.0, 5.0, 0.0]);
        assert_eq!(attrs.positions[3], [3.0, 0.0, 0.0]);
    }
}
