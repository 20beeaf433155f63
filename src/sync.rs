//! Collaborator interfaces between a [`ShapeTree`] and a graphics API: texture lookup, buffer
//! upload and indexed draw submission.

use ahash::HashMap;

use crate::dirty::{Channel, Stream};
use crate::error::GeometryResult;
use crate::id::{NodeId, TextureId};
use crate::shape::ShapeTree;

/// Size of a texture and the part of it holding image data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    /// Largest horizontal texture coordinate covered by the image, below `1.0` for padded
    /// textures.
    pub max_u: f32,
    pub max_v: f32,
}

impl TextureInfo {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            max_u: 1.0,
            max_v: 1.0,
        }
    }
}

/// Resolves the textures referenced by shape styles.
pub trait TextureProvider {
    fn texture_info(&self, texture: TextureId) -> Option<TextureInfo>;
}

/// Provider for trees that never use textures.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextures;

impl TextureProvider for NoTextures {
    fn texture_info(&self, _texture: TextureId) -> Option<TextureInfo> {
        None
    }
}

impl TextureProvider for HashMap<TextureId, TextureInfo> {
    fn texture_info(&self, texture: TextureId) -> Option<TextureInfo> {
        self.get(&texture).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferTarget {
    Attribute(Channel),
    Index,
}

/// Identifies one GPU buffer: an attribute channel or the index buffer of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferKey {
    pub stream: Stream,
    pub target: BufferTarget,
}

/// Receives buffer contents during [`ShapeTree::sync`].
pub trait BufferUploader {
    /// Replaces the whole buffer, growing it if needed.
    fn allocate(&mut self, key: BufferKey, bytes: &[u8]);

    /// Overwrites `bytes.len()` bytes of an existing buffer starting at `byte_offset`.
    fn upload_range(&mut self, key: BufferKey, byte_offset: usize, bytes: &[u8]);
}

/// One indexed draw over an index-cache block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    /// Added to every index of the call.
    pub vertex_offset: usize,
    pub index_offset: usize,
    pub index_count: usize,
}

pub trait DrawBackend {
    fn bind_texture(&mut self, texture: Option<TextureId>);
    fn draw_indexed(&mut self, stream: Stream, call: DrawCall);
}

/// What a call to [`ShapeTree::sync`] transferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub allocations: usize,
    pub range_uploads: usize,
    pub bytes: usize,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.allocations == 0 && self.range_uploads == 0
    }
}

struct DrawState<'b, B> {
    backend: &'b mut B,
    bound: Option<Option<TextureId>>,
    calls: usize,
}

impl<B: DrawBackend> DrawState<'_, B> {
    fn bind(&mut self, texture: Option<TextureId>) {
        if self.bound != Some(texture) {
            self.backend.bind_texture(texture);
            self.bound = Some(texture);
        }
    }

    fn draw(&mut self, tree: &ShapeTree, stream: Stream, block: usize) {
        let Some(block) = tree.geometry.cache(stream).get(block) else {
            return;
        };
        if block.index_count == 0 {
            return;
        }
        self.backend.draw_indexed(
            stream,
            DrawCall {
                vertex_offset: block.vertex_offset,
                index_offset: block.index_offset,
                index_count: block.index_count,
            },
        );
        self.calls += 1;
    }
}

impl ShapeTree {
    /// Transfers pending geometry to the uploader and clears the dirty state.
    ///
    /// After a tessellation every non-empty buffer is allocated in full. Otherwise only the
    /// modified byte ranges of each channel are uploaded.
    pub fn sync(&mut self, uploader: &mut impl BufferUploader) -> SyncReport {
        let mut report = SyncReport::default();

        if self.tracker.needs_full_upload() {
            for stream in Stream::ALL {
                for channel in self.geometry.channels(stream) {
                    let Some((bytes, _)) = self.geometry.channel_bytes(stream, channel) else {
                        continue;
                    };
                    if bytes.is_empty() {
                        continue;
                    }
                    let key = BufferKey {
                        stream,
                        target: BufferTarget::Attribute(channel),
                    };
                    uploader.allocate(key, bytes);
                    report.allocations += 1;
                    report.bytes += bytes.len();
                }

                let indices: &[u8] = bytemuck::cast_slice(self.geometry.indices(stream));
                if !indices.is_empty() {
                    let key = BufferKey {
                        stream,
                        target: BufferTarget::Index,
                    };
                    uploader.allocate(key, indices);
                    report.allocations += 1;
                    report.bytes += indices.len();
                }
            }
            self.tracker.clear();
            tracing::debug!(?report, "uploaded full geometry");
            return report;
        }

        for (stream, channel) in self.tracker.pending() {
            let Some(range) = self.tracker.consume_and_clear(stream, channel) else {
                continue;
            };
            let Some((bytes, stride)) = self.geometry.channel_bytes(stream, channel) else {
                continue;
            };
            let start = range.start() * stride;
            let end = ((range.end() + 1) * stride).min(bytes.len());
            if start >= end {
                continue;
            }
            let key = BufferKey {
                stream,
                target: BufferTarget::Attribute(channel),
            };
            uploader.upload_range(key, start, &bytes[start..end]);
            report.range_uploads += 1;
            report.bytes += end - start;
        }
        if !report.is_empty() {
            tracing::trace!(?report, "uploaded dirty ranges");
        }
        report
    }

    /// Issues the draw calls of a node's subtree and returns how many were made.
    ///
    /// Untextured subtrees draw one call per block of the node. Subtrees containing textured
    /// shapes draw child by child so each leaf can bind its own texture.
    pub fn draw(&self, id: NodeId, backend: &mut impl DrawBackend) -> GeometryResult<usize> {
        self.node(id)?;
        let mut state = DrawState {
            backend,
            bound: None,
            calls: 0,
        };
        self.draw_node(id, &mut state)?;
        Ok(state.calls)
    }

    fn draw_node<B: DrawBackend>(
        &self,
        id: NodeId,
        state: &mut DrawState<'_, B>,
    ) -> GeometryResult<()> {
        let node = self.node(id)?;

        if node.is_group() && node.textured {
            for child in self.children(id)? {
                self.draw_node(child, state)?;
            }
            return Ok(());
        }

        let texture = node.texture.and(node.style.texture);
        // A textured leaf's own blocks are split where its untextured stroke and points begin.
        let untextured_from = node
            .leaf
            .as_ref()
            .filter(|_| !node.is_group() && self.config().is_2d())
            .and_then(|leaf| match (leaf.first_stroke_block, leaf.first_point_block) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            });

        for stream in Stream::ALL {
            let Some(blocks) = node.ranges.blocks(stream) else {
                continue;
            };
            for block in blocks.iter() {
                let textured = stream == Stream::Fill
                    && texture.is_some()
                    && untextured_from.map_or(true, |split| block < split);
                state.bind(if textured { texture } else { None });
                state.draw(self, stream, block);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Color;
    use crate::config::TessConfig;
    use crate::stroke::Stroke;
    use crate::style::Style;

    #[derive(Default)]
    struct Recorder {
        allocations: Vec<(BufferKey, usize)>,
        ranges: Vec<(BufferKey, usize, usize)>,
        binds: Vec<Option<TextureId>>,
        draws: Vec<(Stream, DrawCall)>,
    }

    impl BufferUploader for Recorder {
        fn allocate(&mut self, key: BufferKey, bytes: &[u8]) {
            self.allocations.push((key, bytes.len()));
        }

        fn upload_range(&mut self, key: BufferKey, byte_offset: usize, bytes: &[u8]) {
            self.ranges.push((key, byte_offset, bytes.len()));
        }
    }

    impl DrawBackend for Recorder {
        fn bind_texture(&mut self, texture: Option<TextureId>) {
            self.binds.push(texture);
        }

        fn draw_indexed(&mut self, stream: Stream, call: DrawCall) {
            self.draws.push((stream, call));
        }
    }

    fn square(tree: &mut ShapeTree, x: f32, style: Style) -> NodeId {
        let id = tree.create_path(tree.root(), style).unwrap();
        for p in [(x, 0.0), (x + 10.0, 0.0), (x + 10.0, 10.0), (x, 10.0)] {
            tree.vertex(id, p).unwrap();
        }
        tree.end_shape(id, true).unwrap();
        id
    }

    #[test]
    fn first_sync_allocates_and_later_syncs_upload_ranges() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        square(&mut tree, 0.0, Style::fill_only(Color::WHITE));
        let b = square(&mut tree, 20.0, Style::fill_only(Color::WHITE));
        tree.update_tessellation(&NoTextures).unwrap();

        let mut recorder = Recorder::default();
        let report = tree.sync(&mut recorder);
        // Eight fill channels and the fill index buffer.
        assert_eq!(report.allocations, 9);
        assert!(recorder.allocations.contains(&(
            BufferKey {
                stream: Stream::Fill,
                target: BufferTarget::Index
            },
            12 * 2
        )));
        assert!(tree.sync(&mut recorder).is_empty());

        tree.set_fill_color(b, Color::BLACK).unwrap();
        let report = tree.sync(&mut recorder);
        assert_eq!(report.range_uploads, 1);
        assert_eq!(
            recorder.ranges,
            vec![(
                BufferKey {
                    stream: Stream::Fill,
                    target: BufferTarget::Attribute(Channel::Color)
                },
                16,
                16
            )]
        );
        assert!(tree.tracker().pending().is_empty());
    }

    #[test]
    fn untextured_trees_draw_once_per_block() {
        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        square(&mut tree, 0.0, Style::fill_only(Color::WHITE));
        square(&mut tree, 20.0, Style::fill_only(Color::WHITE));
        tree.update_tessellation(&NoTextures).unwrap();

        let mut recorder = Recorder::default();
        assert_eq!(tree.draw(tree.root(), &mut recorder), Ok(1));
        assert_eq!(
            recorder.draws,
            vec![(
                Stream::Fill,
                DrawCall {
                    vertex_offset: 0,
                    index_offset: 0,
                    index_count: 12
                }
            )]
        );
        assert_eq!(recorder.binds, vec![None]);
    }

    #[test]
    fn textured_leaves_unbind_before_their_stroke() {
        let texture = TextureId(7);
        let mut textures = HashMap::default();
        textures.insert(texture, TextureInfo::new(64, 64));

        let mut tree = ShapeTree::new(TessConfig::default()).unwrap();
        let style = Style {
            texture: Some(texture),
            stroke: Stroke::new(2.0, Color::BLACK),
            ..Style::default()
        };
        square(&mut tree, 0.0, style);
        square(&mut tree, 20.0, Style::fill_only(Color::WHITE));
        tree.update_tessellation(&textures).unwrap();

        let mut recorder = Recorder::default();
        let calls = tree.draw(tree.root(), &mut recorder).unwrap();
        assert_eq!(calls, 3);
        assert_eq!(recorder.binds, vec![Some(texture), None]);
        assert_eq!(recorder.draws[0].1.index_count, 6);
    }
}
