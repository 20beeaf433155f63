use std::collections::BTreeMap;
use std::ops::Range;

use tessera::{
    BufferKey, BufferTarget, BufferUploader, DrawBackend, DrawCall, ShapeTree, Stream, TextureId,
};

/// Uploader that mirrors every transfer into byte vectors, standing in for GPU buffers.
#[derive(Debug, Default)]
pub struct RecordingUploader {
    pub buffers: BTreeMap<BufferKey, Vec<u8>>,
    pub allocations: usize,
    /// Byte ranges written by partial uploads since the last [`RecordingUploader::reset_log`].
    pub range_uploads: Vec<(BufferKey, Range<usize>)>,
}

impl RecordingUploader {
    pub fn reset_log(&mut self) {
        self.allocations = 0;
        self.range_uploads.clear();
    }

    /// Total bytes moved by partial uploads.
    pub fn uploaded_bytes(&self) -> usize {
        self.range_uploads.iter().map(|(_, r)| r.len()).sum()
    }

    /// Lists the buffers whose mirrored contents differ from the tree's geometry.
    pub fn mismatches(&self, tree: &ShapeTree) -> Vec<String> {
        let geometry = tree.geometry();
        let mut out = Vec::new();
        for stream in Stream::ALL {
            let mut expected: Vec<(BufferKey, &[u8])> = geometry
                .channels(stream)
                .into_iter()
                .filter_map(|channel| {
                    geometry.channel_bytes(stream, channel).map(|(bytes, _)| {
                        (
                            BufferKey {
                                stream,
                                target: BufferTarget::Attribute(channel),
                            },
                            bytes,
                        )
                    })
                })
                .collect();
            expected.push((
                BufferKey {
                    stream,
                    target: BufferTarget::Index,
                },
                bytemuck::cast_slice(geometry.indices(stream)),
            ));

            for (key, bytes) in expected {
                if bytes.is_empty() {
                    continue;
                }
                match self.buffers.get(&key) {
                    Some(mirror) if mirror.as_slice() == bytes => {}
                    Some(_) => out.push(format!("{key:?} differs from the geometry")),
                    None => out.push(format!("{key:?} was never uploaded")),
                }
            }
        }
        out
    }
}

impl BufferUploader for RecordingUploader {
    fn allocate(&mut self, key: BufferKey, bytes: &[u8]) {
        self.buffers.insert(key, bytes.to_vec());
        self.allocations += 1;
    }

    fn upload_range(&mut self, key: BufferKey, byte_offset: usize, bytes: &[u8]) {
        let range = byte_offset..byte_offset + bytes.len();
        if let Some(buffer) = self.buffers.get_mut(&key) {
            buffer[range.clone()].copy_from_slice(bytes);
        }
        self.range_uploads.push((key, range));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawEvent {
    Bind(Option<TextureId>),
    Draw(Stream, DrawCall),
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub events: Vec<DrawEvent>,
}

impl RecordingBackend {
    pub fn draws(&self) -> impl Iterator<Item = (Stream, DrawCall)> + '_ {
        self.events.iter().filter_map(|event| match event {
            DrawEvent::Draw(stream, call) => Some((*stream, *call)),
            DrawEvent::Bind(_) => None,
        })
    }
}

impl DrawBackend for RecordingBackend {
    fn bind_texture(&mut self, texture: Option<TextureId>) {
        self.events.push(DrawEvent::Bind(texture));
    }

    fn draw_indexed(&mut self, stream: Stream, call: DrawCall) {
        self.events.push(DrawEvent::Draw(stream, call));
    }
}
