//! A [`BufferUploader`] writing shape tree geometry into wgpu buffers.

use std::borrow::Cow;

use ahash::HashMap;
use wgpu::util::DeviceExt;
use wgpu::BufferUsages;

use crate::sync::{BufferKey, BufferTarget, BufferUploader};

#[derive(Debug, Clone, Copy)]
struct BufferSizingDecision {
    should_reallocate: bool,
}

fn decide_buffer_sizing(existing_size: Option<u64>, required_size: usize) -> BufferSizingDecision {
    let required_size = required_size as u64;
    let should_reallocate = existing_size
        .map(|size| size < required_size)
        .unwrap_or(true);

    BufferSizingDecision { should_reallocate }
}

/// Pads `bytes` with zeros to wgpu's copy alignment.
fn aligned(bytes: &[u8]) -> Cow<'_, [u8]> {
    let align = wgpu::COPY_BUFFER_ALIGNMENT as usize;
    let padded = bytes.len().div_ceil(align) * align;
    if padded == bytes.len() {
        return Cow::Borrowed(bytes);
    }
    let mut owned = bytes.to_vec();
    owned.resize(padded, 0);
    Cow::Owned(owned)
}

/// Owns one wgpu buffer per [`BufferKey`].
///
/// Buffers are reused while they are large enough and reallocated when the geometry grows.
pub struct WgpuUploader<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    buffers: HashMap<BufferKey, wgpu::Buffer>,
}

impl<'a> WgpuUploader<'a> {
    pub fn new(device: &'a wgpu::Device, queue: &'a wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            buffers: HashMap::default(),
        }
    }

    #[inline]
    pub fn buffer(&self, key: BufferKey) -> Option<&wgpu::Buffer> {
        self.buffers.get(&key)
    }

    fn usage(key: BufferKey) -> BufferUsages {
        match key.target {
            BufferTarget::Index => BufferUsages::INDEX | BufferUsages::COPY_DST,
            BufferTarget::Attribute(_) => BufferUsages::VERTEX | BufferUsages::COPY_DST,
        }
    }
}

impl BufferUploader for WgpuUploader<'_> {
    fn allocate(&mut self, key: BufferKey, bytes: &[u8]) {
        let bytes = aligned(bytes);
        let existing = self.buffers.get(&key);
        let decision = decide_buffer_sizing(existing.map(|buffer| buffer.size()), bytes.len());

        if decision.should_reallocate {
            let label = format!("{:?} {:?}", key.stream, key.target);
            tracing::debug!(buffer = %label, size = bytes.len(), "allocating geometry buffer");
            let buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&label),
                    contents: &bytes,
                    usage: Self::usage(key),
                });
            self.buffers.insert(key, buffer);
        } else if let Some(buffer) = existing {
            self.queue.write_buffer(buffer, 0, &bytes);
        }
    }

    fn upload_range(&mut self, key: BufferKey, byte_offset: usize, bytes: &[u8]) {
        let Some(buffer) = self.buffers.get(&key) else {
            tracing::warn!(?key, "range upload to a buffer that was never allocated");
            return;
        };
        let bytes = aligned(bytes);
        if (byte_offset + bytes.len()) as u64 > buffer.size() {
            tracing::warn!(?key, byte_offset, "range upload past the end of the buffer");
            return;
        }
        self.queue.write_buffer(buffer, byte_offset as u64, &bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decide_buffer_sizing_reallocates_when_missing() {
        let decision = decide_buffer_sizing(None, 128);
        assert!(decision.should_reallocate);
    }

    #[test]
    fn decide_buffer_sizing_reallocates_when_too_small() {
        let decision = decide_buffer_sizing(Some(64), 128);
        assert!(decision.should_reallocate);
    }

    #[test]
    fn decide_buffer_sizing_keeps_buffer_when_large_enough() {
        let decision = decide_buffer_sizing(Some(512), 128);
        assert!(!decision.should_reallocate);
    }

    #[test]
    fn odd_sized_writes_are_padded_to_copy_alignment() {
        assert_eq!(aligned(&[1, 2, 3, 4]).len(), 4);
        assert_eq!(aligned(&[1, 2, 3, 4, 5, 6]).as_ref(), &[1, 2, 3, 4, 5, 6, 0, 0]);
    }
}
