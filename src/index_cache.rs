/// One draw call's worth of geometry: a vertex range and the indices that address it.
///
/// Index values stored for a block are relative to `vertex_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexBlock {
    pub vertex_offset: usize,
    pub vertex_count: usize,
    pub index_offset: usize,
    pub index_count: usize,
}

/// Ordered list of [`IndexBlock`]s for one output stream.
///
/// Leaf shapes append blocks while tessellating. Aggregation then appends group-level copies
/// after them, so a block index stays valid until the next full tessellation clears the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexCache {
    blocks: Vec<IndexBlock>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&IndexBlock> {
        self.blocks.get(index)
    }

    #[inline]
    pub fn blocks(&self) -> &[IndexBlock] {
        &self.blocks
    }

    #[inline]
    pub(crate) fn block_mut(&mut self, index: usize) -> &mut IndexBlock {
        &mut self.blocks[index]
    }

    /// Appends an empty block starting right after the last one.
    pub fn add_new(&mut self) -> usize {
        let block = match self.blocks.last() {
            Some(last) => IndexBlock {
                vertex_offset: last.vertex_offset + last.vertex_count,
                vertex_count: 0,
                index_offset: last.index_offset + last.index_count,
                index_count: 0,
            },
            None => IndexBlock::default(),
        };
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    /// Appends a copy of block `source`.
    pub fn add_copy(&mut self, source: usize) -> usize {
        let block = self.blocks[source];
        self.blocks.push(block);
        self.blocks.len() - 1
    }

    /// Returns the last block, creating the first one if the cache is empty.
    pub fn last_or_new(&mut self) -> usize {
        if self.blocks.is_empty() {
            self.add_new()
        } else {
            self.blocks.len() - 1
        }
    }

    pub fn inc_counts(&mut self, index: usize, index_count: usize, vertex_count: usize) {
        let block = &mut self.blocks[index];
        block.index_count += index_count;
        block.vertex_count += vertex_count;
    }
}

/// Inclusive range of block indices inside an [`IndexCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub first: usize,
    pub last: usize,
}

impl BlockSpan {
    #[inline]
    pub fn single(index: usize) -> Self {
        Self {
            first: index,
            last: index,
        }
    }

    /// Number of blocks, which is the number of draw calls the span needs.
    #[inline]
    pub fn count(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.first..=self.last
    }
}

/// Inclusive range of vertices inside one output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexSpan {
    pub first: usize,
    pub last: usize,
}

impl VertexSpan {
    /// Span covering the vertices appended while a stream grew from `before` to `after`.
    pub fn between(before: usize, after: usize) -> Option<Self> {
        (after > before).then(|| Self {
            first: before,
            last: after - 1,
        })
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.last - self.first + 1
    }

    #[inline]
    pub fn contains(&self, other: &VertexSpan) -> bool {
        self.first <= other.first && other.last <= self.last
    }

    pub fn union(self, other: VertexSpan) -> VertexSpan {
        VertexSpan {
            first: self.first.min(other.first),
            last: self.last.max(other.last),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_blocks_start_where_the_previous_one_ends() {
        let mut cache = IndexCache::new();
        let first = cache.add_new();
        cache.inc_counts(first, 6, 4);
        let second = cache.add_new();
        assert_eq!(
            cache.get(second),
            Some(&IndexBlock {
                vertex_offset: 4,
                vertex_count: 0,
                index_offset: 6,
                index_count: 0,
            })
        );
    }

    #[test]
    fn copies_keep_offsets_and_counts() {
        let mut cache = IndexCache::new();
        let first = cache.last_or_new();
        cache.inc_counts(first, 3, 3);
        assert_eq!(cache.last_or_new(), first);
        let copy = cache.add_copy(first);
        assert_eq!(cache.get(copy), cache.get(first));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn vertex_spans_cover_appended_vertices() {
        assert_eq!(VertexSpan::between(4, 4), None);
        let span = VertexSpan::between(4, 10).unwrap();
        assert_eq!(span, VertexSpan { first: 4, last: 9 });
        assert_eq!(span.count(), 6);
        let wider = span.union(VertexSpan { first: 12, last: 12 });
        assert!(wider.contains(&span));
        assert!(!span.contains(&wider));
    }
}
