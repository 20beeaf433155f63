//! Dirty-range tracking for output streams.
//!
//! Every (stream, channel) pair keeps one inclusive vertex interval that only grows until the
//! sync step consumes it. A full tessellation replaces all ranges with a single "upload
//! everything" flag.

use std::ops::RangeInclusive;

use ahash::HashMap;

/// Output stream a vertex belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stream {
    /// Triangles. In 2D this also holds strokes and points.
    Fill,
    /// 3D stroke quads.
    Line,
    /// 3D point sprites.
    Point,
}

impl Stream {
    pub const ALL: [Stream; 3] = [Stream::Fill, Stream::Line, Stream::Point];
}

/// Per-vertex attribute channel of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Position,
    Color,
    Normal,
    TexCoord,
    Ambient,
    Specular,
    Emissive,
    Shininess,
    /// Line stream: opposite endpoint and signed half-width.
    Direction,
    /// Point stream: sprite corner offset.
    Offset,
    /// Custom fill attribute, by registry id.
    Custom(u16),
}

/// Inclusive interval of modified vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRange {
    pub first: usize,
    pub last: usize,
}

impl DirtyRange {
    #[inline]
    pub fn widen(&mut self, first: usize, last: usize) {
        self.first = self.first.min(first);
        self.last = self.last.max(last);
    }

    #[inline]
    pub fn as_range(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    ranges: HashMap<(Stream, Channel), DirtyRange>,
    full_upload: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Widens the tracked interval of `channel` to include `first..=last`.
    pub fn mark_modified(&mut self, stream: Stream, channel: Channel, first: usize, last: usize) {
        if first > last {
            return;
        }
        self.ranges
            .entry((stream, channel))
            .and_modify(|range| range.widen(first, last))
            .or_insert(DirtyRange { first, last });
    }

    /// Returns the accumulated interval of `channel` and resets it.
    pub fn consume_and_clear(
        &mut self,
        stream: Stream,
        channel: Channel,
    ) -> Option<RangeInclusive<usize>> {
        self.ranges
            .remove(&(stream, channel))
            .map(|range| range.as_range())
    }

    #[inline]
    pub fn range(&self, stream: Stream, channel: Channel) -> Option<DirtyRange> {
        self.ranges.get(&(stream, channel)).copied()
    }

    #[inline]
    pub fn is_modified(&self, stream: Stream, channel: Channel) -> bool {
        self.ranges.contains_key(&(stream, channel))
    }

    /// Channels with pending ranges, in a stable order.
    pub fn pending(&self) -> Vec<(Stream, Channel)> {
        let mut keys: Vec<_> = self.ranges.keys().copied().collect();
        keys.sort();
        keys
    }

    /// Forgets all partial ranges and requests a full upload of every buffer.
    pub fn mark_full_upload(&mut self) {
        self.ranges.clear();
        self.full_upload = true;
    }

    #[inline]
    pub fn needs_full_upload(&self) -> bool {
        self.full_upload
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
        self.full_upload = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_grow_until_consumed() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_modified(Stream::Fill, Channel::Color, 10, 12);
        tracker.mark_modified(Stream::Fill, Channel::Color, 4, 5);
        tracker.mark_modified(Stream::Fill, Channel::Color, 20, 20);

        assert_eq!(
            tracker.consume_and_clear(Stream::Fill, Channel::Color),
            Some(4..=20)
        );
        assert_eq!(tracker.consume_and_clear(Stream::Fill, Channel::Color), None);
    }

    #[test]
    fn channels_and_streams_are_tracked_independently() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_modified(Stream::Fill, Channel::Position, 0, 3);
        tracker.mark_modified(Stream::Line, Channel::Position, 7, 9);

        assert!(!tracker.is_modified(Stream::Fill, Channel::Color));
        assert_eq!(
            tracker.pending(),
            vec![
                (Stream::Fill, Channel::Position),
                (Stream::Line, Channel::Position)
            ]
        );
    }

    #[test]
    fn full_upload_discards_partial_ranges() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_modified(Stream::Point, Channel::Offset, 1, 2);
        tracker.mark_full_upload();
        assert!(tracker.needs_full_upload());
        assert!(tracker.pending().is_empty());
        tracker.clear();
        assert!(!tracker.needs_full_upload());
    }

    #[test]
    fn inverted_ranges_are_ignored() {
        let mut tracker = DirtyTracker::new();
        tracker.mark_modified(Stream::Fill, Channel::Color, 5, 4);
        assert!(tracker.pending().is_empty());
    }
}
