//! Resident byte segments of a single track.
//!
//! Segments are kept disjoint, non-adjacent and ordered by offset: every
//! insert coalesces with whatever it overlaps or touches. A covered range
//! therefore always lies inside exactly one segment, and reads are a
//! zero-copy `Bytes::slice`.

use bytes::{Bytes, BytesMut};
use std::ops::Range;

#[derive(Debug, Clone)]
struct Segment {
    start: u64,
    data: Bytes,
}

impl Segment {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }
}

/// Ordered set of resident byte ranges with their contents.
#[derive(Debug, Clone, Default)]
pub struct ByteRangeSet {
    segments: Vec<Segment>,
    resident: u64,
}

impl ByteRangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total resident bytes.
    pub fn resident_bytes(&self) -> u64 {
        self.resident
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Resident ranges in offset order.
    pub fn ranges(&self) -> Vec<Range<u64>> {
        self.segments.iter().map(|s| s.start..s.end()).collect()
    }

    /// Index range of segments that overlap or touch `[start, end)`.
    fn touching(&self, start: u64, end: u64) -> Range<usize> {
        let first = self.segments.partition_point(|s| s.end() < start);
        let last = self.segments.partition_point(|s| s.start <= end);
        first..last.max(first)
    }

    /// Bytes that inserting `[offset, offset + len)` would add.
    pub fn growth(&self, offset: u64, len: u64) -> u64 {
        let end = offset + len;
        let mut covered = 0;
        for segment in &self.segments[self.touching(offset, end)] {
            let lo = segment.start.max(offset);
            let hi = segment.end().min(end);
            covered += hi.saturating_sub(lo);
        }
        len - covered
    }

    /// Merge `data` at `offset`, returning the number of newly resident bytes.
    ///
    /// Track content never changes, so where the new bytes overlap resident
    /// ones the resident copy is kept.
    pub fn insert(&mut self, offset: u64, data: Bytes) -> u64 {
        if data.is_empty() {
            return 0;
        }
        let end = offset + data.len() as u64;
        let span = self.touching(offset, end);

        if span.is_empty() {
            let len = data.len() as u64;
            self.segments.insert(span.start, Segment { start: offset, data });
            self.resident += len;
            return len;
        }

        if span.len() == 1 {
            let existing = &self.segments[span.start];
            if existing.start <= offset && existing.end() >= end {
                return 0;
            }
        }

        let merged_start = offset.min(self.segments[span.start].start);
        let merged_end = end.max(self.segments[span.end - 1].end());
        let mut buffer = BytesMut::zeroed((merged_end - merged_start) as usize);

        let at = (offset - merged_start) as usize;
        buffer[at..at + data.len()].copy_from_slice(&data);

        let mut previously_resident = 0;
        for segment in self.segments.drain(span.clone()) {
            let at = (segment.start - merged_start) as usize;
            buffer[at..at + segment.data.len()].copy_from_slice(&segment.data);
            previously_resident += segment.data.len() as u64;
        }

        let merged_len = merged_end - merged_start;
        self.segments.insert(
            span.start,
            Segment {
                start: merged_start,
                data: buffer.freeze(),
            },
        );
        let added = merged_len - previously_resident;
        self.resident += added;
        added
    }

    fn segment_containing(&self, position: u64) -> Option<&Segment> {
        let idx = self.segments.partition_point(|s| s.start <= position);
        if idx == 0 {
            return None;
        }
        let segment = &self.segments[idx - 1];
        (position < segment.end()).then_some(segment)
    }

    /// Whether `[offset, offset + len)` is fully resident. Empty ranges are
    /// never reported as covered.
    pub fn covers(&self, offset: u64, len: u64) -> bool {
        if len == 0 {
            return false;
        }
        match (self.segment_containing(offset), offset.checked_add(len)) {
            (Some(segment), Some(end)) => segment.end() >= end,
            _ => false,
        }
    }

    /// Bytes of `[offset, offset + len)` if fully resident.
    pub fn read(&self, offset: u64, len: u64) -> Option<Bytes> {
        if !self.covers(offset, len) {
            return None;
        }
        let segment = self.segment_containing(offset)?;
        let from = (offset - segment.start) as usize;
        Some(segment.data.slice(from..from + len as usize))
    }

    /// The resident range containing `position`.
    pub fn span_at(&self, position: u64) -> Option<Range<u64>> {
        self.segment_containing(position).map(|s| s.start..s.end())
    }

    /// Start of the first resident range beginning after `position`.
    pub fn next_start_after(&self, position: u64) -> Option<u64> {
        let idx = self.segments.partition_point(|s| s.start <= position);
        self.segments.get(idx).map(|s| s.start)
    }

    /// Iterate `(offset, bytes)` pairs in offset order.
    pub fn segments(&self) -> impl Iterator<Item = (u64, &Bytes)> + '_ {
        self.segments.iter().map(|s| (s.start, &s.data))
    }
}
