//! Byte sources the lexer reads from.
//!
//! A source is either one buffer (the whole file, a decoded stream) or an
//! ordered chain of buffers. Page contents split over several streams are
//! read through a chain so the segments never have to be joined into one
//! allocation. Positions are global offsets across the whole chain.

use bytes::{Bytes, BytesMut};
use std::cell::Cell;

/// An immutable, possibly segmented, byte sequence.
#[derive(Debug, Clone, Default)]
pub struct ByteSource {
    segments: Vec<Bytes>,
    /// Global start offset of each segment
    starts: Vec<usize>,
    len: usize,
    /// Segment that satisfied the last lookup
    hint: Cell<usize>,
}

impl ByteSource {
    /// Wrap a single buffer.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self::chain(vec![data.into()])
    }

    /// Chain several buffers into one logical sequence. Empty buffers are skipped.
    pub fn chain(segments: Vec<Bytes>) -> Self {
        let segments: Vec<Bytes> = segments.into_iter().filter(|s| !s.is_empty()).collect();
        let mut starts = Vec::with_capacity(segments.len());
        let mut len = 0;
        for segment in &segments {
            starts.push(len);
            len += segment.len();
        }
        Self {
            segments,
            starts,
            len,
            hint: Cell::new(0),
        }
    }

    /// Append a segment at the end of the chain.
    pub fn append(&mut self, data: Bytes) {
        if data.is_empty() {
            return;
        }
        self.starts.push(self.len);
        self.len += data.len();
        self.segments.push(data);
    }

    /// Total length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the source holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of underlying segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    fn locate(&self, pos: usize) -> Option<(usize, usize)> {
        if pos >= self.len {
            return None;
        }
        let hint = self.hint.get();
        if let Some(&start) = self.starts.get(hint) {
            if pos >= start && pos < start + self.segments[hint].len() {
                return Some((hint, pos - start));
            }
        }
        let idx = match self.starts.binary_search(&pos) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        self.hint.set(idx);
        Some((idx, pos - self.starts[idx]))
    }

    /// Byte at a global offset.
    #[inline]
    pub fn byte_at(&self, pos: usize) -> Option<u8> {
        if self.segments.len() == 1 {
            return self.segments[0].get(pos).copied();
        }
        self.locate(pos).map(|(seg, off)| self.segments[seg][off])
    }

    /// Bytes in `start..end` (clamped to the source length).
    ///
    /// Ranges inside one segment are returned as zero-copy views; ranges that
    /// cross a segment boundary are copied.
    pub fn slice(&self, start: usize, end: usize) -> Bytes {
        let end = end.min(self.len);
        if start >= end {
            return Bytes::new();
        }
        let Some((first_seg, first_off)) = self.locate(start) else {
            return Bytes::new();
        };
        let seg = &self.segments[first_seg];
        if first_off + (end - start) <= seg.len() {
            return seg.slice(first_off..first_off + (end - start));
        }

        let mut out = BytesMut::with_capacity(end - start);
        let mut pos = start;
        while pos < end {
            let Some((idx, off)) = self.locate(pos) else { break };
            let segment = &self.segments[idx];
            let take = (segment.len() - off).min(end - pos);
            out.extend_from_slice(&segment[off..off + take]);
            pos += take;
        }
        out.freeze()
    }

    /// Find `needle` at or after `from`, looking at most `limit` bytes ahead.
    pub fn find(&self, from: usize, needle: &[u8], limit: Option<usize>) -> Option<usize> {
        if needle.is_empty() {
            return Some(from);
        }
        let end = match limit {
            Some(limit) => from.saturating_add(limit).min(self.len),
            None => self.len,
        };
        if self.segments.len() == 1 {
            let hay = self.segments[0].get(from..end)?;
            return hay
                .windows(needle.len())
                .position(|w| w == needle)
                .map(|p| from + p);
        }
        let mut pos = from;
        while pos + needle.len() <= end {
            if (0..needle.len()).all(|i| self.byte_at(pos + i) == Some(needle[i])) {
                return Some(pos);
            }
            pos += 1;
        }
        None
    }

    /// Find the last occurrence of `needle` that starts before `before`.
    pub fn rfind(&self, before: usize, needle: &[u8]) -> Option<usize> {
        let before = before.min(self.len);
        let mut pos = before.checked_sub(needle.len())?;
        loop {
            if (0..needle.len()).all(|i| self.byte_at(pos + i) == Some(needle[i])) {
                return Some(pos);
            }
            if pos == 0 {
                return None;
            }
            pos -= 1;
        }
    }
}

impl From<Bytes> for ByteSource {
    fn from(data: Bytes) -> Self {
        Self::new(data)
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(Bytes::from(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chained() -> ByteSource {
        ByteSource::chain(vec![
            Bytes::from_static(b"abc"),
            Bytes::new(),
            Bytes::from_static(b"def"),
            Bytes::from_static(b"gh"),
        ])
    }

    #[test]
    fn test_single_segment() {
        let src = ByteSource::new(Bytes::from_static(b"hello"));
        assert_eq!(src.len(), 5);
        assert_eq!(src.byte_at(0), Some(b'h'));
        assert_eq!(src.byte_at(5), None);
        assert_eq!(&src.slice(1, 4)[..], b"ell");
    }

    #[test]
    fn test_chain_skips_empty_segments() {
        let src = chained();
        assert_eq!(src.segment_count(), 3);
        assert_eq!(src.len(), 8);
    }

    #[test]
    fn test_chain_byte_at_crosses_segments() {
        let src = chained();
        let all: Vec<u8> = (0..src.len()).filter_map(|i| src.byte_at(i)).collect();
        assert_eq!(all, b"abcdefgh");
        // Going backwards after the hint moved forward
        assert_eq!(src.byte_at(1), Some(b'b'));
    }

    #[test]
    fn test_chain_slice_across_boundary() {
        let src = chained();
        assert_eq!(&src.slice(2, 7)[..], b"cdefg");
        assert_eq!(&src.slice(3, 6)[..], b"def");
        assert_eq!(&src.slice(6, 100)[..], b"gh");
        assert!(src.slice(5, 5).is_empty());
    }

    #[test]
    fn test_find_and_rfind() {
        let src = chained();
        assert_eq!(src.find(0, b"cde", None), Some(2));
        assert_eq!(src.find(0, b"cde", Some(3)), None);
        assert_eq!(src.rfind(src.len(), b"fg"), Some(5));
        assert_eq!(src.rfind(src.len(), b"zz"), None);

        let flat = ByteSource::new(Bytes::from_static(b"xx endstream yy"));
        assert_eq!(flat.find(0, b"endstream", None), Some(3));
        assert_eq!(flat.rfind(flat.len(), b"x"), Some(1));
    }

    #[test]
    fn test_append_extends_chain() {
        let mut src = ByteSource::new(Bytes::from_static(b"xref\n0 1"));
        src.append(Bytes::new());
        src.append(Bytes::from_static(b"\n0000000000 65535 f"));
        assert_eq!(src.segment_count(), 2);
        assert_eq!(src.len(), 27);
        assert_eq!(src.byte_at(8), Some(b'\n'));
        assert_eq!(src.find(0, b"65535", None), Some(20));
    }
}
