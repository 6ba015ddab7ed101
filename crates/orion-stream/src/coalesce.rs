//! Scratch buffer for text/thinking deltas awaiting the next frame flush.
//!
//! Adjacent deltas of the same kind are merged into one segment; a change of
//! kind starts a new segment so the flushed sequence replays in the exact
//! order it arrived. Flushing the segments through the accumulator yields the
//! same snapshot as applying every delta individually.

use crate::event::ContentKind;

/// Pending bytes above which the batcher asks for an early flush.
pub const MAX_PENDING_BYTES: usize = 8_192;

#[derive(Debug, Default)]
pub struct DeltaBatcher {
    segments: Vec<(ContentKind, String)>,
    pending_bytes: usize,
}

impl DeltaBatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers one delta. Returns true when the buffer is large enough that
    /// the caller should flush before the next tick.
    pub fn push(&mut self, kind: ContentKind, content: &str) -> bool {
        if !content.is_empty() {
            match self.segments.last_mut() {
                Some((last_kind, buf)) if *last_kind == kind => buf.push_str(content),
                _ => self.segments.push((kind, content.to_string())),
            }
            self.pending_bytes += content.len();
        }
        self.pending_bytes >= MAX_PENDING_BYTES
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn pending_bytes(&self) -> usize {
        self.pending_bytes
    }

    /// Takes all buffered segments in arrival order, leaving the batcher empty.
    pub fn drain(&mut self) -> Vec<(ContentKind, String)> {
        self.pending_bytes = 0;
        std::mem::take(&mut self.segments)
    }

    /// Discards buffered deltas without applying them.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.pending_bytes = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_same_kind_deltas_merge() {
        let mut batcher = DeltaBatcher::new();
        batcher.push(ContentKind::Text, "Hi");
        batcher.push(ContentKind::Text, " there");
        assert_eq!(batcher.drain(), vec![(ContentKind::Text, "Hi there".to_string())]);
        assert!(batcher.is_empty());
        assert_eq!(batcher.pending_bytes(), 0);
    }

    #[test]
    fn kind_change_starts_new_segment() {
        let mut batcher = DeltaBatcher::new();
        batcher.push(ContentKind::Thinking, "a");
        batcher.push(ContentKind::Text, "b");
        batcher.push(ContentKind::Thinking, "c");
        let kinds: Vec<ContentKind> = batcher.drain().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![ContentKind::Thinking, ContentKind::Text, ContentKind::Thinking]
        );
    }

    #[test]
    fn empty_delta_buffers_nothing() {
        let mut batcher = DeltaBatcher::new();
        assert!(!batcher.push(ContentKind::Text, ""));
        assert!(batcher.is_empty());
    }

    #[test]
    fn large_backlog_requests_early_flush() {
        let mut batcher = DeltaBatcher::new();
        let big = "x".repeat(MAX_PENDING_BYTES - 1);
        assert!(!batcher.push(ContentKind::Text, &big));
        assert!(batcher.push(ContentKind::Text, "y"));
        batcher.clear();
        assert!(batcher.is_empty());
    }
}
