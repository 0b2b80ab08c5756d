//! Source spans and line lookup.

/// A byte range in one source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// Start byte offset, inclusive.
    pub start: u32,
    /// End byte offset, exclusive.
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// An empty span at the given offset.
    pub fn empty(offset: u32) -> Self {
        Self { start: offset, end: offset }
    }

    /// Span for nodes synthesized during rewriting; no source backs it.
    pub fn dummy() -> Self {
        Self { start: u32::MAX, end: u32::MAX }
    }

    pub fn is_dummy(&self) -> bool {
        self.start == u32::MAX && self.end == u32::MAX
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(&self, other: Span) -> Span {
        if self.is_dummy() {
            return other;
        }
        if other.is_dummy() {
            return *self;
        }
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Byte-offset to line/column lookup table, built once per source unit.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-based line number containing `offset`.
    pub fn line(&self, offset: u32) -> u32 {
        match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx as u32 + 1,
            Err(idx) => idx as u32,
        }
    }

    /// 1-based column of `offset` within its line.
    pub fn column(&self, offset: u32) -> u32 {
        let line = self.line(offset);
        let line_start = self.line_starts[line as usize - 1];
        offset - line_start + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both() {
        let a = Span::new(4, 8);
        let b = Span::new(10, 12);
        assert_eq!(a.merge(b), Span::new(4, 12));
    }

    #[test]
    fn merge_ignores_dummy() {
        let a = Span::new(4, 8);
        assert_eq!(a.merge(Span::dummy()), a);
        assert_eq!(Span::dummy().merge(a), a);
    }

    #[test]
    fn line_lookup() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.line(0), 1);
        assert_eq!(index.line(2), 1);
        assert_eq!(index.line(3), 2);
        assert_eq!(index.line(6), 3);
        assert_eq!(index.line(7), 4);
        assert_eq!(index.column(4), 2);
    }

    #[test]
    fn line_of_first_char_on_line() {
        let index = LineIndex::new("a\nb\nc");
        assert_eq!(index.line(2), 2);
        assert_eq!(index.column(2), 1);
    }
}
