//! Source position tracking, mirroring the original `LogSnippet` byte-offset-to-line/column walk.

/// A half-open byte range into the source buffer plus its resolved line/column.
///
/// Line and column are 1-indexed; `0` means "unknown" (used for synthetic or
/// host-injected positions that have no source text behind them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub start: usize,
    pub end: usize,
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn unknown() -> Self {
        Position { start: 0, end: 0, line: 0, column: 0 }
    }

    pub fn is_unknown(&self) -> bool {
        self.line == 0 && self.column == 0
    }

    /// Computes line/column by scanning `source` for newlines up to `start`, the same
    /// linear walk `LogSnippet`'s constructor performs over the source buffer.
    pub fn from_offsets(source: &str, start: usize, end: usize) -> Self {
        let mut line = 1u32;
        let mut col = 1u32;
        for ch in source[..start.min(source.len())].chars() {
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        Position { start, end, line, column: col }
    }
}
