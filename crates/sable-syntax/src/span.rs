use serde::{Deserialize, Serialize};

/// 1-based line/column position in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Position { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    /// Span for nodes the subsystem manufactures rather than parses.
    pub fn synthetic() -> Self {
        Span {
            start: Position { line: 0, column: 0 },
            end: Position { line: 0, column: 0 },
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.start.line == 0 && self.end.line == 0
    }
}

impl Default for Span {
    fn default() -> Self {
        Span::synthetic()
    }
}
