//! Append-only caption transcript
//!
//! Lines are only produced from caption events, in arrival order. Nothing
//! edits or removes a line while the room is alive.

use serde::Serialize;

/// One caption line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptLine {
    /// Speaker label, `"Unknown"` when the caption carried none
    pub sender: String,
    /// Trimmed caption text, never empty
    pub text: String,
}

impl TranscriptLine {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.sender, self.text)
    }
}

/// Ordered caption log of a room
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line at the end
    pub fn push(&mut self, line: TranscriptLine) {
        self.lines.push(line);
    }

    /// All lines in arrival order
    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines spoken by a single sender label, in order
    pub fn lines_from<'a>(&'a self, sender: &'a str) -> impl Iterator<Item = &'a TranscriptLine> {
        self.lines.iter().filter(move |line| line.sender == sender)
    }

    /// Append another transcript's lines after this one's
    pub(super) fn extend(&mut self, other: Transcript) {
        self.lines.extend(other.lines);
    }
}
