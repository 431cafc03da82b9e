//! Character-offset view over a UTF-8 string.
//!
//! Spans are expressed in character indices so every detector agrees on
//! the unit. Regex engines and `str` slicing work in bytes, so conversions
//! go through here.

use std::ops::Range;

/// Borrowed text plus the byte offset of every character.
#[derive(Debug, Clone)]
pub struct IndexedText<'a> {
    text: &'a str,
    /// `offsets[i]` is the byte offset of char `i`; the last entry is `text.len()`.
    offsets: Vec<usize>,
}

impl<'a> IndexedText<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        offsets.push(text.len());
        Self { text, offsets }
    }

    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// Number of characters.
    pub fn char_len(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Character index of a byte offset. The offset must sit on a char boundary.
    pub fn char_at_byte(&self, byte: usize) -> Option<usize> {
        self.offsets.binary_search(&byte).ok()
    }

    /// Byte range covering characters `[start, end)`.
    pub fn byte_range(&self, start: usize, end: usize) -> Option<Range<usize>> {
        if start > end || end > self.char_len() {
            return None;
        }
        Some(self.offsets[start]..self.offsets[end])
    }

    /// Character range covering bytes `[start, end)`.
    pub fn char_range(&self, start: usize, end: usize) -> Option<Range<usize>> {
        Some(self.char_at_byte(start)?..self.char_at_byte(end)?)
    }

    /// Substring for characters `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Option<&'a str> {
        self.byte_range(start, end).map(|r| &self.text[r])
    }
}
