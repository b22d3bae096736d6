//! Boundary-aware text chunking.
//!
//! Splits long documents into overlapping segments of at most `max_chars`
//! characters. Cuts are placed after sentence-ending punctuation where the
//! look-back window allows it, otherwise after whitespace, otherwise at the
//! hard limit. Lengths are counted in Unicode scalar values.

use crate::types::{AppError, Result};

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHARS: usize = 5000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

const SENTENCE_ENDINGS: [char; 4] = ['.', '!', '?', '\n'];
const HONORIFICS: [&str; 8] = ["Mr", "Mrs", "Ms", "Dr", "Prof", "Sr", "Jr", "St"];

#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Default for TextChunker {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl TextChunker {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(AppError::InvalidInput(
                "max_chars must be greater than zero".into(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(AppError::InvalidInput(format!(
                "overlap_chars ({}) must be smaller than max_chars ({})",
                overlap_chars, max_chars
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Lazily yields trimmed, non-empty chunks borrowed from `text`.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());

        Chunks {
            text,
            chars: text.chars().collect(),
            offsets,
            start: 0,
            max_chars: self.max_chars,
            overlap_chars: self.overlap_chars,
            done: false,
        }
    }

    /// Collects all chunks of `text` into owned strings.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunks(text).map(str::to_string).collect()
    }
}

/// Iterator returned by [`TextChunker::chunks`].
pub struct Chunks<'a> {
    text: &'a str,
    chars: Vec<char>,
    /// Byte offset of every char plus a trailing `text.len()`.
    offsets: Vec<usize>,
    start: usize,
    max_chars: usize,
    overlap_chars: usize,
    done: bool,
}

impl<'a> Chunks<'a> {
    fn split_point(&self, start: usize, ideal_end: usize) -> usize {
        let window_start = ideal_end.saturating_sub(self.overlap_chars).max(start);

        for i in (window_start..ideal_end).rev() {
            let c = self.chars[i];
            if SENTENCE_ENDINGS.contains(&c) {
                if c == '.' && self.is_abbreviation(i, window_start) {
                    continue;
                }
                return i + 1;
            }
        }

        for i in (window_start..ideal_end).rev() {
            if self.chars[i].is_whitespace() {
                return i + 1;
            }
        }

        ideal_end
    }

    /// A period after a lone capital ("U.S.") or a honorific ("Mr.") does not end a sentence.
    fn is_abbreviation(&self, dot: usize, window_start: usize) -> bool {
        if dot == 0 {
            return false;
        }

        let prev = dot - 1;
        if self.chars[prev].is_uppercase()
            && (prev == 0 || prev == window_start || self.chars[prev - 1].is_whitespace())
        {
            return true;
        }

        let mut word_start = dot;
        while word_start > 0 && self.chars[word_start - 1].is_alphabetic() {
            word_start -= 1;
        }
        if dot - word_start > 4 {
            return false;
        }
        if word_start > 0 && !self.chars[word_start - 1].is_whitespace() {
            return false;
        }

        let word: String = self.chars[word_start..dot].iter().collect();
        HONORIFICS.contains(&word.as_str())
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let len = self.chars.len();

        while !self.done && self.start < len {
            let start = self.start;
            let mut end = (start + self.max_chars).min(len);
            if end < len {
                end = self.split_point(start, end);
            }

            let piece = self.text[self.offsets[start]..self.offsets[end]].trim();

            if end >= len {
                self.done = true;
            } else {
                let mut next = (start + 1).max(end.saturating_sub(self.overlap_chars));
                // skip the tail of a word cut by the overlap, never past the previous cut
                while next < end && next > 0 && !self.chars[next - 1].is_whitespace() {
                    next += 1;
                }
                self.start = next;
            }

            if !piece.is_empty() {
                return Some(piece);
            }
        }

        None
    }
}
