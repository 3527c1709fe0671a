//! Boundary-aware text splitter
//!
//! Cuts text into windows of at most `chunk_size` characters. Each window ends
//! at the strongest boundary available (paragraph, line, sentence, clause, word)
//! and the next window starts exactly `chunk_overlap` characters before that end,
//! so consecutive chunks share an overlap of fixed length. A raw character cut is
//! used only when no boundary falls inside the window.

use crate::config::ChunkingConfig;

/// Separator tiers, strongest first. Within a tier the latest match wins.
const SEPARATOR_TIERS: &[&[&str]] = &[
    &["\n\n"],
    &["\n"],
    &["。", "！", "？", ". ", "! ", "? "],
    &["；", "，", "; ", ", "],
    &[" "],
];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    tiers: Vec<Vec<Vec<char>>>,
}

impl RecursiveSplitter {
    /// `chunk_overlap` is clamped below `chunk_size` so the window always advances.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        let tiers = SEPARATOR_TIERS
            .iter()
            .map(|tier| tier.iter().map(|sep| sep.chars().collect()).collect())
            .collect();

        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            tiers,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into overlapping chunks. Whitespace-only input yields nothing.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        if chars.iter().all(|c| c.is_whitespace()) {
            return Vec::new();
        }

        let len = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + self.chunk_size).min(len);
            let end = if hard_end == len {
                len
            } else {
                self.boundary(&chars, start, hard_end)
            };

            chunks.push(chars[start..end].iter().collect());

            if end == len {
                break;
            }
            start = end - self.chunk_overlap;
        }

        chunks
    }

    /// Pick the end of the window `[start, hard_end)`.
    ///
    /// Candidates must leave the chunk longer than the overlap (so the next
    /// window advances) and at least half full (so a stray early paragraph
    /// break does not produce a run of tiny chunks).
    fn boundary(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let min_end = start + (self.chunk_overlap + 1).max(self.chunk_size / 2);

        for tier in &self.tiers {
            for end in (min_end..=hard_end).rev() {
                let matched = tier.iter().any(|sep| {
                    end >= start + sep.len() && chars[end - sep.len()..end] == sep[..]
                });
                if matched {
                    return end;
                }
            }
        }

        hard_end
    }
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}
