//! Lowercasing tokenizer with stop word removal and length truncation.
//!
//! Splits on non-alphanumeric characters and drops common English stop words and
//! single-character tokens. Tokens are byte spans into one lowercased buffer, so
//! tokenizing a passage costs a single allocation for the text.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is",
        "it", "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there",
        "these", "they", "this", "to", "was", "will", "with",
    ]
    .into_iter()
    .collect()
});

/// Tokenized text: owns the lowercased buffer, exposes `&str` tokens via byte spans.
pub struct Tokens {
    buffer: String,
    spans: Vec<(u32, u32)>,
}

impl Tokens {
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.spans
            .iter()
            .map(|&(s, e)| &self.buffer[s as usize..e as usize])
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Term → occurrence count.
    pub fn term_counts(&self) -> HashMap<&str, u32> {
        let mut counts = HashMap::with_capacity(self.spans.len());
        for token in self.iter() {
            *counts.entry(token).or_insert(0) += 1;
        }
        counts
    }
}

/// Tokenizes `text` without a length limit. Used for queries.
pub fn tokenize(text: &str) -> Tokens {
    tokenize_truncated(text, usize::MAX)
}

/// Tokenizes `text`, keeping at most `max_tokens` tokens. Used for documents.
pub fn tokenize_truncated(text: &str, max_tokens: usize) -> Tokens {
    let buffer = text.to_lowercase();
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;

    let push = |s: usize, e: usize, spans: &mut Vec<(u32, u32)>| {
        let token = &buffer[s..e];
        if token.len() > 1 && !STOP_WORDS.contains(token) {
            spans.push((s as u32, e as u32));
        }
    };

    for (i, c) in buffer.char_indices() {
        if spans.len() >= max_tokens {
            break;
        }
        if c.is_alphanumeric() {
            if start.is_none() {
                start = Some(i);
            }
        } else if let Some(s) = start.take() {
            push(s, i, &mut spans);
        }
    }
    if spans.len() < max_tokens {
        if let Some(s) = start {
            push(s, buffer.len(), &mut spans);
        }
    }

    Tokens { buffer, spans }
}
