//! BM25 building blocks for the built-in lexical engine.

/// Build-time inverted index with document length tracking.
pub mod inverted_index;
/// Precomputed BM25 Okapi impacts per posting.
pub mod scorer;
/// Lowercasing tokenizer with stop words and truncation.
pub mod tokenizer;

pub use inverted_index::{InvertedIndex, Posting};
pub use scorer::term_impacts;
pub use tokenizer::{tokenize, tokenize_truncated};
