//! Build-time inverted index for BM25.
//!
//! Maps terms to postings lists (internal document ID + term frequency).
//! Internal IDs are assigned densely in insertion order; the caller keeps the
//! mapping back to collection pids.

use crate::bm25::tokenizer::tokenize_truncated;
use std::collections::HashMap;

/// A single entry in a term's postings list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Posting {
    pub doc: u32,
    pub term_frequency: u32,
}

/// Term → postings, plus the document lengths BM25 normalization needs.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    pub postings: HashMap<String, Vec<Posting>>,
    /// internal id → number of kept tokens.
    pub doc_lengths: Vec<u32>,
    pub total_doc_length: u64,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes the first `max_tokens` tokens of `text` and returns its internal ID.
    pub fn add_document(&mut self, text: &str, max_tokens: usize) -> u32 {
        let doc = self.doc_lengths.len() as u32;
        let tokens = tokenize_truncated(text, max_tokens);
        self.doc_lengths.push(tokens.len() as u32);
        self.total_doc_length += tokens.len() as u64;

        for (term, tf) in tokens.term_counts() {
            self.postings.entry(term.to_string()).or_default().push(Posting {
                doc,
                term_frequency: tf,
            });
        }
        doc
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_lengths.len() as u32
    }

    pub fn average_doc_length(&self) -> f32 {
        if self.doc_lengths.is_empty() {
            return 0.0;
        }
        self.total_doc_length as f32 / self.doc_lengths.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_document_assigns_dense_ids() {
        let mut idx = InvertedIndex::new();
        assert_eq!(idx.add_document("the quick brown fox", usize::MAX), 0);
        assert_eq!(idx.add_document("lazy dog", usize::MAX), 1);
        assert_eq!(idx.doc_count(), 2);
        assert!(idx.postings.contains_key("quick"));
        assert!(!idx.postings.contains_key("the"));
    }

    #[test]
    fn test_term_frequency() {
        let mut idx = InvertedIndex::new();
        idx.add_document("hello hello hello world", usize::MAX);
        let postings = &idx.postings["hello"];
        assert_eq!(postings, &vec![Posting { doc: 0, term_frequency: 3 }]);
    }

    #[test]
    fn test_truncation_limits_postings_and_length() {
        let mut idx = InvertedIndex::new();
        idx.add_document("alpha beta gamma delta", 2);
        assert_eq!(idx.doc_lengths[0], 2);
        assert!(idx.postings.contains_key("beta"));
        assert!(!idx.postings.contains_key("gamma"));
    }

    #[test]
    fn test_average_doc_length() {
        let mut idx = InvertedIndex::new();
        assert_eq!(idx.average_doc_length(), 0.0);
        idx.add_document("one two three", usize::MAX);
        idx.add_document("four five six seven eight", usize::MAX);
        assert_eq!(idx.average_doc_length(), 4.0);
    }

    #[test]
    fn test_empty_document_still_gets_id() {
        let mut idx = InvertedIndex::new();
        assert_eq!(idx.add_document("", usize::MAX), 0);
        assert_eq!(idx.doc_lengths, vec![0]);
        assert!(idx.postings.is_empty());
    }
}
