//! BM25 Okapi impact computation.
//!
//! Instead of scoring at query time, each (term, document) pair gets its full
//! BM25 contribution precomputed at build time. A query's score for a document
//! is then the sum of the impacts of the query terms it contains.

use crate::bm25::inverted_index::{InvertedIndex, Posting};
use crate::config;

/// Okapi IDF: `ln((N - df + 0.5) / (df + 0.5) + 1)`. Always positive.
pub fn idf(doc_count: u32, document_frequency: usize) -> f32 {
    let n = doc_count as f32;
    let df = document_frequency as f32;
    ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
}

/// BM25 impact of every posting in `postings`, in the same order.
pub fn term_impacts(index: &InvertedIndex, postings: &[Posting]) -> Vec<f32> {
    let avgdl = index.average_doc_length();
    let idf = idf(index.doc_count(), postings.len());
    let k1 = config::BM25_K1;
    let b = config::BM25_B;

    postings
        .iter()
        .map(|p| {
            let dl = index.doc_lengths.get(p.doc as usize).copied().unwrap_or(0) as f32;
            let tf = p.term_frequency as f32;
            let norm = if avgdl > 0.0 { dl / avgdl } else { 1.0 };
            idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * norm))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_corpus() -> InvertedIndex {
        let mut idx = InvertedIndex::new();
        idx.add_document("rust programming systems language fast", usize::MAX);
        idx.add_document("python programming scripting easy", usize::MAX);
        idx.add_document("java enterprise programming verbose", usize::MAX);
        idx.add_document("rust memory safety zero cost abstractions", usize::MAX);
        idx
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let idx = build_corpus();
        let rust = term_impacts(&idx, &idx.postings["rust"]);
        let programming = term_impacts(&idx, &idx.postings["programming"]);
        assert_eq!(rust.len(), 2);
        assert_eq!(programming.len(), 3);
        assert!(rust[0] > programming[0]);
    }

    #[test]
    fn test_impacts_positive() {
        let idx = build_corpus();
        for postings in idx.postings.values() {
            assert!(term_impacts(&idx, postings).iter().all(|&w| w > 0.0));
        }
    }

    #[test]
    fn test_higher_tf_higher_impact() {
        let mut idx = InvertedIndex::new();
        idx.add_document("cat cat cat bird", usize::MAX);
        idx.add_document("cat bird fish", usize::MAX);
        let postings = &idx.postings["cat"];
        let impacts = term_impacts(&idx, postings);
        let by_doc = |d: u32| impacts[postings.iter().position(|p| p.doc == d).unwrap()];
        assert!(by_doc(0) > by_doc(1));
    }

    #[test]
    fn test_idf_monotonic() {
        assert!(idf(100, 1) > idf(100, 50));
        assert!(idf(1, 1) > 0.0);
    }
}
