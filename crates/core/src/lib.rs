//! # rankd-core
//!
//! Query-serving core for multi-tenant passage retrieval: a registry of
//! per-tenant engines, a memoizing single-flight query cache, a softmax ranking
//! pipeline and a per-tenant build orchestrator.
//!
//! This crate has no async dependencies. The `rankd-server` crate wraps
//! [`service::SearchService`] in an HTTP API.

/// BM25 building blocks: tokenizer, inverted index and impact scoring.
pub mod bm25;
/// Build orchestrator: per-tenant serialized index (re)builds.
pub mod build;
/// Memoizing query cache with single-flight computation.
pub mod cache;
/// TSV collection store mapping passage ids to text.
pub mod collection;
/// Global configuration constants and runtime service settings.
pub mod config;
/// Engine traits, engine handles and the built-in lexical engine.
pub mod engine;
/// Typed errors for collections, engines and service operations.
pub mod error;
/// Packed low-bit scalar quantization of posting impacts.
pub mod quantization;
/// Softmax ranking of engine candidates.
pub mod ranking;
/// Index name → engine handle registry.
pub mod registry;
/// The service operations exposed to the HTTP boundary.
pub mod service;
/// Checksummed snapshot persistence.
pub mod storage;

pub use error::{Error, ErrorKind, Result};
pub use service::SearchService;
