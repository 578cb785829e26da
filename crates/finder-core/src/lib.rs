//! Core library for the finder scoring engine: fetches wallet-attributed
//! predictions, samples and judges them with an LLM oracle, converts
//! verdicts into penalized population-normalized scores, blends quality
//! with submission volume and derives integer ledger weights.

pub mod config;
pub mod engine;
pub mod errors;
pub mod judge;
pub mod model;
pub mod providers;
pub mod report;
pub mod retry;
pub mod sampler;
pub mod scoring;
pub mod storage;
pub mod validator;
pub mod volume;
