//! smellcmp - compare LLM and static-analysis code smell findings
//!
//! The library exposes every stage of a comparison study:
//!
//! - [`chunker`] splits source files into line-bounded chunks under a token budget
//! - [`ai`] sends chunks to an LLM and enforces the four-field reply contract
//! - [`store`] persists one output file per chunk
//! - [`static_findings`] reads the static analyzer's JSON output
//! - [`normalize`] maps both vocabularies onto [`models::CanonicalCategory`]
//! - [`compare`] matches findings and computes agreement metrics
//! - [`reporters`] renders a [`compare::ComparisonResult`]

pub mod ai;
pub mod chunker;
pub mod cli;
pub mod compare;
pub mod config;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod reporters;
pub mod static_findings;
pub mod store;
