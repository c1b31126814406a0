//! The single source of truth for all test data.

pub mod asset;
pub mod corpus;
pub mod ner;
