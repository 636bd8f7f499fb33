//! Query-level rewriting: locating label blocks inside a raw query,
//! splicing an enforced selector into queries that have none, and building
//! pure-constraint selectors for the discovery endpoints.

pub mod endpoint;
pub mod scanner;
pub mod shape;
