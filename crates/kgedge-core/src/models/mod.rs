//! Data models for graph entities.
//!
//! - `Edge`: a directed, typed relationship with free-form properties
//! - `Graph`: the local edge list of one partition

pub mod edge;

pub use edge::{Edge, Graph, PARTITION_PROPERTY};
