//! REST API client module for the graph-storage service.
//!
//! This module provides the `ApiClient` for issuing partition-aware,
//! authenticated calls, plus the pieces it is built from:
//! `RequestEnvelope` validation, the raw `Transport`, and `ApiError`.

pub mod client;
pub mod envelope;
pub mod error;
pub mod transport;

pub use client::ApiClient;
pub use envelope::{Partition, RequestEnvelope, PARTITION_HEADER};
pub use error::ApiError;
pub use transport::{ResponseOutcome, Transport};
