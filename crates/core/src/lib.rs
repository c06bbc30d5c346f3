//! `stockbook-core`: shared primitives for the stockbook workspace.
//!
//! This crate contains **pure** building blocks (identifiers, the
//! business-zone clock, domain errors) with no storage concerns.

pub mod clock;
pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{EntropySource, EntropyUnavailable, IdGenerator, OsEntropy, RecordId};
