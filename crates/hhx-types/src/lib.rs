//! Foundation types for hhx.
//!
//! Every other hhx crate depends on `hhx-types`.
//!
//! # Key Types
//!
//! - [`Digest`] -- Content digest of a tracked file (BLAKE3, hex on the wire)
//! - [`ByteSize`] -- Human-readable byte count for summaries

pub mod digest;
pub mod error;
pub mod size;

pub use digest::Digest;
pub use error::TypeError;
pub use size::ByteSize;
