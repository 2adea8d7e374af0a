//! Content hashing for hhx.
//!
//! Provides domain-separated BLAKE3 hashing over byte slices, readers and
//! files. File hashing streams the content, so memory use does not grow with
//! file size.

pub mod hasher;

pub use hasher::{ContentHasher, HasherError, StreamingHasher};
