use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use hhx_types::Digest;

/// Domain-separated, streaming BLAKE3 content hasher.
///
/// Each hasher carries a domain tag (e.g., `"hhx-file-v1"`) that is fed to
/// BLAKE3 ahead of the content. Digests computed under different tags never
/// compare equal.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher for tracked working-tree files.
    pub const FILE: Self = Self {
        domain: "hhx-file-v1",
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    fn start(&self) -> blake3::Hasher {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        hasher
    }

    /// Start an incremental digest, for content arriving in chunks.
    pub fn streaming(&self) -> StreamingHasher {
        StreamingHasher {
            inner: self.start(),
        }
    }

    /// Hash raw bytes with domain separation.
    pub fn hash(&self, data: &[u8]) -> Digest {
        let mut hasher = self.start();
        hasher.update(data);
        Digest::from_hash(*hasher.finalize().as_bytes())
    }

    /// Hash everything a reader yields, without buffering it whole.
    pub fn hash_reader<R: Read>(&self, mut reader: R) -> Result<Digest, HasherError> {
        let mut hasher = self.start();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Digest::from_hash(*hasher.finalize().as_bytes()))
    }

    /// Hash the content of the file at `path`.
    pub fn hash_file(&self, path: &Path) -> Result<Digest, HasherError> {
        let file = File::open(path)?;
        self.hash_reader(io::BufReader::new(file))
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }
}

/// Incremental form of [`ContentHasher`]; yields the same digest as hashing
/// the concatenated chunks in one call.
pub struct StreamingHasher {
    inner: blake3::Hasher,
}

impl StreamingHasher {
    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    pub fn finalize(&self) -> Digest {
        Digest::from_hash(*self.inner.finalize().as_bytes())
    }
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error)]
pub enum HasherError {
    #[error("I/O error while hashing: {0}")]
    Io(#[from] io::Error),
}
