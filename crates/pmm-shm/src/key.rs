use std::fmt;
use std::str::FromStr;

use rand::Rng;

use crate::error::ShmError;

/// Prefix shared by every key generated by [`BufferKey::unique`].
pub const KEY_PREFIX: &str = "pmm";

/// Textual identifier of a shared buffer.
///
/// Keys double as file names for the mmap backend, so they are restricted to
/// ASCII alphanumerics, `.`, `_` and `-`, and may not start with a dot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferKey(String);

impl BufferKey {
    /// Create a key from an arbitrary string, validating its characters.
    pub fn new(key: impl Into<String>) -> Result<Self, ShmError> {
        let key = key.into();
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'));
        if !valid {
            return Err(ShmError::InvalidKey(key));
        }
        Ok(BufferKey(key))
    }

    /// Generate a key unique to this run.
    ///
    /// The key combines the process id with a random nonce so concurrent runs
    /// (and repeated runs inside one process) never share a buffer:
    /// `pmm-<pid>-<nonce>-<role>`.
    pub fn unique(role: &str) -> Result<Self, ShmError> {
        let nonce: u32 = rand::thread_rng().gen();
        BufferKey::new(format!(
            "{}-{}-{:08x}-{}",
            KEY_PREFIX,
            std::process::id(),
            nonce,
            role
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BufferKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BufferKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for BufferKey {
    type Err = ShmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BufferKey::new(s)
    }
}

/// A created buffer: its key and exact size in bytes.
///
/// Handles carry no OS resources, so they can be cloned freely and
/// reconstructed in another process from the key and size alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferHandle {
    key: BufferKey,
    len: usize,
}

impl BufferHandle {
    pub fn new(key: BufferKey, len: usize) -> Self {
        BufferHandle { key, len }
    }

    pub fn key(&self) -> &BufferKey {
        &self.key
    }

    /// Size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
