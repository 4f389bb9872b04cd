//! # Backing Stores
//!
//! Two storage legs behind the gateway: a local per-page JSON cache
//! that is always reachable, and a [`RemoteStore`] seam for whatever
//! backend the host wires in. The remote is an external collaborator;
//! this crate only ever hands it an opaque payload string.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

/// Stable storage key for a document, derived from its path so maps
/// from different documents never collide. `/products/summer.html` →
/// `products-summer`; an empty or root path → `index`.
pub fn page_identity(document_path: &str) -> String {
    let trimmed = document_path.trim().trim_matches('/');
    // Only the final segment carries an extension; directory names may
    // have dots of their own (`/v2.5/pricing`).
    let without_ext = match trimmed.rsplit_once('/') {
        Some((dirs, file)) => format!("{}/{}", dirs, strip_extension(file)),
        None => strip_extension(trimmed).to_string(),
    };

    let mut identity = String::new();
    for segment in without_ext.split('/').filter(|s| !s.is_empty()) {
        if !identity.is_empty() {
            identity.push('-');
        }
        for c in segment.chars() {
            if c.is_ascii_alphanumeric() {
                identity.push(c.to_ascii_lowercase());
            } else if !identity.ends_with('-') {
                identity.push('-');
            }
        }
    }
    let identity = identity.trim_matches('-').to_string();
    if identity.is_empty() {
        "index".to_string()
    } else {
        identity
    }
}

fn strip_extension(segment: &str) -> &str {
    segment
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(segment)
}

/// Per-page JSON files under a cache directory.
#[derive(Debug, Clone)]
pub struct LocalCache {
    dir: PathBuf,
}

impl LocalCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_for(&self, identity: &str) -> PathBuf {
        self.dir.join(format!("{}.json", identity))
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, identity: &str, payload: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.file_for(identity), payload)?;
        Ok(())
    }

    /// `Ok(None)` when no map has been cached for this page yet.
    pub fn read(&self, identity: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.file_for(identity)) {
            Ok(payload) => Ok(Some(payload)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Seam to the out-of-scope backend. Payloads are opaque strings.
pub trait RemoteStore {
    fn push(&mut self, identity: &str, payload: &str) -> Result<(), StoreError>;
    fn pull(&mut self, identity: &str) -> Result<Option<String>, StoreError>;
}

/// In-process remote, for tests and host embeddings without a backend.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    entries: HashMap<String, String>,
    fail_push: bool,
    fail_pull: bool,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remote whose pushes always fail, for degradation tests.
    pub fn failing_push() -> Self {
        Self {
            fail_push: true,
            ..Self::default()
        }
    }

    pub fn failing_pull() -> Self {
        Self {
            fail_pull: true,
            ..Self::default()
        }
    }

    pub fn entry(&self, identity: &str) -> Option<&str> {
        self.entries.get(identity).map(|s| s.as_str())
    }
}

impl RemoteStore for InMemoryRemote {
    fn push(&mut self, identity: &str, payload: &str) -> Result<(), StoreError> {
        if self.fail_push {
            return Err(StoreError::Unavailable("push rejected".to_string()));
        }
        self.entries.insert(identity.to_string(), payload.to_string());
        Ok(())
    }

    fn pull(&mut self, identity: &str) -> Result<Option<String>, StoreError> {
        if self.fail_pull {
            return Err(StoreError::Unavailable("pull rejected".to_string()));
        }
        Ok(self.entries.get(identity).cloned())
    }
}
