//! Temporary-file registry for one extraction attempt.
//!
//! Every temp file created while producing a preview (a copied-down remote
//! source, an extracted preview payload) is registered in a [`TempFileSet`].
//! The set is drained exactly once per attempt — on success and on every
//! failure path alike — so no extraction can leak files into the temp
//! directory. Draining also happens on drop, which is what actually carries
//! the guarantee: the engine creates one set per attempt and lets scope end
//! do the cleanup.
//!
//! Temp names are unpredictable: a SHA-256 token over the source path, the
//! process id, a monotonic counter, and the current time. Concurrent attempts
//! share the temp directory safely on name uniqueness alone; no locking.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use std::{env, fs};
use tracing::warn;

static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Allocate a fresh path in the system temp directory.
///
/// The file is not created; callers create it themselves (and should register
/// it first, so a half-written file is still cleaned up).
pub fn unique_path(hint: &Path, extension: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    let mut hasher = Sha256::new();
    hasher.update(hint.as_os_str().as_encoded_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(NAME_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(nanos.to_le_bytes());
    let token = format!("{:x}", hasher.finalize());

    env::temp_dir().join(format!("rawpreview-{}.{}", &token[..24], extension))
}

/// Ordered set of temp paths owned by the current extraction attempt.
#[derive(Debug, Default)]
pub struct TempFileSet {
    paths: Vec<PathBuf>,
}

impl TempFileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path for cleanup. Registering the same path twice is a
    /// no-op; each path is deleted at most once.
    pub fn register(&mut self, path: PathBuf) {
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Delete every registered path and clear the set.
    ///
    /// Individual deletion failures are logged and skipped, never propagated:
    /// a file the external tool failed to create is not an error here.
    pub fn drain(&mut self) {
        for path in self.paths.drain(..) {
            if let Err(err) = fs::remove_file(&path) {
                if path.exists() {
                    warn!(path = %path.display(), %err, "failed to remove temp file");
                }
            }
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

impl Drop for TempFileSet {
    fn drop(&mut self) {
        self.drain();
    }
}
