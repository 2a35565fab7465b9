//! Token validation against the hash file written by the token issuance tool.
//!
//! Each line of the file is `identifier:sha256hex`. Only the hashes are kept;
//! plaintext tokens never touch the disk or the log.

use crate::utils::error::LoadError;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

/// SHA-256 of `token || salt`, lowercase hex.
pub fn hash_token(token: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Immutable set of token digests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenHashSet {
    hashes: HashSet<String>,
}

impl TokenHashSet {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| read_error(path, source))?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut hashes = HashSet::new();

        for (idx, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match line.split_once(':') {
                Some((_, hash)) if !hash.trim().is_empty() => {
                    hashes.insert(hash.trim().to_ascii_lowercase());
                }
                _ => {
                    tracing::warn!(line = idx + 1, "Skipping malformed token file entry");
                }
            }
        }

        Self { hashes }
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.hashes.contains(digest)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

fn read_error(path: &Path, source: std::io::Error) -> LoadError {
    let path = path.display().to_string();
    if source.kind() == ErrorKind::NotFound {
        LoadError::NotFound { path }
    } else {
        LoadError::Io { path, source }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenOptions {
    /// Appended to every token before hashing.
    pub salt: String,
    /// Re-read the file when its modification time changes.
    pub watch: bool,
}

#[derive(Debug)]
struct Snapshot {
    hashes: Arc<TokenHashSet>,
    modified: Option<SystemTime>,
}

#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    options: TokenOptions,
    current: RwLock<Snapshot>,
}

impl TokenStore {
    /// Load the hash file. A missing file is fatal for the daemon: no token
    /// could ever validate.
    pub fn load<P: AsRef<Path>>(path: P, options: TokenOptions) -> Result<Self, LoadError> {
        let path = path.as_ref().to_path_buf();
        let modified = modified_time(&path);
        let hashes = TokenHashSet::load(&path)?;

        tracing::info!(
            path = %path.display(),
            tokens = hashes.len(),
            watch = options.watch,
            "Loaded token hashes"
        );
        if hashes.is_empty() {
            tracing::warn!("Token file contains no hashes, gated actions will always be refused");
        }

        Ok(Self {
            path,
            options,
            current: RwLock::new(Snapshot {
                hashes: Arc::new(hashes),
                modified,
            }),
        })
    }

    pub fn is_valid(&self, token: &str) -> bool {
        if token.is_empty() {
            return false;
        }
        if self.options.watch {
            self.refresh_if_changed();
        }

        let digest = hash_token(token, &self.options.salt);
        let valid = self.hashes().contains(&digest);
        if valid {
            tracing::info!("Token accepted");
        } else {
            tracing::info!("Token rejected");
        }
        valid
    }

    pub fn hashes(&self) -> Arc<TokenHashSet> {
        let snapshot = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&snapshot.hashes)
    }

    /// Swap in a freshly read set when the file changed on disk. A failed
    /// read keeps the previous set.
    pub fn refresh_if_changed(&self) -> bool {
        let modified = modified_time(&self.path);
        {
            let snapshot = self.current.read().unwrap_or_else(PoisonError::into_inner);
            if modified.is_none() || snapshot.modified == modified {
                return false;
            }
        }

        match TokenHashSet::load(&self.path) {
            Ok(hashes) => {
                tracing::info!(
                    path = %self.path.display(),
                    tokens = hashes.len(),
                    "Token file changed, reloaded hashes"
                );
                let mut snapshot = self.current.write().unwrap_or_else(PoisonError::into_inner);
                *snapshot = Snapshot {
                    hashes: Arc::new(hashes),
                    modified,
                };
                true
            }
            Err(e) => {
                tracing::error!("Failed to reload token file, keeping previous hashes: {}", e);
                false
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABC123: &str = "6ca13d52ca70c883e0f0bb101e425a89e8624de51db2d2392593af6a84118090";

    #[test]
    fn test_hash_token_matches_sha256() {
        assert_eq!(hash_token("abc123", ""), ABC123);
        assert_ne!(hash_token("abc123", "pepper"), ABC123);
    }

    #[test]
    fn test_parse_discards_identifiers() {
        let set = TokenHashSet::parse(&format!("alice@example.org:{}\n", ABC123));
        assert_eq!(set.len(), 1);
        assert!(set.contains(ABC123));
        assert!(!set.contains("alice@example.org"));
    }

    #[test]
    fn test_parse_trims_and_lowercases() {
        let upper = ABC123.to_ascii_uppercase();
        let set = TokenHashSet::parse(&format!("bob:{}  \r\n\n", upper));
        assert!(set.contains(ABC123));
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let set = TokenHashSet::parse("no-colon-here\ncarol:\n\n   \ndave:deadbeef\n");
        assert_eq!(set.len(), 1);
        assert!(set.contains("deadbeef"));
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = TokenHashSet::load("/nonexistent/sphincter/hashes").unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
    }
}
