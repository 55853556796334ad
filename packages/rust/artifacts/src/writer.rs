//! Atomic file writes with checksums.

use std::path::Path;

use feedgen_shared::{FeedgenError, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Metadata for a single written artifact file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactMeta {
    pub filename: String,
    pub sha256: String,
    pub size_bytes: usize,
}

/// Write `content` to `path` via a sibling temp file and rename.
///
/// Parent directories are created as needed. Readers never observe a
/// partially written file.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<ArtifactMeta> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| FeedgenError::validation(format!("not a file path: {}", path.display())))?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::path::PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| FeedgenError::io(&dir, e))?;

    let temp = dir.join(format!(".{file_name}.tmp"));

    // Write to temp file first
    if let Err(e) = std::fs::write(&temp, content) {
        let _ = std::fs::remove_file(&temp);
        return Err(FeedgenError::io(&temp, e));
    }

    // Atomic rename
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(FeedgenError::io(path, e));
    }

    debug!(path = %path.display(), size = content.len(), "wrote artifact");

    Ok(ArtifactMeta {
        filename: path.display().to_string(),
        sha256: sha256_hex(content),
        size_bytes: content.len(),
    })
}

/// Pretty-print `data` as JSON with a trailing newline and write it atomically.
pub fn write_json<T: Serialize>(path: &Path, data: &T) -> Result<ArtifactMeta> {
    let json = to_pretty_json(data)?;
    write_atomic(path, json.as_bytes())
}

pub(crate) fn to_pretty_json<T: Serialize>(data: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(data)
        .map_err(|e| FeedgenError::validation(format!("JSON serialization failed: {e}")))?;
    json.push('\n');
    Ok(json)
}

/// Lowercase hex SHA-256 of `content`.
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    pub fn temp_dir(prefix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("{prefix}-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_dir;
    use super::*;

    #[test]
    fn write_atomic_creates_parents_and_checksums() {
        let root = temp_dir("fg-writer-test");
        let path = root.join("nested/out/feeds.json");

        let meta = write_atomic(&path, b"hello").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
        assert_eq!(meta.size_bytes, 5);
        assert_eq!(
            meta.sha256,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(!root.join("nested/out/.feeds.json.tmp").exists());

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn write_atomic_overwrites() {
        let root = temp_dir("fg-writer-test");
        let path = root.join("a.txt");

        write_atomic(&path, b"first version").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");

        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn json_has_trailing_newline() {
        let json = to_pretty_json(&serde_json::json!({"a": 1})).unwrap();
        assert_eq!(json, "{\n  \"a\": 1\n}\n");
    }
}
