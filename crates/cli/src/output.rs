use anyhow::{Context, Result};
use nomap_protocol::to_output_json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of a file read or written by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDigest {
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

impl FileDigest {
    pub fn of(path: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            path: path.into(),
            sha256: sha256_hex(bytes),
            bytes: bytes.len() as u64,
        }
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// A fully serialized output waiting to be written.
pub struct PendingOutput {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

impl PendingOutput {
    pub fn json<T: Serialize>(path: &Path, value: &T) -> Result<Self> {
        let bytes = to_output_json(value)
            .with_context(|| format!("Failed to serialize {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    pub fn text(path: &Path, text: String) -> Self {
        Self {
            path: path.to_path_buf(),
            bytes: text.into_bytes(),
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, bytes).with_context(|| format!("Failed to write {}", tmp.display()))?;
    Ok(tmp)
}

fn publish(tmp: &Path, path: &Path) -> Result<()> {
    std::fs::rename(tmp, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))
}

/// Write `bytes` next to `path` and rename over it, so readers never see a partial file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = stage(path, bytes)?;
    publish(&tmp, path)
}

/// Write every output. All `.tmp` files are staged before the first rename; if any of them
/// fails, the staged files are removed and existing outputs stay as they were.
pub fn commit(outputs: &[PendingOutput]) -> Result<Vec<FileDigest>> {
    let mut staged = Vec::with_capacity(outputs.len());
    for output in outputs {
        match stage(&output.path, &output.bytes) {
            Ok(tmp) => staged.push(tmp),
            Err(err) => {
                for tmp in &staged {
                    if let Err(cleanup) = std::fs::remove_file(tmp) {
                        log::warn!("failed to remove {}: {cleanup}", tmp.display());
                    }
                }
                return Err(err);
            }
        }
    }

    let mut written = Vec::with_capacity(outputs.len());
    for (output, tmp) in outputs.iter().zip(&staged) {
        publish(tmp, &output.path)?;
        log::info!(
            "wrote {} ({} bytes)",
            output.path.display(),
            output.bytes.len()
        );
        let name = output
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| output.path.display().to_string());
        written.push(FileDigest::of(name, &output.bytes));
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_tmp() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_atomic(&path, b"one").unwrap();
        write_atomic(&path, b"two").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"two");
        assert!(!dir.path().join("nested/out.json.tmp").exists());
    }

    #[test]
    fn commit_reports_file_names_and_digests() {
        let dir = tempdir().unwrap();
        let outputs = vec![
            PendingOutput::json(&dir.path().join("a.json"), &serde_json::json!({"k": 1}))
                .unwrap(),
            PendingOutput::text(&dir.path().join("b.md"), "# b\n".to_string()),
        ];
        let digests = commit(&outputs).unwrap();
        assert_eq!(digests.len(), 2);
        assert_eq!(digests[0].path, "a.json");
        assert_eq!(digests[1].bytes, 4);
        assert_eq!(digests[1].sha256, sha256_hex(b"# b\n"));
    }

    #[test]
    fn failed_commit_leaves_previous_outputs_untouched() {
        let dir = tempdir().unwrap();
        let kept = dir.path().join("a.json");
        std::fs::write(&kept, b"old").unwrap();
        // A plain file where a directory is needed makes the second output unwritable.
        std::fs::write(dir.path().join("blocker"), b"").unwrap();

        let outputs = vec![
            PendingOutput::text(&kept, "new".to_string()),
            PendingOutput::text(&dir.path().join("blocker/b.md"), "b".to_string()),
        ];
        assert!(commit(&outputs).is_err());

        assert_eq!(std::fs::read(&kept).unwrap(), b"old");
        assert!(!dir.path().join("a.json.tmp").exists());
    }
}
