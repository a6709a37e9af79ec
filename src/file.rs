// File-backed slot: one JSON document per key

use crate::slot::Slot;
use eyre::{Context, Result, eyre};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Slot storing each key in `{dir}/{key}.json`
///
/// Writes go to a temporary file that is synced and then renamed over the
/// target, so a crash mid-write leaves the previous value intact.
pub struct FileSlot {
    base_path: PathBuf,
}

impl FileSlot {
    /// Open or create a slot directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let base_path = dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).context("Failed to create store directory")?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// File holding the value for `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        Self::validate_key(key)?;
        Ok(self.base_path.join(format!("{}.json", key)))
    }

    fn validate_key(key: &str) -> Result<()> {
        if key.is_empty() {
            return Err(eyre!("Slot key cannot be empty"));
        }
        if !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(eyre!("Invalid slot key: {} (must be ASCII alphanumeric with _/-)", key));
        }
        // ASCII only, so bytes and chars agree
        if key.len() > 64 {
            return Err(eyre!("Slot key too long: {} (max 64 chars)", key));
        }
        Ok(())
    }

    fn replace_file(tmp_path: &Path, path: &Path, value: &str) -> Result<()> {
        let mut file = fs::File::create(tmp_path).context("Failed to create temporary slot file")?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(tmp_path, path).context("Failed to replace slot file")?;
        Ok(())
    }
}

impl Slot for FileSlot {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let lock_path = self.base_path.join(format!("{}.lock", key));
        let tmp_path = self.base_path.join(format!("{}.json.tmp", key));

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .context("Failed to open lock file")?;
        lock.lock_exclusive().context("Failed to acquire file lock")?;

        if let Err(e) = Self::replace_file(&tmp_path, &path, value) {
            match fs::remove_file(&tmp_path) {
                Err(cleanup) if cleanup.kind() != ErrorKind::NotFound => {
                    warn!(path = ?tmp_path, error = ?cleanup, "Failed to remove temporary slot file");
                }
                _ => {}
            }
            return Err(e);
        }

        debug!(key, bytes = value.len(), "Wrote slot file");
        // Lock is released when `lock` is dropped
        Ok(())
    }
}
