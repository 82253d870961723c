use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Blob storage collaborator. Keys follow the inspection namespace
/// (`uploads/{id}/{filename}`, `reports/{id}/report.pdf|txt`); locators are
/// retrievable links with a caller-chosen lifetime (ignored by stores that
/// have no expiry concept).
pub trait BlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;

    fn get(&self, key: &str) -> Result<Vec<u8>>;

    fn locator(&self, key: &str, ttl_seconds: u64) -> Result<String>;
}

/// Filesystem-backed store rooted at one storage directory, returning
/// `file://` locators. Presigned-URL stores (S3 and friends) plug in
/// behind the same trait.
#[derive(Debug, Clone)]
pub struct LocalStore {
    base_dir: PathBuf,
}

impl LocalStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn full_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if relative.components().any(|component| {
            !matches!(component, Component::Normal(_))
        }) {
            bail!("invalid object key: {key}");
        }
        Ok(self.base_dir.join(relative))
    }
}

impl BlobStore for LocalStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.full_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes).with_context(|| format!("writing object {key}"))?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.full_path(key)?;
        fs::read(&path).with_context(|| format!("reading object {key}"))
    }

    fn locator(&self, key: &str, _ttl_seconds: u64) -> Result<String> {
        let path = self.full_path(key)?;
        let absolute = fs::canonicalize(&path)
            .with_context(|| format!("no stored object for key {key}"))?;
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_round_trip_under_namespaced_key() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = LocalStore::new(temp.path());

        store.put("uploads/insp-1/front.jpg", b"jpeg bytes")?;
        assert_eq!(store.get("uploads/insp-1/front.jpg")?, b"jpeg bytes");
        Ok(())
    }

    #[test]
    fn locator_points_at_stored_file() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let store = LocalStore::new(temp.path());
        store.put("reports/insp-1/report.txt", b"laudo")?;

        let locator = store.locator("reports/insp-1/report.txt", 3600)?;
        assert!(locator.starts_with("file://"));
        assert!(locator.ends_with("report.txt"));
        Ok(())
    }

    #[test]
    fn missing_object_fails_for_get_and_locator() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp.path());
        assert!(store.get("uploads/none/missing.jpg").is_err());
        assert!(store.locator("uploads/none/missing.jpg", 60).is_err());
    }

    #[test]
    fn traversal_keys_are_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(temp.path());
        assert!(store.put("../outside.txt", b"x").is_err());
        assert!(store.put("/absolute.txt", b"x").is_err());
    }
}
