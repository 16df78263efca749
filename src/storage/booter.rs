//! Booter - the `<path>.bt` file holding the schema root pointer.
//!
//! Updates go through a temporary file that is fsynced and then renamed
//! over the real one, so a reader sees either the old or the new contents.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::common::config::{file_path, BOOT_SUFFIX, BOOT_TMP_SUFFIX};
use crate::common::{Error, Result};

pub struct Booter {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl Booter {
    /// Create an empty boot file.
    ///
    /// # Errors
    /// `Error::FileExists` if the boot file is already there.
    pub fn create<P: AsRef<Path>>(prefix: P) -> Result<Self> {
        let booter = Self::paths(prefix.as_ref());
        booter.remove_bad_tmp()?;
        if booter.path.exists() {
            return Err(Error::FileExists(booter.path));
        }
        File::create(&booter.path)?.sync_all()?;
        Ok(booter)
    }

    /// Open an existing boot file.
    ///
    /// # Errors
    /// `Error::FileNotFound` if there is no boot file.
    pub fn open<P: AsRef<Path>>(prefix: P) -> Result<Self> {
        let booter = Self::paths(prefix.as_ref());
        booter.remove_bad_tmp()?;
        if !booter.path.exists() {
            return Err(Error::FileNotFound(booter.path));
        }
        Ok(booter)
    }

    /// Read the whole boot file.
    pub fn load(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// Atomically replace the boot file contents.
    pub fn update(&self, bytes: &[u8]) -> Result<()> {
        let mut tmp = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.tmp_path)?;
        tmp.write_all(bytes)?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&self.tmp_path, &self.path)?;
        Ok(())
    }

    fn paths(prefix: &Path) -> Self {
        Self {
            path: file_path(prefix, BOOT_SUFFIX),
            tmp_path: file_path(prefix, BOOT_TMP_SUFFIX),
        }
    }

    // A leftover tmp file is an update that never reached its rename.
    fn remove_bad_tmp(&self) -> Result<()> {
        if self.tmp_path.exists() {
            fs::remove_file(&self.tmp_path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_create_update_load() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("db");

        let booter = Booter::create(&prefix).unwrap();
        assert!(booter.load().unwrap().is_empty());

        booter.update(&42u64.to_le_bytes()).unwrap();
        assert_eq!(booter.load().unwrap(), 42u64.to_le_bytes());

        let reopened = Booter::open(&prefix).unwrap();
        assert_eq!(reopened.load().unwrap(), 42u64.to_le_bytes());
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("db");

        Booter::create(&prefix).unwrap();
        assert!(matches!(Booter::create(&prefix), Err(Error::FileExists(_))));
    }

    #[test]
    fn test_open_missing_fails() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            Booter::open(dir.path().join("db")),
            Err(Error::FileNotFound(_))
        ));
    }

    #[test]
    fn test_stale_tmp_is_discarded() {
        let dir = tempdir().unwrap();
        let prefix = dir.path().join("db");

        let booter = Booter::create(&prefix).unwrap();
        booter.update(b"good").unwrap();
        let tmp = file_path(&prefix, BOOT_TMP_SUFFIX);
        fs::write(&tmp, b"half-written").unwrap();

        let reopened = Booter::open(&prefix).unwrap();
        assert_eq!(reopened.load().unwrap(), b"good");
        assert!(!tmp.exists());
    }
}
