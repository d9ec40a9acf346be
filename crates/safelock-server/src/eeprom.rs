//! File-backed persistent region.
//!
//! The whole region lives in one file. Writes land in a working copy; a
//! commit replaces the file atomically (write a sibling, then rename), so a
//! crash mid-commit leaves either the old or the new region, never a mix.
//! A missing file is an erased region.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use safelock_core::{
    Eeprom, StoreError,
    store::{ERASED, REGION_SIZE},
};
use tracing::{debug, info};

/// Persistent region stored in a host file.
#[derive(Debug)]
pub struct FileEeprom {
    path: PathBuf,
    working: Vec<u8>,
}

impl FileEeprom {
    /// Open the region at `path`, creating nothing until the first commit.
    ///
    /// Short files are padded with erased bytes and long ones truncated to
    /// the region size.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let mut working = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no persistent region yet, starting erased");
                Vec::new()
            },
            Err(err) => return Err(err.into()),
        };
        working.resize(REGION_SIZE, ERASED);

        Ok(Self { path, working })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>, StoreError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.working.len() => Ok(offset..end),
            _ => Err(StoreError::OutOfRange { offset, len, size: self.working.len() }),
        }
    }
}

impl Eeprom for FileEeprom {
    fn size(&self) -> usize {
        self.working.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.working[range]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        let range = self.range(offset, bytes.len())?;
        self.working[range].copy_from_slice(bytes);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let staging = self.staging_path();
        fs::write(&staging, &self.working)?;
        fs::rename(&staging, &self.path)?;
        debug!(path = %self.path.display(), "region committed");
        Ok(())
    }
}
