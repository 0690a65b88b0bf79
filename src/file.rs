use std::fs::OpenOptions;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Read-only access.
    Read,
    /// Read and write access. The file is created if it does not exist.
    Write,
}

/// A block-addressable byte store. All operations are positioned, so a
/// shared reference suffices and concurrent block access needs no file-wide
/// lock.
pub struct File {
    inner: std::fs::File,
    mode: FileMode,
}

impl File {
    pub fn open(path: impl AsRef<Path>, mode: FileMode) -> Result<Self> {
        let inner = match mode {
            FileMode::Read => OpenOptions::new().read(true).open(path)?,
            FileMode::Write => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .open(path)?,
        };
        Ok(Self { inner, mode })
    }

    /// An anonymous file that is deleted once the handle drops.
    pub fn temporary() -> Result<Self> {
        Ok(Self {
            inner: tempfile::tempfile()?,
            mode: FileMode::Write,
        })
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn size(&self) -> Result<u64> {
        Ok(self.inner.metadata()?.len())
    }

    pub fn resize(&self, new_size: u64) -> Result<()> {
        self.inner.set_len(new_size)?;
        Ok(())
    }

    pub fn read_block(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact_at(buf, offset)?;
        Ok(())
    }

    pub fn write_block(&self, buf: &[u8], offset: u64) -> Result<()> {
        self.inner.write_all_at(buf, offset)?;
        Ok(())
    }
}
