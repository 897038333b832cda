//! File-backed flash image
//!
//! Offset 0 of the file is the application base address. Gaps left between
//! writes are filled with erased bytes so the image matches what a real
//! part would read back.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::info;
use udsboot_core::flash::ERASED_BYTE;
use udsboot_core::{ApplicationRegion, FlashDriver, FlashError};

#[derive(Debug)]
pub struct FileFlash {
    path: PathBuf,
    file: File,
    region: ApplicationRegion,
}

impl FileFlash {
    /// Open (or create) the image at `path`. Existing contents are kept.
    pub fn open(path: impl AsRef<Path>, region: ApplicationRegion) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        Ok(Self { path, file, region })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn pad_to(&mut self, offset: u64) -> io::Result<()> {
        let len = self.file.metadata()?.len();
        if len < offset {
            self.file.seek(SeekFrom::Start(len))?;
            io::copy(
                &mut io::repeat(ERASED_BYTE).take(offset - len),
                &mut self.file,
            )?;
        }
        Ok(())
    }
}

impl FlashDriver for FileFlash {
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        let in_region = u32::try_from(data.len())
            .map(|len| self.region.contains(address, len))
            .unwrap_or(false);
        if !in_region {
            return Err(FlashError::OutOfBounds {
                address,
                len: data.len(),
            });
        }

        let offset = u64::from(address - self.region.base_address);
        self.pad_to(offset)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        Ok(())
    }

    fn finalize(&mut self, address: u32, written: u32) -> Result<(), FlashError> {
        self.file.flush()?;
        self.file.sync_data()?;
        info!(
            path = %self.path.display(),
            address = format!("0x{:08X}", address),
            written,
            "Image committed"
        );
        Ok(())
    }
}
