use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::range::CellRange;
use crate::store::{MemoryWorkbook, RangeUpdate, SheetStore, StoreError};

pub fn save_workbook(book: &MemoryWorkbook, path: impl AsRef<Path>) -> Result<(), StoreError> {
    let path = path.as_ref();
    // Write beside the target, then rename over it.
    let tmp = path.with_extension("tmp");
    {
        let file = File::create(&tmp)?;
        let encoder = GzEncoder::new(file, Compression::default());
        let mut writer = std::io::BufWriter::new(encoder);
        serialize_into(&mut writer, book)?;
        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

pub fn load_workbook(path: impl AsRef<Path>) -> Result<MemoryWorkbook, StoreError> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(file);
    let mut reader = std::io::BufReader::new(decoder);

    let book: MemoryWorkbook = deserialize_from(&mut reader)?;
    Ok(book)
}

/// A [`MemoryWorkbook`] mirrored to a gzip-compressed file after every change.
pub struct FileWorkbook {
    path: PathBuf,
    book: MemoryWorkbook,
}

impl FileWorkbook {
    /// Open the workbook at `path`, or start an empty one if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let book = if path.exists() {
            debug!("loading workbook from {}", path.display());
            load_workbook(&path)?
        } else {
            debug!("no workbook at {}, starting empty", path.display());
            MemoryWorkbook::new()
        };
        Ok(FileWorkbook { path, book })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), StoreError> {
        save_workbook(&self.book, &self.path)
    }
}

impl SheetStore for FileWorkbook {
    fn worksheet_titles(&self) -> Result<Vec<String>, StoreError> {
        self.book.worksheet_titles()
    }

    fn add_worksheet(&mut self, title: &str, rows: u32, cols: u32) -> Result<(), StoreError> {
        self.book.add_worksheet(title, rows, cols)?;
        self.persist()
    }

    fn read_range(&self, title: &str, range: &CellRange) -> Result<Vec<Vec<String>>, StoreError> {
        self.book.read_range(title, range)
    }

    fn write_range(
        &mut self,
        title: &str,
        range: &CellRange,
        values: &[Vec<String>],
    ) -> Result<(), StoreError> {
        self.book.write_range(title, range, values)?;
        self.persist()
    }

    fn clear_range(&mut self, title: &str, range: &CellRange) -> Result<(), StoreError> {
        self.book.clear_range(title, range)?;
        self.persist()
    }

    fn batch_update(&mut self, title: &str, updates: &[RangeUpdate]) -> Result<(), StoreError> {
        self.book.batch_update(title, updates)?;
        self.persist()
    }
}
