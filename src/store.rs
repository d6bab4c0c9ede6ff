//! Persistence of the file index
//!
//! The index lives in a single gzip-compressed JSON array of URL strings.
//! Writes go to a temporary file in the target directory which is then
//! renamed over the old file, so readers only ever see a complete index.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::index::Index;

/// Default file name of the persisted index
pub const INDEX_FILE: &str = "index.json.gz";

/// Reads and writes the persisted index at a fixed path
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Compressed size of the index file, if present
    pub fn size_bytes(&self) -> Option<u64> {
        std::fs::metadata(&self.path).ok().map(|m| m.len())
    }

    /// Load the persisted index
    ///
    /// Never crawls: a missing file is reported as `IndexNotFound` and an
    /// unreadable one as `IndexCorrupt`.
    pub fn load(&self) -> Result<Index> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::IndexNotFound { path: self.path.clone() });
            }
            Err(e) => return Err(self.corrupt(e.to_string())),
        };

        let reader = BufReader::new(GzDecoder::new(file));
        let index: Index =
            serde_json::from_reader(reader).map_err(|e| self.corrupt(e.to_string()))?;
        index.validate().map_err(|reason| self.corrupt(reason))?;

        log::info!("Loaded {} index entries from {:?}", index.len(), self.path);
        Ok(index)
    }

    /// Replace the persisted index with `index`
    pub fn save(&self, index: &Index) -> Result<()> {
        write_atomic(&self.path, |writer| {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            serde_json::to_writer(&mut encoder, index)?;
            encoder.finish()?;
            Ok(())
        })
        .map_err(|source| Error::Persist { path: self.path.clone(), source })?;

        log::info!("Saved {} index entries to {:?}", index.len(), self.path);
        Ok(())
    }

    /// Delete the persisted index; returns whether a file was removed
    pub fn clear(&self) -> Result<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                log::info!("Removed index file {:?}", self.path);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(Error::Persist { path: self.path.clone(), source }),
        }
    }

    fn corrupt(&self, reason: String) -> Error {
        log::warn!("Index at {:?} is unreadable: {}", self.path, reason);
        Error::IndexCorrupt { path: self.path.clone(), reason }
    }
}

/// Write a file through a sibling temp file and rename it into place
///
/// The previous file at `path` is left untouched if `write` or the rename
/// fails.
pub(crate) fn write_atomic<F>(path: &Path, write: F) -> io::Result<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let temp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(temp.as_file());
        write(&mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
