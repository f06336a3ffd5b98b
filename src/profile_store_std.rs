//! Profile selection kept as a single byte in a file.

use std::io;
use std::path::PathBuf;

use crate::board::ProfileStore;

pub struct FileProfileStore {
    path: PathBuf,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProfileStore for FileProfileStore {
    type Error = io::Error;

    fn load(&mut self) -> Result<u8, Self::Error> {
        let bytes = std::fs::read(&self.path)?;
        // An empty file reads like erased flash
        Ok(bytes.first().copied().unwrap_or(u8::MAX))
    }

    fn save(&mut self, value: u8) -> Result<(), Self::Error> {
        std::fs::write(&self.path, [value])
    }
}
