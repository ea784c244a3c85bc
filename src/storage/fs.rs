use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::ObjectStore;
use crate::config::StoreConfig;
use crate::error::{Error, Result};

/// A file-backed object store: one flat directory, one file per object.
///
/// Put writes the payload to a hidden temp file, fsyncs it, then publishes
/// it with a hard link. Link creation fails if the target name exists, so
/// the link is simultaneously the atomicity and the exclusivity of
/// put-if-absent: readers only ever see complete objects, and exactly one
/// of two racing writers wins the name.
pub struct FileObjectStore {
    dir: PathBuf,
    write_buffer_size: usize,
}

impl FileObjectStore {
    /// Opens a store rooted at the given directory, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(StoreConfig::new(dir))
    }

    pub fn with_config(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.dir)?;
        Ok(Self {
            dir: config.dir,
            write_buffer_size: config.write_buffer_size,
        })
    }

    fn write_temp(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::with_capacity(self.write_buffer_size, file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }
}

impl ObjectStore for FileObjectStore {
    fn put_if_absent(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let target = self.dir.join(name);
        let temp = self.dir.join(format!(".tmp_{}", Uuid::new_v4()));

        if let Err(err) = self.write_temp(&temp, bytes) {
            // Never leave a partial blob behind.
            let _ = fs::remove_file(&temp);
            return Err(err);
        }

        let published = fs::hard_link(&temp, &target);
        let _ = fs::remove_file(&temp);
        match published {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                Err(Error::AlreadyExists(name.to_owned()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            // Hidden names are in-flight temp files, not objects.
            if name.starts_with('.') || !name.starts_with(prefix) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        match fs::read(self.dir.join(name)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(name.to_owned()))
            }
            Err(err) => Err(err.into()),
        }
    }
}
