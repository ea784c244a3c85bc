use std::path::PathBuf;

/// Configuration for the file-backed object store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding the objects.
    pub dir: PathBuf,

    /// Buffer size for object writes (default: 16KB).
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./emberdb"),
            write_buffer_size: 16 * 1024,
        }
    }
}

impl StoreConfig {
    /// Create a new config with the given directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Default::default()
        }
    }

    /// Set the write buffer size.
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }
}
