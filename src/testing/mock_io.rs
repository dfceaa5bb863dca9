//! Mock I/O helpers backed by temporary files.
//!
//! A worker's output stream can be replayed from a file written by
//! [`mock_result_stream`], and [`file_sinks`] gives a router real files to
//! write to.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::{NamedTempFile, TempDir};

/// A temporary file that is deleted when dropped.
pub struct TempFilePath {
    #[allow(dead_code)]
    temp_file: NamedTempFile,
    path: PathBuf,
}

impl TempFilePath {
    /// Create a new temporary file.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_file = NamedTempFile::new()?;
        let path = temp_file.path().to_path_buf();
        Ok(Self { temp_file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file for reading from the start.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(&self) -> std::io::Result<File> {
        File::open(&self.path)
    }
}

/// A temporary directory that is deleted, with its contents, when dropped.
pub struct TempDirPath {
    #[allow(dead_code)]
    temp_dir: TempDir,
    path: PathBuf,
}

impl TempDirPath {
    /// Create a new temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory cannot be created.
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().to_path_buf();
        Ok(Self { temp_dir, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path for `filename` inside this directory.
    #[must_use]
    pub fn file_path(&self, filename: &str) -> PathBuf {
        self.path.join(filename)
    }
}

/// Write `docs` as a worker output stream: each document serialized as JSON
/// and terminated by `separator`.
///
/// # Errors
///
/// Returns an error if the file cannot be created or a document cannot be
/// serialized.
///
/// # Example
///
/// ```
/// use jobflow::decoder::StreamingResultDecoder;
/// use jobflow::testing::mock_result_stream;
/// use serde_json::json;
///
/// let stream = mock_result_stream(&[json!({"a": 1}), json!({"b": 2})], b'\n').unwrap();
/// let decoder: StreamingResultDecoder<_> = StreamingResultDecoder::new(stream.open().unwrap());
/// assert_eq!(decoder.count(), 2);
/// ```
pub fn mock_result_stream<T: Serialize>(docs: &[T], separator: u8) -> std::io::Result<TempFilePath> {
    let temp = TempFilePath::new()?;
    let mut file = File::create(temp.path())?;
    for doc in docs {
        serde_json::to_writer(&mut file, doc)?;
        file.write_all(&[separator])?;
    }
    file.flush()?;
    Ok(temp)
}

/// Create `count` empty files named `route-<i>` in `dir` and open them as
/// sinks, in route order.
///
/// # Errors
///
/// Returns an error if a file cannot be created.
pub fn file_sinks(dir: &TempDirPath, count: usize) -> std::io::Result<Vec<File>> {
    (0..count)
        .map(|i| File::create(route_file(dir, i)))
        .collect()
}

/// Path of the file [`file_sinks`] created for `route`.
#[must_use]
pub fn route_file(dir: &TempDirPath, route: usize) -> PathBuf {
    dir.file_path(&format!("route-{route}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_file_path() {
        let temp_dir = TempDirPath::new().unwrap();
        let file_path = temp_dir.file_path("test.txt");
        assert!(file_path.starts_with(temp_dir.path()));
        assert!(file_path.ends_with("test.txt"));
    }

    #[test]
    fn test_mock_result_stream_terminates_each_document() {
        let temp = mock_result_stream(&[1, 2], b';').unwrap();
        let contents = std::fs::read(temp.path()).unwrap();
        assert_eq!(contents, b"1;2;");
    }

    #[test]
    fn test_file_sinks_are_created_in_order() {
        let dir = TempDirPath::new().unwrap();
        let mut sinks = file_sinks(&dir, 2).unwrap();
        sinks[1].write_all(b"x").unwrap();
        assert_eq!(std::fs::read(route_file(&dir, 0)).unwrap(), b"");
        assert_eq!(std::fs::read(route_file(&dir, 1)).unwrap(), b"x");
    }
}
