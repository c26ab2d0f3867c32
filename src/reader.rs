//! Consumed I/O contracts: document reading from candidate locations and
//! plain filesystem access.
//!
//! The physical byte transport (block devices, mount management) lives in
//! the platform layer and is out of scope here; these traits are the seam
//! the resolution strategies talk through, with thin local implementations
//! for the shipped binary and recording fakes in tests.

use std::io;
use std::path::Path;

/// Reads a fixed set of files from one candidate location.
///
/// Returned payloads match the order of `file_names`. Any error means "this
/// location could not be used", not "the environment is broken" — callers
/// move on to the next candidate.
pub trait DiskReader {
    fn read_files(&self, location: &str, file_names: &[&str]) -> io::Result<Vec<Vec<u8>>>;
}

/// Plain file access for the file-based strategy. `read` must surface a
/// distinguishable not-found condition (`io::ErrorKind::NotFound`).
pub trait FileSystem {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
    fn exists(&self, path: &Path) -> bool;
}

// ── local implementations ─────────────────────────────────

/// Reads documents from an already-mounted config drive directory.
pub struct MountedDiskReader;

impl DiskReader for MountedDiskReader {
    fn read_files(&self, location: &str, file_names: &[&str]) -> io::Result<Vec<Vec<u8>>> {
        let base = Path::new(location);
        let mut payloads = Vec::with_capacity(file_names.len());
        for name in file_names {
            payloads.push(std::fs::read(base.join(name))?);
        }
        Ok(payloads)
    }
}

pub struct LocalFs;

impl FileSystem for LocalFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
