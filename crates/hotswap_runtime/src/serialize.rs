//! Session snapshot serialization using `MessagePack`.
//!
//! Snapshots carry working memory, the clock, the active rule set, fired
//! counts and refraction memory, so a restored session neither loses
//! history nor re-fires rules against facts they already matched.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use hotswap_foundation::{Error, ErrorKind, Result};

use crate::session::SessionSnapshot;

/// Serializes a snapshot to bytes using `MessagePack` format.
///
/// Uses named serialization to preserve struct field names.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_bytes(snapshot: &SessionSnapshot) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(snapshot)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

/// Deserializes a snapshot from `MessagePack` bytes.
///
/// # Errors
///
/// Returns an error if deserialization fails.
pub fn from_bytes(bytes: &[u8]) -> Result<SessionSnapshot> {
    rmp_serde::from_slice(bytes)
        .map_err(|e| Error::new(ErrorKind::SerializationError(e.to_string())))
}

fn io_error(action: &str, path: &Path, e: &std::io::Error) -> Error {
    Error::new(ErrorKind::IoError(format!(
        "failed to {action} '{}': {e}",
        path.display()
    )))
}

/// Saves a snapshot to a file, creating or overwriting it.
///
/// # Errors
///
/// Returns an error if the file cannot be written or serialization fails.
pub fn save_to_file<P: AsRef<Path>>(snapshot: &SessionSnapshot, path: P) -> Result<()> {
    let path = path.as_ref();
    let bytes = to_bytes(snapshot)?;

    let file = File::create(path).map_err(|e| io_error("create file", path, &e))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&bytes)
        .map_err(|e| io_error("write to file", path, &e))?;
    writer
        .flush()
        .map_err(|e| io_error("flush file", path, &e))?;

    Ok(())
}

/// Loads a snapshot from a `MessagePack` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or deserialization fails.
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<SessionSnapshot> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| io_error("open file", path, &e))?;

    let mut bytes = Vec::new();
    BufReader::new(file)
        .read_to_end(&mut bytes)
        .map_err(|e| io_error("read file", path, &e))?;

    from_bytes(&bytes)
}
