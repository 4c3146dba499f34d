//! Versioned binary snapshots.
//!
//! A checkpoint file is a `u32` format version followed by the
//! implementor's snapshot, both in a fixed-int little-endian bincode
//! encoding. The version is checked before the payload is decoded.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::HashError;

/// Failure to write or restore a checkpoint.
#[derive(Debug)]
pub enum CheckpointError {
    Io(std::io::Error),
    /// The payload could not be encoded or decoded
    Serialization(bincode::Error),
    /// The file was written by an incompatible format version
    VersionMismatch { expected: u32, found: u32 },
    /// The payload decoded but its parts disagree
    InvalidFormat(String),
    /// The stored parts do not assemble into a valid model
    Model(HashError),
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::Io(err) => write!(f, "checkpoint I/O failed: {err}"),
            CheckpointError::Serialization(err) => write!(f, "checkpoint codec failed: {err}"),
            CheckpointError::VersionMismatch { expected, found } => write!(
                f,
                "checkpoint format version {found} is not supported (expected {expected})"
            ),
            CheckpointError::InvalidFormat(msg) => write!(f, "inconsistent checkpoint: {msg}"),
            CheckpointError::Model(err) => write!(f, "checkpoint does not form a model: {err}"),
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<std::io::Error> for CheckpointError {
    fn from(err: std::io::Error) -> Self {
        CheckpointError::Io(err)
    }
}

impl From<bincode::Error> for CheckpointError {
    fn from(err: bincode::Error) -> Self {
        CheckpointError::Serialization(err)
    }
}

impl From<HashError> for CheckpointError {
    fn from(err: HashError) -> Self {
        CheckpointError::Model(err)
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_little_endian()
}

/// Types persisted through a serializable snapshot.
///
/// Implementors only convert to and from their snapshot; the provided
/// methods handle files, the codec and the version header.
pub trait Checkpointable: Sized {
    type Snapshot: Serialize + DeserializeOwned;

    /// Format version written into every file; bump on layout changes.
    const FORMAT_VERSION: u32;

    fn to_snapshot(&self) -> Self::Snapshot;

    fn from_snapshot(snapshot: Self::Snapshot) -> Result<Self, CheckpointError>;

    /// Writes the snapshot to `path`, creating parent directories.
    fn save_checkpoint<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        codec().serialize_into(&mut writer, &Self::FORMAT_VERSION)?;
        codec().serialize_into(&mut writer, &self.to_snapshot())?;
        writer.flush()?;
        Ok(())
    }

    fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        let mut reader = BufReader::new(File::open(path)?);
        let found: u32 = codec().deserialize_from(&mut reader)?;
        if found != Self::FORMAT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: Self::FORMAT_VERSION,
                found,
            });
        }
        let snapshot = codec().deserialize_from(&mut reader)?;
        Self::from_snapshot(snapshot)
    }
}
