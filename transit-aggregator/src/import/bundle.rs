//! Unpacking downloaded bundles into payloads.

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;
use tracing::debug;

use super::error::UnpackError;
use crate::dataset::BundleFormat;

/// Largest buffer reserved up front from a zip entry's declared size.
///
/// The declared size comes from the archive header and isn't trusted;
/// larger entries still unpack, growing as they are read.
const MAX_PREALLOCATED_ENTRY: u64 = 16 * 1024 * 1024;

/// One file's worth of feed data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Entry name inside the bundle, or the dataset source for unbundled data.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Unpack `bytes` according to `format`.
///
/// `None` passes the bytes through, `Gzip` decompresses a single stream and
/// `Zip` yields one payload per file entry (directories are skipped).
pub fn unpack(format: BundleFormat, name: &str, bytes: Vec<u8>) -> Result<Vec<Payload>, UnpackError> {
    match format {
        BundleFormat::None => Ok(vec![Payload {
            name: name.to_string(),
            bytes,
        }]),
        BundleFormat::Gzip => {
            let mut decoder = GzDecoder::new(bytes.as_slice());
            let mut out = Vec::new();
            decoder.read_to_end(&mut out).map_err(UnpackError::Gzip)?;
            Ok(vec![Payload {
                name: name.trim_end_matches(".gz").to_string(),
                bytes: out,
            }])
        }
        BundleFormat::Zip => unpack_zip(bytes),
    }
}

fn unpack_zip(bytes: Vec<u8>) -> Result<Vec<Payload>, UnpackError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut payloads = Vec::with_capacity(archive.len());

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let mut data = Vec::with_capacity(capacity_hint(entry.size()));
        entry
            .read_to_end(&mut data)
            .map_err(|error| UnpackError::ZipEntry {
                name: name.clone(),
                error,
            })?;

        debug!(entry = %name, size = data.len(), "Unpacked zip entry");
        payloads.push(Payload { name, bytes: data });
    }

    Ok(payloads)
}

fn capacity_hint(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOCATED_ENTRY)).unwrap_or(0)
}
