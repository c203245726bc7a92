// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Archive Toolkit
//!
//! Product configurations are tar+gzip archives. To inject the provider
//! override the archive is decompressed into a seekable temporary tar file,
//! one entry is appended in place after the last existing entry, and the tar
//! is compressed again. Existing entries are never rewritten.
//!
//! # Usage
//!
//! ```ignore
//! let mut tar = archive::unzip_to_tar(&gz_bytes[..])?;
//! archive::append_entry(&mut tar, "provider_override.tf.json", &json)?;
//! let gz = archive::rezip(tar)?;
//! ```

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use thiserror::Error;

const BLOCK_SIZE: u64 = 512;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("archive is corrupt: {0}")]
    Corrupt(String),
}

/// Decompress a tar+gzip stream into a new temporary tar file positioned at
/// its start. Consumes the input.
pub fn unzip_to_tar<R: Read>(input: R) -> Result<File, ArchiveError> {
    let mut decoder = GzDecoder::new(input);
    let mut tar = tempfile::tempfile()?;
    io::copy(&mut decoder, &mut tar)?;
    tar.seek(SeekFrom::Start(0))?;
    Ok(tar)
}

/// Offset just past the last entry's data, rounded up to a block boundary.
fn end_of_entries(tar: &mut File) -> Result<u64, ArchiveError> {
    tar.seek(SeekFrom::Start(0))?;
    let mut end = 0u64;
    {
        let mut archive = tar::Archive::new(&mut *tar);
        let entries = archive
            .entries()
            .map_err(|e| ArchiveError::Corrupt(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| ArchiveError::Corrupt(e.to_string()))?;
            end = entry.raw_file_position() + entry.size();
        }
    }
    Ok(end.div_ceil(BLOCK_SIZE) * BLOCK_SIZE)
}

/// Append one regular-file entry to a tar file.
pub fn append_entry(tar: &mut File, name: &str, contents: &str) -> Result<(), ArchiveError> {
    let offset = end_of_entries(tar)?;
    tar.seek(SeekFrom::Start(offset))?;

    let mut header = tar::Header::new_gnu();
    header.set_size(contents.len() as u64);
    header.set_mode(0o644);
    header.set_entry_type(tar::EntryType::Regular);

    let mut builder = tar::Builder::new(&mut *tar);
    builder.append_data(&mut header, name, contents.as_bytes())?;
    builder.finish()?;
    drop(builder);

    tar.flush()?;
    tar.seek(SeekFrom::Start(0))?;
    Ok(())
}

/// Compress a tar file back to tar+gzip.
pub fn rezip(mut tar: File) -> Result<Vec<u8>, ArchiveError> {
    tar.seek(SeekFrom::Start(0))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    io::copy(&mut tar, &mut encoder)?;
    Ok(encoder.finish()?)
}

/// Decompress, append `name`, and recompress in one call.
pub fn inject_entry(archive: &[u8], name: &str, contents: &str) -> Result<Vec<u8>, ArchiveError> {
    let mut tar = unzip_to_tar(archive)?;
    append_entry(&mut tar, name, contents)?;
    rezip(tar)
}

/// Names and contents of every regular entry, in archive order.
pub fn read_entries(archive: &[u8]) -> Result<Vec<(String, Vec<u8>)>, ArchiveError> {
    let mut reader = tar::Archive::new(GzDecoder::new(archive));
    let mut entries = Vec::new();
    for entry in reader.entries().map_err(|e| ArchiveError::Corrupt(e.to_string()))? {
        let mut entry = entry.map_err(|e| ArchiveError::Corrupt(e.to_string()))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|e| ArchiveError::Corrupt(e.to_string()))?
            .to_string_lossy()
            .into_owned();
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        entries.push((name, data));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::build_archive;

    #[test]
    fn test_appended_entry_follows_originals() {
        let main_tf = b"resource \"null_resource\" \"x\" {}\n".to_vec();
        let exact_block = vec![b'a'; 512];
        let original = build_archive(&[("main.tf", main_tf.as_slice()), ("modules/block.bin", exact_block.as_slice())]);

        let modified = inject_entry(&original, "provider_override.tf.json", "{\"provider\":{}}").unwrap();
        let entries = read_entries(&modified).unwrap();

        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["main.tf", "modules/block.bin", "provider_override.tf.json"]);
        assert_eq!(entries[0].1, main_tf);
        assert_eq!(entries[1].1, exact_block);
        assert_eq!(entries[2].1, b"{\"provider\":{}}");
    }

    #[test]
    fn test_append_to_empty_archive() {
        let original = build_archive(&[]);
        let modified = inject_entry(&original, "only.txt", "hello").unwrap();
        let entries = read_entries(&modified).unwrap();
        assert_eq!(entries, vec![("only.txt".to_string(), b"hello".to_vec())]);
    }

    #[test]
    fn test_repeated_appends_keep_order() {
        let original = build_archive(&[("a.tf", b"a".as_slice())]);
        let mut tar = unzip_to_tar(&original[..]).unwrap();
        append_entry(&mut tar, "b.tf", "b").unwrap();
        append_entry(&mut tar, "c.tf", "cc").unwrap();
        let entries = read_entries(&rezip(tar).unwrap()).unwrap();
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a.tf", "b.tf", "c.tf"]);
    }

    #[test]
    fn test_garbage_input_is_an_error() {
        assert!(inject_entry(b"definitely not gzip", "x", "y").is_err());
    }
}
