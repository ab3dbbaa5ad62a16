//! Reader for the Bethesda BSA archive format used by Arena's `GLOBAL.BSA`.
//!
//! The archive starts with a `u16` entry count, followed immediately by the
//! packed entry payloads. The directory lives at the end of the file as
//! `count` 18-byte records: a 12-byte NUL-padded name, a `u16` compressed
//! flag, and a `u32` payload size. Entry offsets are reconstructed by
//! accumulating sizes from the end of the header.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::{ArenaError, Result};

const HEADER_SIZE: u64 = 2;
const RECORD_SIZE: usize = 18;
const NAME_FIELD_SIZE: usize = 12;

#[derive(Debug, Clone, Copy)]
struct Entry {
    start: u64,
    end: u64,
}

/// Read-only view of a BSA archive. The directory is parsed up front; entry
/// payloads are read from disk on demand.
#[derive(Debug)]
pub struct BsaArchive {
    path: PathBuf,
    // Sorted by name for binary-search lookup. Duplicate directory records
    // collapse to the last occurrence.
    lookup: Vec<(String, Entry)>,
}

impl BsaArchive {
    /// Opens an archive and parses its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let count = u16::from_le_bytes(header) as usize;

        let directory_len = (count * RECORD_SIZE) as u64;
        let directory_start = file_len
            .checked_sub(directory_len)
            .filter(|&start| start >= HEADER_SIZE || count == 0)
            .ok_or_else(|| {
                ArenaError::malformed(path, format!("directory of {count} entries does not fit"))
            })?;

        file.seek(SeekFrom::Start(directory_start))?;
        let mut directory = vec![0u8; directory_len as usize];
        file.read_exact(&mut directory)?;

        let mut lookup: Vec<(String, Entry)> = Vec::with_capacity(count);
        let mut start = HEADER_SIZE;
        for record in directory.chunks_exact(RECORD_SIZE) {
            let name: String = record[..NAME_FIELD_SIZE]
                .iter()
                .take_while(|&&byte| byte != 0)
                .map(|&byte| if byte == b'\\' { '/' } else { byte as char })
                .collect();

            let compressed = u16::from_le_bytes([record[12], record[13]]);
            if compressed != 0 {
                return Err(ArenaError::unsupported(path, "compressed archive entries"));
            }

            let size = u32::from_le_bytes([record[14], record[15], record[16], record[17]]);
            let entry = Entry {
                start,
                end: start + u64::from(size),
            };
            start = entry.end;

            match lookup.binary_search_by(|(existing, _)| existing.as_str().cmp(&name)) {
                Ok(index) => lookup[index].1 = entry,
                Err(index) => lookup.insert(index, (name, entry)),
            }
        }

        if start > directory_start {
            return Err(ArenaError::malformed(
                path,
                "entry payloads overlap the directory",
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            lookup,
        })
    }

    /// Returns true if the archive contains an entry with this exact name.
    pub fn exists(&self, name: &str) -> bool {
        self.lookup
            .binary_search_by(|(existing, _)| existing.as_str().cmp(name))
            .is_ok()
    }

    /// Reads the payload of the named entry.
    pub fn open(&self, name: &str) -> Result<Vec<u8>> {
        let index = self
            .lookup
            .binary_search_by(|(existing, _)| existing.as_str().cmp(name))
            .map_err(|_| ArenaError::NotFound(name.to_string()))?;
        let entry = self.lookup[index].1;

        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(entry.start))?;
        let mut payload = vec![0u8; (entry.end - entry.start) as usize];
        file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Iterates over the entry names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.lookup.iter().map(|(name, _)| name.as_str())
    }

    /// Returns the number of distinct entries.
    pub fn len(&self) -> usize {
        self.lookup.len()
    }

    /// Returns true if the archive has no entries.
    pub fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds an in-memory archive image from (name, payload) pairs.
    pub(crate) fn build_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut image = (entries.len() as u16).to_le_bytes().to_vec();
        for (_, payload) in entries {
            image.extend_from_slice(payload);
        }
        for (name, payload) in entries {
            let mut name_field = [0u8; NAME_FIELD_SIZE];
            name_field[..name.len()].copy_from_slice(name.as_bytes());
            image.extend_from_slice(&name_field);
            image.extend_from_slice(&0u16.to_le_bytes());
            image.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        }
        image
    }

    fn write_archive(entries: &[(&str, &[u8])]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GLOBAL.BSA");
        std::fs::write(&path, build_archive(entries)).unwrap();
        (dir, path)
    }

    #[test]
    fn loads_directory_and_reads_entries() {
        let (_dir, path) = write_archive(&[("FOO.TXT", b"AAA"), ("BAR.TXT", b"BB")]);
        let archive = BsaArchive::load(&path).unwrap();

        assert_eq!(archive.len(), 2);
        assert!(archive.exists("FOO.TXT"));
        assert!(archive.exists("BAR.TXT"));
        assert!(!archive.exists("MISSING.TXT"));

        assert_eq!(archive.open("FOO.TXT").unwrap(), b"AAA");
        assert_eq!(archive.open("BAR.TXT").unwrap(), b"BB");

        // Names come back sorted.
        let names: Vec<_> = archive.names().collect();
        assert_eq!(names, vec!["BAR.TXT", "FOO.TXT"]);
    }

    #[test]
    fn normalizes_backslashes_in_names() {
        let (_dir, path) = write_archive(&[("SUB\\A.DAT", b"x")]);
        let archive = BsaArchive::load(&path).unwrap();
        assert!(archive.exists("SUB/A.DAT"));
    }

    #[test]
    fn missing_entry_is_not_found() {
        let (_dir, path) = write_archive(&[("FOO.TXT", b"AAA")]);
        let archive = BsaArchive::load(&path).unwrap();
        assert!(matches!(
            archive.open("NOPE.TXT"),
            Err(ArenaError::NotFound(name)) if name == "NOPE.TXT"
        ));
    }

    #[test]
    fn rejects_compressed_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GLOBAL.BSA");
        let mut image = build_archive(&[("FOO.TXT", b"AAA")]);
        // Flip the compressed flag in the only directory record.
        let flag_offset = image.len() - 6;
        image[flag_offset] = 1;
        std::fs::write(&path, image).unwrap();

        assert!(matches!(
            BsaArchive::load(&path),
            Err(ArenaError::UnsupportedEncoding { .. })
        ));
    }

    #[test]
    fn rejects_truncated_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GLOBAL.BSA");
        // Claims 200 entries but has no directory.
        std::fs::write(&path, 200u16.to_le_bytes()).unwrap();
        assert!(matches!(
            BsaArchive::load(&path),
            Err(ArenaError::Malformed { .. })
        ));
    }
}
