//! Virtual filesystem over the game's data directories.
//!
//! Entries are resolved against an ordered list of data paths holding loose
//! files, with `GLOBAL.BSA` in the first registered path as the fallback for
//! anything not found on disk. Later-registered paths take precedence so user
//! overrides shadow the stock data.

mod bsa;
pub mod fnmatch;

use std::fs;
use std::path::{Path, PathBuf};

pub use bsa::BsaArchive;

use crate::{ArenaError, Result};

/// Name of the archive that backs every lookup miss.
pub const GLOBAL_BSA_NAME: &str = "GLOBAL.BSA";

#[derive(Debug)]
pub struct VfsManager {
    data_paths: Vec<PathBuf>,
    global_bsa: BsaArchive,
}

impl VfsManager {
    /// Creates a manager rooted at the directory containing `GLOBAL.BSA`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let global_bsa = BsaArchive::load(root.join(GLOBAL_BSA_NAME))?;
        Ok(Self {
            data_paths: vec![root],
            global_bsa,
        })
    }

    /// Registers an additional directory of loose files. Paths added later
    /// shadow earlier ones.
    pub fn add_data_path(&mut self, path: impl Into<PathBuf>) {
        self.data_paths.push(path.into());
    }

    /// Returns the archive backing the manager.
    pub fn global_bsa(&self) -> &BsaArchive {
        &self.global_bsa
    }

    /// Reads the named entry, preferring loose files over the archive.
    pub fn open(&self, name: &str) -> Result<Vec<u8>> {
        for path in self.data_paths.iter().rev() {
            let candidate = path.join(name);
            if candidate.is_file() {
                return Ok(fs::read(candidate)?);
            }
        }

        self.global_bsa.open(name)
    }

    /// Returns true if the named entry resolves to a loose file or an
    /// archive entry.
    pub fn exists(&self, name: &str) -> bool {
        self.data_paths
            .iter()
            .any(|path| path.join(name).is_file())
            || self.global_bsa.exists(name)
    }

    /// Lists every reachable entry, optionally filtered by a shell-style
    /// pattern. Loose files are reported with `/`-separated paths relative to
    /// their data directory; archive entries are matched by basename.
    pub fn list(&self, pattern: Option<&str>) -> Vec<String> {
        let mut names = Vec::new();

        for path in self.data_paths.iter().rev() {
            collect_dir(path, "", pattern, &mut names);
        }

        match pattern {
            None => names.extend(self.global_bsa.names().map(str::to_string)),
            Some(pattern) => names.extend(
                self.global_bsa
                    .names()
                    .filter(|name| {
                        let basename = name.rsplit('/').next().unwrap_or(name);
                        fnmatch::matches(pattern, basename)
                    })
                    .map(str::to_string),
            ),
        }

        names
    }
}

fn collect_dir(path: &Path, prefix: &str, pattern: Option<&str>, names: &mut Vec<String>) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "skipping unreadable data directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();

        if entry.path().is_dir() {
            let child_prefix = format!("{prefix}{file_name}/");
            collect_dir(&entry.path(), &child_prefix, pattern, names);
        } else {
            let relative = format!("{prefix}{file_name}");
            if pattern.map_or(true, |pattern| fnmatch::matches(pattern, &relative)) {
                names.push(relative);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::bsa::tests::build_archive;
    use super::*;

    fn make_root(entries: &[(&str, &[u8])]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(GLOBAL_BSA_NAME), build_archive(entries)).unwrap();
        dir
    }

    #[test]
    fn requires_global_bsa_in_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VfsManager::new(dir.path()).is_err());
    }

    #[test]
    fn opens_archive_entries() {
        let root = make_root(&[("SOUND.VOC", b"voc bytes")]);
        let vfs = VfsManager::new(root.path()).unwrap();

        assert!(vfs.exists("SOUND.VOC"));
        assert_eq!(vfs.open("SOUND.VOC").unwrap(), b"voc bytes");
        assert!(matches!(
            vfs.open("MISSING.VOC"),
            Err(ArenaError::NotFound(_))
        ));
    }

    #[test]
    fn loose_files_shadow_the_archive() {
        let root = make_root(&[("SOUND.VOC", b"archived")]);
        fs::write(root.path().join("SOUND.VOC"), b"loose").unwrap();

        let vfs = VfsManager::new(root.path()).unwrap();
        assert_eq!(vfs.open("SOUND.VOC").unwrap(), b"loose");
    }

    #[test]
    fn later_data_paths_take_precedence() {
        let root = make_root(&[]);
        let override_dir = tempfile::tempdir().unwrap();
        fs::write(root.path().join("A.TXT"), b"base").unwrap();
        fs::write(override_dir.path().join("A.TXT"), b"override").unwrap();

        let mut vfs = VfsManager::new(root.path()).unwrap();
        vfs.add_data_path(override_dir.path());
        assert_eq!(vfs.open("A.TXT").unwrap(), b"override");
    }

    #[test]
    fn lists_loose_and_archived_entries() {
        let root = make_root(&[("MUSIC.XMI", b"midi"), ("WALL.IMG", b"img")]);
        fs::create_dir(root.path().join("mods")).unwrap();
        fs::write(root.path().join("mods/EXTRA.IMG"), b"img").unwrap();

        let vfs = VfsManager::new(root.path()).unwrap();

        let mut all = vfs.list(None);
        all.sort();
        assert!(all.contains(&"MUSIC.XMI".to_string()));
        assert!(all.contains(&"WALL.IMG".to_string()));
        assert!(all.contains(&"mods/EXTRA.IMG".to_string()));
        // The archive file itself shows up as a loose file.
        assert!(all.contains(&GLOBAL_BSA_NAME.to_string()));

        let imgs = vfs.list(Some("*.IMG"));
        assert!(imgs.contains(&"WALL.IMG".to_string()));
        assert!(!imgs.contains(&"MUSIC.XMI".to_string()));
    }
}
