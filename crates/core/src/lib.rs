//! Core library for reading The Elder Scrolls: Arena game data.
//!
//! The crate is organized around a virtual filesystem that layers loose
//! files over the GLOBAL.BSA archive, with decoders for the formats the
//! engine needs on top: IMG textures, FLC cinematics, VOC audio, the
//! key/value text files that drive options and music selection, and the
//! PKLITE-compressed executable.

pub mod assets;
pub mod error;
pub mod exe;
pub mod keyvalue;
pub mod music;
pub mod options;
pub mod vfs;

pub(crate) mod bytes;

pub use assets::{Color, FlcFile, ImgFile, ImgMetadata, Palette, VocFile};
pub use error::{ArenaError, Result};
pub use keyvalue::KeyValueFile;
pub use music::{MusicDefinition, MusicLibrary, MusicType};
pub use options::Options;
pub use vfs::{BsaArchive, VfsManager};
