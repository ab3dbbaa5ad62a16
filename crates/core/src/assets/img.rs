//! Decoder for IMG textures.
//!
//! Most IMG files carry a 12-byte header (x/y offset, width, height, flags,
//! data length, all little-endian u16). Flag bit 0x0100 marks a 768-byte
//! built-in VGA palette after the pixel data; the low flag byte selects the
//! pixel encoding. A handful of files are headerless with hardcoded
//! dimensions, and wall textures are headerless 64x64 blocks recognized by
//! their flags matching no known encoding.

use super::compression::decode_type_04;
use super::{Palette, PALETTE_BYTES};
use crate::bytes::read_le16;
use crate::{ArenaError, Result};

use serde::{Deserialize, Serialize};

const HEADER_SIZE: usize = 12;
const PALETTE_FLAG: u16 = 0x0100;
const ENCODING_MASK: u16 = 0x00FF;
const ENCODING_RAW: u16 = 0x0000;
const ENCODING_LZSS: u16 = 0x0004;
const ENCODING_DEFLATE: u16 = 0x0008;
const WALL_DIMENSION: usize = 64;

// These IMG files are headerless with hardcoded dimensions.
const RAW_OVERRIDES: [(&str, usize, usize); 15] = [
    ("ARENARW.IMG", 16, 16),
    ("CITY.IMG", 16, 11),
    ("DITHER.IMG", 16, 50),
    ("DITHER2.IMG", 16, 50),
    ("DUNGEON.IMG", 14, 8),
    ("DZTTAV.IMG", 32, 34),
    ("NOCAMP.IMG", 25, 19),
    ("NOSPELL.IMG", 25, 19),
    ("P1.IMG", 320, 53),
    ("POPTALK.IMG", 320, 77),
    ("S2.IMG", 320, 36),
    ("SLIDER.IMG", 289, 7),
    ("TOWN.IMG", 9, 10),
    ("UPDOWN.IMG", 8, 16),
    ("VILLAGE.IMG", 8, 8),
];

fn raw_override(filename: &str) -> Option<(usize, usize)> {
    RAW_OVERRIDES
        .iter()
        .find(|(name, _, _)| filename.eq_ignore_ascii_case(name))
        .map(|&(_, width, height)| (width, height))
}

/// Header-level description of an IMG file, available without a palette.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImgMetadata {
    pub width: usize,
    pub height: usize,
    pub x_offset: u16,
    pub y_offset: u16,
    pub flags: u16,
    pub has_builtin_palette: bool,
}

enum Layout {
    RawOverride,
    Headered,
    Wall,
}

struct Parsed {
    metadata: ImgMetadata,
    layout: Layout,
    data_len: usize,
}

fn parse_header(filename: &str, data: &[u8]) -> Result<Parsed> {
    if let Some((width, height)) = raw_override(filename) {
        return Ok(Parsed {
            metadata: ImgMetadata {
                width,
                height,
                x_offset: 0,
                y_offset: 0,
                flags: 0,
                has_builtin_palette: false,
            },
            layout: Layout::RawOverride,
            data_len: width * height,
        });
    }

    let header = |offset| {
        read_le16(data, offset)
            .ok_or_else(|| ArenaError::malformed(filename, "truncated IMG header"))
    };
    let x_offset = header(0)?;
    let y_offset = header(2)?;
    let width = usize::from(header(4)?);
    let height = usize::from(header(6)?);
    let flags = header(8)?;
    let data_len = usize::from(header(10)?);

    let encoding = flags & ENCODING_MASK;
    if matches!(encoding, ENCODING_RAW | ENCODING_LZSS | ENCODING_DEFLATE) {
        Ok(Parsed {
            metadata: ImgMetadata {
                width,
                height,
                x_offset,
                y_offset,
                flags,
                has_builtin_palette: (flags & PALETTE_FLAG) != 0,
            },
            layout: Layout::Headered,
            data_len,
        })
    } else {
        // No recognizable flags, so the header is garbage; assume a
        // headerless 64x64 wall texture.
        Ok(Parsed {
            metadata: ImgMetadata {
                width: WALL_DIMENSION,
                height: WALL_DIMENSION,
                x_offset: 0,
                y_offset: 0,
                flags: 0,
                has_builtin_palette: false,
            },
            layout: Layout::Wall,
            data_len: WALL_DIMENSION * WALL_DIMENSION,
        })
    }
}

/// A decoded IMG texture: 32-bit ARGB pixels.
#[derive(Debug, Clone)]
pub struct ImgFile {
    width: usize,
    height: usize,
    flags: u16,
    pixels: Vec<u32>,
}

impl ImgFile {
    /// Inspects a file's header without decoding pixels.
    pub fn metadata(filename: &str, data: &[u8]) -> Result<ImgMetadata> {
        parse_header(filename, data).map(|parsed| parsed.metadata)
    }

    /// Decodes an IMG file. `palette` overrides the built-in palette when
    /// given; files without a built-in palette require it.
    pub fn from_bytes(filename: &str, data: &[u8], palette: Option<&Palette>) -> Result<Self> {
        let parsed = parse_header(filename, data)?;
        let ImgMetadata { width, height, flags, .. } = parsed.metadata;

        let (indices, builtin) = match parsed.layout {
            Layout::RawOverride | Layout::Wall => {
                let pixels = data.get(..parsed.data_len).ok_or_else(|| {
                    ArenaError::malformed(filename, "truncated headerless IMG data")
                })?;
                (pixels.to_vec(), None)
            }
            Layout::Headered => {
                let src = data
                    .get(HEADER_SIZE..HEADER_SIZE + parsed.data_len)
                    .ok_or_else(|| ArenaError::malformed(filename, "truncated IMG data"))?;

                let indices = match flags & ENCODING_MASK {
                    ENCODING_RAW => {
                        if src.len() != width * height {
                            return Err(ArenaError::malformed(
                                filename,
                                "pixel data does not match dimensions",
                            ));
                        }
                        src.to_vec()
                    }
                    ENCODING_LZSS => {
                        let decoded = decode_type_04(src, width * height);
                        if decoded.len() != width * height {
                            return Err(ArenaError::malformed(
                                filename,
                                "LZSS data ended before the image was complete",
                            ));
                        }
                        decoded
                    }
                    ENCODING_DEFLATE => {
                        return Err(ArenaError::unsupported(filename, "type 08 compression"));
                    }
                    _ => unreachable!("parse_header only keeps known encodings"),
                };

                let builtin = if parsed.metadata.has_builtin_palette {
                    let raw = data
                        .get(HEADER_SIZE + parsed.data_len..)
                        .and_then(|rest| rest.get(..PALETTE_BYTES))
                        .ok_or_else(|| {
                            ArenaError::malformed(filename, "truncated built-in palette")
                        })?;
                    Some(Palette::from_vga(raw).ok_or_else(|| {
                        ArenaError::malformed(filename, "truncated built-in palette")
                    })?)
                } else {
                    None
                };

                (indices, builtin)
            }
        };

        // A caller-provided palette wins over the built-in one.
        let palette = match (palette, builtin.as_ref()) {
            (Some(palette), _) => palette,
            (None, Some(builtin)) => builtin,
            (None, None) => {
                return Err(ArenaError::malformed(
                    filename,
                    "no built-in palette and none provided",
                ));
            }
        };

        let pixels = indices
            .iter()
            .map(|&index| palette.get(index).to_argb())
            .collect();

        Ok(Self {
            width,
            height,
            flags,
            pixels,
        })
    }

    /// Reads the 768-byte built-in palette from a palette-bearing IMG.
    pub fn extract_palette(filename: &str, data: &[u8]) -> Result<Palette> {
        let flags = read_le16(data, 8)
            .ok_or_else(|| ArenaError::malformed(filename, "truncated IMG header"))?;
        let data_len = usize::from(
            read_le16(data, 10)
                .ok_or_else(|| ArenaError::malformed(filename, "truncated IMG header"))?,
        );

        if flags & PALETTE_FLAG == 0 {
            return Err(ArenaError::malformed(
                filename,
                "no built-in palette to extract",
            ));
        }

        let raw = data
            .get(HEADER_SIZE + data_len..)
            .and_then(|rest| rest.get(..PALETTE_BYTES))
            .ok_or_else(|| ArenaError::malformed(filename, "truncated built-in palette"))?;
        Palette::from_vga(raw)
            .ok_or_else(|| ArenaError::malformed(filename, "truncated built-in palette"))
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Row-major ARGB pixels, `width * height` long.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }
}
