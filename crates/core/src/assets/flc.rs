//! Decoder for FLC animations (cinematics).
//!
//! Only the 0xAF12 variant is handled. A file is a 128-byte header followed
//! by frame chunks; each frame chunk holds sub-chunks for palettes, full
//! frames (byte runs), and delta frames. The last frame loops back to the
//! first and is dropped.

use super::{Palette, PALETTE_BYTES};
use crate::bytes::{read_le16, read_le32};
use crate::{ArenaError, Result};

const FLC_TYPE: u16 = 0xAF12;
const HEADER_SIZE: usize = 128;
const FRAME_HEADER_SIZE: usize = 16;
const CHUNK_HEADER_SIZE: usize = 6;

const FRAME_TYPE: u16 = 0xF1FA;
const PREFIX_CHUNK: u16 = 0xF100;

const CHUNK_COLOR_256: u16 = 0x04;
const CHUNK_FLI_SS2: u16 = 0x07;
const CHUNK_FLI_BRUN: u16 = 0x0F;

struct Frame {
    palette_index: usize,
    pixels: Vec<u8>,
}

/// A decoded FLC animation: 8-bit frames plus the palettes they reference.
pub struct FlcFile {
    width: usize,
    height: usize,
    frame_duration: f64,
    palettes: Vec<Palette>,
    frames: Vec<Frame>,
}

impl FlcFile {
    pub fn from_bytes(filename: &str, data: &[u8]) -> Result<Self> {
        let truncated = || ArenaError::malformed(filename, "truncated FLC data");

        let file_type = read_le16(data, 4).ok_or_else(truncated)?;
        if file_type != FLC_TYPE {
            return Err(ArenaError::unsupported(
                filename,
                format!("FLIC type {file_type:#06x}"),
            ));
        }

        let width = usize::from(read_le16(data, 8).ok_or_else(truncated)?);
        let height = usize::from(read_le16(data, 10).ok_or_else(truncated)?);
        let speed = read_le32(data, 16).ok_or_else(truncated)?;

        let mut this = Self {
            width,
            height,
            frame_duration: f64::from(speed) / 1000.0,
            palettes: Vec::new(),
            frames: Vec::new(),
        };

        // Scratch pixels carried across frames. Byte runs replace them
        // wholesale, delta frames patch them.
        let mut scratch = vec![0u8; width * height];

        let mut offset = HEADER_SIZE;
        while offset < data.len() {
            let frame_size = read_le32(data, offset).ok_or_else(truncated)? as usize;
            let frame_type = read_le16(data, offset + 4).ok_or_else(truncated)?;

            if frame_type == FRAME_TYPE {
                let chunk_count = read_le16(data, offset + 6).ok_or_else(truncated)?;
                let mut chunk_offset = offset + FRAME_HEADER_SIZE;

                for _ in 0..chunk_count {
                    let chunk_size = read_le32(data, chunk_offset).ok_or_else(truncated)? as usize;
                    let chunk_type = read_le16(data, chunk_offset + 4).ok_or_else(truncated)?;
                    let chunk_data = data
                        .get(chunk_offset + CHUNK_HEADER_SIZE..chunk_offset + chunk_size)
                        .ok_or_else(truncated)?;

                    match chunk_type {
                        CHUNK_COLOR_256 => {
                            this.palettes.push(read_palette(filename, chunk_data)?);
                        }
                        CHUNK_FLI_BRUN => {
                            this.decode_full_frame(filename, chunk_data, &mut scratch)?;
                            this.push_frame(filename, &scratch)?;
                        }
                        CHUNK_FLI_SS2 => {
                            this.decode_delta_frame(filename, chunk_data, &mut scratch)?;
                            this.push_frame(filename, &scratch)?;
                        }
                        // Thumbnails and other chunk types are not needed.
                        _ => {}
                    }

                    chunk_offset += chunk_size;
                }
            } else if frame_type != PREFIX_CHUNK {
                return Err(ArenaError::malformed(
                    filename,
                    format!("unrecognized frame type {frame_type:#06x}"),
                ));
            }

            if frame_size == 0 {
                return Err(ArenaError::malformed(filename, "zero-length frame"));
            }
            offset += frame_size;
        }

        // The last frame loops back to the first, so drop it.
        if this.frames.pop().is_none() {
            return Err(ArenaError::malformed(filename, "animation has no frames"));
        }
        if this.frames.is_empty() {
            return Err(ArenaError::malformed(filename, "animation has no frames"));
        }

        Ok(this)
    }

    fn push_frame(&mut self, filename: &str, scratch: &[u8]) -> Result<()> {
        // Frames reference whichever palette was most recently read.
        let palette_index = self
            .palettes
            .len()
            .checked_sub(1)
            .ok_or_else(|| ArenaError::malformed(filename, "frame appears before any palette"))?;
        self.frames.push(Frame {
            palette_index,
            pixels: scratch.to_vec(),
        });
        Ok(())
    }

    /// Byte-run chunk: rows of packets covering the whole frame.
    fn decode_full_frame(&self, filename: &str, data: &[u8], scratch: &mut [u8]) -> Result<()> {
        let truncated = || ArenaError::malformed(filename, "truncated byte-run chunk");
        let mut offset = 0;

        for row in 0..self.height {
            // The leading packet count per row is ignored; the decoded width
            // decides when the row is done.
            offset += 1;

            let mut x = 0;
            while x < self.width {
                let kind = *data.get(offset).ok_or_else(truncated)? as i8;
                let row_start = row * self.width;

                if kind > 0 {
                    // One pixel repeated `kind` times.
                    let pixel = *data.get(offset + 1).ok_or_else(truncated)?;
                    let count = kind as usize;
                    let dst = scratch
                        .get_mut(row_start + x..row_start + x + count)
                        .ok_or_else(|| {
                            ArenaError::malformed(filename, "byte run overflows its row")
                        })?;
                    dst.fill(pixel);
                    x += count;
                    offset += 2;
                } else if kind < 0 {
                    // Literal copy of `-kind` pixels.
                    let count = kind.unsigned_abs() as usize;
                    let src = data.get(offset + 1..offset + 1 + count).ok_or_else(truncated)?;
                    let dst = scratch
                        .get_mut(row_start + x..row_start + x + count)
                        .ok_or_else(|| {
                            ArenaError::malformed(filename, "byte run overflows its row")
                        })?;
                    dst.copy_from_slice(src);
                    x += count;
                    offset += 1 + count;
                } else {
                    return Err(ArenaError::malformed(filename, "zero-length byte-run packet"));
                }
            }
        }

        Ok(())
    }

    /// Delta chunk: packets that patch the previous frame in place.
    fn decode_delta_frame(&self, filename: &str, data: &[u8], scratch: &mut [u8]) -> Result<()> {
        let truncated = || ArenaError::malformed(filename, "truncated delta chunk");
        let line_count = read_le16(data, 0).ok_or_else(truncated)?;

        let mut y: usize = 0;
        let mut offset = 2;

        for _ in 0..line_count {
            // Words before the packet count either skip rows (bits 15 and 14
            // set) or set the last pixel of the current row (bit 15 only).
            let mut packet_count = 0;
            while offset < data.len() {
                let word = read_le16(data, offset).ok_or_else(truncated)?;
                offset += 2;

                if word & 0x8000 != 0 {
                    if word & 0x4000 != 0 {
                        y += usize::from((word as i16).unsigned_abs());
                    } else {
                        let pixel = (word & 0x00FF) as u8;
                        let index = y * self.width + self.width - 1;
                        *scratch.get_mut(index).ok_or_else(|| {
                            ArenaError::malformed(filename, "delta row out of bounds")
                        })? = pixel;
                        y += 1;
                    }
                } else {
                    packet_count = word;
                    break;
                }
            }

            let mut x: usize = 0;
            for _ in 0..packet_count {
                x += usize::from(*data.get(offset).ok_or_else(truncated)?);
                let count = *data.get(offset + 1).ok_or_else(truncated)? as i8;
                offset += 2;

                let row_start = y * self.width;
                if count > 0 {
                    // `count` pairs of literal colors.
                    for _ in 0..count {
                        let pair = data.get(offset..offset + 2).ok_or_else(truncated)?;
                        offset += 2;
                        for &pixel in pair {
                            if x < self.width {
                                *scratch.get_mut(row_start + x).ok_or_else(|| {
                                    ArenaError::malformed(filename, "delta row out of bounds")
                                })? = pixel;
                                x += 1;
                            }
                        }
                    }
                } else if count < 0 {
                    // One color pair repeated `-count` times.
                    let pair = data.get(offset..offset + 2).ok_or_else(truncated)?;
                    offset += 2;
                    for _ in 0..count.unsigned_abs() {
                        for &pixel in pair {
                            if x < self.width {
                                *scratch.get_mut(row_start + x).ok_or_else(|| {
                                    ArenaError::malformed(filename, "delta row out of bounds")
                                })? = pixel;
                                x += 1;
                            }
                        }
                    }
                } else {
                    return Err(ArenaError::malformed(filename, "zero-length delta packet"));
                }
            }

            y += 1;
        }

        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Seconds each frame stays on screen.
    pub fn frame_duration(&self) -> f64 {
        self.frame_duration
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// 8-bit palette indices for a frame, row-major.
    pub fn frame_pixels(&self, index: usize) -> Option<&[u8]> {
        self.frames.get(index).map(|frame| frame.pixels.as_slice())
    }

    pub fn frame_palette(&self, index: usize) -> Option<&Palette> {
        let frame = self.frames.get(index)?;
        self.palettes.get(frame.palette_index)
    }

    /// A frame rendered through its palette as `0xAARRGGBB` pixels.
    pub fn frame_argb(&self, index: usize) -> Option<Vec<u32>> {
        let frame = self.frames.get(index)?;
        let palette = self.palettes.get(frame.palette_index)?;
        Some(
            frame
                .pixels
                .iter()
                .map(|&pixel| palette.get(pixel).to_argb())
                .collect(),
        )
    }
}

fn read_palette(filename: &str, chunk_data: &[u8]) -> Result<Palette> {
    let element_count = read_le16(chunk_data, 0)
        .ok_or_else(|| ArenaError::malformed(filename, "truncated palette chunk"))?;
    if element_count != 1 {
        return Err(ArenaError::malformed(
            filename,
            format!("unusual palette element count {element_count}"),
        ));
    }

    // Skip count and color count, one byte each, are ignored.
    let rgb = chunk_data
        .get(4..4 + PALETTE_BYTES)
        .ok_or_else(|| ArenaError::malformed(filename, "truncated palette chunk"))?;
    Palette::from_rgb(rgb)
        .ok_or_else(|| ArenaError::malformed(filename, "truncated palette chunk"))
}
