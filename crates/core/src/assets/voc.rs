//! Decoder for Creative Voice (.VOC) sound files.
//!
//! Arena's files only use the terminator, sound data, and repeat block
//! types. Output is 8-bit unsigned PCM with repeats flattened into the
//! sample stream.

use crate::bytes::{read_le16, read_le24};
use crate::{ArenaError, Result};

const SIGNATURE: &[u8; 19] = b"Creative Voice File";
const EOF_BYTE: u8 = 0x1A;
const BLOCK_HEADER_SIZE: usize = 4;

const BLOCK_TERMINATOR: u8 = 0x00;
const BLOCK_SOUND_DATA: u8 = 0x01;
const BLOCK_REPEAT_START: u8 = 0x06;
const BLOCK_REPEAT_END: u8 = 0x07;

/// Decoded mono 8-bit unsigned PCM audio.
pub struct VocFile {
    sample_rate: u32,
    samples: Vec<u8>,
}

impl VocFile {
    pub fn from_bytes(filename: &str, data: &[u8]) -> Result<Self> {
        let truncated = || ArenaError::malformed(filename, "truncated VOC data");

        let signature = data.get(..SIGNATURE.len()).ok_or_else(truncated)?;
        if signature != SIGNATURE {
            return Err(ArenaError::malformed(filename, "missing VOC signature"));
        }
        if *data.get(19).ok_or_else(truncated)? != EOF_BYTE {
            return Err(ArenaError::malformed(filename, "bad VOC EOF byte"));
        }

        let header_size = usize::from(read_le16(data, 20).ok_or_else(truncated)?);
        let version = read_le16(data, 22).ok_or_else(truncated)?;
        let checksum = read_le16(data, 24).ok_or_else(truncated)?;
        if checksum != (!version).wrapping_add(0x1234) {
            return Err(ArenaError::malformed(filename, "VOC header checksum mismatch"));
        }

        let mut sample_rate: Option<u32> = None;
        let mut samples = Vec::new();

        // Blocks between a repeat start and end accumulate here, then get
        // appended `plays` times.
        let mut repeat: Option<(u32, Vec<u8>)> = None;

        let mut offset = header_size;
        while offset < data.len() {
            let block_type = *data.get(offset).ok_or_else(truncated)?;
            if block_type == BLOCK_TERMINATOR {
                break;
            }

            let block_size = read_le24(data, offset + 1).ok_or_else(truncated)? as usize;
            let block_data = data
                .get(offset + BLOCK_HEADER_SIZE..offset + BLOCK_HEADER_SIZE + block_size)
                .ok_or_else(truncated)?;

            match block_type {
                BLOCK_SOUND_DATA => {
                    let divisor = *block_data.first().ok_or_else(truncated)?;
                    let codec = *block_data.get(1).ok_or_else(truncated)?;
                    if codec != 0 {
                        return Err(ArenaError::unsupported(
                            filename,
                            format!("VOC codec {codec}"),
                        ));
                    }

                    let rate = 1_000_000 / (256 - u32::from(divisor));
                    match sample_rate {
                        None => sample_rate = Some(rate),
                        Some(existing) if existing != rate => {
                            tracing::warn!(
                                filename,
                                existing,
                                rate,
                                "sound block changes sample rate mid-file, keeping first"
                            );
                        }
                        Some(_) => {}
                    }

                    let pcm = &block_data[2..];
                    match &mut repeat {
                        Some((_, buffered)) => buffered.extend_from_slice(pcm),
                        None => samples.extend_from_slice(pcm),
                    }
                }
                BLOCK_REPEAT_START => {
                    let stored = read_le16(block_data, 0).ok_or_else(truncated)?;
                    // The stored count is plays minus one; 0xFFFF means loop
                    // forever, flattened here to a single pass.
                    let plays = if stored == 0xFFFF {
                        1
                    } else {
                        u32::from(stored) + 1
                    };
                    repeat = Some((plays, Vec::new()));
                }
                BLOCK_REPEAT_END => {
                    let (plays, buffered) = repeat.take().ok_or_else(|| {
                        ArenaError::malformed(filename, "repeat end without repeat start")
                    })?;
                    for _ in 0..plays {
                        samples.extend_from_slice(&buffered);
                    }
                }
                other => {
                    return Err(ArenaError::malformed(
                        filename,
                        format!("unhandled VOC block type {other}"),
                    ));
                }
            }

            offset += BLOCK_HEADER_SIZE + block_size;
        }

        // A missing repeat end leaves buffered audio; play it once.
        if let Some((_, buffered)) = repeat.take() {
            samples.extend_from_slice(&buffered);
        }

        let sample_rate = sample_rate
            .ok_or_else(|| ArenaError::malformed(filename, "no sound data blocks"))?;

        Ok(Self {
            sample_rate,
            samples,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// 8-bit unsigned PCM, centered on 128.
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERSION: u16 = 0x010A;

    fn header() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(SIGNATURE);
        data.push(EOF_BYTE);
        data.extend_from_slice(&26u16.to_le_bytes());
        data.extend_from_slice(&VERSION.to_le_bytes());
        data.extend_from_slice(&(!VERSION).wrapping_add(0x1234).to_le_bytes());
        data
    }

    fn sound_block(divisor: u8, pcm: &[u8]) -> Vec<u8> {
        let mut data = vec![BLOCK_SOUND_DATA];
        let size = (pcm.len() + 2) as u32;
        data.extend_from_slice(&size.to_le_bytes()[..3]);
        data.push(divisor);
        data.push(0); // Codec: 8-bit unsigned PCM.
        data.extend_from_slice(pcm);
        data
    }

    #[test]
    fn decodes_sound_data() {
        let mut data = header();
        // Divisor 0x9C gives 1_000_000 / 100 = 10 kHz.
        data.extend_from_slice(&sound_block(0x9C, &[128, 130, 126]));
        data.push(BLOCK_TERMINATOR);

        let voc = VocFile::from_bytes("TEST.VOC", &data).unwrap();
        assert_eq!(voc.sample_rate(), 10_000);
        assert_eq!(voc.samples(), &[128, 130, 126]);
        assert!((voc.duration() - 3.0 / 10_000.0).abs() < 1e-12);
    }

    #[test]
    fn repeat_blocks_duplicate_their_audio() {
        let mut data = header();
        data.extend_from_slice(&sound_block(0x9C, &[1]));
        // Repeat start: stored count 2 means three plays.
        data.extend_from_slice(&[BLOCK_REPEAT_START, 2, 0, 0, 2, 0]);
        data.extend_from_slice(&sound_block(0x9C, &[5, 6]));
        data.extend_from_slice(&[BLOCK_REPEAT_END, 0, 0, 0]);
        data.push(BLOCK_TERMINATOR);

        let voc = VocFile::from_bytes("DRUMS.VOC", &data).unwrap();
        assert_eq!(voc.samples(), &[1, 5, 6, 5, 6, 5, 6]);
    }

    #[test]
    fn infinite_repeat_plays_once() {
        let mut data = header();
        data.extend_from_slice(&[BLOCK_REPEAT_START, 2, 0, 0, 0xFF, 0xFF]);
        data.extend_from_slice(&sound_block(0x9C, &[9]));
        data.extend_from_slice(&[BLOCK_REPEAT_END, 0, 0, 0]);
        data.push(BLOCK_TERMINATOR);

        let voc = VocFile::from_bytes("TEST.VOC", &data).unwrap();
        assert_eq!(voc.samples(), &[9]);
    }

    #[test]
    fn rejects_bad_checksum() {
        let mut data = header();
        data[24] ^= 0xFF;
        data.extend_from_slice(&sound_block(0x9C, &[0]));
        assert!(VocFile::from_bytes("TEST.VOC", &data).is_err());
    }

    #[test]
    fn rejects_unknown_codecs() {
        let mut data = header();
        let mut block = sound_block(0x9C, &[0]);
        block[5] = 3; // ADPCM codec byte.
        data.extend_from_slice(&block);

        assert!(matches!(
            VocFile::from_bytes("TEST.VOC", &data),
            Err(ArenaError::UnsupportedEncoding { .. })
        ));
    }
}
