//! Unpacker for PKLITE-compressed DOS executables (A.EXE).
//!
//! The compressed payload sits between the 752-byte stub and an 8-byte
//! trailer. A bit stream selects between literal bytes, XOR-decrypted with a
//! rolling key, and back-references into the output decoded through two
//! prefix-code tables.

use crate::bytes::read_le16;
use crate::{ArenaError, Result};

const STUB_SIZE: usize = 752;
const TRAILER_SIZE: usize = 8;

/// Sentinel for the copy-count code that switches to byte-encoded lengths.
const LENGTH_ESCAPE: u16 = u16::MAX;

// Copy-count prefix codes. The escape code reads the count from the next
// byte instead (0xFE skips, 0xFF ends the stream).
const COPY_COUNT_CODES: [(&str, u16); 24] = [
    ("10", 2),
    ("11", 3),
    ("000", 4),
    ("0010", 5),
    ("0011", 6),
    ("0100", 7),
    ("01010", 8),
    ("01011", 9),
    ("01100", 10),
    ("011010", 11),
    ("011011", 12),
    ("011100", LENGTH_ESCAPE),
    ("0111010", 13),
    ("0111011", 14),
    ("0111100", 15),
    ("01111010", 16),
    ("01111011", 17),
    ("01111100", 18),
    ("011111010", 19),
    ("011111011", 20),
    ("011111100", 21),
    ("011111101", 22),
    ("011111110", 23),
    ("011111111", 24),
];

// High-byte-of-offset prefix codes; the decoded value is the high byte.
const OFFSET_CODES: [(&str, u16); 32] = [
    ("1", 0),
    ("0000", 1),
    ("0001", 2),
    ("00100", 3),
    ("00101", 4),
    ("00110", 5),
    ("00111", 6),
    ("010000", 7),
    ("010001", 8),
    ("010010", 9),
    ("010011", 10),
    ("010100", 11),
    ("010101", 12),
    ("010110", 13),
    ("0101110", 14),
    ("0101111", 15),
    ("0110000", 16),
    ("0110001", 17),
    ("0110010", 18),
    ("0110011", 19),
    ("0110100", 20),
    ("0110101", 21),
    ("0110110", 22),
    ("0110111", 23),
    ("0111000", 24),
    ("0111001", 25),
    ("0111010", 26),
    ("0111011", 27),
    ("0111100", 28),
    ("0111101", 29),
    ("0111110", 30),
    ("0111111", 31),
];

#[derive(Default)]
struct Node {
    value: Option<u16>,
    children: [Option<Box<Node>>; 2],
}

/// Prefix-code decoder built from a code table.
struct BitTree {
    root: Node,
}

impl BitTree {
    fn from_codes(codes: &[(&str, u16)]) -> Self {
        let mut root = Node::default();
        for &(code, value) in codes {
            let mut node = &mut root;
            for bit in code.bytes() {
                let index = usize::from(bit == b'1');
                node = node.children[index].get_or_insert_with(Box::default);
            }
            node.value = Some(value);
        }
        Self { root }
    }

    fn decode(&self, reader: &mut BitReader<'_>) -> Result<u16> {
        let mut node = &self.root;
        loop {
            let index = usize::from(reader.next_bit()?);
            node = node.children[index]
                .as_deref()
                .ok_or_else(|| reader.malformed("bit sequence matches no code"))?;
            if let Some(value) = node.value {
                return Ok(value);
            }
        }
    }
}

/// LSB-first bit stream over the compressed payload, refilled a 16-bit word
/// at a time.
struct BitReader<'a> {
    filename: &'a str,
    data: &'a [u8],
    byte_index: usize,
    bit_array: u16,
    bits_read: u32,
}

impl<'a> BitReader<'a> {
    fn new(filename: &'a str, data: &'a [u8]) -> Result<Self> {
        let bit_array = read_le16(data, 0)
            .ok_or_else(|| ArenaError::malformed(filename, "compressed data too short"))?;
        Ok(Self {
            filename,
            data,
            byte_index: 2,
            bit_array,
            bits_read: 0,
        })
    }

    fn malformed(&self, message: &str) -> ArenaError {
        ArenaError::malformed(self.filename, message)
    }

    fn next_byte(&mut self) -> Result<u8> {
        let byte = *self
            .data
            .get(self.byte_index)
            .ok_or_else(|| self.malformed("compressed data ended early"))?;
        self.byte_index += 1;
        Ok(byte)
    }

    fn next_bit(&mut self) -> Result<bool> {
        let bit = self.bit_array & (1 << self.bits_read) != 0;
        self.bits_read += 1;

        // Refill as soon as the current word is exhausted, before the next
        // data byte is read. Literal decryption depends on this ordering.
        if self.bits_read == 16 {
            self.bits_read = 0;
            let low = self.next_byte()?;
            let high = self.next_byte()?;
            self.bit_array = u16::from(low) | (u16::from(high) << 8);
        }

        Ok(bit)
    }

    /// XOR key for the next literal byte.
    fn decrypt_key(&self) -> u8 {
        (16 - self.bits_read) as u8
    }
}

/// Decompresses a PKLITE-packed executable image.
pub fn unpack(filename: &str, data: &[u8]) -> Result<Vec<u8>> {
    let trailer_start = data
        .len()
        .checked_sub(TRAILER_SIZE)
        .filter(|&end| end > STUB_SIZE + 2)
        .ok_or_else(|| ArenaError::malformed(filename, "file too short to be packed"))?;
    let compressed = &data[STUB_SIZE..trailer_start];

    let last_word = read_le16(compressed, compressed.len() - 2)
        .ok_or_else(|| ArenaError::malformed(filename, "compressed data too short"))?;
    if last_word != 0xFFFF {
        return Err(ArenaError::malformed(
            filename,
            format!("bad final compressed word {last_word:#06x}"),
        ));
    }

    // The trailer's far pointer gives the decompressed size.
    let segment = read_le16(data, trailer_start)
        .ok_or_else(|| ArenaError::malformed(filename, "missing size trailer"))?;
    let offset = read_le16(data, trailer_start + 2)
        .ok_or_else(|| ArenaError::malformed(filename, "missing size trailer"))?;
    let decomp_len = usize::from(segment) * 16 + usize::from(offset);

    let copy_counts = BitTree::from_codes(&COPY_COUNT_CODES);
    let offsets = BitTree::from_codes(&OFFSET_CODES);

    let mut reader = BitReader::new(filename, compressed)?;
    let mut decomp: Vec<u8> = Vec::with_capacity(decomp_len);

    tracing::debug!(filename, decomp_len, "unpacking executable");

    loop {
        if !reader.next_bit()? {
            // Literal byte, XOR-decrypted with the current bit position.
            let key = reader.decrypt_key();
            let byte = reader.next_byte()? ^ key;
            if decomp.len() == decomp_len {
                return Err(ArenaError::malformed(filename, "output overruns its size"));
            }
            decomp.push(byte);
            continue;
        }

        // Back-reference into the output.
        let copy_count = match copy_counts.decode(&mut reader)? {
            LENGTH_ESCAPE => {
                let byte = reader.next_byte()?;
                match byte {
                    0xFE => continue,
                    0xFF => break,
                    _ => usize::from(byte) + 25,
                }
            }
            count => usize::from(count),
        };

        // A two-byte copy always has a zero high offset byte.
        let high = if copy_count != 2 {
            offsets.decode(&mut reader)?
        } else {
            0
        };
        let low = reader.next_byte()?;
        let offset = usize::from(low) | (usize::from(high) << 8);

        let start = decomp
            .len()
            .checked_sub(offset)
            .ok_or_else(|| ArenaError::malformed(filename, "back-reference before output start"))?;

        // Source and destination may overlap, so copy byte by byte.
        for i in start..start + copy_count {
            if decomp.len() == decomp_len {
                return Err(ArenaError::malformed(filename, "output overruns its size"));
            }
            let byte = *decomp
                .get(i)
                .ok_or_else(|| ArenaError::malformed(filename, "back-reference past output"))?;
            decomp.push(byte);
        }
    }

    // A short stream leaves the rest of the image zeroed.
    decomp.resize(decomp_len, 0);
    Ok(decomp)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Builds a packed file: stub, bit words and data bytes, then the
    // trailing far pointer encoding the decompressed length.
    fn packed(compressed: &[u8], decomp_len: u16) -> Vec<u8> {
        let mut data = vec![0u8; STUB_SIZE];
        data.extend_from_slice(compressed);
        data.extend_from_slice(&0u16.to_le_bytes()); // Segment.
        data.extend_from_slice(&decomp_len.to_le_bytes()); // Offset.
        data.extend_from_slice(&[0u8; 4]);
        data
    }

    #[test]
    fn unpacks_literal_bytes() {
        // Bit stream: 0 (literal), 0 (literal), 1 + 011100 (escape), then
        // the 0xFF end byte. Literals decrypt with keys 15 and 14.
        let compressed = [0x74, 0x00, b'A' ^ 15, b'B' ^ 14, 0xFF, 0xFF];
        let data = packed(&compressed, 2);
        assert_eq!(unpack("A.EXE", &data).unwrap(), b"AB");
    }

    #[test]
    fn unpacks_back_references() {
        // 0 (literal 'A'), then 1 + "11" (copy 3) + "1" (high offset 0) with
        // least-significant offset byte 1, then 1 + 011100 + 0xFF to end.
        let compressed = [0xBE, 0x03, b'A' ^ 15, 0x01, 0xFF, 0xFF];
        let data = packed(&compressed, 4);
        assert_eq!(unpack("A.EXE", &data).unwrap(), b"AAAA");
    }

    #[test]
    fn short_streams_zero_fill_the_tail() {
        let compressed = [0x74, 0x00, b'A' ^ 15, b'B' ^ 14, 0xFF, 0xFF];
        let data = packed(&compressed, 4);
        assert_eq!(unpack("A.EXE", &data).unwrap(), b"AB\0\0");
    }

    #[test]
    fn rejects_bad_final_word() {
        let compressed = [0x74, 0x00, 0xFF, 0x00, 0x00];
        let data = packed(&compressed, 0);
        assert!(unpack("A.EXE", &data).is_err());
    }

    #[test]
    fn rejects_underflowing_back_references() {
        // Immediately requests a copy from before the start of the output:
        // 1 (dup) + "11" (copy 3) + "1" (high 0) + low byte 5.
        let compressed = [0x0F, 0x00, 5, 0x00, 0xFF, 0xFF];
        let data = packed(&compressed, 8);
        assert!(unpack("A.EXE", &data).is_err());
    }

    #[test]
    fn rejects_truncated_files() {
        assert!(unpack("A.EXE", &[0u8; 100]).is_err());
    }
}
