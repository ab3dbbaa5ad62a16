//! LZSS decompression for "type 04" IMG/CIF data.
//!
//! The scheme is the DOS-era LZSS variant: a 4096-byte ring buffer seeded
//! with spaces and a write cursor starting at 0x0FEE. Flag bytes gate eight
//! items each, LSB first; a set bit means one literal byte, a clear bit means
//! a two-byte back-reference whose second byte packs the high offset nibble
//! and the copy length minus three.

const WINDOW_SIZE: usize = 4096;
const WINDOW_FILL: u8 = 0x20;
const WINDOW_START: usize = 0x0FEE;
const MIN_MATCH: usize = 3;

/// Decodes up to `expected_len` bytes from `src`. Output stops early if the
/// source runs out, so callers should verify the length when it matters.
pub(crate) fn decode_type_04(src: &[u8], expected_len: usize) -> Vec<u8> {
    let mut window = [WINDOW_FILL; WINDOW_SIZE];
    let mut window_pos = WINDOW_START;
    let mut out = Vec::with_capacity(expected_len);
    let mut src_index = 0;

    'outer: while out.len() < expected_len {
        let Some(&flags) = src.get(src_index) else {
            break;
        };
        src_index += 1;

        for bit in 0..8 {
            if out.len() >= expected_len {
                break;
            }

            if flags & (1 << bit) != 0 {
                let Some(&byte) = src.get(src_index) else {
                    break 'outer;
                };
                src_index += 1;

                out.push(byte);
                window[window_pos] = byte;
                window_pos = (window_pos + 1) % WINDOW_SIZE;
            } else {
                let Some(pair) = src.get(src_index..src_index + 2) else {
                    break 'outer;
                };
                src_index += 2;

                let offset = usize::from(pair[0]) | (usize::from(pair[1] & 0xF0) << 4);
                let count = usize::from(pair[1] & 0x0F) + MIN_MATCH;

                for step in 0..count {
                    if out.len() >= expected_len {
                        break;
                    }
                    let byte = window[(offset + step) % WINDOW_SIZE];
                    out.push(byte);
                    window[window_pos] = byte;
                    window_pos = (window_pos + 1) % WINDOW_SIZE;
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_literal_runs() {
        // Flag byte with all bits set: eight literals.
        let src = [0xFF, 1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(decode_type_04(&src, 8), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn back_references_copy_earlier_output() {
        // Three literals "ABC" written at window positions 0x0FEE..0x0FF1,
        // then a reference to them: offset 0x0FEE, count 3.
        let src = [0b0000_0111, b'A', b'B', b'C', 0xEE, 0xF0];
        assert_eq!(decode_type_04(&src, 6), b"ABCABC");
    }

    #[test]
    fn fresh_window_reads_as_spaces() {
        // A reference before any literal copies from the space-filled window.
        let src = [0b0000_0000, 0x00, 0x02];
        assert_eq!(decode_type_04(&src, 5), vec![WINDOW_FILL; 5]);
    }

    #[test]
    fn truncated_source_stops_early() {
        let src = [0xFF, 1, 2];
        assert_eq!(decode_type_04(&src, 8), vec![1, 2]);
    }

    #[test]
    fn output_is_capped_at_expected_len() {
        let src = [0xFF, 1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(decode_type_04(&src, 3), vec![1, 2, 3]);
    }
}
