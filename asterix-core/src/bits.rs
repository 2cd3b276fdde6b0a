//! MSB-first bit cursor over an item's bytes.
//!
//! Item layouts in the ASTERIX documents are given as bit ranges counted from
//! the most significant bit of the first octet. `BitReader` walks those ranges
//! in order so a decoder reads like the layout table it implements.

use crate::types::twos_complement;

pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader { data, pos: 0 }
    }

    /// Current bit position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bits left before the end of the data.
    pub fn remaining(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    pub fn skip(&mut self, bits: usize) {
        self.pos += bits;
    }

    /// Read `bits` (at most 64) as an unsigned value.
    ///
    /// Bits past the end of the data read as zero. Callers slice items to
    /// their exact span first, so this only matters for malformed layouts.
    pub fn read_u(&mut self, bits: usize) -> u64 {
        let mut value = 0u64;
        for _ in 0..bits.min(64) {
            let byte = self.pos / 8;
            let bit = if byte < self.data.len() {
                (self.data[byte] >> (7 - (self.pos % 8))) & 1
            } else {
                0
            };
            value = (value << 1) | bit as u64;
            self.pos += 1;
        }
        value
    }

    /// Read `bits` as a two's-complement signed value.
    pub fn read_i(&mut self, bits: usize) -> i64 {
        let raw = self.read_u(bits);
        twos_complement(raw, bits as u32)
    }

    pub fn read_flag(&mut self) -> bool {
        self.read_u(1) == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_unsigned_across_octets() {
        let data = [0b1010_1100, 0b0101_0011];
        let mut r = BitReader::new(&data);
        assert_eq!(r.read_u(3), 0b101);
        assert_eq!(r.read_u(7), 0b011_0001);
        assert_eq!(r.read_u(6), 0b01_0011);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn test_read_signed() {
        // 14-bit field holding -1 after two spare bits
        let data = [0x3F, 0xFF];
        let mut r = BitReader::new(&data);
        r.skip(2);
        assert_eq!(r.read_i(14), -1);
    }

    #[test]
    fn test_read_flag_and_position() {
        let data = [0x80];
        let mut r = BitReader::new(&data);
        assert!(r.read_flag());
        assert!(!r.read_flag());
        assert_eq!(r.position(), 2);
    }

    #[test]
    fn test_read_past_end_is_zero() {
        let data = [0xFF];
        let mut r = BitReader::new(&data);
        r.skip(4);
        assert_eq!(r.read_u(8), 0xF0);
    }
}
