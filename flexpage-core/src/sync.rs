//! Synchronisation patterns.
//!
//! Everything here is a 2-level bit pattern defined at 1600 baud. The symbol
//! serializer stretches it when the frame body runs at 3200 baud.

use crate::speed::FlexSpeed;

/// Low half shared by every sync-1 A word.
const A_WORD_LOW: u32 = 0x5939;

/// A word sent in the resync preamble.
const PREAMBLE_A_WORD: u32 = 0xCB20_5939;

/// Comma, C pattern, inverted comma, inverted C.
const SYNC2_PATTERN: u64 = 0b1010_1110_1101_1000_0100_0101_0001_0010_0111_1011;
const SYNC2_BITS: u32 = 40;

/// Bits in one preamble repetition.
pub const PREAMBLE_BITS: usize = 96;

/// Bits in sync 1: bit sync, A, B, inverted A.
pub const SYNC1_BITS: usize = 32 + 32 + 16 + 32;

/// Appends the low `width` bits of `value`, most significant first.
pub fn push_bits(bits: &mut Vec<u8>, value: u64, width: u32) {
    for shift in (0..width).rev() {
        bits.push(((value >> shift) & 1) as u8);
    }
}

/// Alternating `1010...` pattern of the given length.
fn push_alternating(bits: &mut Vec<u8>, len: usize, start: u8) {
    for i in 0..len {
        bits.push(start ^ (i % 2) as u8);
    }
}

/// The A word announcing a speed.
pub fn a_word(speed: FlexSpeed) -> u32 {
    let high = !(speed.sync_code() >> 16) & 0xFFFF;
    (high << 16) | A_WORD_LOW
}

/// Resync preamble sent ahead of the frame.
pub fn preamble(repeats: usize) -> Vec<u8> {
    let mut bits = Vec::with_capacity(repeats * PREAMBLE_BITS);
    for _ in 0..repeats {
        push_alternating(&mut bits, 16, 1);
        push_bits(&mut bits, u64::from(PREAMBLE_A_WORD), 32);
        push_alternating(&mut bits, 16, 0);
        push_bits(&mut bits, u64::from(!PREAMBLE_A_WORD), 32);
    }
    bits
}

/// Sync 1, which tells receivers the speed of the frame that follows.
pub fn sync1(speed: FlexSpeed) -> Vec<u8> {
    let a = a_word(speed);
    let mut bits = Vec::with_capacity(SYNC1_BITS);
    push_alternating(&mut bits, 32, 1);
    push_bits(&mut bits, u64::from(a), 32);
    push_alternating(&mut bits, 16, 0);
    push_bits(&mut bits, u64::from(!a), 32);
    bits
}

/// Sync 2, sent after the frame information word.
pub fn sync2() -> Vec<u8> {
    let mut bits = Vec::with_capacity(SYNC2_BITS as usize);
    push_bits(&mut bits, SYNC2_PATTERN, SYNC2_BITS);
    bits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_u32(bits: &[u8]) -> u32 {
        bits.iter().fold(0, |acc, b| (acc << 1) | u32::from(*b))
    }

    #[test]
    fn test_a_word_1600() {
        assert_eq!(a_word(FlexSpeed::Bps1600), 0x78F3_5939);
        assert_eq!(!a_word(FlexSpeed::Bps1600), 0x870C_A6C6);
    }

    #[test]
    fn test_a_word_table() {
        // the 1600 bps A word as a bit string, first bit on air first
        let a1 = "01111000111100110101100100111001";
        assert_eq!(u32::from_str_radix(a1, 2).unwrap(), a_word(FlexSpeed::Bps1600));

        assert_eq!(a_word(FlexSpeed::Bps3200), 0x84E7_5939);
        assert_eq!(a_word(FlexSpeed::Bps6400), 0xB383_5939);
    }

    #[test]
    fn test_inverted_a_word_carries_sync_code() {
        // receivers read the sync code from the inverted A word
        for speed in FlexSpeed::ALL {
            assert_eq!(!a_word(speed) >> 16, speed.sync_code() >> 16);
        }
    }

    #[test]
    fn test_sync1_layout() {
        let bits = sync1(FlexSpeed::Bps1600);
        assert_eq!(bits.len(), SYNC1_BITS);
        assert_eq!(to_u32(&bits[0..32]), 0xAAAA_AAAA);
        assert_eq!(to_u32(&bits[32..64]), 0x78F3_5939);
        assert_eq!(to_u32(&bits[64..80]), 0x5555);
        assert_eq!(to_u32(&bits[80..112]), 0x870C_A6C6);
    }

    #[test]
    fn test_sync1_per_speed() {
        let expected = [
            (FlexSpeed::Bps1600, 0x78F3_5939u32, 0x870C_A6C6u32),
            (FlexSpeed::Bps3200, 0x84E7_5939, 0x7B18_A6C6),
            (FlexSpeed::Bps6400, 0xB383_5939, 0x4C7C_A6C6),
        ];
        for (speed, a, inverted) in expected {
            let bits = sync1(speed);
            assert_eq!(to_u32(&bits[32..64]), a);
            assert_eq!(to_u32(&bits[80..112]), inverted);
        }
    }

    #[test]
    fn test_preamble() {
        let bits = preamble(2);
        assert_eq!(bits.len(), 2 * PREAMBLE_BITS);
        assert_eq!(to_u32(&bits[0..16]), 0xAAAA);
        assert_eq!(to_u32(&bits[16..48]), PREAMBLE_A_WORD);
        assert_eq!(to_u32(&bits[48..64]), 0x5555);
        assert_eq!(to_u32(&bits[64..96]), !PREAMBLE_A_WORD);
        assert!(preamble(0).is_empty());
    }

    #[test]
    fn test_sync2() {
        let bits = sync2();
        assert_eq!(bits.len(), 40);
        assert_eq!(&bits[..4], &[1, 0, 1, 0]);
        assert_eq!(to_u32(&bits[4..20]), 0xED84);
        assert_eq!(to_u32(&bits[24..40]), !0xED84u32 & 0xFFFF);
    }
}
