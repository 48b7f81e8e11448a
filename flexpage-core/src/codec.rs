//! Bit and word level coding for FLEX.
//!
//! Every FLEX word is 32 bits on air:
//!
//! ```text
//! +-------------------+------------------+--------+
//! | information x0..  | BCH parity       | parity |
//! | bits 31..11 (21)  | bits 10..1 (10)  | bit 0  |
//! +-------------------+------------------+--------+
//! ```
//!
//! Information bits go out least significant bit first, so the 21-bit value
//! is bit-reversed into the top of the word before BCH encoding.

use crate::error::EncodeError;
use crate::speed::FlexSpeed;
use crate::Result;

/// BCH(31,21) generator polynomial: x^10 + x^9 + x^8 + x^6 + x^5 + x^3 + 1.
pub const BCH_GENERATOR: u32 = 0x769;

/// Number of information bits per word.
pub const INFO_BITS: u32 = 21;

/// Mask of the information bits.
pub const INFO_MASK: u32 = (1 << INFO_BITS) - 1;

/// Number of parity bits produced by the BCH code.
const PARITY_BITS: u32 = 10;

/// Words per interleaved block.
pub const WORDS_PER_BLOCK: usize = 8;

/// Blocks per frame.
pub const BLOCKS_PER_FRAME: usize = 11;

/// Words carried by one phase of a frame.
pub const WORDS_PER_PHASE: usize = WORDS_PER_BLOCK * BLOCKS_PER_FRAME;

/// Bits one phase contributes to a block.
pub const BITS_PER_BLOCK: usize = WORDS_PER_BLOCK * 32;

/// The 88 encoded words of one phase.
pub type PhaseWords = [u32; WORDS_PER_PHASE];

fn check_info(info: u32) -> Result<()> {
    if info > INFO_MASK {
        return Err(EncodeError::invalid_input(format!(
            "information value {:#x} exceeds 21 bits",
            info
        )));
    }
    Ok(())
}

/// Remainder of a 31-bit value divided by the generator polynomial.
fn remainder(mut value: u32) -> u32 {
    for bit in (PARITY_BITS..31).rev() {
        if value & (1 << bit) != 0 {
            value ^= BCH_GENERATOR << (bit - PARITY_BITS);
        }
    }
    value
}

/// Encodes 21 information bits into a systematic 31-bit BCH codeword.
///
/// The information occupies bits 30..10, the parity bits 9..0.
pub fn bch_encode(info: u32) -> Result<u32> {
    check_info(info)?;
    let shifted = info << PARITY_BITS;
    Ok(shifted | remainder(shifted))
}

/// Computes the syndrome of a 31-bit codeword. Zero for every valid codeword.
pub fn syndrome(codeword: u32) -> u32 {
    remainder(codeword & 0x7FFF_FFFF)
}

/// Reverses the order of the 21 information bits.
pub fn reverse_info(info: u32) -> u32 {
    (info & INFO_MASK).reverse_bits() >> (32 - INFO_BITS)
}

/// Builds the 32-bit on-air word for a 21-bit information value.
pub fn encode_word(info: u32) -> Result<u32> {
    check_info(info)?;
    let codeword = bch_encode(reverse_info(info))?;
    let word = codeword << 1;
    Ok(word | (word.count_ones() & 1))
}

/// Recovers the information value from an on-air word.
pub fn word_info(word: u32) -> u32 {
    reverse_info(word >> (32 - INFO_BITS))
}

/// Returns whether an on-air word has a zero syndrome and even parity.
pub fn word_is_valid(word: u32) -> bool {
    syndrome(word >> 1) == 0 && word.count_ones() % 2 == 0
}

/// Fills bits 0..3 with the FLEX 4-bit checksum.
///
/// The nibbles at bits 4..19, bit 20 and the checksum itself sum to 0xF.
pub fn with_checksum(info: u32) -> u32 {
    let info = info & INFO_MASK & !0xF;
    let sum = ((info >> 4) & 0xF)
        + ((info >> 8) & 0xF)
        + ((info >> 12) & 0xF)
        + ((info >> 16) & 0xF)
        + ((info >> 20) & 1);
    info | (!sum & 0xF)
}

/// Returns whether a word carrying a 4-bit checksum is consistent.
pub fn checksum_ok(info: u32) -> bool {
    let sum = (info & 0xF)
        + ((info >> 4) & 0xF)
        + ((info >> 8) & 0xF)
        + ((info >> 12) & 0xF)
        + ((info >> 16) & 0xF)
        + ((info >> 20) & 1);
    sum & 0xF == 0xF
}

/// Interleaves one block of one phase: bit 31 of words 0..7, then bit 30, and so on.
fn interleave_block(words: &[u32], out: &mut Vec<u8>) {
    for bit in (0..32).rev() {
        for word in words {
            out.push(((word >> bit) & 1) as u8);
        }
    }
}

fn check_phase_count(count: usize, speed: FlexSpeed) -> Result<()> {
    if count != speed.phases().len() {
        return Err(EncodeError::invalid_input(format!(
            "{} carries {} phases, got {}",
            speed,
            speed.phases().len(),
            count
        )));
    }
    Ok(())
}

/// Interleaves the encoded words of every phase into a bit sequence.
///
/// Each block is interleaved per phase; the phases are then multiplexed bit
/// by bit in phase order.
pub fn interleave(phases: &[PhaseWords], speed: FlexSpeed) -> Result<Vec<u8>> {
    check_phase_count(phases.len(), speed)?;

    let mut bits = Vec::with_capacity(BLOCKS_PER_FRAME * BITS_PER_BLOCK * phases.len());
    let mut block_bits: Vec<Vec<u8>> = vec![Vec::with_capacity(BITS_PER_BLOCK); phases.len()];

    for block in 0..BLOCKS_PER_FRAME {
        let range = block * WORDS_PER_BLOCK..(block + 1) * WORDS_PER_BLOCK;
        for (words, out) in phases.iter().zip(block_bits.iter_mut()) {
            out.clear();
            interleave_block(&words[range.clone()], out);
        }
        for i in 0..BITS_PER_BLOCK {
            for out in &block_bits {
                bits.push(out[i]);
            }
        }
    }

    Ok(bits)
}

/// Exact inverse of [`interleave`].
pub fn deinterleave(bits: &[u8], speed: FlexSpeed) -> Result<Vec<PhaseWords>> {
    let phase_count = speed.phases().len();
    let expected = BLOCKS_PER_FRAME * BITS_PER_BLOCK * phase_count;
    if bits.len() != expected {
        return Err(EncodeError::invalid_input(format!(
            "expected {} interleaved bits, got {}",
            expected,
            bits.len()
        )));
    }

    let mut phases = vec![[0u32; WORDS_PER_PHASE]; phase_count];
    for (index, bit) in bits.iter().enumerate() {
        let phase = index % phase_count;
        let position = index / phase_count;
        let block = position / BITS_PER_BLOCK;
        let within = position % BITS_PER_BLOCK;
        let word = block * WORDS_PER_BLOCK + within % WORDS_PER_BLOCK;
        let shift = 31 - within / WORDS_PER_BLOCK;
        phases[phase][word] |= u32::from(bit & 1) << shift;
    }

    Ok(phases)
}
