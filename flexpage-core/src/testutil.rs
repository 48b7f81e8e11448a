//! Receive-side helpers used to check encoder output in tests.

use crate::address::Capcode;
use crate::codec::{deinterleave, word_info, PhaseWords, INFO_BITS};
use crate::message::{VECTOR_ALPHANUMERIC, VECTOR_NUMERIC};
use crate::speed::FlexSpeed;
use crate::symbols::{four_level_bits, SymbolStream};
use crate::sync::{PREAMBLE_BITS, SYNC1_BITS};

const NUMERIC_CHARS: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'U', ' ', '-', ']', '[',
];

/// Reads numeric digits back out of message words, dropping trailing fill.
pub fn decode_numeric(words: &[u32]) -> String {
    let total = words.len() * INFO_BITS as usize;
    let bit_at = |bit: usize| (words[bit / 21] >> (bit % 21)) & 1;

    let mut text = String::new();
    let mut bit = 2;
    while bit + 4 <= total {
        let code = (0..4).fold(0, |acc, i| acc | (bit_at(bit + i) << i));
        text.push(NUMERIC_CHARS[code as usize]);
        bit += 4;
    }
    text.trim_end_matches(' ').to_string()
}

/// Reads alphanumeric text back out of message words (header first).
pub fn decode_alphanumeric(words: &[u32]) -> String {
    words
        .iter()
        .skip(1)
        .flat_map(|w| [w & 0x7F, (w >> 7) & 0x7F, (w >> 14) & 0x7F])
        .skip(1)
        .filter(|c| *c != 0x03)
        .map(|c| c as u8 as char)
        .collect()
}

/// Extracts the capcode and message words of the first page in a phase.
pub fn page_from_phase(words: &PhaseWords) -> (Capcode, Vec<u32>) {
    pages_from_phase(words).remove(0)
}

/// Extracts every page in a phase, in address field order.
///
/// Address values up to 0x8000 open a two-word long address.
pub fn pages_from_phase(words: &PhaseWords) -> Vec<(Capcode, Vec<u32>)> {
    let info: Vec<u32> = words.iter().map(|w| word_info(*w)).collect();
    let vector_start = ((info[0] >> 10) & 0x3F) as usize;

    let mut pages = Vec::new();
    let mut index = 1;
    while index < vector_start {
        let len = if info[index] <= 0x8000 { 2 } else { 1 };
        let capcode =
            Capcode::from_address_words(&info[index..index + len]).expect("address decodes");
        // vector words mirror the address words
        let vector_index = vector_start + (index - 1);
        pages.push((capcode, read_message(&info, vector_index, len == 2)));
        index += len;
    }
    pages
}

fn read_message(info: &[u32], vector_index: usize, long: bool) -> Vec<u32> {
    let vector = info[vector_index];
    let kind = (vector >> 4) & 0x7;
    let start = ((vector >> 7) & 0x7F) as usize;
    let length = ((vector >> 14) & 0x7F) as usize;

    let mut message = Vec::new();
    if long {
        message.push(info[vector_index + 1]);
    }
    match kind {
        VECTOR_ALPHANUMERIC => message.extend_from_slice(&info[start..start + length]),
        VECTOR_NUMERIC => {
            let count = (length & 0x7) + 1;
            message.extend_from_slice(&info[start..start + count]);
        }
        _ => message.clear(),
    }
    message
}

/// Splits a transmitted stream back into its FIW and phase words.
pub fn decode_stream(
    stream: &SymbolStream,
    speed: FlexSpeed,
    preamble_repeats: usize,
) -> (u32, Vec<PhaseWords>) {
    let repeat = speed.sync_repeat();
    let symbols = stream.symbols();

    let fiw_start = (preamble_repeats * PREAMBLE_BITS + SYNC1_BITS) * repeat;
    let fiw = (0..32).fold(0u32, |acc, i| {
        let symbol = symbols[fiw_start + i * repeat];
        (acc << 1) | u32::from(symbol == 3)
    });

    let body_start = fiw_start + (32 + 40) * repeat;
    let mut bits = Vec::new();
    for symbol in &symbols[body_start..] {
        if speed.levels() == 4 {
            let (a, b) = four_level_bits(*symbol);
            bits.push(a);
            bits.push(b);
        } else {
            bits.push(u8::from(*symbol == 3));
        }
    }
    let phases = deinterleave(&bits, speed).expect("body deinterleaves");
    (fiw, phases)
}
