//! FSK symbol streams.
//!
//! Symbols are indices 0..=3 from the lowest to the highest deviation. Two-level
//! sections use only the outer symbols; four-level sections carry two bits per
//! symbol in Gray code.

use crate::error::EncodeError;
use crate::frame::FlexFrame;
use crate::sync;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Highest symbol index.
pub const MAX_SYMBOL: u8 = 3;

/// Two-level symbol for a bit.
pub fn two_level(bit: u8) -> u8 {
    if bit & 1 == 1 {
        MAX_SYMBOL
    } else {
        0
    }
}

/// Four-level Gray-coded symbol for a bit pair (first bit most significant).
pub fn four_level(first: u8, second: u8) -> u8 {
    match (first & 1, second & 1) {
        (0, 0) => 0,
        (0, 1) => 1,
        (1, 1) => 2,
        _ => 3,
    }
}

/// Inverse of [`four_level`].
pub fn four_level_bits(symbol: u8) -> (u8, u8) {
    match symbol {
        0 => (0, 0),
        1 => (0, 1),
        2 => (1, 1),
        _ => (1, 0),
    }
}

/// Ordered symbols at a single rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolStream {
    symbol_rate: u32,
    symbols: Vec<u8>,
}

impl SymbolStream {
    pub fn new(symbol_rate: u32) -> Self {
        Self {
            symbol_rate,
            symbols: Vec::new(),
        }
    }

    /// Builds a stream from raw symbol indices.
    pub fn from_symbols(symbol_rate: u32, symbols: Vec<u8>) -> Result<Self> {
        if let Some(bad) = symbols.iter().find(|s| **s > MAX_SYMBOL) {
            return Err(EncodeError::invalid_input(format!(
                "symbol {} out of range",
                bad
            )));
        }
        Ok(Self {
            symbol_rate,
            symbols,
        })
    }

    /// Serializes a frame: preamble, sync 1, FIW, sync 2, then the interleaved body.
    ///
    /// Preamble, sync and FIW are 2-level 1600-baud patterns; at 3200 baud
    /// each of their bits is sent as two identical symbols.
    pub fn from_frame(frame: &FlexFrame, preamble_repeats: usize) -> Result<Self> {
        let speed = frame.address().speed;
        let repeat = speed.sync_repeat();

        let mut header = sync::preamble(preamble_repeats);
        header.extend(sync::sync1(speed));
        sync::push_bits(&mut header, u64::from(frame.fiw()), 32);
        header.extend(sync::sync2());

        let body = frame.body_bits()?;

        let mut stream = Self::new(speed.symbol_rate());
        stream
            .symbols
            .reserve(header.len() * repeat + body.len() / speed.bits_per_symbol());
        stream.push_two_level(&header, repeat);
        if speed.levels() == 4 {
            stream.push_four_level(&body)?;
        } else {
            stream.push_two_level(&body, 1);
        }
        Ok(stream)
    }

    /// Appends bits as outer-level symbols, each repeated `repeat` times.
    pub fn push_two_level(&mut self, bits: &[u8], repeat: usize) {
        for bit in bits {
            let symbol = two_level(*bit);
            self.symbols.extend(std::iter::repeat(symbol).take(repeat));
        }
    }

    /// Appends bit pairs as Gray-coded symbols.
    pub fn push_four_level(&mut self, bits: &[u8]) -> Result<()> {
        if bits.len() % 2 != 0 {
            return Err(EncodeError::invalid_input(format!(
                "4-level section needs an even bit count, got {}",
                bits.len()
            )));
        }
        self.symbols
            .extend(bits.chunks_exact(2).map(|pair| four_level(pair[0], pair[1])));
        Ok(())
    }

    pub fn symbol_rate(&self) -> u32 {
        self.symbol_rate
    }

    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Air time of the stream.
    pub fn duration(&self) -> Duration {
        if self.symbol_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.symbols.len() as u64 * 1_000_000 / u64::from(self.symbol_rate))
    }

    /// Packs four symbols per byte, first symbol in the high bits.
    pub fn to_packed(&self) -> Vec<u8> {
        self.symbols
            .chunks(4)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, s)| acc | (*s << (6 - 2 * i)))
            })
            .collect()
    }

    /// Unpacks `count` symbols produced by [`SymbolStream::to_packed`].
    pub fn from_packed(symbol_rate: u32, packed: &[u8], count: usize) -> Result<Self> {
        if count > packed.len() * 4 {
            return Err(EncodeError::invalid_input(format!(
                "{} packed bytes cannot hold {} symbols",
                packed.len(),
                count
            )));
        }
        let symbols = (0..count)
            .map(|i| (packed[i / 4] >> (6 - 2 * (i % 4))) & 0x3)
            .collect();
        Ok(Self {
            symbol_rate,
            symbols,
        })
    }
}
