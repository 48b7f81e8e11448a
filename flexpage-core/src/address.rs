//! Capcodes and address words.

use crate::error::EncodeError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest short-address capcode.
pub const SHORT_MIN: u32 = 1;
/// Highest short-address capcode.
pub const SHORT_MAX: u32 = 1_933_312;
/// Lowest long-address capcode.
pub const LONG_MIN: u32 = 2_068_481;
/// Highest long-address capcode.
pub const LONG_MAX: u32 = 1_075_843_072;

const SHORT_OFFSET: u32 = 0x8000;
const LONG_BASE: u32 = 2_068_480;
const LONG_WORD1_SPAN: u32 = 0x8000;
const LONG_WORD2_MASK: u32 = 0x1F_FFFF;

/// A validated pager address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Capcode(u32);

impl Capcode {
    /// Validates a raw capcode against the FLEX address ranges.
    pub fn new(value: u32) -> Result<Self> {
        if (SHORT_MIN..=SHORT_MAX).contains(&value) || (LONG_MIN..=LONG_MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(EncodeError::InvalidCapcode { capcode: value })
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Returns whether this capcode needs a two-word long address.
    pub fn is_long(self) -> bool {
        self.0 >= LONG_MIN
    }

    /// Number of address words this capcode occupies.
    pub fn address_word_count(self) -> usize {
        if self.is_long() {
            2
        } else {
            1
        }
    }

    /// The 21-bit information values of the address field, before BCH coding.
    pub fn address_words(self) -> Vec<u32> {
        if self.is_long() {
            let v = self.0 - LONG_BASE - 1;
            vec![
                v % LONG_WORD1_SPAN + 1,
                (v / LONG_WORD1_SPAN) ^ LONG_WORD2_MASK,
            ]
        } else {
            vec![self.0 + SHORT_OFFSET]
        }
    }

    /// Reconstructs a capcode from address field information values.
    pub fn from_address_words(words: &[u32]) -> Option<Self> {
        let value = match *words {
            [word] => word.checked_sub(SHORT_OFFSET)?,
            [first, second] => {
                let high = (second ^ LONG_WORD2_MASK).checked_mul(LONG_WORD1_SPAN)?;
                high.checked_add(LONG_BASE)?.checked_add(first)?
            }
            _ => return None,
        };
        Self::new(value).ok()
    }
}

impl TryFrom<u32> for Capcode {
    type Error = EncodeError;

    fn try_from(value: u32) -> Result<Self> {
        Capcode::new(value)
    }
}

impl From<Capcode> for u32 {
    fn from(capcode: Capcode) -> u32 {
        capcode.0
    }
}

impl fmt::Display for Capcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:07}", self.0)
    }
}
