//! Message field encoding.
//!
//! A page occupies one vector word per address word plus zero or more
//! message words. Several recipients can share one message field, each
//! with its own vectors. Words here are 21-bit information values; BCH
//! coding happens when the frame is assembled.

use crate::address::Capcode;
use crate::codec::{with_checksum, INFO_BITS, WORDS_PER_PHASE};
use crate::error::EncodeError;
use crate::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Vector type for short messages and tone-only pages.
pub const VECTOR_SHORT: u32 = 0b010;
/// Vector type for standard numeric messages.
pub const VECTOR_NUMERIC: u32 = 0b011;
/// Vector type for alphanumeric messages.
pub const VECTOR_ALPHANUMERIC: u32 = 0b101;

/// Maximum words in a numeric message (3-bit length field).
pub const MAX_NUMERIC_WORDS: usize = 8;
/// Maximum words in an alphanumeric message (7-bit length field).
pub const MAX_ALPHANUMERIC_WORDS: usize = 127;

/// Recipients that can share one frame.
///
/// Keeps the vector field start inside the 6-bit BIW pointer even when
/// every recipient has a long address.
pub const MAX_RECIPIENTS: usize = 16;

/// Numeric fill character (space).
const NUMERIC_FILL: u32 = 0xC;
/// Numeric digits start after the two checksum bits.
const NUMERIC_FIRST_BIT: usize = 2;
const DIGIT_BITS: usize = 4;

/// End-of-text padding for alphanumeric content words.
const ETX: u32 = 0x03;
const CHAR_BITS: u32 = 7;
/// Fragment number marking a single complete fragment.
const FRAGMENT_ONLY: u32 = 0b11;

/// A page payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum Message {
    /// Alert without payload.
    ToneOnly,
    /// Digits and the limited numeric character set.
    Numeric(String),
    /// 7-bit ASCII text.
    Alphanumeric(String),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::ToneOnly => MessageKind::ToneOnly,
            Message::Numeric(_) => MessageKind::Numeric,
            Message::Alphanumeric(_) => MessageKind::Alphanumeric,
        }
    }
}

/// Message type without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    ToneOnly,
    Numeric,
    Alphanumeric,
}

/// Message field words ready for frame assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage {
    kind: MessageKind,
    words: Vec<u32>,
    numeric_check: u32,
    /// Every recipient has a long address, so the first word travels only in
    /// their second vector slots.
    carried: bool,
}

impl EncodedMessage {
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    /// All message words, including one carried in a long-address vector slot.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Words placed in the message field, after the vector field.
    pub fn field_words(&self) -> &[u32] {
        if self.carried && !self.words.is_empty() {
            &self.words[1..]
        } else {
            &self.words
        }
    }

    /// Vector words of one recipient for a message field beginning at word
    /// `message_start`.
    ///
    /// A long address gets a second vector slot carrying the first message
    /// word; its vector then describes only the words after that one.
    pub fn vector_words(&self, capcode: Capcode, message_start: usize) -> Vec<u32> {
        if !capcode.is_long() {
            return vec![self.vector(message_start, self.words.len())];
        }

        let rest_start = if self.carried {
            message_start
        } else {
            message_start + 1
        };
        let rest_len = self.words.len().saturating_sub(1);
        let first = self.words.first().copied().unwrap_or(0);
        vec![self.vector(rest_start, rest_len), first]
    }

    fn vector(&self, start: usize, words: usize) -> u32 {
        let (start, words) = (start as u32, words as u32);
        match self.kind {
            MessageKind::ToneOnly => short_vector(),
            MessageKind::Numeric => numeric_vector(start, words, self.numeric_check),
            MessageKind::Alphanumeric => alphanumeric_vector(start, words),
        }
    }
}

/// Short message vector announcing a tone-only page (t = 01, source 0).
fn short_vector() -> u32 {
    with_checksum((VECTOR_SHORT << 4) | (0b01 << 7))
}

/// `words` is the number of message-field words; the vector stores it minus one.
fn numeric_vector(start: u32, words: u32, check: u32) -> u32 {
    with_checksum(
        (VECTOR_NUMERIC << 4)
            | ((start & 0x7F) << 7)
            | ((words.saturating_sub(1) & 0x7) << 14)
            | ((check & 0xF) << 17),
    )
}

fn alphanumeric_vector(start: u32, words: u32) -> u32 {
    with_checksum((VECTOR_ALPHANUMERIC << 4) | ((start & 0x7F) << 7) | ((words & 0x7F) << 14))
}

fn all_long(recipients: &[Capcode]) -> bool {
    !recipients.is_empty() && recipients.iter().all(|c| c.is_long())
}

/// Message words the recipients can share in one phase.
///
/// One BIW plus an address and a vector word per address word. When every
/// recipient has a long address the first message word rides in their
/// second vector slots instead of the message field.
pub fn message_word_budget(recipients: &[Capcode]) -> usize {
    let address_words: usize = recipients.iter().map(|c| c.address_word_count()).sum();
    let carried = usize::from(all_long(recipients));
    (WORDS_PER_PHASE + carried).saturating_sub(1 + 2 * address_words)
}

/// Encodes a message shared by the given recipients.
pub fn encode_message(recipients: &[Capcode], message: &Message) -> Result<EncodedMessage> {
    if recipients.is_empty() {
        return Err(EncodeError::invalid_input("message has no recipients"));
    }
    if recipients.len() > MAX_RECIPIENTS {
        return Err(EncodeError::TooManyRecipients {
            count: recipients.len(),
            limit: MAX_RECIPIENTS,
        });
    }

    let any_long = recipients.iter().any(|c| c.is_long());
    let (words, numeric_check, limit) = match message {
        Message::ToneOnly => (Vec::new(), 0, 0),
        Message::Numeric(text) => {
            let min_words = if any_long { 2 } else { 1 };
            let (words, check) = pack_numeric(text, min_words)?;
            (words, check, MAX_NUMERIC_WORDS)
        }
        Message::Alphanumeric(text) => (pack_alphanumeric(text)?, 0, MAX_ALPHANUMERIC_WORDS),
    };

    let limit = limit.min(message_word_budget(recipients));
    if words.len() > limit {
        return Err(EncodeError::MessageTooLong {
            words: words.len(),
            limit,
        });
    }

    debug!(
        "Encoded {:?} message for {} recipient(s): {} words",
        message.kind(),
        recipients.len(),
        words.len()
    );

    Ok(EncodedMessage {
        kind: message.kind(),
        words,
        numeric_check,
        carried: all_long(recipients),
    })
}

fn numeric_code(c: char) -> Option<u32> {
    let code = match c {
        '0'..='9' => c as u32 - '0' as u32,
        'A' | 'S' => 0xA,
        'B' | 'U' => 0xB,
        ' ' => 0xC,
        '-' | 'C' => 0xD,
        ']' | ')' | 'D' => 0xE,
        '[' | '(' | 'E' => 0xF,
        _ => return None,
    };
    Some(code)
}

/// Writes a 4-bit code at an absolute bit position, spilling into the next word if needed.
fn put_digit(words: &mut Vec<u32>, bit: usize, code: u32) {
    let index = bit / INFO_BITS as usize;
    let offset = bit % INFO_BITS as usize;
    let room = INFO_BITS as usize - offset;
    if words.len() <= index {
        words.resize(index + 1, 0);
    }
    if room >= DIGIT_BITS {
        words[index] |= code << offset;
    } else {
        words[index] |= (code & ((1 << room) - 1)) << offset;
        if words.len() <= index + 1 {
            words.resize(index + 2, 0);
        }
        words[index + 1] |= code >> room;
    }
}

/// Packs numeric text and returns the words and the low 4 checksum bits for the vector.
fn pack_numeric(text: &str, min_words: usize) -> Result<(Vec<u32>, u32)> {
    let word_bits = INFO_BITS as usize;
    let mut words = Vec::new();
    let mut bit = NUMERIC_FIRST_BIT;

    for c in text.chars() {
        let code = numeric_code(c).ok_or_else(|| {
            EncodeError::invalid_message(format!("character {:?} is not valid in a numeric page", c))
        })?;
        put_digit(&mut words, bit, code);
        bit += DIGIT_BITS;
    }

    // Whole fill characters only; a tail shorter than a digit stays zero.
    let used_words = bit.div_ceil(word_bits).max(min_words);
    while bit + DIGIT_BITS <= used_words * word_bits {
        put_digit(&mut words, bit, NUMERIC_FILL);
        bit += DIGIT_BITS;
    }
    words.resize(used_words, 0);

    let binsum = words
        .iter()
        .map(|w| (w & 0xFF) + ((w >> 8) & 0xFF) + ((w >> 16) & 0x1F))
        .sum::<u32>()
        & 0xFF;
    let folded = (binsum & 0x3F) + ((binsum >> 6) & 0x3);
    let check = !folded & 0x3F;

    words[0] |= (check >> 4) & 0x3;
    Ok((words, check & 0xF))
}

/// Packs alphanumeric text behind a fragment header.
fn pack_alphanumeric(text: &str) -> Result<Vec<u32>> {
    if !text.is_ascii() {
        return Err(EncodeError::invalid_message(
            "alphanumeric pages carry 7-bit ASCII only",
        ));
    }

    let chars: Vec<u32> = text.bytes().map(u32::from).collect();
    let signature = !chars.iter().sum::<u32>() & 0x7F;

    let mut slots = Vec::with_capacity(chars.len() + 3);
    slots.push(signature);
    slots.extend(chars);
    while slots.len() % 3 != 0 {
        slots.push(ETX);
    }

    let mut words = Vec::with_capacity(1 + slots.len() / 3);
    // Header: C = 0 (no continuation), F = 11 (only fragment), N = 0, R = 0, M = 0.
    words.push(FRAGMENT_ONLY << 11);
    for chunk in slots.chunks(3) {
        words.push(chunk[0] | (chunk[1] << CHAR_BITS) | (chunk[2] << (2 * CHAR_BITS)));
    }

    let sum: u32 = words
        .iter()
        .map(|w| (w & 0xFF) + ((w >> 8) & 0xFF) + ((w >> 16) & 0x1F))
        .sum();
    words[0] |= !sum & 0x3FF;

    Ok(words)
}
