//! Frame assembly.
//!
//! Word layout of one phase (88 words, 11 blocks of 8):
//!
//! ```text
//! +------+----------------+---------------+---------------+-----------+
//! | BIW1 | address field  | vector field  | message field | idle fill |
//! +------+----------------+---------------+---------------+-----------+
//! ```

use crate::address::Capcode;
use crate::codec::{encode_word, interleave, with_checksum, PhaseWords, INFO_MASK, WORDS_PER_PHASE};
use crate::error::EncodeError;
use crate::message::EncodedMessage;
use crate::scheduler::FrameAddress;
use crate::speed::Phase;
use crate::Result;
use tracing::debug;

/// Idle words alternate between these two information values.
const IDLE_EVEN: u32 = 0;
const IDLE_ODD: u32 = INFO_MASK;

/// Frame information word: cycle, frame, no roaming, no repeat, no traffic flags.
pub fn fiw_info(cycle: u8, frame: u8) -> u32 {
    with_checksum(((u32::from(cycle) & 0xF) << 4) | ((u32::from(frame) & 0x7F) << 8))
}

/// Block information word 1 with priority 0, no extra BIWs, no carry-on and no collapse.
pub fn biw1_info(vector_start: usize) -> u32 {
    with_checksum(((vector_start as u32) & 0x3F) << 10)
}

pub fn idle_info(index: usize) -> u32 {
    if index % 2 == 0 {
        IDLE_EVEN
    } else {
        IDLE_ODD
    }
}

/// Builds the information words of one phase.
struct PhaseBuilder {
    words: Vec<u32>,
}

impl PhaseBuilder {
    /// A phase with no pages.
    fn empty() -> Self {
        Self {
            words: vec![biw1_info(1)],
        }
    }

    /// A phase paging every recipient with one shared message field.
    ///
    /// Address words come in recipient order and the vector field mirrors
    /// it, one vector word per address word.
    fn with_pages(recipients: &[Capcode], message: &EncodedMessage) -> Self {
        let address_words: usize = recipients.iter().map(|c| c.address_word_count()).sum();
        let vector_start = 1 + address_words;
        let message_start = vector_start + address_words;

        let mut words = Vec::with_capacity(WORDS_PER_PHASE);
        words.push(biw1_info(vector_start));
        for capcode in recipients {
            words.extend(capcode.address_words());
        }
        for capcode in recipients {
            words.extend(message.vector_words(*capcode, message_start));
        }
        words.extend_from_slice(message.field_words());
        Self { words }
    }

    fn finish(mut self) -> Result<PhaseWords> {
        if self.words.len() > WORDS_PER_PHASE {
            return Err(EncodeError::fault(format!(
                "phase holds {} words, frame has room for {}",
                self.words.len(),
                WORDS_PER_PHASE
            )));
        }
        while self.words.len() < WORDS_PER_PHASE {
            let index = self.words.len();
            self.words.push(idle_info(index));
        }

        let mut encoded = [0u32; WORDS_PER_PHASE];
        for (slot, info) in encoded.iter_mut().zip(&self.words) {
            *slot = encode_word(*info)?;
        }
        Ok(encoded)
    }
}

/// A fully coded FLEX frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlexFrame {
    address: FrameAddress,
    fiw: u32,
    phases: Vec<PhaseWords>,
}

impl FlexFrame {
    /// Assembles the frame carrying the page in its scheduled phase.
    ///
    /// Every recipient must already be scheduled into `address`. The other
    /// phases of a multi-phase speed carry an empty block structure.
    pub fn assemble(
        address: FrameAddress,
        recipients: &[Capcode],
        message: &EncodedMessage,
    ) -> Result<Self> {
        let fiw = encode_word(fiw_info(address.cycle, address.frame))?;

        let phases = address
            .speed
            .phases()
            .iter()
            .map(|&phase| {
                if phase == address.phase {
                    PhaseBuilder::with_pages(recipients, message).finish()
                } else {
                    PhaseBuilder::empty().finish()
                }
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Assembled frame {} cycle {} phase {} at {} for {} recipient(s)",
            address.frame,
            address.cycle,
            address.phase,
            address.speed,
            recipients.len()
        );

        Ok(Self {
            address,
            fiw,
            phases,
        })
    }

    pub fn address(&self) -> FrameAddress {
        self.address
    }

    /// Encoded frame information word.
    pub fn fiw(&self) -> u32 {
        self.fiw
    }

    /// Encoded words of every phase, in transmission order.
    pub fn phases(&self) -> &[PhaseWords] {
        &self.phases
    }

    /// Encoded words of one phase, if the frame's speed carries it.
    pub fn phase(&self, phase: Phase) -> Option<&PhaseWords> {
        self.address
            .speed
            .phases()
            .iter()
            .position(|p| *p == phase)
            .map(|index| &self.phases[index])
    }

    /// Interleaved block bits of the frame body.
    pub fn body_bits(&self) -> Result<Vec<u8>> {
        interleave(&self.phases, self.address.speed)
    }
}
