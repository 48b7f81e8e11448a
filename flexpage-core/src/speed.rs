//! Channel speeds and phases.

use crate::error::EncodeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Interleaved sub-channel of a FLEX frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    A,
    B,
    C,
    D,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::A => write!(f, "A"),
            Phase::B => write!(f, "B"),
            Phase::C => write!(f, "C"),
            Phase::D => write!(f, "D"),
        }
    }
}

/// Supported FLEX channel speeds.
///
/// | speed | symbol rate | levels | phases     |
/// |-------|-------------|--------|------------|
/// | 1600  | 1600        | 2      | A          |
/// | 3200  | 3200        | 2      | A, C       |
/// | 6400  | 3200        | 4      | A, B, C, D |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum FlexSpeed {
    #[default]
    Bps1600,
    Bps3200,
    Bps6400,
}

impl FlexSpeed {
    /// All supported speeds, slowest first.
    pub const ALL: [FlexSpeed; 3] = [FlexSpeed::Bps1600, FlexSpeed::Bps3200, FlexSpeed::Bps6400];

    /// Resolves a bit rate in bits per second.
    pub fn from_bps(bps: u32) -> Result<Self, EncodeError> {
        match bps {
            1600 => Ok(FlexSpeed::Bps1600),
            3200 => Ok(FlexSpeed::Bps3200),
            6400 => Ok(FlexSpeed::Bps6400),
            other => Err(EncodeError::UnsupportedBaudRate { baud_rate: other }),
        }
    }

    /// Data rate in bits per second.
    pub fn bps(self) -> u32 {
        match self {
            FlexSpeed::Bps1600 => 1600,
            FlexSpeed::Bps3200 => 3200,
            FlexSpeed::Bps6400 => 6400,
        }
    }

    /// Symbols per second of the frame body.
    pub fn symbol_rate(self) -> u32 {
        match self {
            FlexSpeed::Bps1600 => 1600,
            FlexSpeed::Bps3200 | FlexSpeed::Bps6400 => 3200,
        }
    }

    /// Number of FSK levels used for the frame body.
    pub fn levels(self) -> u8 {
        match self {
            FlexSpeed::Bps1600 | FlexSpeed::Bps3200 => 2,
            FlexSpeed::Bps6400 => 4,
        }
    }

    pub fn bits_per_symbol(self) -> usize {
        if self.levels() == 4 {
            2
        } else {
            1
        }
    }

    /// Phases carried at this speed, in transmission order.
    pub fn phases(self) -> &'static [Phase] {
        match self {
            FlexSpeed::Bps1600 => &[Phase::A],
            FlexSpeed::Bps3200 => &[Phase::A, Phase::C],
            FlexSpeed::Bps6400 => &[Phase::A, Phase::B, Phase::C, Phase::D],
        }
    }

    /// 32-bit sync code announcing this speed in sync 1.
    ///
    /// Receivers pick the body's symbol rate and level count from the high
    /// half, so the code must agree with [`FlexSpeed::symbol_rate`] and
    /// [`FlexSpeed::levels`]. The low half is its complement. `0xB068` would
    /// announce 1600 baud 4-level, which no speed here uses.
    pub fn sync_code(self) -> u32 {
        match self {
            FlexSpeed::Bps1600 => 0x870C_78F3,
            FlexSpeed::Bps3200 => 0x7B18_84E7,
            FlexSpeed::Bps6400 => 0x4C7C_B383,
        }
    }

    /// Number of 1600-baud sync symbols each sync bit expands to at this symbol rate.
    pub fn sync_repeat(self) -> usize {
        (self.symbol_rate() / 1600) as usize
    }
}

impl TryFrom<u32> for FlexSpeed {
    type Error = EncodeError;

    fn try_from(bps: u32) -> Result<Self, Self::Error> {
        FlexSpeed::from_bps(bps)
    }
}

impl From<FlexSpeed> for u32 {
    fn from(speed: FlexSpeed) -> u32 {
        speed.bps()
    }
}

impl fmt::Display for FlexSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bps", self.bps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bps() {
        assert_eq!(FlexSpeed::from_bps(1600).unwrap(), FlexSpeed::Bps1600);
        assert_eq!(FlexSpeed::from_bps(3200).unwrap(), FlexSpeed::Bps3200);
        assert_eq!(FlexSpeed::from_bps(6400).unwrap(), FlexSpeed::Bps6400);
        assert_eq!(
            FlexSpeed::from_bps(9600),
            Err(EncodeError::UnsupportedBaudRate { baud_rate: 9600 })
        );
        assert!(FlexSpeed::from_bps(0).is_err());
    }

    #[test]
    fn test_speed_table() {
        assert_eq!(FlexSpeed::Bps1600.symbol_rate(), 1600);
        assert_eq!(FlexSpeed::Bps3200.symbol_rate(), 3200);
        assert_eq!(FlexSpeed::Bps6400.symbol_rate(), 3200);
        assert_eq!(FlexSpeed::Bps6400.levels(), 4);
        assert_eq!(FlexSpeed::Bps6400.bits_per_symbol(), 2);

        for speed in FlexSpeed::ALL {
            assert_eq!(
                speed.symbol_rate() as usize * speed.bits_per_symbol(),
                speed.phases().len() * 1600
            );
        }
    }

    #[test]
    fn test_sync_codes_are_self_complementary() {
        for speed in FlexSpeed::ALL {
            let code = speed.sync_code();
            assert_eq!((code >> 16) as u16, !(code as u16));
        }
    }

    #[test]
    fn test_sync_codes_match_receiver_modes() {
        // high half of the sync code -> (baud, levels) as FLEX receivers decode it
        let modes: [(u16, u32, u8); 5] = [
            (0x870C, 1600, 2),
            (0xB068, 1600, 4),
            (0x7B18, 3200, 2),
            (0xDEA0, 3200, 4),
            (0x4C7C, 3200, 4),
        ];
        let mode_of = |code: u32| {
            modes
                .iter()
                .find(|(high, _, _)| u32::from(*high) == code >> 16)
                .map(|(_, baud, levels)| (*baud, *levels))
        };

        assert_eq!(FlexSpeed::Bps1600.sync_code(), 0x870C_78F3);
        assert_eq!(FlexSpeed::Bps3200.sync_code(), 0x7B18_84E7);
        assert_eq!(FlexSpeed::Bps6400.sync_code(), 0x4C7C_B383);

        for speed in FlexSpeed::ALL {
            assert_eq!(
                mode_of(speed.sync_code()),
                Some((speed.symbol_rate(), speed.levels())),
                "{}",
                speed
            );
        }
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&FlexSpeed::Bps3200).unwrap();
        assert_eq!(json, "3200");

        let speed: FlexSpeed = serde_json::from_str("6400").unwrap();
        assert_eq!(speed, FlexSpeed::Bps6400);

        let err = serde_json::from_str::<FlexSpeed>("9600");
        assert!(err.is_err());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::A.to_string(), "A");
        assert_eq!(serde_json::to_string(&Phase::D).unwrap(), "\"D\"");
    }
}
