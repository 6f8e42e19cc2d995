//! Power-up mode selection.
//!
//! The first multiplexed sample set decides which protocol family runs for
//! the rest of the session. The decision is stored once in a [`ModeCell`]
//! and never revisited.

use portable_atomic::{AtomicU8, Ordering};

use crate::lines::Port;
use crate::mux::{decode_pad, RawSampleTable};
use crate::types::Buttons;

/// Active protocol family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Multiplexed,
    Serial,
}

impl Mode {
    const fn encode(self) -> u8 {
        match self {
            Mode::Multiplexed => MODE_MULTIPLEXED,
            Mode::Serial => MODE_SERIAL,
        }
    }

    const fn decode(raw: u8) -> Option<Self> {
        match raw {
            MODE_MULTIPLEXED => Some(Mode::Multiplexed),
            MODE_SERIAL => Some(Mode::Serial),
            _ => None,
        }
    }
}

const MODE_UNDECIDED: u8 = 0;
const MODE_MULTIPLEXED: u8 = 1;
const MODE_SERIAL: u8 = 2;

/// Error returned by [`ModeCell::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeError {
    /// A mode was already stored; carries the stored one.
    AlreadySelected(Mode),
}

/// Set-once holder for the session mode, shared between tasks.
pub struct ModeCell(AtomicU8);

impl ModeCell {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU8::new(MODE_UNDECIDED))
    }

    /// Store `mode` unless one was already stored.
    pub fn select(&self, mode: Mode) -> Result<(), ModeError> {
        self.0
            .compare_exchange(
                MODE_UNDECIDED,
                mode.encode(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map(|_| ())
            .map_err(|current| match Mode::decode(current) {
                Some(stored) => ModeError::AlreadySelected(stored),
                None => ModeError::AlreadySelected(mode),
            })
    }

    /// The stored mode, or `None` while undecided.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<Mode> {
        Mode::decode(self.0.load(Ordering::Acquire))
    }
}

impl Default for ModeCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Inputs that steer arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ArbitrationConfig {
    /// Buttons held on player 2 at power-up that force multiplexed mode.
    pub mux_chord: Buttons,
    /// Raw port 1 byte at the last phase that indicates a serial pad is wired
    /// in. No multiplexed pad reads `0x00` there: it would mean Up and Down
    /// both pressed.
    pub serial_marker: u8,
}

impl ArbitrationConfig {
    pub const DEFAULT: Self = Self {
        mux_chord: Buttons::START,
        serial_marker: 0x00,
    };
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One-shot mode decision.
pub struct Arbiter {
    config: ArbitrationConfig,
    decided: bool,
}

impl Arbiter {
    #[must_use]
    pub const fn new(config: ArbitrationConfig) -> Self {
        Self {
            config,
            decided: false,
        }
    }

    /// An arbiter that has nothing left to decide, for fixed-mode profiles.
    #[must_use]
    pub const fn decided(config: ArbitrationConfig) -> Self {
        Self {
            config,
            decided: true,
        }
    }

    /// Decide the mode from the first sample set. Returns `None` on every
    /// later call.
    pub fn arbitrate(&mut self, table: &RawSampleTable) -> Option<Mode> {
        if self.decided {
            return None;
        }
        self.decided = true;

        let chord = decode_pad(table.port(Port::Two))
            .buttons
            .contains(self.config.mux_chord);
        let marker = table.last_sample(Port::One) == self.config.serial_marker;

        let mode = match (chord, marker) {
            (false, true) => Mode::Serial,
            _ => Mode::Multiplexed,
        };
        info!("mode selected: {:?} (chord {}, marker {})", mode, chord, marker);
        Some(mode)
    }

    #[inline]
    #[must_use]
    pub fn is_decided(&self) -> bool {
        self.decided
    }
}
