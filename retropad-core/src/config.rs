//! Compile-time configuration: timing constants and capability profiles.
//!
//! Customize these at compile time by creating your own const, the same way
//! [`Timing::DEFAULT`] is built.

use crate::arbiter::Mode;

/// Tick periods and windows for every engine, in microseconds unless noted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// Select-line phase period of the multiplexed engine.
    pub poll_phase_us: u32,
    /// Gap between two multiplexed sample sets.
    pub inter_packet_us: u32,
    /// Minimum delay between a select toggle and latching the input lines.
    pub settle_us: u32,
    /// Half period of the serial clock.
    pub serial_half_period_us: u32,
    /// Period of the serial watchdog tick.
    pub watchdog_tick_us: u32,
    /// Watchdog ticks without a clock tick before a transaction is abandoned.
    pub watchdog_window_ticks: u8,
    /// Idle countdown tick. Matches the 4 ms unit of the HID idle rate.
    pub idle_tick_us: u32,
    /// Idle rate (in idle ticks) used until the host sets one.
    pub default_idle_ticks: u8,
}

impl Timing {
    /// ≈500 µs phases with a 2 ms gap, ≈7 kHz serial bit rate, 4 ms idle
    /// ticks and a 12 ms default idle rate.
    pub const DEFAULT: Self = Self {
        poll_phase_us: 500,
        inter_packet_us: 2_000,
        settle_us: 20,
        serial_half_period_us: 71,
        watchdog_tick_us: 1_000,
        watchdog_window_ticks: 8,
        idle_tick_us: 4_000,
        default_idle_ticks: 3,
    };
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Which protocol engines a build carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Profile {
    /// Two multiplexed ports only.
    MultiplexedOnly,
    /// One serial port only.
    SerialOnly,
    /// Both families, with the mode chosen once at power-up.
    Dual,
}

impl Profile {
    /// The mode fixed by the profile, or `None` if it must be arbitrated.
    #[inline]
    #[must_use]
    pub const fn fixed_mode(self) -> Option<Mode> {
        match self {
            Profile::MultiplexedOnly => Some(Mode::Multiplexed),
            Profile::SerialOnly => Some(Mode::Serial),
            Profile::Dual => None,
        }
    }

    /// Whether the multiplexed engine runs at power-up.
    ///
    /// Arbitration needs a first multiplexed sample set, so `Dual` starts
    /// multiplexed as well.
    #[inline]
    #[must_use]
    pub const fn starts_multiplexed(self) -> bool {
        !matches!(self, Profile::SerialOnly)
    }
}
