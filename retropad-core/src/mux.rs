//! Multiplexed pad engine (Mega Drive style 3/6-button pads, two ports).
//!
//! The engine steps the shared select line through eight phases and latches
//! the six data lines of both ports once per phase:
//!
//! ```text
//!        |Sel|D0 |D1 |D2 |D3 |D4 |D5 |
//!     0: | L |UP |DW |LO |LO |A  |ST |
//!     1: | H |UP |DW |LF |RG |B  |C  |
//!     2: | L |UP |DW |LO |LO |A  |ST |
//!     3: | H |UP |DW |LF |RG |B  |C  |
//!     4: | L |LO |LO |LO |LO |A  |ST |   6-button pads only
//!     5: | H |Z  |Y  |X  |MD |HI |HI |   6-button pads only
//!     6: | L |HI |HI |HI |HI |A  |ST |
//!     7: | H |UP |DW |LF |RG |B  |C  |
//!
//!  phase: 0 1 2 ... 7 |  8  | 0 1 2 ...
//!           _   _      _         _   _
//!   SEL: __/ \_/ \_.. \_______/ \_/ \_..
//!        |  500 us each |2 ms |
//! ```
//!
//! All data lines are active-low. Phase 8 is the inter-packet gap; no sample
//! is taken there.

use crate::config::Timing;
use crate::lines::{MuxLines, Port, LINE_MASK};
use crate::timing::{TickKind, TickSchedule};
use crate::types::{Buttons, AXIS_CENTER, AXIS_MAX, AXIS_MIN};

/// Select-line phases per sample set.
pub const PHASES: usize = 8;

/// Phase index of the inter-packet gap.
pub const GAP_PHASE: u8 = PHASES as u8;

/// Phase carrying A and Start.
pub const PHASE_A_START: usize = 2;
/// Phase carrying the directions, B and C.
pub const PHASE_DIRECTIONS: usize = 3;
/// Phase identifying a 6-button pad (D0..D3 all low).
pub const PHASE_SIX_BUTTON_ID: usize = 4;
/// Phase carrying Z, Y, X and Mode on a 6-button pad.
pub const PHASE_EXTRA: usize = 5;

const UP: u8 = 1 << 0;
const DOWN: u8 = 1 << 1;
const LEFT: u8 = 1 << 2;
const RIGHT: u8 = 1 << 3;
const LOW_NIBBLE: u8 = 0x0F;
const HIGH_PAIR: u8 = 0x30;
const PRESENCE: u8 = LEFT | RIGHT;

/// Raw line samples of one port, indexed by phase.
pub type PortSamples = [u8; PHASES];

/// Raw line snapshots for both ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSampleTable {
    ports: [PortSamples; 2],
}

impl RawSampleTable {
    /// Every line released, as read with nothing plugged in.
    pub const RELEASED: Self = Self {
        ports: [[LINE_MASK; PHASES]; 2],
    };

    #[must_use]
    pub const fn from_ports(port1: PortSamples, port2: PortSamples) -> Self {
        Self {
            ports: [port1, port2],
        }
    }

    #[inline]
    #[must_use]
    pub const fn port(&self, port: Port) -> &PortSamples {
        &self.ports[port.index()]
    }

    /// The last sample of `port` in the cycle.
    #[inline]
    #[must_use]
    pub const fn last_sample(&self, port: Port) -> u8 {
        self.ports[port.index()][PHASES - 1]
    }
}

impl Default for RawSampleTable {
    fn default() -> Self {
        Self::RELEASED
    }
}

/// Result of a poll tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MuxEvent {
    /// Select toggled; a sample is pending for the new phase.
    Advanced,
    /// Phase 7 done: the set is complete and the inter-packet gap started.
    SampleSetComplete(RawSampleTable),
    /// Gap over; phase 0 sample pending.
    Restarted,
}

/// Select-line polling state machine.
pub struct MuxEngine {
    timing: Timing,
    phase: u8,
    select_high: bool,
    sample_pending: bool,
    table: RawSampleTable,
}

impl MuxEngine {
    #[must_use]
    pub const fn new(timing: Timing) -> Self {
        Self {
            timing,
            phase: 0,
            select_high: false,
            sample_pending: false,
            table: RawSampleTable::RELEASED,
        }
    }

    /// Drive select low, request the phase 0 sample and arm the poll tick.
    pub fn start<L: MuxLines, T: TickSchedule>(&mut self, lines: &mut L, timers: &mut T) {
        self.phase = 0;
        self.drive_select(lines, false);
        self.sample_pending = true;
        timers.schedule(TickKind::PollSelect, self.timing.poll_phase_us);
        debug!("mux engine started");
    }

    /// Cancel the poll tick and park the select line at its idle level.
    pub fn stop<L: MuxLines, T: TickSchedule>(&mut self, lines: &mut L, timers: &mut T) {
        timers.cancel(TickKind::PollSelect);
        self.drive_select(lines, false);
        self.phase = 0;
        self.sample_pending = false;
        debug!("mux engine stopped");
    }

    /// Handle one poll tick.
    pub fn on_tick<L: MuxLines, T: TickSchedule>(
        &mut self,
        lines: &mut L,
        timers: &mut T,
    ) -> MuxEvent {
        if self.phase < GAP_PHASE - 1 {
            let level = !self.select_high;
            self.drive_select(lines, level);
            self.phase += 1;
            self.sample_pending = true;
            MuxEvent::Advanced
        } else if self.phase == GAP_PHASE {
            timers.schedule(TickKind::PollSelect, self.timing.poll_phase_us);
            self.phase = 0;
            self.sample_pending = true;
            MuxEvent::Restarted
        } else {
            self.drive_select(lines, false);
            timers.schedule(TickKind::PollSelect, self.timing.inter_packet_us);
            self.phase = GAP_PHASE;
            self.sample_pending = false;
            trace!("mux sample set complete");
            MuxEvent::SampleSetComplete(self.table)
        }
    }

    #[inline]
    #[must_use]
    pub fn sample_pending(&self) -> bool {
        self.sample_pending
    }

    /// Store both ports' lines at the current phase if a sample is pending.
    ///
    /// Call only once the settle delay has elapsed since the last tick.
    /// Returns whether a sample was taken.
    pub fn latch<L: MuxLines>(&mut self, lines: &mut L) -> bool {
        if !self.sample_pending || self.phase >= GAP_PHASE {
            return false;
        }
        let phase = self.phase as usize;
        for port in Port::ALL {
            self.table.ports[port.index()][phase] = lines.read_port(port) & LINE_MASK;
        }
        self.sample_pending = false;
        true
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> u8 {
        self.phase
    }

    #[inline]
    #[must_use]
    pub fn table(&self) -> &RawSampleTable {
        &self.table
    }

    fn drive_select<L: MuxLines>(&mut self, lines: &mut L, high: bool) {
        self.select_high = high;
        lines.set_select(high);
    }
}

/// Pad type detected from a sample set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PadKind {
    /// Nothing plugged in, or a reading no pad produces.
    Absent,
    ThreeButton,
    SixButton,
}

/// Decoded state of one multiplexed pad.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedPad {
    pub kind: PadKind,
    pub x: u8,
    pub y: u8,
    pub buttons: Buttons,
}

impl DecodedPad {
    pub const NEUTRAL: Self = Self {
        kind: PadKind::Absent,
        x: AXIS_CENTER,
        y: AXIS_CENTER,
        buttons: Buttons::NONE,
    };
}

/// Lines pressed at `phase`, inverted to active-high.
#[inline]
fn pressed(samples: &PortSamples, phase: usize) -> u8 {
    !samples[phase] & LINE_MASK
}

/// Classify the pad from its select-low phases.
///
/// D2/D3 read low at every select-low phase while a pad is attached; a
/// 6-button pad additionally pulls D0..D3 low at phase 4.
#[must_use]
pub fn classify(samples: &PortSamples) -> PadKind {
    if samples[0] & PRESENCE != 0 {
        PadKind::Absent
    } else if samples[PHASE_SIX_BUTTON_ID] & LOW_NIBBLE == 0 {
        PadKind::SixButton
    } else {
        PadKind::ThreeButton
    }
}

/// Resolve a direction pair; both or neither pressed means centered.
#[inline]
fn axis(pressed: u8, negative: u8, positive: u8) -> u8 {
    match (pressed & negative != 0, pressed & positive != 0) {
        (true, false) => AXIS_MIN,
        (false, true) => AXIS_MAX,
        _ => AXIS_CENTER,
    }
}

/// Decode one port's sample set into axes and buttons.
#[must_use]
pub fn decode_pad(samples: &PortSamples) -> DecodedPad {
    let kind = classify(samples);
    if kind == PadKind::Absent {
        return DecodedPad::NEUTRAL;
    }

    let directions = pressed(samples, PHASE_DIRECTIONS);
    let a_start = pressed(samples, PHASE_A_START);

    let mut buttons = Buttons((directions & HIGH_PAIR) | ((a_start & HIGH_PAIR) << 2));
    if kind == PadKind::SixButton {
        buttons |= Buttons(pressed(samples, PHASE_EXTRA) & LOW_NIBBLE);
    }

    DecodedPad {
        kind,
        x: axis(directions, LEFT, RIGHT),
        y: axis(directions, UP, DOWN),
        buttons,
    }
}
