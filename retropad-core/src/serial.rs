//! Serial pad engine: a bit-banged synchronous bus master for PlayStation
//! style pads, plus its stall watchdog.
//!
//! One transaction exchanges nine bytes, LSB first. Data changes on the
//! falling clock edge and is read on the rising edge:
//!
//! ```text
//! master: 0x01 | 0x42 | 0xFF | 0xFF | 0xFF | 0xFF | 0xFF | 0xFF | 0xFF
//! pad:    0xFF | 0x73 | 0x5A | DAT1 | DAT2 | RJX  | RJY  | LJX  | LJY
//!
//!  ATT ‾‾|____________________________________ ... ______________|‾‾‾‾
//!  CLK ‾‾‾‾‾|_|‾|_|‾|_|‾ ... ‾|_|‾‾‾‾‾|_|‾ ... ‾|_|‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾
//!           0   1   2  ...  7  gap   0  ...  7   1 bit
//! ```
//!
//! Each tick is one clock half period. The position is `(byte, edge)`:
//! byte 0 is the gap between transactions, bytes 1..=9 are exchanged with
//! 16 clock edges each followed by a 2-edge gap.

use crate::config::Timing;
use crate::lines::SerialLines;
use crate::timing::{TickKind, TickSchedule};

/// Bytes the master sends per transaction.
pub const COMMAND: [u8; TRANSACTION_BYTES as usize] =
    [0x01, 0x42, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];

/// Bytes exchanged per transaction.
pub const TRANSACTION_BYTES: u8 = 9;

/// Response header bytes: high-Z filler, pad ID, ready marker.
pub const HEADER_BYTES: usize = 3;

/// Response data bytes: two button bytes and four stick bytes.
pub const DATA_BYTES: usize = 6;

/// Clock edges carrying data within one byte.
pub const ACTIVE_EDGES: u8 = 16;

/// Ticks per byte, including the inter-byte gap.
pub const EDGES_PER_BYTE: u8 = ACTIVE_EDGES + 2;

/// Ticks between transactions.
pub const GAP_EDGES: u8 = 32;

/// Pad ID of an analog pad (mode 7, three 16-bit words).
pub const ANALOG_ID: u8 = 0x73;
/// Pad ID of a digital pad (mode 4, one 16-bit word).
pub const DIGITAL_ID: u8 = 0x41;
/// Third header byte of every valid response.
pub const READY_MARKER: u8 = 0x5A;

/// Response data assembled LSB first, in wire order:
/// `[DAT1, DAT2, RJX, RJY, LJX, LJY]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ShiftAccumulator(pub [u8; DATA_BYTES]);

impl ShiftAccumulator {
    #[inline]
    pub fn clear(&mut self) {
        self.0 = [0; DATA_BYTES];
    }

    #[inline]
    fn set_bit(&mut self, slot: usize, bit: u8) {
        self.0[slot] |= 1 << bit;
    }
}

/// What kind of pad answered a transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PadStatus {
    /// Full response with sticks.
    Analog,
    /// Buttons only; stick bytes are filler.
    Digital,
    /// No valid header, or a header followed by a floating data line,
    /// e.g. nothing plugged in or a pad that stopped answering.
    Absent,
}

/// One completed transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialFrame {
    pub header: [u8; HEADER_BYTES],
    pub data: ShiftAccumulator,
}

impl SerialFrame {
    /// Build a frame from the nine response bytes as seen on the wire.
    #[must_use]
    pub fn from_response(response: &[u8; TRANSACTION_BYTES as usize]) -> Self {
        let mut frame = Self::default();
        frame.header.copy_from_slice(&response[..HEADER_BYTES]);
        frame.data.0.copy_from_slice(&response[HEADER_BYTES..]);
        frame
    }

    /// Classify the responding pad.
    ///
    /// An analog header followed by a payload that never pulls the data line
    /// low is a pad that let go of the bus after the header: no analog pad
    /// reports every button released with all four sticks pinned at full
    /// scale. A digital pad's stick bytes are filler, so the same payload is
    /// just a released digital pad.
    #[must_use]
    pub fn status(&self) -> PadStatus {
        match (self.header[1], self.header[2]) {
            (ANALOG_ID, READY_MARKER) if self.data.0 != [0xFF; DATA_BYTES] => {
                PadStatus::Analog
            }
            (DIGITAL_ID, READY_MARKER) => PadStatus::Digital,
            _ => PadStatus::Absent,
        }
    }
}

/// Result of a clock tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialEvent {
    /// Between transactions.
    Idle,
    /// A transaction is in flight.
    Transferring,
    /// The last byte finished; the lines are back at idle levels.
    Complete(SerialFrame),
}

/// Serial bus master state machine.
pub struct SerialEngine {
    timing: Timing,
    byte: u8,
    edge: u8,
    clock_high: bool,
    header: [u8; HEADER_BYTES],
    accumulator: ShiftAccumulator,
    watchdog: u8,
}

impl SerialEngine {
    #[must_use]
    pub const fn new(timing: Timing) -> Self {
        Self {
            timing,
            byte: 0,
            edge: 0,
            clock_high: true,
            header: [0; HEADER_BYTES],
            accumulator: ShiftAccumulator([0; DATA_BYTES]),
            watchdog: timing.watchdog_window_ticks,
        }
    }

    /// Release the lines and arm the clock and watchdog ticks.
    pub fn start<L: SerialLines, T: TickSchedule>(&mut self, lines: &mut L, timers: &mut T) {
        self.reset_transaction();
        self.release(lines);
        timers.schedule(TickKind::SerialClock, self.timing.serial_half_period_us);
        timers.schedule(TickKind::SerialWatchdog, self.timing.watchdog_tick_us);
        debug!("serial engine started");
    }

    /// Cancel both ticks and leave the lines idle.
    pub fn stop<L: SerialLines, T: TickSchedule>(&mut self, lines: &mut L, timers: &mut T) {
        timers.cancel(TickKind::SerialClock);
        timers.cancel(TickKind::SerialWatchdog);
        self.reset_transaction();
        self.release(lines);
        debug!("serial engine stopped");
    }

    /// Handle one clock half period.
    pub fn on_clock<L: SerialLines>(&mut self, lines: &mut L) -> SerialEvent {
        self.watchdog = self.timing.watchdog_window_ticks;

        let active = self.byte > 0 && self.edge < ACTIVE_EDGES;

        if active {
            self.clock_high = !self.clock_high;
            lines.set_clock(self.clock_high);
        }

        // Odd edges are rising: the pad's bit is stable.
        if active && self.edge & 1 == 1 && lines.data_in() {
            self.shift_in((self.edge - 1) >> 1);
        }

        if active {
            let command = COMMAND[usize::from(self.byte - 1)];
            lines.set_command((command >> (self.edge >> 1)) & 1 == 1);
        } else {
            lines.set_command(true);
        }

        if self.byte == 0 {
            self.advance_gap(lines)
        } else {
            self.advance_byte(lines)
        }
    }

    /// Handle one watchdog tick.
    ///
    /// Counts down while a transaction is in flight; clock ticks reload the
    /// count. When it runs out the transaction is abandoned and the lines are
    /// released. Returns whether a reset happened.
    pub fn on_watchdog_tick<L: SerialLines>(&mut self, lines: &mut L) -> bool {
        if self.byte == 0 {
            return false;
        }
        self.watchdog = self.watchdog.saturating_sub(1);
        if self.watchdog > 0 {
            return false;
        }
        warn!(
            "serial transaction stalled at byte {} edge {}, resetting",
            self.byte,
            self.edge
        );
        self.reset_transaction();
        self.release(lines);
        true
    }

    /// Current `(byte, edge)` position.
    #[inline]
    #[must_use]
    pub fn position(&self) -> (u8, u8) {
        (self.byte, self.edge)
    }

    #[inline]
    #[must_use]
    pub fn accumulator(&self) -> &ShiftAccumulator {
        &self.accumulator
    }

    #[inline]
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.byte > 0
    }

    fn advance_gap<L: SerialLines>(&mut self, lines: &mut L) -> SerialEvent {
        if self.edge == 0 {
            self.release(lines);
        }
        if self.edge + 1 < GAP_EDGES {
            self.edge += 1;
            return SerialEvent::Idle;
        }
        self.clear_buffers();
        lines.set_attention(true);
        self.edge = 0;
        self.byte = 1;
        SerialEvent::Transferring
    }

    fn advance_byte<L: SerialLines>(&mut self, lines: &mut L) -> SerialEvent {
        if self.edge + 1 < EDGES_PER_BYTE {
            self.edge += 1;
            return SerialEvent::Transferring;
        }
        self.edge = 0;
        if self.byte < TRANSACTION_BYTES {
            self.byte += 1;
            return SerialEvent::Transferring;
        }

        let frame = SerialFrame {
            header: self.header,
            data: self.accumulator,
        };
        self.reset_transaction();
        self.release(lines);
        trace!("serial transaction complete");
        SerialEvent::Complete(frame)
    }

    fn shift_in(&mut self, bit: u8) {
        let index = usize::from(self.byte - 1);
        if index < HEADER_BYTES {
            self.header[index] |= 1 << bit;
        } else {
            self.accumulator.set_bit(index - HEADER_BYTES, bit);
        }
    }

    fn clear_buffers(&mut self) {
        self.header = [0; HEADER_BYTES];
        self.accumulator.clear();
    }

    fn reset_transaction(&mut self) {
        self.clear_buffers();
        self.byte = 0;
        self.edge = 0;
        self.watchdog = self.timing.watchdog_window_ticks;
    }

    fn release<L: SerialLines>(&mut self, lines: &mut L) {
        self.clock_high = true;
        lines.set_clock(true);
        lines.set_command(true);
        lines.set_attention(false);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    extern crate std;

    use super::*;
    use crate::timing::TickTable;

    pub(crate) const ANALOG_RESPONSE: [u8; 9] =
        [0xFF, ANALOG_ID, READY_MARKER, 0xEF, 0xFE, 0x80, 0x7F, 0x10, 0xF0];

    /// A pad that shifts out a canned response and records the command.
    pub(crate) struct FakePad {
        response: [u8; 9],
        /// Stop answering after this many bytes (lines float high).
        answer_bytes: usize,
        pub received: [u8; 9],
        byte: usize,
        bit: u8,
        clock: bool,
        command: bool,
        data: bool,
        pub attention: bool,
        pub clock_edges: usize,
    }

    impl FakePad {
        pub(crate) fn new(response: [u8; 9]) -> Self {
            Self {
                response,
                answer_bytes: 9,
                received: [0; 9],
                byte: 0,
                bit: 0,
                clock: true,
                command: true,
                data: true,
                attention: false,
                clock_edges: 0,
            }
        }

        pub(crate) fn silent_after(mut self, bytes: usize) -> Self {
            self.answer_bytes = bytes;
            self
        }

        pub(crate) fn is_idle(&self) -> bool {
            self.clock && self.command && !self.attention
        }
    }

    impl SerialLines for FakePad {
        fn set_clock(&mut self, high: bool) {
            if self.attention && self.clock != high {
                self.clock_edges += 1;
                if !high {
                    self.data = if self.byte < self.answer_bytes.min(9) {
                        (self.response[self.byte] >> self.bit) & 1 == 1
                    } else {
                        true
                    };
                } else if self.byte < 9 {
                    if self.command {
                        self.received[self.byte] |= 1 << self.bit;
                    }
                    self.bit += 1;
                    if self.bit == 8 {
                        self.bit = 0;
                        self.byte += 1;
                    }
                }
            }
            self.clock = high;
        }

        fn set_command(&mut self, high: bool) {
            self.command = high;
        }

        fn set_attention(&mut self, asserted: bool) {
            if asserted && !self.attention {
                self.byte = 0;
                self.bit = 0;
                self.received = [0; 9];
            }
            self.attention = asserted;
            if !asserted {
                self.data = true;
            }
        }

        fn data_in(&mut self) -> bool {
            self.data
        }
    }

    /// Clock ticks needed for one full transaction including the leading gap.
    pub(crate) const TICKS_PER_TRANSACTION: usize =
        GAP_EDGES as usize + TRANSACTION_BYTES as usize * EDGES_PER_BYTE as usize;

    /// Tick until a transaction completes.
    pub(crate) fn run_transaction(engine: &mut SerialEngine, pad: &mut FakePad) -> SerialFrame {
        for _ in 0..TICKS_PER_TRANSACTION * 2 {
            if let SerialEvent::Complete(frame) = engine.on_clock(pad) {
                return frame;
            }
        }
        panic!("transaction did not complete");
    }

    fn started(pad: &mut FakePad) -> (SerialEngine, TickTable) {
        let mut engine = SerialEngine::new(Timing::DEFAULT);
        let mut timers = TickTable::new();
        engine.start(pad, &mut timers);
        (engine, timers)
    }

    #[test]
    fn test_start_arms_clock_and_watchdog() {
        let mut pad = FakePad::new(ANALOG_RESPONSE);
        let (mut engine, mut timers) = started(&mut pad);
        assert_eq!(timers.period(TickKind::SerialClock), Some(71));
        assert_eq!(timers.period(TickKind::SerialWatchdog), Some(1_000));
        assert!(pad.is_idle());

        engine.stop(&mut pad, &mut timers);
        assert!(!timers.is_scheduled(TickKind::SerialClock));
        assert!(!timers.is_scheduled(TickKind::SerialWatchdog));
    }

    #[test]
    fn test_transaction_reassembles_response() {
        let mut pad = FakePad::new(ANALOG_RESPONSE);
        let (mut engine, _) = started(&mut pad);

        let frame = run_transaction(&mut engine, &mut pad);
        assert_eq!(frame, SerialFrame::from_response(&ANALOG_RESPONSE));
        assert_eq!(frame.status(), PadStatus::Analog);
        assert_eq!(frame.data.0, [0xEF, 0xFE, 0x80, 0x7F, 0x10, 0xF0]);
    }

    #[test]
    fn test_master_sends_command_sequence() {
        let mut pad = FakePad::new(ANALOG_RESPONSE);
        let (mut engine, _) = started(&mut pad);
        run_transaction(&mut engine, &mut pad);
        assert_eq!(pad.received, COMMAND);
        // 8 bits, two edges each, for every byte.
        assert_eq!(pad.clock_edges, 9 * 16);
    }

    #[test]
    fn test_lines_idle_after_completion() {
        let mut pad = FakePad::new(ANALOG_RESPONSE);
        let (mut engine, _) = started(&mut pad);
        run_transaction(&mut engine, &mut pad);
        assert!(pad.is_idle());
        assert_eq!(engine.position(), (0, 0));
        assert_eq!(engine.accumulator(), &ShiftAccumulator::default());
    }

    #[test]
    fn test_attention_released_one_bit_after_last_bit() {
        let mut pad = FakePad::new(ANALOG_RESPONSE);
        let (mut engine, _) = started(&mut pad);

        // Run up to the last data edge of byte 9.
        let last_bit_tick = GAP_EDGES as usize + 8 * EDGES_PER_BYTE as usize + ACTIVE_EDGES as usize;
        for _ in 0..last_bit_tick {
            engine.on_clock(&mut pad);
        }
        assert_eq!(engine.position(), (9, ACTIVE_EDGES));
        assert!(pad.attention);

        // One bit period (two half periods) later the transaction ends.
        assert_eq!(engine.on_clock(&mut pad), SerialEvent::Transferring);
        assert!(pad.attention);
        assert!(matches!(engine.on_clock(&mut pad), SerialEvent::Complete(_)));
        assert!(!pad.attention);
    }

    #[test]
    fn test_consecutive_transactions_start_clean() {
        let mut pad = FakePad::new([0xFF, ANALOG_ID, READY_MARKER, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        let (mut engine, _) = started(&mut pad);
        run_transaction(&mut engine, &mut pad);

        pad.response = [0xFF, ANALOG_ID, READY_MARKER, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let frame = run_transaction(&mut engine, &mut pad);
        assert_eq!(frame.data.0, [0x00; DATA_BYTES]);
    }

    #[test]
    fn test_unplugged_pad_is_absent() {
        let mut pad = FakePad::new([0xFF; 9]);
        let (mut engine, _) = started(&mut pad);
        let frame = run_transaction(&mut engine, &mut pad);
        assert_eq!(frame.status(), PadStatus::Absent);
    }

    #[test]
    fn test_pad_silent_after_header_is_absent() {
        let mut pad = FakePad::new(ANALOG_RESPONSE).silent_after(HEADER_BYTES);
        let (mut engine, _) = started(&mut pad);
        let frame = run_transaction(&mut engine, &mut pad);
        assert_eq!(frame.header, [0xFF, ANALOG_ID, READY_MARKER]);
        assert_eq!(frame.data.0, [0xFF; DATA_BYTES]);
        assert_eq!(frame.status(), PadStatus::Absent);
    }

    #[test]
    fn test_digital_pad_with_nothing_pressed_is_present() {
        let frame = SerialFrame::from_response(&[0xFF, DIGITAL_ID, READY_MARKER, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        // Released buttons and filler sticks.
        assert_eq!(frame.status(), PadStatus::Digital);
    }

    #[test]
    fn test_watchdog_resets_stalled_transaction() {
        let mut pad = FakePad::new(ANALOG_RESPONSE).silent_after(3);
        let (mut engine, _) = started(&mut pad);

        // Three bytes exchanged, then the clock stops.
        for _ in 0..GAP_EDGES as usize + 3 * EDGES_PER_BYTE as usize {
            engine.on_clock(&mut pad);
        }
        assert_eq!(engine.position(), (4, 0));
        assert!(pad.attention);

        let window = Timing::DEFAULT.watchdog_window_ticks;
        for _ in 1..window {
            assert!(!engine.on_watchdog_tick(&mut pad));
        }
        assert!(engine.in_transaction());

        assert!(engine.on_watchdog_tick(&mut pad));
        assert_eq!(engine.position(), (0, 0));
        assert_eq!(engine.accumulator(), &ShiftAccumulator::default());
        assert!(pad.is_idle());
    }

    #[test]
    fn test_watchdog_reset_does_not_corrupt_next_transaction() {
        let mut pad = FakePad::new(ANALOG_RESPONSE);
        let (mut engine, _) = started(&mut pad);

        for _ in 0..GAP_EDGES as usize + 3 * EDGES_PER_BYTE as usize + 5 {
            engine.on_clock(&mut pad);
        }
        for _ in 0..Timing::DEFAULT.watchdog_window_ticks {
            engine.on_watchdog_tick(&mut pad);
        }
        assert!(!engine.in_transaction());

        let frame = run_transaction(&mut engine, &mut pad);
        assert_eq!(frame, SerialFrame::from_response(&ANALOG_RESPONSE));
    }

    #[test]
    fn test_clock_ticks_keep_watchdog_quiet() {
        let mut pad = FakePad::new(ANALOG_RESPONSE);
        let (mut engine, _) = started(&mut pad);
        for _ in 0..GAP_EDGES as usize + 1 {
            engine.on_clock(&mut pad);
        }
        for _ in 0..100 {
            engine.on_clock(&mut pad);
            assert!(!engine.on_watchdog_tick(&mut pad));
        }
    }

    #[test]
    fn test_watchdog_ignores_gap() {
        let mut pad = FakePad::new(ANALOG_RESPONSE);
        let (mut engine, _) = started(&mut pad);
        for _ in 0..100 {
            assert!(!engine.on_watchdog_tick(&mut pad));
        }
    }
}
