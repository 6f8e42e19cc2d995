//! PadRunner: sole owner of both pad engines, their lines and the tick table.
//!
//! Every protocol tick goes through [`PadRunner::on_tick`] on one `&mut self`,
//! so a poll tick, a serial clock tick and a watchdog tick never interleave.
//! The hand-over from the multiplexed engine to the serial engine happens in
//! [`PadRunner::enter`]: the poll tick is cancelled, select is parked low and
//! the multiplexed lines are released before the serial engine is armed.

use crate::arbiter::Mode;
use crate::config::{Profile, Timing};
use crate::lines::{MuxLines, SerialLines};
use crate::mux::{MuxEngine, MuxEvent};
use crate::report::SampleSet;
use crate::serial::{SerialEngine, SerialEvent};
use crate::timing::{TickKind, TickTable};

/// Both engines behind a single tick dispatcher.
pub struct PadRunner<M, S> {
    mux: MuxEngine,
    serial: SerialEngine,
    mux_lines: Option<M>,
    serial_lines: S,
    ticks: TickTable,
    active: Option<Mode>,
}

impl<M: MuxLines, S: SerialLines> PadRunner<M, S> {
    /// Take both ports. Nothing runs until [`start`](Self::start).
    pub fn new(mux_lines: M, serial_lines: S, timing: Timing) -> Self {
        Self {
            mux: MuxEngine::new(timing),
            serial: SerialEngine::new(timing),
            mux_lines: Some(mux_lines),
            serial_lines,
            ticks: TickTable::new(),
            active: None,
        }
    }

    /// Start the engine `profile` powers up with.
    pub fn start(&mut self, profile: Profile) {
        if self.active.is_some() {
            return;
        }
        if profile.starts_multiplexed() {
            if let Some(lines) = self.mux_lines.as_mut() {
                self.mux.start(lines, &mut self.ticks);
                self.active = Some(Mode::Multiplexed);
            }
        } else {
            self.mux_lines = None;
            self.start_serial();
        }
    }

    /// Run the engine for `mode`.
    ///
    /// Entering serial mode from multiplexed mode stops the multiplexed engine
    /// for good. Going back is refused and returns `false`.
    pub fn enter(&mut self, mode: Mode) -> bool {
        match (self.active, mode) {
            (Some(Mode::Multiplexed), Mode::Multiplexed) | (Some(Mode::Serial), Mode::Serial) => true,
            (Some(Mode::Serial), Mode::Multiplexed) => {
                warn!("multiplexed mode requested after serial hand-over");
                false
            }
            (_, Mode::Serial) => {
                if let Some(mut lines) = self.mux_lines.take() {
                    self.mux.stop(&mut lines, &mut self.ticks);
                }
                self.start_serial();
                info!("serial engine taking over");
                true
            }
            (None, Mode::Multiplexed) => match self.mux_lines.as_mut() {
                Some(lines) => {
                    self.mux.start(lines, &mut self.ticks);
                    self.active = Some(Mode::Multiplexed);
                    true
                }
                None => false,
            },
        }
    }

    /// Dispatch one tick. Returns a sample set when one completed.
    ///
    /// Ticks of a kind the running engine has not scheduled are ignored.
    pub fn on_tick(&mut self, kind: TickKind) -> Option<SampleSet> {
        if !self.ticks.is_scheduled(kind) {
            return None;
        }
        match (kind, self.active) {
            (TickKind::PollSelect, Some(Mode::Multiplexed)) => {
                let lines = self.mux_lines.as_mut()?;
                match self.mux.on_tick(lines, &mut self.ticks) {
                    MuxEvent::SampleSetComplete(table) => Some(SampleSet::Multiplexed(table)),
                    MuxEvent::Advanced | MuxEvent::Restarted => None,
                }
            }
            (TickKind::SerialClock, Some(Mode::Serial)) => {
                match self.serial.on_clock(&mut self.serial_lines) {
                    SerialEvent::Complete(frame) => Some(SampleSet::Serial(frame)),
                    SerialEvent::Idle | SerialEvent::Transferring => None,
                }
            }
            (TickKind::SerialWatchdog, Some(Mode::Serial)) => {
                self.serial.on_watchdog_tick(&mut self.serial_lines);
                None
            }
            _ => None,
        }
    }

    /// Whether the multiplexed engine waits for its settle-delayed sample.
    #[inline]
    #[must_use]
    pub fn sample_pending(&self) -> bool {
        self.active == Some(Mode::Multiplexed) && self.mux.sample_pending()
    }

    /// Take the pending multiplexed sample. Call once the settle delay after
    /// the last poll tick has passed.
    pub fn latch(&mut self) -> bool {
        match (self.active, self.mux_lines.as_mut()) {
            (Some(Mode::Multiplexed), Some(lines)) => self.mux.latch(lines),
            _ => false,
        }
    }

    /// Periods of the ticks the running engine wants.
    #[inline]
    #[must_use]
    pub fn ticks(&self) -> &TickTable {
        &self.ticks
    }

    /// The running engine.
    #[inline]
    #[must_use]
    pub fn active(&self) -> Option<Mode> {
        self.active
    }

    fn start_serial(&mut self) {
        self.serial.start(&mut self.serial_lines, &mut self.ticks);
        self.active = Some(Mode::Serial);
    }
}
