//! HID idle-rate bookkeeping: when must the report be (re-)sent.

use portable_atomic::{AtomicU8, Ordering};

/// Milliseconds per idle tick, the unit of the HID idle rate.
pub const IDLE_TICK_MS: u32 = 4;

/// Idle rate in 4 ms ticks. Zero means "send only on change".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdleRate(pub u8);

impl IdleRate {
    pub const INDEFINITE: Self = Self(0);

    /// Convert a host request in milliseconds, saturating at the largest
    /// representable rate. `u32::MAX` is the USB stack's "indefinite".
    #[must_use]
    pub fn from_millis(ms: u32) -> Self {
        if ms == u32::MAX {
            return Self::INDEFINITE;
        }
        Self(u8::try_from(ms / IDLE_TICK_MS).unwrap_or(u8::MAX))
    }

    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u32 {
        self.0 as u32 * IDLE_TICK_MS
    }

    #[inline]
    #[must_use]
    pub const fn is_indefinite(self) -> bool {
        self.0 == 0
    }
}

/// Idle rate written by USB control requests and read by the main loop.
pub struct SharedIdleRate(AtomicU8);

impl SharedIdleRate {
    #[must_use]
    pub const fn new(rate: IdleRate) -> Self {
        Self(AtomicU8::new(rate.0))
    }

    #[inline]
    pub fn store(&self, rate: IdleRate) {
        self.0.store(rate.0, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> IdleRate {
        IdleRate(self.0.load(Ordering::Acquire))
    }
}

/// Transmit scheduler driven by idle ticks and report changes.
#[derive(Debug)]
pub struct IdleScheduler {
    rate: IdleRate,
    counter: u8,
    armed: bool,
    elapsed: bool,
    changed: bool,
}

impl IdleScheduler {
    #[must_use]
    pub const fn new(rate: IdleRate) -> Self {
        Self {
            rate,
            counter: 0,
            armed: true,
            elapsed: false,
            changed: false,
        }
    }

    /// Count one idle tick.
    pub fn on_idle_tick(&mut self) {
        if !self.armed || self.rate.is_indefinite() {
            return;
        }
        self.counter = self.counter.saturating_add(1);
        if self.counter >= self.rate.0 {
            self.elapsed = true;
            self.armed = false;
        }
    }

    /// The report content changed and must go out.
    #[inline]
    pub fn mark_changed(&mut self) {
        self.changed = true;
    }

    #[inline]
    #[must_use]
    pub fn due(&self) -> bool {
        self.elapsed || self.changed
    }

    /// A report went out: restart the countdown.
    pub fn on_sent(&mut self) {
        self.counter = 0;
        self.elapsed = false;
        self.changed = false;
        self.armed = true;
    }

    /// Apply a new rate. The running countdown restarts from zero.
    pub fn set_rate(&mut self, rate: IdleRate) {
        if rate == self.rate {
            return;
        }
        self.rate = rate;
        self.counter = 0;
        self.elapsed = false;
        self.armed = true;
    }

    #[inline]
    #[must_use]
    pub fn rate(&self) -> IdleRate {
        self.rate
    }
}
