//! PadBridge: connects the protocol engines to the report sink.

use crate::arbiter::{ArbitrationConfig, Arbiter, Mode};
use crate::config::{Profile, Timing};
use crate::idle::{IdleRate, IdleScheduler};
use crate::output::{OutputError, OutputSink};
use crate::report::{ReportBuilder, SampleSet};
use crate::types::Report;

/// The cooperative main loop of the adapter.
///
/// Sample sets from the engines go in through [`ingest`](Self::ingest), idle
/// ticks through [`idle_tick`](Self::idle_tick), and
/// [`service`](Self::service) hands the report to the sink whenever one is
/// due.
///
/// # Mode
///
/// Nothing is sent until a mode is known. Fixed profiles know it from the
/// start; `Profile::Dual` learns it from the first multiplexed sample set.
pub struct PadBridge<O> {
    output: O,
    builder: ReportBuilder,
    idle: IdleScheduler,
    arbiter: Arbiter,
    mode: Option<Mode>,
}

impl<O: OutputSink> PadBridge<O> {
    /// Create a new bridge for `profile`, sending to `output`.
    pub fn new(output: O, profile: Profile, timing: Timing, arbitration: ArbitrationConfig) -> Self {
        let mode = profile.fixed_mode();
        let arbiter = if mode.is_some() {
            Arbiter::decided(arbitration)
        } else {
            Arbiter::new(arbitration)
        };
        Self {
            output,
            builder: ReportBuilder::new(),
            idle: IdleScheduler::new(IdleRate(timing.default_idle_ticks)),
            arbiter,
            mode,
        }
    }

    /// Take a completed sample set.
    ///
    /// Returns the mode when this call decided it.
    pub fn ingest(&mut self, samples: &SampleSet) -> Option<Mode> {
        let decided = match samples {
            SampleSet::Multiplexed(table) if self.mode.is_none() => {
                self.arbiter.arbitrate(table)
            }
            _ => None,
        };
        if decided.is_some() {
            self.mode = decided;
        }

        // Sets from the engine that is not selected are only used to arbitrate.
        let matches_mode = matches!(
            (self.mode, samples),
            (Some(Mode::Multiplexed), SampleSet::Multiplexed(_))
                | (Some(Mode::Serial), SampleSet::Serial(_))
        );
        if matches_mode && self.builder.build(samples) {
            self.idle.mark_changed();
        }
        decided
    }

    /// Count one idle tick.
    #[inline]
    pub fn idle_tick(&mut self) {
        self.idle.on_idle_tick();
    }

    /// Apply an idle rate requested by the host.
    pub fn set_idle_rate(&mut self, rate: IdleRate) {
        if rate != self.idle.rate() {
            debug!("idle rate set to {} ticks", rate.0);
        }
        self.idle.set_rate(rate);
    }

    /// Send the report if a mode is known, a send is due and the sink is
    /// ready.
    ///
    /// Returns whether a report went out. On error the send stays due and is
    /// retried on the next call.
    pub async fn service(&mut self) -> Result<bool, BridgeError> {
        if self.mode.is_none() || !self.idle.due() || !self.output.is_ready() {
            return Ok(false);
        }
        self.output
            .send(self.builder.report())
            .await
            .map_err(BridgeError::Output)?;
        self.idle.on_sent();
        Ok(true)
    }

    #[inline]
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// The committed report.
    #[inline]
    pub fn report(&self) -> &Report {
        self.builder.report()
    }

    #[inline]
    pub fn idle_rate(&self) -> IdleRate {
        self.idle.rate()
    }

    /// Get a reference to the output sink.
    pub fn output(&self) -> &O {
        &self.output
    }

    /// Get a mutable reference to the output sink.
    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}

/// Error type for bridge operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeError {
    /// Error from the output sink.
    Output(OutputError),
}

/// A change in the outcome of [`PadBridge::service`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HealthChange {
    /// Sending started failing, or failed differently than before.
    Failing(BridgeError),
    /// A report went out after a failure.
    Recovered,
}

/// Remembers the last service failure so a persistent one is reported once.
///
/// A pass that had nothing to send says nothing about the sink and leaves
/// the state alone.
#[derive(Debug, Default)]
pub struct OutputHealth {
    last_error: Option<BridgeError>,
}

impl OutputHealth {
    #[must_use]
    pub const fn new() -> Self {
        Self { last_error: None }
    }

    pub fn observe(&mut self, outcome: &Result<bool, BridgeError>) -> Option<HealthChange> {
        match *outcome {
            Ok(false) => None,
            Ok(true) => self.last_error.take().map(|_| HealthChange::Recovered),
            Err(e) if self.last_error == Some(e) => None,
            Err(e) => {
                self.last_error = Some(e);
                Some(HealthChange::Failing(e))
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn is_failing(&self) -> bool {
        self.last_error.is_some()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::lines::{Port, LINE_MASK};
    use crate::mux::{RawSampleTable, PHASES};
    use crate::serial::{SerialFrame, ShiftAccumulator, ANALOG_ID, READY_MARKER};
    use crate::types::Buttons;
    use core::future::Future;
    use core::pin::Pin;
    use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
    use std::sync::{Arc, Mutex};
    use std::vec::Vec;

    // Simple mock output sink
    struct MockOutput {
        sent: Arc<Mutex<Vec<Report>>>,
        ready: bool,
        fail: Option<OutputError>,
    }

    impl MockOutput {
        fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                ready: true,
                fail: None,
            }
        }
    }

    impl OutputSink for MockOutput {
        fn send(&mut self, report: &Report) -> impl Future<Output = Result<(), OutputError>> {
            let result = match self.fail {
                Some(e) => Err(e),
                None => {
                    self.sent.lock().unwrap().push(*report);
                    Ok(())
                }
            };
            core::future::ready(result)
        }

        fn is_ready(&self) -> bool {
            self.ready
        }
    }

    // Helper to run a future to completion (simple blocking executor)
    fn block_on<F: Future>(mut f: F) -> F::Output {
        fn noop_raw_waker() -> RawWaker {
            fn noop(_: *const ()) {}
            fn clone(_: *const ()) -> RawWaker {
                noop_raw_waker()
            }
            static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
            RawWaker::new(core::ptr::null(), &VTABLE)
        }

        let waker = unsafe { Waker::from_raw(noop_raw_waker()) };
        let mut cx = Context::from_waker(&waker);

        // SAFETY: We don't move f after pinning
        let mut f = unsafe { Pin::new_unchecked(&mut f) };

        loop {
            match f.as_mut().poll(&mut cx) {
                Poll::Ready(result) => return result,
                Poll::Pending => {
                    panic!("Mock future returned Pending unexpectedly");
                }
            }
        }
    }

    fn dual_bridge() -> (PadBridge<MockOutput>, Arc<Mutex<Vec<Report>>>) {
        let output = MockOutput::new();
        let sent = output.sent.clone();
        let bridge = PadBridge::new(output, Profile::Dual, Timing::DEFAULT, ArbitrationConfig::DEFAULT);
        (bridge, sent)
    }

    fn start_up_table() -> RawSampleTable {
        let port1 = [0x33, 0x3F, 0x1F, 0x3E, 0x33, 0x3F, 0x3F, 0x3F];
        RawSampleTable::from_ports(port1, [LINE_MASK; PHASES])
    }

    fn serial_marker_table() -> RawSampleTable {
        let mut port1 = [LINE_MASK; PHASES];
        port1[PHASES - 1] = 0x00;
        RawSampleTable::from_ports(port1, [LINE_MASK; PHASES])
    }

    fn analog_frame(dat1: u8) -> SampleSet {
        SampleSet::Serial(SerialFrame {
            header: [0xFF, ANALOG_ID, READY_MARKER],
            data: ShiftAccumulator([dat1, 0xFF, 0x7F, 0x7F, 0x7F, 0x7F]),
        })
    }

    #[test]
    fn test_nothing_sent_before_mode() {
        let (mut bridge, sent) = dual_bridge();
        for _ in 0..10 {
            bridge.idle_tick();
        }
        assert_eq!(block_on(bridge.service()), Ok(false));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_first_set_decides_and_sends() {
        let (mut bridge, sent) = dual_bridge();
        let set = SampleSet::Multiplexed(start_up_table());

        assert_eq!(bridge.ingest(&set), Some(Mode::Multiplexed));
        assert_eq!(bridge.mode(), Some(Mode::Multiplexed));
        assert_eq!(block_on(bridge.service()), Ok(true));

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].axes(Port::One), (0x7F, 0x00));
        assert_eq!(sent[0].buttons(Port::One), Buttons::START);
    }

    #[test]
    fn test_unchanged_state_waits_for_idle() {
        let (mut bridge, sent) = dual_bridge();
        let set = SampleSet::Multiplexed(start_up_table());
        bridge.ingest(&set);
        block_on(bridge.service()).unwrap();

        bridge.ingest(&set);
        assert_eq!(block_on(bridge.service()), Ok(false));

        // Default rate: one resend after three idle ticks.
        bridge.idle_tick();
        bridge.idle_tick();
        assert_eq!(block_on(bridge.service()), Ok(false));
        bridge.idle_tick();
        assert_eq!(block_on(bridge.service()), Ok(true));
        assert_eq!(block_on(bridge.service()), Ok(false));
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_indefinite_rate_suppresses_resend() {
        let (mut bridge, sent) = dual_bridge();
        bridge.set_idle_rate(IdleRate::INDEFINITE);
        let set = SampleSet::Multiplexed(start_up_table());
        bridge.ingest(&set);
        block_on(bridge.service()).unwrap();

        for _ in 0..500 {
            bridge.idle_tick();
            bridge.ingest(&set);
            assert_eq!(block_on(bridge.service()), Ok(false));
        }
        assert_eq!(sent.lock().unwrap().len(), 1);

        bridge.ingest(&SampleSet::Multiplexed(RawSampleTable::RELEASED));
        assert_eq!(block_on(bridge.service()), Ok(true));
    }

    #[test]
    fn test_serial_mode_ignores_multiplexed_sets() {
        let (mut bridge, sent) = dual_bridge();
        assert_eq!(
            bridge.ingest(&SampleSet::Multiplexed(serial_marker_table())),
            Some(Mode::Serial)
        );
        // Nothing built from the arbitration set.
        assert_eq!(bridge.report(), &Report::NEUTRAL);

        bridge.ingest(&analog_frame(0xF7));
        assert_eq!(bridge.report().buttons(Port::Two), Buttons(0x08));
        assert_eq!(block_on(bridge.service()), Ok(true));

        bridge.ingest(&SampleSet::Multiplexed(start_up_table()));
        assert_eq!(bridge.report().buttons(Port::Two), Buttons(0x08));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_fixed_profile_skips_arbitration() {
        let output = MockOutput::new();
        let mut bridge = PadBridge::new(
            output,
            Profile::SerialOnly,
            Timing::DEFAULT,
            ArbitrationConfig::DEFAULT,
        );
        assert_eq!(bridge.mode(), Some(Mode::Serial));
        assert_eq!(bridge.ingest(&analog_frame(0xFE)), None);
        assert_eq!(block_on(bridge.service()), Ok(true));
    }

    #[test]
    fn test_not_ready_holds_report() {
        let (mut bridge, sent) = dual_bridge();
        bridge.output_mut().ready = false;
        bridge.ingest(&SampleSet::Multiplexed(start_up_table()));
        assert_eq!(block_on(bridge.service()), Ok(false));

        bridge.output_mut().ready = true;
        assert_eq!(block_on(bridge.service()), Ok(true));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_send_error_is_retried() {
        let (mut bridge, sent) = dual_bridge();
        bridge.output_mut().fail = Some(OutputError::Io);
        bridge.ingest(&SampleSet::Multiplexed(start_up_table()));
        assert_eq!(
            block_on(bridge.service()),
            Err(BridgeError::Output(OutputError::Io))
        );

        bridge.output_mut().fail = None;
        assert_eq!(block_on(bridge.service()), Ok(true));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_persistent_failure_reported_once() {
        let mut output = MockOutput::new();
        output.fail = Some(OutputError::Io);
        let mut bridge =
            PadBridge::new(output, Profile::MultiplexedOnly, Timing::DEFAULT, ArbitrationConfig::DEFAULT);
        bridge.ingest(&SampleSet::Multiplexed(start_up_table()));

        let mut health = OutputHealth::new();
        let mut changes = Vec::new();
        for _ in 0..250 {
            bridge.idle_tick();
            let outcome = block_on(bridge.service());
            changes.extend(health.observe(&outcome));
        }
        assert_eq!(changes, [HealthChange::Failing(BridgeError::Output(OutputError::Io))]);
        assert!(health.is_failing());

        bridge.output_mut().fail = None;
        let outcome = block_on(bridge.service());
        assert_eq!(outcome, Ok(true));
        assert_eq!(health.observe(&outcome), Some(HealthChange::Recovered));
        assert!(!health.is_failing());
    }

    #[test]
    fn test_health_ignores_idle_passes_and_reports_new_errors() {
        let io = Err(BridgeError::Output(OutputError::Io));
        let disabled = Err(BridgeError::Output(OutputError::Disabled));
        let mut health = OutputHealth::new();

        assert_eq!(health.observe(&Ok(true)), None);
        assert!(health.observe(&io).is_some());
        assert_eq!(health.observe(&Ok(false)), None);
        assert_eq!(health.observe(&io), None);
        assert_eq!(
            health.observe(&disabled),
            Some(HealthChange::Failing(BridgeError::Output(OutputError::Disabled)))
        );
    }
}
