//! Timing service: tick kinds, the tick schedule and its deadlines.
//!
//! The engines never touch hardware timers directly. They ask a
//! [`TickSchedule`] to (re)arm or cancel a tick kind, and the platform layer
//! turns the resulting periods into real timers. [`TickTable`] is the plain
//! software implementation the firmware reads its periods from, and
//! [`TickDeadlines`] turns those periods into the next fire time of each kind.

/// Number of distinct tick kinds.
pub const TICK_KINDS: usize = 4;

/// Periodic tick sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TickKind {
    /// Slow idle-countdown tick (USB re-send scheduling).
    Idle,
    /// Select-line phase tick for the multiplexed engine.
    PollSelect,
    /// Half-bit clock tick for the serial engine.
    SerialClock,
    /// Independently clocked stall detector for the serial engine.
    SerialWatchdog,
}

impl TickKind {
    /// All tick kinds, in index order.
    pub const ALL: [TickKind; TICK_KINDS] = [
        TickKind::Idle,
        TickKind::PollSelect,
        TickKind::SerialClock,
        TickKind::SerialWatchdog,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            TickKind::Idle => 0,
            TickKind::PollSelect => 1,
            TickKind::SerialClock => 2,
            TickKind::SerialWatchdog => 3,
        }
    }
}

/// Arms and cancels periodic ticks.
pub trait TickSchedule {
    /// Fire `kind` every `period_us` microseconds, replacing any previous period.
    fn schedule(&mut self, kind: TickKind, period_us: u32);

    /// Stop delivering `kind`.
    fn cancel(&mut self, kind: TickKind);
}

/// Software timer table: the current period of every tick kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickTable {
    periods: [Option<u32>; TICK_KINDS],
}

impl TickTable {
    /// A table with every tick cancelled.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            periods: [None; TICK_KINDS],
        }
    }

    /// Current period of `kind` in microseconds, or `None` if cancelled.
    #[inline]
    #[must_use]
    pub fn period(&self, kind: TickKind) -> Option<u32> {
        self.periods[kind.index()]
    }

    #[inline]
    #[must_use]
    pub fn is_scheduled(&self, kind: TickKind) -> bool {
        self.period(kind).is_some()
    }
}

impl TickSchedule for TickTable {
    fn schedule(&mut self, kind: TickKind, period_us: u32) {
        self.periods[kind.index()] = Some(period_us);
    }

    fn cancel(&mut self, kind: TickKind) {
        self.periods[kind.index()] = None;
    }
}

/// Next fire time of every scheduled tick kind, in microseconds.
///
/// The platform layer keeps one of these next to the [`TickTable`] it hands
/// to the engines, sleeps until [`next`](Self::next), dispatches that tick
/// and reports it back with [`fired`](Self::fired). A single task draining
/// this table runs every protocol tick to completion before the next one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickDeadlines {
    due: [Option<u64>; TICK_KINDS],
}

impl TickDeadlines {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            due: [None; TICK_KINDS],
        }
    }

    /// Follow the table: newly scheduled kinds fire one period after `now_us`,
    /// cancelled kinds are dropped. Armed kinds keep their deadline.
    pub fn sync(&mut self, table: &TickTable, now_us: u64) {
        for kind in TickKind::ALL {
            let slot = &mut self.due[kind.index()];
            *slot = match (table.period(kind), *slot) {
                (None, _) => None,
                (Some(_), Some(at)) => Some(at),
                (Some(period), None) => Some(now_us + u64::from(period)),
            };
        }
    }

    /// The earliest armed tick. Ties go to the kind listed first in
    /// [`TickKind::ALL`].
    #[must_use]
    pub fn next(&self) -> Option<(TickKind, u64)> {
        TickKind::ALL
            .iter()
            .filter_map(|&kind| self.due[kind.index()].map(|at| (kind, at)))
            .min_by_key(|&(_, at)| at)
    }

    /// `kind` was dispatched: re-arm it one current period after its deadline.
    pub fn fired(&mut self, kind: TickKind, table: &TickTable) {
        let slot = &mut self.due[kind.index()];
        *slot = match (*slot, table.period(kind)) {
            (Some(at), Some(period)) => Some(at + u64::from(period)),
            _ => None,
        };
    }

    #[inline]
    #[must_use]
    pub fn deadline(&self, kind: TickKind) -> Option<u64> {
        self.due[kind.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_table_schedule_and_cancel() {
        let mut table = TickTable::new();
        assert!(!table.is_scheduled(TickKind::PollSelect));

        table.schedule(TickKind::PollSelect, 500);
        assert_eq!(table.period(TickKind::PollSelect), Some(500));

        table.schedule(TickKind::PollSelect, 2000);
        assert_eq!(table.period(TickKind::PollSelect), Some(2000));

        table.cancel(TickKind::PollSelect);
        assert_eq!(table.period(TickKind::PollSelect), None);
        assert_eq!(table.period(TickKind::Idle), None);
    }

    fn table(kinds: &[(TickKind, u32)]) -> TickTable {
        let mut table = TickTable::new();
        for &(kind, period) in kinds {
            table.schedule(kind, period);
        }
        table
    }

    #[test]
    fn test_deadlines_follow_table() {
        let mut deadlines = TickDeadlines::new();
        assert_eq!(deadlines.next(), None);

        let ticks = table(&[(TickKind::SerialClock, 71), (TickKind::SerialWatchdog, 1_000)]);
        deadlines.sync(&ticks, 100);
        assert_eq!(deadlines.deadline(TickKind::SerialClock), Some(171));
        assert_eq!(deadlines.deadline(TickKind::SerialWatchdog), Some(1_100));
        assert_eq!(deadlines.deadline(TickKind::PollSelect), None);
        assert_eq!(deadlines.next(), Some((TickKind::SerialClock, 171)));

        deadlines.sync(&TickTable::new(), 200);
        assert_eq!(deadlines.next(), None);
    }

    #[test]
    fn test_fired_rearms_from_deadline_with_current_period() {
        let mut ticks = table(&[(TickKind::PollSelect, 500)]);
        let mut deadlines = TickDeadlines::new();
        deadlines.sync(&ticks, 0);

        // Late wakeup does not drift the schedule.
        deadlines.fired(TickKind::PollSelect, &ticks);
        assert_eq!(deadlines.deadline(TickKind::PollSelect), Some(1_000));

        // The handler switched to the inter-packet gap.
        ticks.schedule(TickKind::PollSelect, 2_000);
        deadlines.fired(TickKind::PollSelect, &ticks);
        assert_eq!(deadlines.deadline(TickKind::PollSelect), Some(3_000));

        ticks.cancel(TickKind::PollSelect);
        deadlines.fired(TickKind::PollSelect, &ticks);
        assert_eq!(deadlines.next(), None);
    }

    #[test]
    fn test_sync_keeps_armed_deadlines() {
        let ticks = table(&[(TickKind::SerialWatchdog, 1_000)]);
        let mut deadlines = TickDeadlines::new();
        deadlines.sync(&ticks, 0);
        deadlines.sync(&ticks, 600);
        assert_eq!(deadlines.deadline(TickKind::SerialWatchdog), Some(1_000));
    }

    #[test]
    fn test_simultaneous_deadlines_dispatch_in_kind_order() {
        let ticks = table(&[(TickKind::SerialWatchdog, 100), (TickKind::SerialClock, 100)]);
        let mut deadlines = TickDeadlines::new();
        deadlines.sync(&ticks, 0);
        assert_eq!(deadlines.next(), Some((TickKind::SerialClock, 100)));
        deadlines.fired(TickKind::SerialClock, &ticks);
        assert_eq!(deadlines.next(), Some((TickKind::SerialWatchdog, 100)));
    }
}
