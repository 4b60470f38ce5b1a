//! Tick-based read cadence.
//!
//! The host loop ticks at a fixed granularity; a read happens on every N-th
//! tick, where N is the poll interval divided by the tick length.

/// Counts ticks and reports when a read is due.
///
/// # Example
///
/// ```
/// use s7comm_poller::TickSchedule;
///
/// let mut schedule = TickSchedule::new(3);
/// let due: Vec<bool> = (0..6).map(|_| schedule.tick()).collect();
/// assert_eq!(due, vec![false, false, true, false, false, true]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    ticks_per_interval: u64,
    count: u64,
}

impl TickSchedule {
    /// Creates a schedule firing every `ticks_per_interval` ticks; 0 is treated as 1.
    pub fn new(ticks_per_interval: u64) -> Self {
        Self {
            ticks_per_interval: ticks_per_interval.max(1),
            count: 0,
        }
    }

    /// Returns the number of ticks between reads.
    pub fn ticks_per_interval(&self) -> u64 {
        self.ticks_per_interval
    }

    /// Advances by one tick. Returns `true` on ticks N, 2N, 3N, ...
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count < self.ticks_per_interval {
            return false;
        }
        self.count = 0;
        true
    }
}
