//! Fixed-interval trigger for pipeline runs.
//!
//! Ticks fall on multiples of the interval since the Unix epoch, so a 6 h
//! schedule fires at 00:00, 06:00, 12:00 and 18:00 UTC. Runs are sequential
//! and missed ticks are not backfilled: the next tick is always computed from
//! the clock after the previous run returns.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    secs: i64,
}

impl FixedInterval {
    /// `None` for a zero-length interval.
    pub fn every_hours(hours: u32) -> Option<Self> {
        Self::every_secs(i64::from(hours) * 3600)
    }

    pub fn every_secs(secs: i64) -> Option<Self> {
        (secs > 0).then_some(Self { secs })
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.secs.unsigned_abs())
    }

    /// First tick strictly after `t`.
    pub fn next_after(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let next = (t.timestamp().div_euclid(self.secs) + 1) * self.secs;
        DateTime::from_timestamp(next, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Block on the wall clock and call `job` at each tick.
    pub fn run<F: FnMut(u64)>(&self, max_runs: Option<u64>, job: F) -> u64 {
        self.run_with(max_runs, Utc::now, std::thread::sleep, job)
    }

    /// Same as [`FixedInterval::run`] with an injected clock and sleeper.
    /// Returns the number of runs performed, which is only reached when
    /// `max_runs` is set.
    pub fn run_with<N, S, F>(&self, max_runs: Option<u64>, now: N, mut sleep: S, mut job: F) -> u64
    where
        N: Fn() -> DateTime<Utc>,
        S: FnMut(Duration),
        F: FnMut(u64),
    {
        let mut runs = 0;
        while max_runs.map_or(true, |max| runs < max) {
            let current = now();
            let tick = self.next_after(current);
            info!(next_run = %tick, "waiting for next scheduled run");
            if let Ok(wait) = (tick - current).to_std() {
                sleep(wait);
            }
            runs += 1;
            job(runs);
        }
        runs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::cell::Cell;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    #[test]
    fn six_hour_ticks_align_to_midnight() {
        let every6 = FixedInterval::every_hours(6).unwrap();
        assert_eq!(every6.next_after(at(0, 0, 1)), at(6, 0, 0));
        assert_eq!(every6.next_after(at(5, 59, 59)), at(6, 0, 0));
        assert_eq!(every6.next_after(at(13, 30, 0)), at(18, 0, 0));
        assert_eq!(
            every6.next_after(at(23, 0, 0)),
            Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn next_tick_is_strictly_after() {
        let every6 = FixedInterval::every_hours(6).unwrap();
        assert_eq!(every6.next_after(at(12, 0, 0)), at(18, 0, 0));
    }

    #[test]
    fn zero_interval_rejected() {
        assert!(FixedInterval::every_hours(0).is_none());
    }

    #[test]
    fn slow_runs_skip_missed_ticks() {
        let every6 = FixedInterval::every_hours(6).unwrap();
        // Each run takes 7 h of clock time.
        let clock = Cell::new(at(1, 0, 0));
        let mut ticks = Vec::new();
        let runs = every6.run_with(
            Some(3),
            || clock.get(),
            |d| clock.set(clock.get() + chrono::Duration::from_std(d).unwrap()),
            |_| {
                ticks.push(clock.get());
                clock.set(clock.get() + chrono::Duration::hours(7));
            },
        );
        assert_eq!(runs, 3);
        assert_eq!(
            ticks,
            vec![
                at(6, 0, 0),
                at(18, 0, 0),
                Utc.with_ymd_and_hms(2024, 5, 2, 6, 0, 0).unwrap(),
            ]
        );
    }
}
