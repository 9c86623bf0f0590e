use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::{Error, Result};

/// Virtual clock of a broadcast queue.
///
/// Virtual time starts at `start` (epoch seconds) and runs `speed` times
/// faster than the wall clock measured from `anchor`.
#[derive(Debug, Clone)]
pub struct QueueClock {
    start: f64,
    speed: f64,
    anchor: Instant,
}

fn check_speed(speed: f64) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidSpeed { speed })
    }
}

fn wall_now() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

impl QueueClock {
    /// Start a clock at `start` epoch seconds, or at the current wall time.
    pub fn new(speed: f64, start: Option<f64>) -> Result<Self> {
        check_speed(speed)?;
        Ok(Self {
            start: start.unwrap_or_else(wall_now),
            speed,
            anchor: Instant::now(),
        })
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Current virtual time in epoch seconds.
    pub fn now(&self) -> f64 {
        self.start + self.anchor.elapsed().as_secs_f64() * self.speed
    }

    pub fn now_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.now() * 1000.0).round() as i64)
    }

    /// Seconds between wall time and virtual time, zeroed when under ten
    /// seconds.
    pub fn timeshift(&self) -> f64 {
        let shift = self.now() - wall_now();
        if shift.abs() < 10.0 {
            0.0
        } else {
            shift
        }
    }

    /// Restart the clock. Without a new start the current virtual time is
    /// kept so a speed change never makes time jump.
    pub fn reset(&mut self, speed: f64, start: Option<f64>) -> Result<()> {
        check_speed(speed)?;
        let start = start.unwrap_or_else(|| self.now());
        self.start = start;
        self.speed = speed;
        self.anchor = Instant::now();
        Ok(())
    }

    /// Real time to wait until virtual time reaches `score`.
    pub fn real_wait(&self, score: f64) -> Duration {
        let ahead = (score - self.now()).max(0.0);
        Duration::from_secs_f64(ahead / self.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn virtual_time_runs_at_speed() {
        let clock = QueueClock::new(60.0, Some(1000.0)).unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!((clock.now() - 1120.0).abs() < 1e-6);
        assert_eq!(clock.real_wait(1180.0), Duration::from_secs(1));
        assert_eq!(clock.real_wait(900.0), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_without_start_keeps_virtual_time() {
        let mut clock = QueueClock::new(1.0, Some(1000.0)).unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        clock.reset(10.0, None).unwrap();
        assert!((clock.now() - 1010.0).abs() < 1e-6);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!((clock.now() - 1020.0).abs() < 1e-6);

        clock.reset(1.0, Some(5000.0)).unwrap();
        assert!((clock.now() - 5000.0).abs() < 1e-6);
    }

    #[test]
    fn rejects_non_positive_speed() {
        assert!(QueueClock::new(0.0, None).is_err());
        assert!(QueueClock::new(f64::NAN, None).is_err());
        let mut clock = QueueClock::new(1.0, None).unwrap();
        assert!(clock.reset(-2.0, None).is_err());
        assert_eq!(clock.speed(), 1.0);
    }

    #[test]
    fn live_clock_has_no_timeshift() {
        let clock = QueueClock::new(1.0, None).unwrap();
        assert_eq!(clock.timeshift(), 0.0);
    }
}
