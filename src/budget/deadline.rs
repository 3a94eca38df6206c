//! Cancellation token carrying a wall-clock limit

use crate::error::{ForecastError, Result};
use std::time::{Duration, Instant};

/// Start time plus an optional limit; `None` never expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    /// Start a deadline now. Negative, non-finite or unrepresentable limits
    /// are rejected.
    pub fn new(time_limit_secs: Option<f64>) -> Result<Self> {
        let limit = time_limit_secs.map(limit_from_secs).transpose()?;
        Ok(Self {
            start: Instant::now(),
            limit,
        })
    }

    pub fn from_duration(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit: Some(limit),
        }
    }

    pub fn unlimited() -> Self {
        Self {
            start: Instant::now(),
            limit: None,
        }
    }

    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    pub fn is_limited(&self) -> bool {
        self.limit.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left, zero once expired; `None` when unlimited
    pub fn remaining(&self) -> Option<Duration> {
        self.limit.map(|limit| limit.saturating_sub(self.elapsed()))
    }

    /// Remaining seconds, as passed on to a follow-up budget
    pub fn remaining_secs(&self) -> Option<f64> {
        self.remaining().map(|d| d.as_secs_f64())
    }

    /// Elapsed time strictly exceeds the limit
    pub fn is_expired(&self) -> bool {
        match self.limit {
            Some(limit) => self.elapsed() > limit,
            None => false,
        }
    }

    /// Elapsed time has reached the limit
    pub fn is_reached(&self) -> bool {
        match self.limit {
            Some(limit) => self.elapsed() >= limit,
            None => false,
        }
    }

    /// `DeadlineExceeded` once expired
    pub fn check(&self) -> Result<()> {
        match self.limit {
            Some(limit) => {
                let elapsed = self.elapsed();
                if elapsed > limit {
                    Err(ForecastError::DeadlineExceeded {
                        elapsed_secs: elapsed.as_secs_f64(),
                        limit_secs: limit.as_secs_f64(),
                    })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }
}

/// Convert a limit in seconds, rejecting values a `Duration` cannot hold
pub fn limit_from_secs(secs: f64) -> Result<Duration> {
    if secs < 0.0 {
        return Err(ForecastError::InvalidConfiguration(format!(
            "time limit must be a non-negative number of seconds, got {}",
            secs
        )));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| {
        ForecastError::InvalidConfiguration(format!("invalid time limit {}s: {}", secs, e))
    })
}

impl Default for Deadline {
    fn default() -> Self {
        Self::unlimited()
    }
}
