//! Delays inserted between send attempts.
//!
//! The engine waits a randomized interval between send attempts. Policies
//! only compute the interval; the engine owns the actual wait.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Source of the wait applied at each pacing point.
pub trait PacingPolicy {
    /// Returns the delay for the next pacing point.
    fn next_delay(&mut self) -> Duration;
}

impl<P: PacingPolicy + ?Sized> PacingPolicy for &mut P {
    fn next_delay(&mut self) -> Duration {
        (**self).next_delay()
    }
}

/// Inclusive range of whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(u64, u64)", into = "(u64, u64)")]
pub struct DelayRange {
    min_seconds: u64,
    max_seconds: u64,
}

impl DelayRange {
    /// Email default: 5 to 15 seconds.
    pub const EMAIL: Self = Self {
        min_seconds: 5,
        max_seconds: 15,
    };

    /// SMS default: 3 to 7 seconds.
    pub const SMS: Self = Self {
        min_seconds: 3,
        max_seconds: 7,
    };

    /// Creates a range.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidDelayRange` if `min_seconds > max_seconds`.
    pub fn new(min_seconds: u64, max_seconds: u64) -> Result<Self> {
        if min_seconds > max_seconds {
            return Err(Error::InvalidDelayRange {
                min: min_seconds,
                max: max_seconds,
            });
        }
        Ok(Self {
            min_seconds,
            max_seconds,
        })
    }

    /// Lower bound in seconds.
    #[must_use]
    pub const fn min_seconds(self) -> u64 {
        self.min_seconds
    }

    /// Upper bound in seconds.
    #[must_use]
    pub const fn max_seconds(self) -> u64 {
        self.max_seconds
    }
}

impl TryFrom<(u64, u64)> for DelayRange {
    type Error = Error;

    fn try_from((min, max): (u64, u64)) -> Result<Self> {
        Self::new(min, max)
    }
}

impl From<DelayRange> for (u64, u64) {
    fn from(range: DelayRange) -> Self {
        (range.min_seconds, range.max_seconds)
    }
}

impl std::fmt::Display for DelayRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{} seconds", self.min_seconds, self.max_seconds)
    }
}

/// Uniform random whole-second delay within a [`DelayRange`].
#[derive(Debug, Clone)]
pub struct UniformPacing {
    range: DelayRange,
    rng: StdRng,
}

impl UniformPacing {
    /// Creates a policy seeded from OS entropy.
    #[must_use]
    pub fn new(range: DelayRange) -> Self {
        Self {
            range,
            rng: StdRng::from_entropy(),
        }
    }

    /// Creates a policy with a fixed seed, for reproducible runs.
    #[must_use]
    pub fn seeded(range: DelayRange, seed: u64) -> Self {
        Self {
            range,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The configured range.
    #[must_use]
    pub const fn range(&self) -> DelayRange {
        self.range
    }
}

impl PacingPolicy for UniformPacing {
    fn next_delay(&mut self) -> Duration {
        let seconds = self
            .rng
            .gen_range(self.range.min_seconds..=self.range.max_seconds);
        Duration::from_secs(seconds)
    }
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacing;

impl PacingPolicy for NoPacing {
    fn next_delay(&mut self) -> Duration {
        Duration::ZERO
    }
}
