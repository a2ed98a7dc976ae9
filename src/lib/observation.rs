use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed successes out of a number of trials for one experiment group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupObservation {
    pub successes: u64,
    pub total: u64,
}

impl GroupObservation {
    pub fn new(successes: u64, total: u64) -> Result<Self> {
        let observation = Self { successes, total };
        observation.validate()?;
        Ok(observation)
    }

    pub fn validate(&self) -> Result<()> {
        if self.total == 0 {
            bail!("Total number of trials must be positive, got {}", self.total);
        }
        if self.successes > self.total {
            bail!(
                "Successes ({}) cannot exceed total number of trials ({})",
                self.successes,
                self.total
            );
        }
        Ok(())
    }

    pub fn failures(&self) -> u64 {
        self.total - self.successes
    }

    /// Observed conversion rate
    pub fn rate(&self) -> f64 {
        self.successes as f64 / self.total as f64
    }

    /// Extend the observation with `additional` trials converting at the current rate.
    ///
    /// Fails when the extended number of trials does not fit in a `u64`.
    pub fn augmented(&self, additional: u64) -> Result<Self> {
        let Some(total) = self.total.checked_add(additional) else {
            bail!(
                "Cannot add {} trials to {}, total number of trials overflows",
                additional,
                self
            );
        };
        // ties round to even
        let new_successes = (self.rate() * additional as f64).round_ties_even() as u64;
        Ok(Self {
            successes: self.successes + new_successes.min(additional),
            total,
        })
    }
}

impl fmt::Display for GroupObservation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{} ({:.2}%)",
            self.successes,
            self.total,
            self.rate() * 100.0
        )
    }
}
