//! Synthetic substitute series: linear drift plus bounded random noise

use chrono::{Days, NaiveDate};
use rand::Rng;

use crate::stats::types::{Ecosystem, Series};

/// Shape parameters of a synthetic series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyntheticProfile {
    /// Starting value
    pub base: u64,
    /// Relative drift applied every day
    pub growth: f64,
    /// Maximum absolute noise added every day
    pub noise: u64,
}

impl SyntheticProfile {
    pub const DEFAULT: Self = Self::new(1000, 0.02, 200);

    pub const fn new(base: u64, growth: f64, noise: u64) -> Self {
        Self {
            base,
            growth,
            noise,
        }
    }

    /// Download-shaped profile for a package of the given ecosystem
    pub fn for_ecosystem(ecosystem: Ecosystem) -> Self {
        let (base, growth) = match ecosystem {
            Ecosystem::Npm => (2000, 0.01),
            Ecosystem::Pypi => (500, 0.005),
        };
        Self::new(base, growth, base / 5)
    }
}

impl Default for SyntheticProfile {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Generates `days` consecutive points ending at `end`, never negative
pub fn series<R: Rng + ?Sized>(
    end: NaiveDate,
    days: u32,
    profile: SyntheticProfile,
    rng: &mut R,
) -> Series {
    let noise = i64::try_from(profile.noise).unwrap_or(i64::MAX);
    let mut value = i64::try_from(profile.base).unwrap_or(i64::MAX);

    Series::from_observations((0..days).filter_map(|i| {
        let date = end.checked_sub_days(Days::new(u64::from(days - i - 1)))?;
        let drift = (value as f64 * profile.growth) as i64;
        let jitter = if noise > 0 {
            rng.random_range(-noise..=noise)
        } else {
            0
        };
        value = (value + drift + jitter).max(0);
        Some((date, value))
    }))
}
