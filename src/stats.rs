//! Summary statistics over a kmer's raw signal samples.
//!
//! All functions are pure and operate on a slice of samples. Variance is the
//! population variance (no Bessel correction). An empty slice yields `NaN` for
//! every floating statistic and `0` for the count.

use clap::ValueEnum;
use std::{fmt::Write, str::FromStr};

use crate::error::CollapseError;

/// A statistic that can be emitted for each kmer when samples are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum StatField {
    /// Arithmetic mean of the samples.
    Mean,
    /// Population standard deviation of the samples.
    Std,
    /// Median of the samples.
    Median,
    /// Median absolute deviation from the median.
    Mad,
    /// Number of samples.
    #[value(alias = "n_signals")]
    Count,
}

impl StatField {
    /// Statistics emitted when none are requested explicitly.
    pub const DEFAULT: [Self; 3] = [Self::Mean, Self::Median, Self::Count];

    /// Column name used in the output header.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Std => "std",
            Self::Median => "median",
            Self::Mad => "mad",
            Self::Count => "count",
        }
    }

    /// Appends this statistic computed over `samples` to `out`.
    pub fn write_value(self, samples: &[f64], out: &mut String) {
        match self {
            Self::Count => {
                let _ = write!(out, "{}", samples.len());
            }
            Self::Mean => push_float(out, mean(samples)),
            Self::Std => push_float(out, std_dev(samples)),
            Self::Median => push_float(out, median(samples)),
            Self::Mad => push_float(out, mad(samples)),
        }
    }
}

impl std::fmt::Display for StatField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StatField {
    type Err = CollapseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean" => Ok(Self::Mean),
            "std" => Ok(Self::Std),
            "median" => Ok(Self::Median),
            "mad" => Ok(Self::Mad),
            "count" | "n_signals" => Ok(Self::Count),
            other => Err(CollapseError::InvalidStatField {
                field: other.to_string(),
            }),
        }
    }
}

/// Writes a float in shortest round-trip form, spelling not-a-number as `nan`.
pub(crate) fn push_float(out: &mut String, value: f64) {
    if value.is_nan() {
        out.push_str("nan");
    } else {
        let _ = write!(out, "{value}");
    }
}

/// Arithmetic mean.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation.
pub fn std_dev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let m = mean(samples);
    let variance = samples.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / samples.len() as f64;
    variance.sqrt()
}

/// Median; the mean of the two middle values for an even count.
pub fn median(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation: `median(|x - median(x)|)`.
pub fn mad(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let center = median(samples);
    let deviations: Vec<f64> = samples.iter().map(|x| (x - center).abs()).collect();
    median(&deviations)
}
