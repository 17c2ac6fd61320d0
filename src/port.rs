use std::{fmt::Display, num::IntErrorKind, ops::RangeInclusive, str::FromStr};

use crate::error::ScanError;

/// Ports selected on the command line, either `N` or the inclusive range `N-M`.
///
/// Bounds aren't checked against the valid port range here. Each prober
/// rejects out of range values by itself so a bad port never aborts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    start: u64,
    end: u64,
}

impl PortSpec {
    pub fn single(port: u64) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub fn range(start: u64, end: u64) -> Result<Self, ScanError> {
        if start > end {
            return Err(ScanError::InvertedRange { start, end });
        }

        Ok(Self { start, end })
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of ports covered, never zero.
    pub fn port_count(&self) -> u64 {
        (self.end - self.start).saturating_add(1)
    }

    /// Ascending ports, restartable since every call builds a new iterator.
    pub fn iter(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}

impl IntoIterator for &PortSpec {
    type Item = u64;
    type IntoIter = RangeInclusive<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromStr for PortSpec {
    type Err = ScanError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let number = |part: &str| match part.trim().parse::<u64>() {
            Ok(n) => Ok(n),
            // Still an integer, only out of range, which the prober reports per port.
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(u64::MAX),
            Err(_) => Err(ScanError::InvalidPortSpec(raw.into())),
        };

        match raw.split_once('-') {
            Some((start, end)) => PortSpec::range(number(start)?, number(end)?),
            None => number(raw).map(PortSpec::single),
        }
    }
}

impl Display for PortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}
