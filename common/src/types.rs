//! Common Types for the MU-MIMO Downlink Scheduler
//!
//! Defines fundamental identifiers and units used throughout the stack

use num_derive::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// User Equipment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UeId(pub u32);

impl UeId {
    /// Create a new UE identifier
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the identifier value
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for UeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UE{}", self.0)
    }
}

/// Cell Identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub u16);

/// Precoding Matrix Indicator: index into the 4-TX codebook
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pmi(pub u8);

impl fmt::Display for Pmi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Channel Quality Indicator reported per PRB
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cqi(pub u8);

impl Cqi {
    /// Highest CQI value
    pub const MAX: Self = Self(15);
    /// Out-of-range indicator (no usable channel)
    pub const OUT_OF_RANGE: Self = Self(0);
}

/// HARQ process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u8);

/// A power ratio stored in the dB domain.
///
/// Additions and subtractions operate in dB, i.e. they multiply/divide the
/// underlying linear factors.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Ratio {
    db: f64,
}

impl Ratio {
    /// Construct from a dB value
    pub fn from_db(db: f64) -> Self {
        Self { db }
    }

    /// Construct from a linear factor
    pub fn from_factor(factor: f64) -> Self {
        Self {
            db: 10.0 * factor.log10(),
        }
    }

    /// 0 dB (factor 1.0)
    pub fn unit() -> Self {
        Self { db: 0.0 }
    }

    /// Value in dB
    pub fn db(&self) -> f64 {
        self.db
    }

    /// Value as a linear factor
    pub fn factor(&self) -> f64 {
        10f64.powf(self.db / 10.0)
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::unit()
    }
}

impl Add for Ratio {
    type Output = Ratio;

    fn add(self, rhs: Ratio) -> Ratio {
        Ratio {
            db: self.db + rhs.db,
        }
    }
}

impl AddAssign for Ratio {
    fn add_assign(&mut self, rhs: Ratio) {
        self.db += rhs.db;
    }
}

impl Sub for Ratio {
    type Output = Ratio;

    fn sub(self, rhs: Ratio) -> Ratio {
        Ratio {
            db: self.db - rhs.db,
        }
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} dB", self.db)
    }
}

/// Channel bandwidth in MHz, discriminants usable with `FromPrimitive`
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive, Serialize, Deserialize)]
pub enum Bandwidth {
    /// 1.4 MHz
    Bw1_4 = 1,
    /// 3 MHz
    Bw3 = 3,
    /// 5 MHz
    Bw5 = 5,
    /// 10 MHz
    Bw10 = 10,
    /// 15 MHz
    Bw15 = 15,
    /// 20 MHz
    Bw20 = 20,
}

impl Bandwidth {
    /// Number of PRBs available in the downlink for this bandwidth
    pub fn num_prbs(&self) -> usize {
        match self {
            Bandwidth::Bw1_4 => 6,
            Bandwidth::Bw3 => 15,
            Bandwidth::Bw5 => 25,
            Bandwidth::Bw10 => 50,
            Bandwidth::Bw15 => 75,
            Bandwidth::Bw20 => 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn test_ratio_conversions() {
        let r = Ratio::from_db(3.0);
        assert!((r.factor() - 1.995).abs() < 0.01);

        let r = Ratio::from_factor(100.0);
        assert!((r.db() - 20.0).abs() < 1e-9);

        assert_eq!(Ratio::unit().db(), 0.0);
        assert!((Ratio::unit().factor() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ratio_arithmetic() {
        let a = Ratio::from_db(10.0);
        let b = Ratio::from_db(-4.0);
        assert!(((a + b).db() - 6.0).abs() < 1e-9);
        assert!(((a - b).db() - 14.0).abs() < 1e-9);

        // dB addition multiplies the linear factors
        let product = (a + b).factor();
        assert!((product - a.factor() * b.factor()).abs() < 1e-9);
    }

    #[test]
    fn test_bandwidth_prbs() {
        assert_eq!(Bandwidth::Bw5.num_prbs(), 25);
        assert_eq!(Bandwidth::Bw20.num_prbs(), 100);
    }

    #[test]
    fn test_bandwidth_from_mhz() {
        assert_eq!(Bandwidth::from_u32(10), Some(Bandwidth::Bw10));
        assert_eq!(Bandwidth::from_u32(7), None);
    }

    #[test]
    fn test_ue_id_ordering() {
        let mut users = vec![UeId(3), UeId(1), UeId(2)];
        users.sort();
        assert_eq!(users, vec![UeId(1), UeId(2), UeId(3)]);
    }
}
