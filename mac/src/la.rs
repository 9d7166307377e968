//! Link Adaptation Interface
//!
//! Modulation/coding selection is external to the scheduler; this module
//! carries the consumer interface plus the CQI decoding-threshold table the
//! proportional-fair metric is anchored on.

use common::types::{Cqi, Ratio, UeId};

use crate::scheduler::UserAllocation;

/// SINR at which a transport block encoded for this CQI decodes at the
/// target block error rate.
pub fn sinr_threshold(cqi: Cqi) -> Ratio {
    let db = match cqi.0 {
        0 => -10.0,
        1 => -6.7,
        2 => -4.7,
        3 => -2.3,
        4 => 0.2,
        5 => 2.4,
        6 => 4.3,
        7 => 5.9,
        8 => 8.1,
        9 => 10.3,
        10 => 11.7,
        11 => 14.1,
        12 => 16.3,
        13 => 18.7,
        14 => 21.0,
        _ => 22.7,
    };
    Ratio::from_db(db)
}

/// Receives the final per-user allocation once per TTI
pub trait LinkAdaptationConsumer: Send {
    fn register_transmission(&mut self, tti: u64, user: UeId, allocation: &UserAllocation);
}

/// Discards all allocations; for tests and benchmarks
#[derive(Debug, Default)]
pub struct NullLinkAdaptation;

impl LinkAdaptationConsumer for NullLinkAdaptation {
    fn register_transmission(&mut self, _tti: u64, _user: UeId, _allocation: &UserAllocation) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_monotonic() {
        let mut previous = sinr_threshold(Cqi(0));
        for cqi in 1..=15u8 {
            let threshold = sinr_threshold(Cqi(cqi));
            assert!(
                threshold > previous,
                "threshold for CQI {} not above CQI {}",
                cqi,
                cqi - 1
            );
            previous = threshold;
        }
    }
}
