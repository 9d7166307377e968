//! Channel Feedback Interface
//!
//! The scheduler consumes quantized per-PRB feedback (preferred PMI, column
//! indicator, CQI) plus the receiver's SINR estimate for every (PMI, column)
//! hypothesis. Feedback is re-read every TTI; the scheduler never caches it
//! across TTI boundaries.

use common::types::{Cqi, Pmi, Ratio, UeId};
use ndarray::Array3;

use crate::codebook::{NUM_PMIS, NUM_TX_ANTENNAS};

/// One user's downlink channel feedback for one TTI
#[derive(Debug, Clone)]
pub struct PrecoderFeedback {
    /// Preferred PMI per PRB
    pub pmi: Vec<Pmi>,
    /// Preferred codebook column per PRB
    pub column: Vec<usize>,
    /// Quantized channel quality per PRB
    pub cqi: Vec<Cqi>,
    /// SINR estimate per (PRB, PMI, column) hypothesis
    pub sinr: Array3<Ratio>,
}

impl PrecoderFeedback {
    /// An all-zero feedback report (CQI out of range, flat SINR floor)
    pub fn empty(num_prbs: usize) -> Self {
        Self {
            pmi: vec![Pmi(0); num_prbs],
            column: vec![0; num_prbs],
            cqi: vec![Cqi::OUT_OF_RANGE; num_prbs],
            sinr: Array3::from_elem(
                (num_prbs, NUM_PMIS, NUM_TX_ANTENNAS),
                Ratio::from_db(-30.0),
            ),
        }
    }

    /// Check the report covers the expected number of PRBs
    pub fn is_sized_for(&self, num_prbs: usize) -> bool {
        self.pmi.len() == num_prbs
            && self.column.len() == num_prbs
            && self.cqi.len() == num_prbs
            && self.sinr.dim() == (num_prbs, NUM_PMIS, NUM_TX_ANTENNAS)
    }
}

/// Source of per-user channel feedback.
///
/// Implementations must return a report for every known user; a user without
/// usable channel state reports `Cqi::OUT_OF_RANGE` rather than no report.
pub trait FeedbackProvider: Send {
    fn feedback(&self, user: UeId, tti: u64) -> PrecoderFeedback;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_feedback_is_sized() {
        let feedback = PrecoderFeedback::empty(25);
        assert!(feedback.is_sized_for(25));
        assert!(!feedback.is_sized_for(50));
        assert_eq!(feedback.cqi[0], Cqi::OUT_OF_RANGE);
    }
}
