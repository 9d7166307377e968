//! Synthetic Collaborators for the Scheduler Simulation
//!
//! Provides a reproducible random channel (feedback provider), a shared
//! handle to the HARQ ledger so the simulation loop can inject NACKs, and a
//! link adaptation sink that keeps aggregate counters.

use common::types::{Cqi, Pmi, Ratio, UeId};
use mac::codebook::{NUM_PMIS, NUM_TX_ANTENNAS};
use mac::la::sinr_threshold;
use mac::{
    FeedbackProvider, HarqManager, HarqRegistry, LinkAdaptationConsumer, PrecoderFeedback,
    RetransmissionGrant, UserAllocation,
};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Reproducible synthetic channel feedback.
///
/// Every (user, TTI) pair seeds its own generator so reports are stable
/// regardless of query order.
pub struct SyntheticFeedback {
    num_prbs: usize,
    seed: u64,
}

impl SyntheticFeedback {
    pub fn new(num_prbs: usize, seed: u64) -> Self {
        Self { num_prbs, seed }
    }

    /// Highest CQI whose decoding threshold the SINR still clears
    fn quantize_cqi(sinr: Ratio) -> Cqi {
        for cqi in (1..=15u8).rev() {
            if sinr >= sinr_threshold(Cqi(cqi)) {
                return Cqi(cqi);
            }
        }
        Cqi::OUT_OF_RANGE
    }
}

impl FeedbackProvider for SyntheticFeedback {
    fn feedback(&self, user: UeId, tti: u64) -> PrecoderFeedback {
        let stream = self
            .seed
            .wrapping_mul(0x9e37_79b9_7f4a_7c15)
            .wrapping_add((user.0 as u64) << 20)
            .wrapping_add(tti);
        let mut rng = StdRng::seed_from_u64(stream);

        let mut pmi = Vec::with_capacity(self.num_prbs);
        let mut column = Vec::with_capacity(self.num_prbs);
        let mut cqi = Vec::with_capacity(self.num_prbs);
        let mut sinr = Array3::from_elem(
            (self.num_prbs, NUM_PMIS, NUM_TX_ANTENNAS),
            Ratio::from_db(-30.0),
        );

        for prb in 0..self.num_prbs {
            let best_db: f64 = rng.gen_range(-6.0..20.0);
            let best_pmi = Pmi(rng.gen_range(0..NUM_PMIS as u8));
            let best_column = rng.gen_range(0..NUM_TX_ANTENNAS);

            for hypothesis_pmi in 0..NUM_PMIS {
                for hypothesis_column in 0..NUM_TX_ANTENNAS {
                    let loss: f64 =
                        if hypothesis_pmi == best_pmi.0 as usize && hypothesis_column == best_column
                        {
                            0.0
                        } else {
                            rng.gen_range(1.0..14.0)
                        };
                    sinr[[prb, hypothesis_pmi, hypothesis_column]] =
                        Ratio::from_db(best_db - loss);
                }
            }

            pmi.push(best_pmi);
            column.push(best_column);
            cqi.push(Self::quantize_cqi(Ratio::from_db(best_db)));
        }

        PrecoderFeedback {
            pmi,
            column,
            cqi,
            sinr,
        }
    }
}

/// Shared handle to the HARQ ledger.
///
/// The scheduler owns one handle; the simulation loop keeps another to
/// register NACKed transmissions between TTIs.
#[derive(Clone, Default)]
pub struct SharedHarq {
    inner: Arc<Mutex<HarqRegistry>>,
}

impl SharedHarq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pending(&self, user: UeId, grant: RetransmissionGrant) {
        self.inner.lock().expect("HARQ ledger poisoned").add_pending(user, grant);
    }

    pub fn has_pending(&self, user: UeId) -> bool {
        self.inner.lock().expect("HARQ ledger poisoned").has_pending(user)
    }
}

impl HarqManager for SharedHarq {
    fn users_with_retransmissions(&self) -> BTreeSet<UeId> {
        self.inner
            .lock()
            .expect("HARQ ledger poisoned")
            .users_with_retransmissions()
    }

    fn process_with_next_retransmission(&self, user: UeId) -> Option<common::types::ProcessId> {
        self.inner
            .lock()
            .expect("HARQ ledger poisoned")
            .process_with_next_retransmission(user)
    }

    fn has_retransmission(
        &self,
        user: UeId,
        process: common::types::ProcessId,
        stream: usize,
    ) -> bool {
        self.inner
            .lock()
            .expect("HARQ ledger poisoned")
            .has_retransmission(user, process, stream)
    }

    fn retransmission(
        &self,
        user: UeId,
        process: common::types::ProcessId,
        stream: usize,
    ) -> Option<RetransmissionGrant> {
        self.inner
            .lock()
            .expect("HARQ ledger poisoned")
            .retransmission(user, process, stream)
    }

    fn retransmission_started(
        &mut self,
        user: UeId,
        process: common::types::ProcessId,
        stream: usize,
    ) {
        self.inner
            .lock()
            .expect("HARQ ledger poisoned")
            .retransmission_started(user, process, stream);
    }
}

/// Link adaptation sink keeping aggregate counters for the run summary
#[derive(Debug, Default)]
pub struct CountingLinkAdaptation {
    pub transmissions: usize,
    pub total_prbs: usize,
}

impl LinkAdaptationConsumer for CountingLinkAdaptation {
    fn register_transmission(&mut self, tti: u64, user: UeId, allocation: &UserAllocation) {
        self.transmissions += 1;
        self.total_prbs += allocation.prbs.len();
        debug!(tti, %user, prbs = allocation.prbs.len(), "transmission registered");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_is_reproducible() {
        let provider = SyntheticFeedback::new(6, 42);
        let a = provider.feedback(UeId(1), 7);
        let b = provider.feedback(UeId(1), 7);
        assert_eq!(a.pmi, b.pmi);
        assert_eq!(a.column, b.column);
        assert_eq!(a.cqi, b.cqi);
        assert!(a.is_sized_for(6));
    }

    #[test]
    fn test_feedback_differs_between_users() {
        let provider = SyntheticFeedback::new(6, 42);
        let a = provider.feedback(UeId(1), 0);
        let b = provider.feedback(UeId(2), 0);
        // channels are independent; at least one report field should differ
        assert!(a.pmi != b.pmi || a.column != b.column || a.cqi != b.cqi);
    }

    #[test]
    fn test_preferred_hypothesis_has_highest_sinr() {
        let provider = SyntheticFeedback::new(4, 7);
        let report = provider.feedback(UeId(3), 0);
        for prb in 0..4 {
            let best = report.sinr[[prb, report.pmi[prb].0 as usize, report.column[prb]]];
            for pmi in 0..NUM_PMIS {
                for column in 0..NUM_TX_ANTENNAS {
                    assert!(report.sinr[[prb, pmi, column]] <= best);
                }
            }
        }
    }

    #[test]
    fn test_cqi_quantization_bounds() {
        assert_eq!(
            SyntheticFeedback::quantize_cqi(Ratio::from_db(-20.0)),
            Cqi::OUT_OF_RANGE
        );
        assert_eq!(
            SyntheticFeedback::quantize_cqi(Ratio::from_db(30.0)),
            Cqi(15)
        );
    }
}
