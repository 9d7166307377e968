//! Downlink Scheduling Orchestrator
//!
//! Drives the full pipeline once per TTI: reset the grid, seed every PRB from
//! the group ranking, reconcile retransmission sizes, fill leftover capacity,
//! and assemble the per-user result. The only state that survives a TTI is
//! the exponentially smoothed per-user throughput history feeding the
//! proportional-fair metric.

use common::types::{Bandwidth, CellId, Pmi, ProcessId, Ratio, UeId};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;
use tracing::{debug, info, trace};

use crate::codebook::Codebook;
use crate::feedback::{FeedbackProvider, PrecoderFeedback};
use crate::filler;
use crate::grid::{GridCoordinate, ResourceGrid, NUM_COLUMNS};
use crate::harq::HarqManager;
use crate::la::{sinr_threshold, LinkAdaptationConsumer};
use crate::ranking::{CandidateEvaluator, GroupRanker};
use crate::sizing;
use crate::MacError;

/// SINR offset applied when a user is forced onto an otherwise empty PRB
const FORCED_SCHEDULING_PENALTY_DB: f64 = -10.0;

/// SINR offset assumed for a non-preferred resource without any estimation
const NO_ESTIMATION_OFFSET_DB: f64 = -10.0;

/// Feedback SINR values above this are clipped before the rate estimate
const MAX_USEFUL_SINR_DB: f64 = 22.0;

/// How the SINR penalty of serving a non-preferred (PMI, column) pair is
/// estimated. Selected once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimationMode {
    /// Use the receiver-reported SINR difference between the pairs
    Perfect,
    /// Use the precomputed codebook inner-product loss table
    #[serde(rename = "innerproduct")]
    InnerProduct,
    /// Apply a flat penalty; non-preferred pairs are not even candidates
    #[serde(rename = "no")]
    NoEstimation,
}

impl FromStr for EstimationMode {
    type Err = MacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "perfect" => Ok(EstimationMode::Perfect),
            "innerproduct" => Ok(EstimationMode::InnerProduct),
            "no" => Ok(EstimationMode::NoEstimation),
            other => Err(MacError::UnknownEstimationMode(other.to_string())),
        }
    }
}

/// Static scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub cell_id: CellId,
    pub bandwidth: Bandwidth,
    /// Transmit antenna ports; the codebook supports exactly four
    pub num_tx_antennas: usize,
    /// Exponential smoothing factor for the throughput history, 0 < alpha <= 1
    pub throughput_smoothing: f64,
    /// Exponent on the throughput history in the proportional-fair metric
    pub history_exponent: f64,
    /// Top up leftover capacity with new transmissions after sizing
    pub fill_grid: bool,
    /// SINR offset estimation for non-preferred resources
    pub estimation: EstimationMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cell_id: CellId(1),
            bandwidth: Bandwidth::Bw5,
            num_tx_antennas: 4,
            throughput_smoothing: 0.05,
            history_exponent: 1.0,
            fill_grid: true,
            estimation: EstimationMode::InnerProduct,
        }
    }
}

/// One user's share of a PRB in the final schedule
#[derive(Debug, Clone, Serialize)]
pub struct PrbAllocation {
    pub pmi: Pmi,
    pub column: usize,
    pub sinr_offset: Ratio,
    pub metric: f64,
}

/// All PRBs granted to one user this TTI
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserAllocation {
    pub prbs: BTreeMap<usize, PrbAllocation>,
}

/// Counters describing how well the pass went
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SchedulerDiagnostics {
    /// Share of cells filled by the initial grouping alone
    pub initial_fill_level: f64,
    /// Share of cells filled when the pass completed
    pub final_fill_level: f64,
    /// Share of new-transmission cells on forced or topped-up resources
    pub imperfect_transmission_ratio: f64,
    /// Share of retransmission cells on non-preferred resources
    pub imperfect_retransmission_ratio: f64,
    /// Retransmissions withdrawn and postponed this TTI
    pub dropped_retransmissions: usize,
}

/// The externally visible result of one scheduling pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct TtiSchedule {
    pub tti: u64,
    pub allocations: BTreeMap<UeId, UserAllocation>,
    pub diagnostics: SchedulerDiagnostics,
}

/// The per-TTI scheduling orchestrator for one cell
pub struct DownlinkScheduler {
    config: SchedulerConfig,
    num_prbs: usize,
    codebook: Codebook,
    ranker: GroupRanker,
    grid: ResourceGrid,
    /// SINR loss between canonical beams, precomputed at construction
    sinr_losses: Array2<Ratio>,
    /// Smoothed per-user throughput; the only cross-TTI state
    throughput_history: HashMap<UeId, f64>,
    feedback_provider: Box<dyn FeedbackProvider>,
    harq: Box<dyn HarqManager>,
    link_adaptation: Box<dyn LinkAdaptationConsumer>,
}

impl DownlinkScheduler {
    pub fn new(
        config: SchedulerConfig,
        feedback_provider: Box<dyn FeedbackProvider>,
        harq: Box<dyn HarqManager>,
        link_adaptation: Box<dyn LinkAdaptationConsumer>,
    ) -> Result<Self, MacError> {
        if config.num_tx_antennas != crate::codebook::NUM_TX_ANTENNAS {
            return Err(MacError::UnsupportedAntennaCount(config.num_tx_antennas));
        }
        if !(config.throughput_smoothing > 0.0 && config.throughput_smoothing <= 1.0) {
            return Err(MacError::InvalidConfiguration(format!(
                "throughput smoothing factor must be in (0, 1], got {}",
                config.throughput_smoothing
            )));
        }
        if config.history_exponent < 0.0 {
            return Err(MacError::InvalidConfiguration(format!(
                "history exponent must be non-negative, got {}",
                config.history_exponent
            )));
        }

        let codebook = Codebook::new();
        let sinr_losses = compute_sinr_losses(&codebook);
        let ranker = GroupRanker::new(codebook.pmis());
        let num_prbs = config.bandwidth.num_prbs();

        info!(
            cell = config.cell_id.0,
            num_prbs,
            beams = codebook.num_canonical_indices(),
            "downlink scheduler initialized"
        );

        Ok(Self {
            config,
            num_prbs,
            codebook,
            ranker,
            grid: ResourceGrid::new(num_prbs),
            sinr_losses,
            throughput_history: HashMap::new(),
            feedback_provider,
            harq,
            link_adaptation,
        })
    }

    pub fn num_prbs(&self) -> usize {
        self.num_prbs
    }

    /// Read access to the allocation table, mainly for inspection and tests
    pub fn grid(&self) -> &ResourceGrid {
        &self.grid
    }

    pub fn throughput_history(&self, user: UeId) -> Option<f64> {
        self.throughput_history.get(&user).copied()
    }

    /// Run one full scheduling pass.
    ///
    /// `active_users` are the users with queued new-transmission data;
    /// retransmission users come from the HARQ manager and take precedence.
    pub fn schedule(&mut self, tti: u64, active_users: &BTreeSet<UeId>) -> TtiSchedule {
        self.grid.reset();

        // collect pending retransmissions and their exact size requirements
        let retransmission_users = self.harq.users_with_retransmissions();
        let mut requirements: BTreeMap<UeId, usize> = BTreeMap::new();
        let mut processes: BTreeMap<UeId, ProcessId> = BTreeMap::new();
        for &user in &retransmission_users {
            let Some(process) = self.harq.process_with_next_retransmission(user) else {
                debug_assert!(false, "{} reported without a retransmission process", user);
                continue;
            };
            debug_assert!(
                self.harq.has_retransmission(user, process, 0),
                "{} has no retransmission for the first transport block",
                user
            );
            let Some(grant) = self.harq.retransmission(user, process, 0) else {
                continue;
            };
            debug!(%user, ?process, prbs = grant.prbs.len(), "pending retransmission");
            requirements.insert(user, grant.prbs.len());
            processes.insert(user, process);
        }

        let new_transmission_users: BTreeSet<UeId> = active_users
            .iter()
            .copied()
            .filter(|user| !requirements.contains_key(user))
            .collect();
        let all_users: BTreeSet<UeId> = requirements
            .keys()
            .copied()
            .chain(new_transmission_users.iter().copied())
            .collect();

        if all_users.is_empty() {
            return TtiSchedule {
                tti,
                ..Default::default()
            };
        }

        // feedback can change between TTIs, so the compatibility caches are
        // rebuilt from scratch on every pass
        let context = build_tti_context(
            self.config.estimation,
            self.config.history_exponent,
            &self.codebook,
            &self.sinr_losses,
            &self.throughput_history,
            self.feedback_provider.as_ref(),
            self.num_prbs,
            tti,
            &all_users,
        );

        let mut imperfect_transmissions = 0usize;
        let mut initial_resources = 0usize;
        for prb in 0..self.num_prbs {
            let ranking = self.ranker.rank_groups(&all_users, prb, &context);
            let Some(best) = ranking.into_iter().next() else {
                continue;
            };

            for column in 0..NUM_COLUMNS {
                if let Some(user) = best.users[column] {
                    debug_assert!(
                        context.fits(user, prb, best.pmi, column),
                        "ranked group contains an incompatible user"
                    );
                    let offset = context.sinr_offset(user, prb, best.pmi, column);
                    self.grid
                        .add_entry(prb, best.pmi, column, user, best.metrics[column], offset);
                    initial_resources += 1;
                }
            }

            // nobody was groupable, e.g. without any feedback at startup;
            // force someone in rather than wasting the PRB
            if self.grid.num_allocated(prb) == 0 {
                imperfect_transmissions += 1;
                let user = *all_users.iter().next().expect("user set is not empty");
                let pmi = self.ranker.pmis()[0];
                self.grid.add_entry(
                    prb,
                    pmi,
                    0,
                    user,
                    0.0,
                    Ratio::from_db(FORCED_SCHEDULING_PENALTY_DB),
                );
            }
        }

        let mut diagnostics = SchedulerDiagnostics {
            initial_fill_level: initial_resources as f64 / (self.num_prbs * NUM_COLUMNS) as f64,
            ..Default::default()
        };

        let scheduled_new_transmissions: BTreeSet<UeId> = new_transmission_users
            .iter()
            .copied()
            .filter(|&user| self.grid.num_prbs_for_user(user) > 0)
            .collect();

        trace!(grid = %self.grid, "initial scheduling done");

        let sizing_stats = sizing::reconcile(
            &mut self.grid,
            &requirements,
            &scheduled_new_transmissions,
            &context,
        );
        let imperfect_retransmissions = sizing_stats.imperfect_placements;
        for user in &sizing_stats.dropped {
            requirements.remove(user);
            processes.remove(user);
        }
        diagnostics.dropped_retransmissions = sizing_stats.dropped.len();

        trace!(grid = %self.grid, "grid after retransmission sizing");

        if self.config.fill_grid {
            imperfect_transmissions += filler::fill_gaps(
                &mut self.grid,
                &self.ranker,
                &new_transmission_users,
                &scheduled_new_transmissions,
                &context,
            );
            trace!(grid = %self.grid, "grid after gap filling");
        }

        // assemble the externally visible result and notify collaborators
        let mut allocations: BTreeMap<UeId, UserAllocation> = BTreeMap::new();
        let mut throughput_this_tti: HashMap<UeId, f64> = HashMap::new();
        let mut retransmission_resources = 0usize;
        let mut new_transmission_resources = 0usize;

        for (&user, &required) in &requirements {
            let coordinates = self.grid.coordinates_of(user);
            debug_assert_eq!(
                coordinates.len(),
                required,
                "{} ended sizing with the wrong PRB count",
                user
            );
            retransmission_resources += coordinates.len();

            let allocation = self.build_allocation(user, &coordinates);
            self.link_adaptation
                .register_transmission(tti, user, &allocation);
            self.harq.retransmission_started(user, processes[&user], 0);
            allocations.insert(user, allocation);
        }

        for &user in &new_transmission_users {
            let coordinates = self.grid.coordinates_of(user);
            if coordinates.is_empty() {
                continue;
            }
            new_transmission_resources += coordinates.len();

            // rate estimate for the fairness history; actual transport block
            // sizing happens in link adaptation
            let rate: f64 = coordinates
                .iter()
                .map(|coordinate| {
                    let pmi = self
                        .grid
                        .pmi(coordinate.prb)
                        .expect("occupied PRB has a PMI");
                    context.expected_throughput(user, coordinate.prb, pmi, coordinate.column)
                })
                .sum();
            throughput_this_tti.insert(user, rate);

            let allocation = self.build_allocation(user, &coordinates);
            self.link_adaptation
                .register_transmission(tti, user, &allocation);
            allocations.insert(user, allocation);
        }

        if retransmission_resources > 0 {
            diagnostics.imperfect_retransmission_ratio =
                imperfect_retransmissions as f64 / retransmission_resources as f64;
        }
        if new_transmission_resources > 0 {
            diagnostics.imperfect_transmission_ratio =
                imperfect_transmissions as f64 / new_transmission_resources as f64;
        }
        diagnostics.final_fill_level =
            self.grid.total_occupancy() as f64 / (self.num_prbs * NUM_COLUMNS) as f64;

        debug!(
            tti,
            fill = diagnostics.final_fill_level,
            dropped = diagnostics.dropped_retransmissions,
            "scheduling pass complete"
        );

        // exponential smoothing of the per-user throughput for the next TTI
        let alpha = self.config.throughput_smoothing;
        for &user in &all_users {
            let history = self.throughput_history.entry(user).or_insert(1.0);
            let current = throughput_this_tti.get(&user).copied().unwrap_or(0.0);
            *history = (1.0 - alpha) * *history + alpha * current;
        }

        TtiSchedule {
            tti,
            allocations,
            diagnostics,
        }
    }

    fn build_allocation(&self, user: UeId, coordinates: &[GridCoordinate]) -> UserAllocation {
        let mut allocation = UserAllocation::default();
        for coordinate in coordinates {
            let pmi = self
                .grid
                .pmi(coordinate.prb)
                .expect("occupied PRB has a PMI");
            allocation.prbs.insert(
                coordinate.prb,
                PrbAllocation {
                    pmi,
                    column: coordinate.column,
                    sinr_offset: self.grid.sinr_offset(user, coordinate.prb, coordinate.column),
                    metric: self.grid.metric(coordinate.prb, coordinate.column),
                },
            );
        }
        allocation
    }
}

/// Build the per-TTI candidate view from fresh feedback.
///
/// A free function over the individual scheduler fields so the returned
/// context can coexist with mutable access to the grid and collaborators.
#[allow(clippy::too_many_arguments)]
fn build_tti_context<'a>(
    mode: EstimationMode,
    history_exponent: f64,
    codebook: &'a Codebook,
    sinr_losses: &'a Array2<Ratio>,
    history: &'a HashMap<UeId, f64>,
    feedback_provider: &dyn FeedbackProvider,
    num_prbs: usize,
    tti: u64,
    users: &BTreeSet<UeId>,
) -> TtiContext<'a> {
    let mut feedback = BTreeMap::new();
    let mut preferred_index = BTreeMap::new();

    for &user in users {
        let report = feedback_provider.feedback(user, tti);
        debug_assert!(
            report.is_sized_for(num_prbs),
            "feedback for {} does not cover {} PRBs",
            user,
            num_prbs
        );
        let indexes: Vec<usize> = (0..num_prbs)
            .map(|prb| codebook.canonical_index(report.pmi[prb], report.column[prb]))
            .collect();
        preferred_index.insert(user, indexes);
        feedback.insert(user, report);
    }

    TtiContext {
        mode,
        history_exponent,
        codebook,
        sinr_losses,
        history,
        feedback,
        preferred_index,
    }
}

/// Pairwise SINR loss between canonical beams: 4 * |<v_i, v_j>|, floored so
/// the dB value stays finite
fn compute_sinr_losses(codebook: &Codebook) -> Array2<Ratio> {
    let n = codebook.num_canonical_indices();
    let mut losses = Array2::from_elem((n, n), Ratio::unit());
    for preferred in 0..n {
        for actual in 0..n {
            let inner_product = codebook.inner_product(preferred, actual);
            let factor = (4.0 * inner_product).max(0.01);
            losses[[preferred, actual]] = Ratio::from_factor(factor);
        }
    }
    losses
}

/// The per-TTI candidate view backing the ranking, sizing and filling stages.
/// Built fresh every pass so stale feedback can never leak across TTIs.
struct TtiContext<'a> {
    mode: EstimationMode,
    history_exponent: f64,
    codebook: &'a Codebook,
    sinr_losses: &'a Array2<Ratio>,
    history: &'a HashMap<UeId, f64>,
    feedback: BTreeMap<UeId, PrecoderFeedback>,
    /// Canonical index of each user's preferred beam per PRB
    preferred_index: BTreeMap<UeId, Vec<usize>>,
}

impl TtiContext<'_> {
    /// Clipped rate estimate for serving the user on this resource
    fn expected_throughput(&self, user: UeId, prb: usize, pmi: Pmi, column: usize) -> f64 {
        let report = &self.feedback[&user];
        let mut expected = sinr_threshold(report.cqi[prb]) + self.sinr_offset(user, prb, pmi, column);
        if expected > Ratio::from_db(MAX_USEFUL_SINR_DB) {
            expected = Ratio::from_db(MAX_USEFUL_SINR_DB);
        }
        (1.0 + expected.factor()).log2()
    }
}

impl CandidateEvaluator for TtiContext<'_> {
    fn fits(&self, user: UeId, prb: usize, pmi: Pmi, column: usize) -> bool {
        match self.mode {
            // without estimation a user may only sit on its preferred beam
            EstimationMode::NoEstimation => {
                self.preferred_index[&user][prb] == self.codebook.canonical_index(pmi, column)
            }
            EstimationMode::Perfect | EstimationMode::InnerProduct => true,
        }
    }

    fn metric(&self, user: UeId, prb: usize, pmi: Pmi, column: usize) -> f64 {
        let throughput = self.expected_throughput(user, prb, pmi, column);
        let history = self.history.get(&user).copied().unwrap_or(1.0);
        throughput / history.powf(self.history_exponent)
    }

    fn sinr_offset(&self, user: UeId, prb: usize, pmi: Pmi, column: usize) -> Ratio {
        let actual = self.codebook.canonical_index(pmi, column);
        let preferred = self.preferred_index[&user][prb];
        if preferred == actual {
            return Ratio::unit();
        }
        match self.mode {
            EstimationMode::Perfect => {
                let report = &self.feedback[&user];
                let best = self.codebook.representative(preferred);
                report.sinr[[prb, pmi.0 as usize, column]]
                    - report.sinr[[prb, best.pmi.0 as usize, best.column]]
            }
            EstimationMode::InnerProduct => self.sinr_losses[[preferred, actual]],
            EstimationMode::NoEstimation => Ratio::from_db(NO_ESTIMATION_OFFSET_DB),
        }
    }

    fn preferred_entry(&self, user: UeId, prb: usize) -> (Pmi, usize) {
        let representative = self.codebook.representative(self.preferred_index[&user][prb]);
        (representative.pmi, representative.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harq::{HarqRegistry, RetransmissionGrant};
    use crate::la::NullLinkAdaptation;
    use common::types::{Cqi, ProcessId};
    use ndarray::Array3;

    /// Deterministic feedback: each user prefers (PMI = id % 16, column = id % 4)
    /// on every PRB with a fixed CQI.
    struct StaticFeedback {
        num_prbs: usize,
        cqi: u8,
    }

    impl FeedbackProvider for StaticFeedback {
        fn feedback(&self, user: UeId, _tti: u64) -> PrecoderFeedback {
            let pmi = Pmi((user.0 % 16) as u8);
            let column = (user.0 % 4) as usize;
            let mut sinr = Array3::from_elem(
                (self.num_prbs, crate::codebook::NUM_PMIS, NUM_COLUMNS),
                Ratio::from_db(-3.0),
            );
            for prb in 0..self.num_prbs {
                sinr[[prb, pmi.0 as usize, column]] = Ratio::from_db(8.0);
            }
            PrecoderFeedback {
                pmi: vec![pmi; self.num_prbs],
                column: vec![column; self.num_prbs],
                cqi: vec![Cqi(self.cqi); self.num_prbs],
                sinr,
            }
        }
    }

    fn test_config() -> SchedulerConfig {
        SchedulerConfig {
            bandwidth: Bandwidth::Bw1_4,
            ..Default::default()
        }
    }

    fn build_scheduler(config: SchedulerConfig, harq: HarqRegistry) -> DownlinkScheduler {
        let num_prbs = config.bandwidth.num_prbs();
        DownlinkScheduler::new(
            config,
            Box::new(StaticFeedback { num_prbs, cqi: 9 }),
            Box::new(harq),
            Box::new(NullLinkAdaptation),
        )
        .unwrap()
    }

    fn users(ids: &[u32]) -> BTreeSet<UeId> {
        ids.iter().map(|&id| UeId(id)).collect()
    }

    #[test]
    fn test_rejects_unsupported_antenna_count() {
        let config = SchedulerConfig {
            num_tx_antennas: 2,
            ..test_config()
        };
        let result = DownlinkScheduler::new(
            config,
            Box::new(StaticFeedback { num_prbs: 6, cqi: 9 }),
            Box::new(HarqRegistry::new()),
            Box::new(NullLinkAdaptation),
        );
        assert!(matches!(result, Err(MacError::UnsupportedAntennaCount(2))));
    }

    #[test]
    fn test_rejects_invalid_smoothing() {
        let config = SchedulerConfig {
            throughput_smoothing: 0.0,
            ..test_config()
        };
        let result = DownlinkScheduler::new(
            config,
            Box::new(StaticFeedback { num_prbs: 6, cqi: 9 }),
            Box::new(HarqRegistry::new()),
            Box::new(NullLinkAdaptation),
        );
        assert!(matches!(result, Err(MacError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_estimation_mode_parsing() {
        assert_eq!(
            "Perfect".parse::<EstimationMode>().unwrap(),
            EstimationMode::Perfect
        );
        assert_eq!(
            "innerproduct".parse::<EstimationMode>().unwrap(),
            EstimationMode::InnerProduct
        );
        assert_eq!(
            "no".parse::<EstimationMode>().unwrap(),
            EstimationMode::NoEstimation
        );
        assert!("something".parse::<EstimationMode>().is_err());
    }

    #[test]
    fn test_empty_user_set_schedules_nothing() {
        let mut scheduler = build_scheduler(test_config(), HarqRegistry::new());
        let schedule = scheduler.schedule(0, &BTreeSet::new());
        assert!(schedule.allocations.is_empty());
        assert_eq!(scheduler.grid().total_occupancy(), 0);
    }

    #[test]
    fn test_grid_invariants_after_full_pass() {
        let mut scheduler = build_scheduler(test_config(), HarqRegistry::new());
        let schedule = scheduler.schedule(0, &users(&[1, 2, 3, 4, 5, 6]));

        let grid = scheduler.grid();
        for prb in 0..grid.num_prbs() {
            let mut seen: BTreeSet<UeId> = BTreeSet::new();
            for column in 0..NUM_COLUMNS {
                if let Some(user) = grid.user(prb, column) {
                    // at most one column per user and PRB
                    assert!(seen.insert(user), "{} twice on PRB {}", user, prb);
                    // every occupied PRB carries one shared PMI
                    assert!(grid.pmi(prb).is_some());
                }
            }
        }
        assert!(!schedule.allocations.is_empty());
        assert!(schedule.diagnostics.final_fill_level > 0.0);
    }

    #[test]
    fn test_retransmission_gets_exact_size() {
        let mut harq = HarqRegistry::new();
        let user = UeId(1);
        harq.add_pending(
            user,
            RetransmissionGrant {
                process: ProcessId(0),
                prbs: vec![0, 1, 2],
                pmi: Pmi(1),
            },
        );
        let mut scheduler = build_scheduler(test_config(), harq);

        let schedule = scheduler.schedule(0, &users(&[1, 2, 3]));

        let allocation = &schedule.allocations[&user];
        assert_eq!(allocation.prbs.len(), 3);
        assert_eq!(scheduler.grid().num_prbs_for_user(user), 3);
    }

    #[test]
    fn test_retransmission_marked_started() {
        let mut harq = HarqRegistry::new();
        let user = UeId(1);
        harq.add_pending(
            user,
            RetransmissionGrant {
                process: ProcessId(3),
                prbs: vec![4, 5],
                pmi: Pmi(0),
            },
        );
        let mut scheduler = build_scheduler(test_config(), harq);

        scheduler.schedule(0, &users(&[1, 2]));

        // the pending entry was consumed; the next TTI sees no retransmission
        let schedule = scheduler.schedule(1, &users(&[1, 2]));
        assert!(schedule.diagnostics.dropped_retransmissions == 0);
        assert!(!schedule.allocations.is_empty());
    }

    #[test]
    fn test_throughput_history_smoothing() {
        let mut scheduler = build_scheduler(test_config(), HarqRegistry::new());
        assert_eq!(scheduler.throughput_history(UeId(1)), None);

        scheduler.schedule(0, &users(&[1]));
        let first = scheduler.throughput_history(UeId(1)).unwrap();
        // a scheduled user moves away from the initial history of 1.0
        assert!(first != 1.0);

        scheduler.schedule(1, &users(&[1]));
        let second = scheduler.throughput_history(UeId(1)).unwrap();
        assert!(second != first);
    }

    #[test]
    fn test_fill_grid_disabled_leaves_holes() {
        let config = SchedulerConfig {
            fill_grid: false,
            estimation: EstimationMode::NoEstimation,
            ..test_config()
        };
        let mut scheduler = build_scheduler(config, HarqRegistry::new());

        // one user preferring one beam cannot fill four columns per PRB
        scheduler.schedule(0, &users(&[1]));
        let grid = scheduler.grid();
        for prb in 0..grid.num_prbs() {
            assert!(grid.num_allocated(prb) <= 1);
        }
    }
}
