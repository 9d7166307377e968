//! Precoder Group Ranking and Conflict Resolution
//!
//! For one PRB and one candidate PMI the best user per spatial column is
//! picked greedily; that is optimal as long as the four picks are pairwise
//! distinct. When the greedy pick schedules a user twice, a bounded
//! exhaustive search over the top candidates per column finds the best valid
//! combination instead.

use common::types::{Pmi, Ratio, UeId};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::trace;

use crate::grid::NUM_COLUMNS;

/// Per-TTI view of candidate compatibility and scoring.
///
/// All four queries depend only on (user, PRB, PMI, column) and stay constant
/// within one TTI; the orchestrator rebuilds the backing caches every pass.
pub trait CandidateEvaluator {
    /// Whether the user may be scheduled on this (PRB, PMI, column)
    fn fits(&self, user: UeId, prb: usize, pmi: Pmi, column: usize) -> bool;

    /// Proportional-fair score for serving the user there; non-negative
    fn metric(&self, user: UeId, prb: usize, pmi: Pmi, column: usize) -> f64;

    /// Correction applied to the fed-back SINR when serving the user on a
    /// non-preferred (PMI, column) pair
    fn sinr_offset(&self, user: UeId, prb: usize, pmi: Pmi, column: usize) -> Ratio;

    /// The user's preferred (PMI, column) pair on this PRB
    fn preferred_entry(&self, user: UeId, prb: usize) -> (Pmi, usize);
}

/// A candidate assignment of up to four users to one PRB under one PMI
#[derive(Debug, Clone)]
pub struct PmiGroup {
    pub pmi: Pmi,
    pub users: [Option<UeId>; NUM_COLUMNS],
    pub metrics: [f64; NUM_COLUMNS],
    pub sum_metric: f64,
}

impl PmiGroup {
    fn empty(pmi: Pmi) -> Self {
        Self {
            pmi,
            users: [None; NUM_COLUMNS],
            metrics: [0.0; NUM_COLUMNS],
            sum_metric: 0.0,
        }
    }

    /// True when no column carries a user
    pub fn is_empty(&self) -> bool {
        self.users.iter().all(Option::is_none)
    }
}

/// No user appears in two columns (empty columns ignored)
pub fn unique_users(users: &[Option<UeId>; NUM_COLUMNS]) -> bool {
    for first in 0..NUM_COLUMNS {
        let Some(user) = users[first] else { continue };
        for second in (first + 1)..NUM_COLUMNS {
            if users[second] == Some(user) {
                return false;
            }
        }
    }
    true
}

/// Ranks user groupings per PMI for one PRB
pub struct GroupRanker {
    pmis: Vec<Pmi>,
}

impl GroupRanker {
    pub fn new(pmis: Vec<Pmi>) -> Self {
        Self { pmis }
    }

    pub fn pmis(&self) -> &[Pmi] {
        &self.pmis
    }

    /// Compute the best group per PMI, sorted descending by sum metric.
    ///
    /// Per column the compatible candidates are ranked by metric and the
    /// maximizer picked; if the four picks are pairwise distinct the group is
    /// final, otherwise the conflict resolver corrects it.
    pub fn rank_groups(
        &self,
        users: &BTreeSet<UeId>,
        prb: usize,
        evaluator: &dyn CandidateEvaluator,
    ) -> Vec<PmiGroup> {
        let mut result: Vec<PmiGroup> = Vec::with_capacity(self.pmis.len());

        for &pmi in &self.pmis {
            let mut per_column: [Vec<(f64, UeId)>; NUM_COLUMNS] = Default::default();
            let mut group = PmiGroup::empty(pmi);

            for column in 0..NUM_COLUMNS {
                for &user in users {
                    if evaluator.fits(user, prb, pmi, column) {
                        per_column[column].push((evaluator.metric(user, prb, pmi, column), user));
                    }
                }
                sort_ranking(&mut per_column[column]);

                if let Some(&(metric, user)) = per_column[column].first() {
                    group.users[column] = Some(user);
                    group.metrics[column] = metric;
                    group.sum_metric += metric;
                }
            }

            if unique_users(&group.users) {
                trace!(prb, %pmi, sum_metric = group.sum_metric, "greedy grouping is valid");
                result.push(group);
            } else {
                trace!(prb, %pmi, "greedy grouping scheduled a user twice, resolving");
                result.push(resolve_conflicts(&per_column, pmi));
            }
        }

        result.sort_by(|a, b| {
            b.sum_metric
                .partial_cmp(&a.sum_metric)
                .unwrap_or(Ordering::Equal)
        });
        result
    }
}

/// Find the best pairwise-distinct combination from the per-column rankings.
///
/// Only the top four candidates per column plus the no-user option take part,
/// bounding the search to 5^4 = 625 combinations regardless of cell load.
pub fn resolve_conflicts(
    per_column: &[Vec<(f64, UeId)>; NUM_COLUMNS],
    pmi: Pmi,
) -> PmiGroup {
    let candidates: Vec<Vec<Option<(f64, UeId)>>> = per_column
        .iter()
        .map(|ranking| {
            let mut column_candidates: Vec<Option<(f64, UeId)>> =
                ranking.iter().take(4).copied().map(Some).collect();
            column_candidates.push(None);
            column_candidates
        })
        .collect();

    let mut best: Option<([Option<(f64, UeId)>; NUM_COLUMNS], f64)> = None;
    for &pick0 in &candidates[0] {
        for &pick1 in &candidates[1] {
            for &pick2 in &candidates[2] {
                for &pick3 in &candidates[3] {
                    let picks = [pick0, pick1, pick2, pick3];
                    let users = [
                        pick0.map(|(_, u)| u),
                        pick1.map(|(_, u)| u),
                        pick2.map(|(_, u)| u),
                        pick3.map(|(_, u)| u),
                    ];
                    if !unique_users(&users) {
                        continue;
                    }
                    let sum: f64 = picks.iter().flatten().map(|&(metric, _)| metric).sum();
                    if best.is_none_or(|(_, best_sum)| sum > best_sum) {
                        best = Some((picks, sum));
                    }
                }
            }
        }
    }

    let mut group = PmiGroup::empty(pmi);
    match best {
        Some((picks, sum)) => {
            for column in 0..NUM_COLUMNS {
                if let Some((metric, user)) = picks[column] {
                    group.users[column] = Some(user);
                    group.metrics[column] = metric;
                }
            }
            group.sum_metric = sum;
        }
        None => {
            // cannot be reached with four columns since the all-empty
            // combination is always valid, handled anyway
            return resolve_by_tie_break(per_column, pmi);
        }
    }
    group
}

/// Deterministic fallback when no pairwise-distinct combination exists: take
/// each column's top candidate, keep a duplicated user's highest-metric
/// column and clear the user from the others with its metric zeroed.
fn resolve_by_tie_break(
    per_column: &[Vec<(f64, UeId)>; NUM_COLUMNS],
    pmi: Pmi,
) -> PmiGroup {
    let mut group = PmiGroup::empty(pmi);
    for column in 0..NUM_COLUMNS {
        if let Some(&(metric, user)) = per_column[column].first() {
            group.users[column] = Some(user);
            group.metrics[column] = metric;
        }
    }

    for column in 0..NUM_COLUMNS {
        for other in 0..column {
            if group.users[other].is_some() && group.users[other] == group.users[column] {
                if group.metrics[other] > group.metrics[column] {
                    group.users[column] = None;
                    group.metrics[column] = 0.0;
                } else {
                    group.users[other] = None;
                    group.metrics[other] = 0.0;
                }
            }
        }
    }

    group.sum_metric = group.metrics.iter().sum();
    group
}

/// Descending by metric, ties broken by user id for determinism
fn sort_ranking(ranking: &mut [(f64, UeId)]) {
    ranking.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.1.cmp(&b.1))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    /// Metric table keyed by (user, column); `fits` is true for listed pairs
    struct TableEvaluator {
        metrics: BTreeMap<(UeId, usize), f64>,
    }

    impl TableEvaluator {
        fn new(entries: &[(u32, usize, f64)]) -> Self {
            Self {
                metrics: entries
                    .iter()
                    .map(|&(user, column, metric)| ((UeId(user), column), metric))
                    .collect(),
            }
        }
    }

    impl CandidateEvaluator for TableEvaluator {
        fn fits(&self, user: UeId, _prb: usize, _pmi: Pmi, column: usize) -> bool {
            self.metrics.contains_key(&(user, column))
        }

        fn metric(&self, user: UeId, _prb: usize, _pmi: Pmi, column: usize) -> f64 {
            self.metrics[&(user, column)]
        }

        fn sinr_offset(&self, _user: UeId, _prb: usize, _pmi: Pmi, _column: usize) -> Ratio {
            Ratio::unit()
        }

        fn preferred_entry(&self, _user: UeId, _prb: usize) -> (Pmi, usize) {
            (Pmi(0), 0)
        }
    }

    fn users(ids: &[u32]) -> BTreeSet<UeId> {
        ids.iter().map(|&id| UeId(id)).collect()
    }

    #[test]
    fn test_greedy_grouping_with_distinct_users() {
        // four distinct users dominate one column each
        let evaluator = TableEvaluator::new(&[
            (0, 0, 5.0),
            (1, 1, 3.0),
            (2, 2, 8.0),
            (3, 3, 1.0),
            // weaker cross-column candidates
            (0, 1, 0.1),
            (1, 2, 0.2),
            (2, 3, 0.3),
            (3, 0, 0.4),
        ]);
        let ranker = GroupRanker::new(vec![Pmi(0)]);

        let ranking = ranker.rank_groups(&users(&[0, 1, 2, 3]), 0, &evaluator);

        assert_eq!(ranking.len(), 1);
        let group = &ranking[0];
        assert_eq!(group.users, [Some(UeId(0)), Some(UeId(1)), Some(UeId(2)), Some(UeId(3))]);
        assert_eq!(group.metrics, [5.0, 3.0, 8.0, 1.0]);
        assert!((group.sum_metric - 17.0).abs() < 1e-12);
    }

    #[test]
    fn test_conflict_resolution_keeps_best_column() {
        // user 0 tops both column 0 (metric 10) and column 2 (metric 9);
        // it must keep column 0 while the next-best distinct user takes column 2
        let evaluator = TableEvaluator::new(&[
            (0, 0, 10.0),
            (0, 2, 9.0),
            (1, 0, 2.0),
            (1, 2, 7.0),
            (2, 1, 4.0),
            (3, 3, 3.0),
        ]);
        let ranker = GroupRanker::new(vec![Pmi(0)]);

        let ranking = ranker.rank_groups(&users(&[0, 1, 2, 3]), 0, &evaluator);

        let group = &ranking[0];
        assert_eq!(group.users[0], Some(UeId(0)));
        assert_eq!(group.users[2], Some(UeId(1)));
        assert_eq!(group.users[1], Some(UeId(2)));
        assert_eq!(group.users[3], Some(UeId(3)));
        assert!((group.sum_metric - 24.0).abs() < 1e-12);
        assert!(unique_users(&group.users));
    }

    #[test]
    fn test_resolver_never_duplicates_users() {
        // two users compete over all four columns
        let evaluator = TableEvaluator::new(&[
            (0, 0, 9.0),
            (0, 1, 8.0),
            (0, 2, 7.0),
            (0, 3, 6.0),
            (1, 0, 5.0),
            (1, 1, 4.0),
            (1, 2, 3.0),
            (1, 3, 2.0),
        ]);
        let ranker = GroupRanker::new(vec![Pmi(0)]);

        let ranking = ranker.rank_groups(&users(&[0, 1]), 0, &evaluator);

        let group = &ranking[0];
        assert!(unique_users(&group.users));
        // best valid combination: user 0 on column 0, user 1 on column 1
        assert!((group.sum_metric - 13.0).abs() < 1e-12);
    }

    #[test]
    fn test_groups_sorted_by_sum_metric() {
        let evaluator = TableEvaluator::new(&[(0, 0, 4.0), (1, 1, 2.0)]);
        let ranker = GroupRanker::new(vec![Pmi(0), Pmi(1), Pmi(2)]);

        let ranking = ranker.rank_groups(&users(&[0, 1]), 0, &evaluator);

        assert_eq!(ranking.len(), 3);
        for pair in ranking.windows(2) {
            assert!(pair[0].sum_metric >= pair[1].sum_metric);
        }
    }

    #[test]
    fn test_tie_break_fallback_clears_duplicates() {
        let per_column: [Vec<(f64, UeId)>; NUM_COLUMNS] = [
            vec![(3.0, UeId(1))],
            vec![(5.0, UeId(1))],
            vec![(4.0, UeId(1))],
            vec![],
        ];

        let group = resolve_by_tie_break(&per_column, Pmi(0));

        assert_eq!(group.users, [None, Some(UeId(1)), None, None]);
        assert_eq!(group.metrics, [0.0, 5.0, 0.0, 0.0]);
        assert!((group.sum_metric - 5.0).abs() < 1e-12);
        assert!(unique_users(&group.users));
    }

    #[test]
    fn test_empty_candidate_pool_yields_empty_group() {
        let evaluator = TableEvaluator::new(&[]);
        let ranker = GroupRanker::new(vec![Pmi(0)]);

        let ranking = ranker.rank_groups(&users(&[0, 1]), 0, &evaluator);

        assert_eq!(ranking.len(), 1);
        assert!(ranking[0].is_empty());
        assert_eq!(ranking[0].sum_metric, 0.0);
    }
}
