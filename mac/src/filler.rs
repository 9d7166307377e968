//! Gap Filling
//!
//! After sizing, the grid may contain fully empty PRBs (where retransmissions
//! were withdrawn) and partially filled ones. Empty PRBs are regrouped from
//! scratch, preferring users that already hold an allocation this TTI;
//! partially filled PRBs get their free columns topped up one by one. A large
//! constant bonus biases column fills toward already-scheduled users so
//! existing allocations grow instead of fragmenting capacity across many
//! single-PRB users.

use common::types::UeId;
use std::collections::BTreeSet;
use tracing::{debug, trace};

use crate::grid::{ResourceGrid, NUM_COLUMNS};
use crate::ranking::{CandidateEvaluator, GroupRanker, PmiGroup};

/// Ranking bonus for candidates that already hold an allocation this TTI
pub const SCHEDULED_USER_BONUS: f64 = 1000.0;

/// Fill empty cells with new transmissions; returns the number of cells
/// filled outside the initial grouping.
pub fn fill_gaps(
    grid: &mut ResourceGrid,
    ranker: &GroupRanker,
    new_transmission_users: &BTreeSet<UeId>,
    scheduled_new_transmissions: &BTreeSet<UeId>,
    evaluator: &dyn CandidateEvaluator,
) -> usize {
    let mut filled = 0;

    // empty PRBs first: they need a fresh PMI decision
    for prb in 0..grid.num_prbs() {
        if grid.num_allocated(prb) != 0 {
            continue;
        }

        let group = best_group(ranker, scheduled_new_transmissions, prb, evaluator).or_else(|| {
            // no group from already-scheduled users, try the whole pool
            best_group(ranker, new_transmission_users, prb, evaluator)
        });
        let Some(group) = group else {
            debug!(prb, "unable to fill empty PRB, no eligible new transmission");
            continue;
        };

        for column in 0..NUM_COLUMNS {
            if let Some(user) = group.users[column] {
                let offset = evaluator.sinr_offset(user, prb, group.pmi, column);
                grid.add_entry(prb, group.pmi, column, user, group.metrics[column], offset);
                filled += 1;
            }
        }
    }

    // then top up the remaining holes column by column
    for prb in 0..grid.num_prbs() {
        let occupancy = grid.num_allocated(prb);
        if occupancy == 0 || occupancy == NUM_COLUMNS {
            continue;
        }
        let Some(pmi) = grid.pmi(prb) else {
            continue;
        };

        for column in 0..NUM_COLUMNS {
            if !grid.resource_free(prb, column) {
                continue;
            }

            let mut best: Option<(f64, f64, UeId)> = None;
            for &user in new_transmission_users {
                if grid.user_already_scheduled_on_prb(user, prb) {
                    continue;
                }
                let metric = evaluator.metric(user, prb, pmi, column);
                let bonus = if scheduled_new_transmissions.contains(&user) {
                    SCHEDULED_USER_BONUS
                } else {
                    0.0
                };
                let score = metric + bonus;
                match best {
                    Some((best_score, _, _)) if score <= best_score => {}
                    _ => best = Some((score, metric, user)),
                }
            }

            if let Some((_, metric, user)) = best {
                trace!(prb, column, %user, "filling leftover column");
                let offset = evaluator.sinr_offset(user, prb, pmi, column);
                grid.add_entry(prb, pmi, column, user, metric, offset);
                filled += 1;
            }
        }
    }

    filled
}

/// The highest-ranked group actually carrying users, if any
fn best_group(
    ranker: &GroupRanker,
    users: &BTreeSet<UeId>,
    prb: usize,
    evaluator: &dyn CandidateEvaluator,
) -> Option<PmiGroup> {
    ranker
        .rank_groups(users, prb, evaluator)
        .into_iter()
        .find(|group| !group.is_empty())
}
