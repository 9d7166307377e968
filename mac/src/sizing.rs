//! Retransmission Sizing
//!
//! HARQ requires a retransmission to occupy exactly as many PRBs as the
//! original transmission. After the initial greedy seeding a retransmission
//! user may hold too many or too few PRBs; four phases reconcile the grid:
//!
//! 1. Transfer — surplus cells of oversized retransmissions are handed to
//!    undersized ones that fit there.
//! 2. Backfill — remaining surplus cells go to already-scheduled new
//!    transmissions; whatever is left over is forcibly deleted.
//! 3. Grow — undersized retransmissions (biggest first) take free compatible
//!    columns, seed empty PRBs with their preferred entry, and finally evict
//!    the lowest-metric occupants that are not finalized retransmissions.
//! 4. Drop — a retransmission still undersized loses its whole allocation and
//!    is postponed to a later TTI; a partial retransmission is unusable.
//!
//! Transfer and Backfill run before eviction because substitutions are
//! zero-sum for grid occupancy.

use common::types::{Ratio, UeId};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace};

use crate::grid::{ResourceGrid, NUM_COLUMNS};
use crate::ranking::CandidateEvaluator;

/// Offset marking a retransmission placed on a non-preferred resource
pub const IMPERFECT_RETRANSMISSION_OFFSET_DB: f64 = -42.0;

/// Outcome of one sizing pass
#[derive(Debug, Default)]
pub struct SizingStats {
    /// Allocations placed on resources the user did not ask for
    pub imperfect_placements: usize,
    /// Retransmissions withdrawn entirely
    pub dropped: BTreeSet<UeId>,
}

/// Reconcile grid occupancy with the required retransmission sizes.
///
/// Afterwards every user in `requirements` holds either exactly its required
/// PRB count or nothing at all.
pub fn reconcile(
    grid: &mut ResourceGrid,
    requirements: &BTreeMap<UeId, usize>,
    scheduled_new_transmissions: &BTreeSet<UeId>,
    evaluator: &dyn CandidateEvaluator,
) -> SizingStats {
    let mut stats = SizingStats::default();

    let mut too_many: BTreeSet<UeId> = BTreeSet::new();
    let mut too_few: BTreeSet<UeId> = BTreeSet::new();
    for (&user, &required) in requirements {
        let current = grid.num_prbs_for_user(user);
        trace!(%user, required, current, "retransmission sizing state");
        match current.cmp(&required) {
            Ordering::Greater => {
                too_many.insert(user);
            }
            Ordering::Less => {
                too_few.insert(user);
            }
            Ordering::Equal => {}
        }
    }

    transfer(grid, requirements, &mut too_many, &mut too_few, evaluator);
    backfill(
        grid,
        requirements,
        &mut too_many,
        scheduled_new_transmissions,
        evaluator,
    );
    debug_assert!(
        too_many.is_empty(),
        "Oversized retransmissions left after backfill"
    );

    grow(
        grid,
        requirements,
        &mut too_few,
        &mut stats,
        evaluator,
    );

    // whatever could not be grown to its exact size is withdrawn entirely
    for user in std::mem::take(&mut too_few) {
        debug!(
            %user,
            required = requirements[&user],
            held = grid.num_prbs_for_user(user),
            "dropping retransmission that could not be sized"
        );
        grid.remove_user(user);
        stats.dropped.insert(user);
    }

    stats
}

/// Hand surplus cells of oversized retransmissions to undersized ones
fn transfer(
    grid: &mut ResourceGrid,
    requirements: &BTreeMap<UeId, usize>,
    too_many: &mut BTreeSet<UeId>,
    too_few: &mut BTreeSet<UeId>,
    evaluator: &dyn CandidateEvaluator,
) {
    let rich_users: Vec<UeId> = too_many.iter().copied().collect();
    for rich in rich_users {
        if too_few.is_empty() {
            break;
        }
        let coordinates = grid.coordinates_of(rich);
        for coordinate in coordinates {
            let Some(pmi) = grid.pmi(coordinate.prb) else {
                continue;
            };
            let poor_users: Vec<UeId> = too_few.iter().copied().collect();
            for poor in poor_users {
                if evaluator.fits(poor, coordinate.prb, pmi, coordinate.column)
                    && !grid.user_already_scheduled_on_prb(poor, coordinate.prb)
                {
                    let metric = evaluator.metric(poor, coordinate.prb, pmi, coordinate.column);
                    let offset =
                        evaluator.sinr_offset(poor, coordinate.prb, pmi, coordinate.column);
                    grid.update_entry(coordinate.prb, coordinate.column, poor, metric, offset);

                    if requirements[&poor] == grid.num_prbs_for_user(poor) {
                        too_few.remove(&poor);
                    }
                    break;
                }
            }
            if requirements[&rich] == grid.num_prbs_for_user(rich) {
                too_many.remove(&rich);
                break;
            }
        }
    }
}

/// Hand remaining surplus cells to scheduled new transmissions, then forcibly
/// delete whatever surplus is left
fn backfill(
    grid: &mut ResourceGrid,
    requirements: &BTreeMap<UeId, usize>,
    too_many: &mut BTreeSet<UeId>,
    scheduled_new_transmissions: &BTreeSet<UeId>,
    evaluator: &dyn CandidateEvaluator,
) {
    let rich_users: Vec<UeId> = too_many.iter().copied().collect();
    for rich in rich_users {
        let coordinates = grid.coordinates_of(rich);
        for coordinate in coordinates {
            let Some(pmi) = grid.pmi(coordinate.prb) else {
                continue;
            };
            for &candidate in scheduled_new_transmissions {
                if evaluator.fits(candidate, coordinate.prb, pmi, coordinate.column)
                    && !grid.user_already_scheduled_on_prb(candidate, coordinate.prb)
                {
                    let metric =
                        evaluator.metric(candidate, coordinate.prb, pmi, coordinate.column);
                    let offset =
                        evaluator.sinr_offset(candidate, coordinate.prb, pmi, coordinate.column);
                    grid.update_entry(coordinate.prb, coordinate.column, candidate, metric, offset);
                    break;
                }
            }
            if requirements[&rich] == grid.num_prbs_for_user(rich) {
                too_many.remove(&rich);
                break;
            }
        }

        if too_many.contains(&rich) {
            // substitutes were not enough, forcibly shrink to the exact size
            while grid.num_prbs_for_user(rich) != requirements[&rich] {
                let coordinate = grid.coordinates_of(rich)[0];
                grid.delete_entry(coordinate.prb, coordinate.column, rich);
            }
            too_many.remove(&rich);
        }
    }
}

/// Grow undersized retransmissions to their exact size, biggest first so
/// small retransmissions do not fragment capacity needed by large ones
fn grow(
    grid: &mut ResourceGrid,
    requirements: &BTreeMap<UeId, usize>,
    too_few: &mut BTreeSet<UeId>,
    stats: &mut SizingStats,
    evaluator: &dyn CandidateEvaluator,
) {
    let mut by_size: Vec<(usize, UeId)> = too_few
        .iter()
        .map(|&user| (requirements[&user], user))
        .collect();
    by_size.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

    for (required, user) in by_size {
        debug!(%user, required, "growing undersized retransmission");

        // first take free space: partially filled PRBs with a compatible free
        // column, or empty PRBs at the user's preferred entry
        for prb in 0..grid.num_prbs() {
            if grid.num_allocated(prb) != 0 {
                if grid.num_allocated(prb) < NUM_COLUMNS
                    && !grid.user_already_scheduled_on_prb(user, prb)
                {
                    let Some(pmi) = grid.pmi(prb) else {
                        continue;
                    };
                    for column in 0..NUM_COLUMNS {
                        if grid.resource_free(prb, column) && evaluator.fits(user, prb, pmi, column)
                        {
                            stats.imperfect_placements += 1;
                            grid.add_entry(
                                prb,
                                pmi,
                                column,
                                user,
                                0.0,
                                Ratio::from_db(IMPERFECT_RETRANSMISSION_OFFSET_DB),
                            );
                            break;
                        }
                    }
                }
            } else {
                let (pmi, column) = evaluator.preferred_entry(user, prb);
                grid.add_entry(prb, pmi, column, user, 0.0, Ratio::unit());
            }

            if grid.num_prbs_for_user(user) == required {
                too_few.remove(&user);
                break;
            }
        }

        if grid.num_prbs_for_user(user) == required {
            continue;
        }

        // free space was not enough: evict the least valuable occupants,
        // never touching a retransmission whose size is already final
        debug!(%user, "not enough free space, evicting low-metric occupants");
        for prb in 0..grid.num_prbs() {
            if !grid.user_already_scheduled_on_prb(user, prb) {
                let Some(pmi) = grid.pmi(prb) else {
                    continue;
                };
                let mut ranking: Vec<(f64, usize)> = (0..NUM_COLUMNS)
                    .map(|column| (grid.metric(prb, column), column))
                    .collect();
                ranking.sort_by(|a, b| {
                    a.0.partial_cmp(&b.0)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.1.cmp(&b.1))
                });

                for (_, column) in ranking {
                    let offset = evaluator.sinr_offset(user, prb, pmi, column);
                    match grid.user(prb, column) {
                        None => {
                            // leftover free column the compatibility check
                            // skipped earlier; taking it beats evicting
                            stats.imperfect_placements += 1;
                            grid.add_entry(prb, pmi, column, user, 0.0, offset);
                            break;
                        }
                        Some(occupant) => {
                            let finalized_retransmission = requirements.contains_key(&occupant)
                                && !too_few.contains(&occupant);
                            if !finalized_retransmission {
                                stats.imperfect_placements += 1;
                                grid.update_entry(prb, column, user, 0.0, offset);
                                break;
                            }
                        }
                    }
                }
            }

            if grid.num_prbs_for_user(user) == required {
                too_few.remove(&user);
                break;
            }
        }
    }
}
