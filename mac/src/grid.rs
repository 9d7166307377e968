//! Per-TTI Allocation Grid
//!
//! The PRB × 4-column table the scheduling pass mutates. Each cell holds at
//! most one user together with its metric and SINR offset; all occupied
//! columns of a PRB share one PMI. The grid keeps per-user reverse indexes so
//! sizing can walk a user's allocation in (PRB, column) order.
//!
//! The grid does not enforce the shared-PMI rule beyond debug assertions;
//! callers must only ever write a PRB's columns with one PMI.

use common::types::{Pmi, Ratio, UeId};
use ndarray::Array2;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Spatial layers per PRB
pub const NUM_COLUMNS: usize = 4;

/// One cell position in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridCoordinate {
    pub prb: usize,
    pub column: usize,
}

/// The allocation table for one TTI
pub struct ResourceGrid {
    num_prbs: usize,
    pmi: Vec<Option<Pmi>>,
    occupancy: Vec<usize>,
    sum_metric: Vec<f64>,
    users: Array2<Option<UeId>>,
    metric: Array2<f64>,
    sinr_offsets: Array2<Ratio>,
    per_user_prbs: BTreeMap<UeId, BTreeSet<usize>>,
    per_user_coordinates: BTreeMap<UeId, BTreeSet<GridCoordinate>>,
}

impl ResourceGrid {
    pub fn new(num_prbs: usize) -> Self {
        Self {
            num_prbs,
            pmi: vec![None; num_prbs],
            occupancy: vec![0; num_prbs],
            sum_metric: vec![0.0; num_prbs],
            users: Array2::from_elem((num_prbs, NUM_COLUMNS), None),
            metric: Array2::zeros((num_prbs, NUM_COLUMNS)),
            sinr_offsets: Array2::from_elem((num_prbs, NUM_COLUMNS), Ratio::unit()),
            per_user_prbs: BTreeMap::new(),
            per_user_coordinates: BTreeMap::new(),
        }
    }

    pub fn num_prbs(&self) -> usize {
        self.num_prbs
    }

    /// Clear all allocations; called at the start of every TTI
    pub fn reset(&mut self) {
        for prb in 0..self.num_prbs {
            self.pmi[prb] = None;
            self.occupancy[prb] = 0;
            self.sum_metric[prb] = 0.0;
            for column in 0..NUM_COLUMNS {
                self.users[[prb, column]] = None;
                self.metric[[prb, column]] = 0.0;
                self.sinr_offsets[[prb, column]] = Ratio::unit();
            }
        }
        self.per_user_prbs.clear();
        self.per_user_coordinates.clear();
    }

    /// Place a user into a free cell
    pub fn add_entry(
        &mut self,
        prb: usize,
        pmi: Pmi,
        column: usize,
        user: UeId,
        metric: f64,
        sinr_offset: Ratio,
    ) {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        debug_assert!(column < NUM_COLUMNS, "Invalid column {}", column);
        debug_assert!(
            self.users[[prb, column]].is_none(),
            "Entry ({}, {}) already filled",
            prb,
            column
        );
        debug_assert!(
            self.pmi[prb].is_none() || self.pmi[prb] == Some(pmi),
            "PMI of PRB {} was already set to {:?}",
            prb,
            self.pmi[prb]
        );
        debug_assert!(
            !self.user_already_scheduled_on_prb(user, prb),
            "{} already scheduled on PRB {}",
            user,
            prb
        );

        self.pmi[prb] = Some(pmi);
        self.users[[prb, column]] = Some(user);
        self.metric[[prb, column]] = metric;
        self.sum_metric[prb] += metric;
        self.occupancy[prb] += 1;
        self.sinr_offsets[[prb, column]] = sinr_offset;

        self.per_user_prbs.entry(user).or_default().insert(prb);
        self.per_user_coordinates
            .entry(user)
            .or_default()
            .insert(GridCoordinate { prb, column });
    }

    /// Replace the occupant of a cell, keeping the PRB's PMI
    pub fn update_entry(
        &mut self,
        prb: usize,
        column: usize,
        user: UeId,
        metric: f64,
        sinr_offset: Ratio,
    ) {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        debug_assert!(column < NUM_COLUMNS, "Invalid column {}", column);
        debug_assert!(
            self.users[[prb, column]].is_some(),
            "Entry ({}, {}) was empty",
            prb,
            column
        );
        debug_assert!(
            !self.user_already_scheduled_on_prb(user, prb)
                || self.users[[prb, column]] == Some(user),
            "{} already scheduled on another column of PRB {}",
            user,
            prb
        );

        if let Some(previous) = self.users[[prb, column]] {
            self.unlink(previous, prb, column);
        }

        self.users[[prb, column]] = Some(user);
        self.sum_metric[prb] -= self.metric[[prb, column]];
        self.metric[[prb, column]] = metric;
        self.sum_metric[prb] += metric;
        self.sinr_offsets[[prb, column]] = sinr_offset;

        self.per_user_prbs.entry(user).or_default().insert(prb);
        self.per_user_coordinates
            .entry(user)
            .or_default()
            .insert(GridCoordinate { prb, column });
    }

    /// Free a cell; the caller names the expected occupant
    pub fn delete_entry(&mut self, prb: usize, column: usize, user: UeId) {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        debug_assert!(column < NUM_COLUMNS, "Invalid column {}", column);
        debug_assert!(
            self.users[[prb, column]] == Some(user),
            "Occupant of ({}, {}) is {:?}, not {}",
            prb,
            column,
            self.users[[prb, column]],
            user
        );

        self.unlink(user, prb, column);
        self.sum_metric[prb] -= self.metric[[prb, column]];
        self.metric[[prb, column]] = 0.0;
        self.users[[prb, column]] = None;
        self.occupancy[prb] -= 1;
        self.sinr_offsets[[prb, column]] = Ratio::unit();

        if self.occupancy[prb] == 0 {
            self.pmi[prb] = None;
        }
    }

    /// Delete every entry held by a user
    pub fn remove_user(&mut self, user: UeId) {
        let coordinates = self.coordinates_of(user);
        for coordinate in coordinates {
            self.delete_entry(coordinate.prb, coordinate.column, user);
        }
        debug_assert!(self.num_prbs_for_user(user) == 0, "Resources left after removal");
    }

    pub fn num_prbs_for_user(&self, user: UeId) -> usize {
        self.per_user_coordinates
            .get(&user)
            .map_or(0, |coordinates| coordinates.len())
    }

    pub fn user_already_scheduled_on_prb(&self, user: UeId, prb: usize) -> bool {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        self.per_user_prbs
            .get(&user)
            .is_some_and(|prbs| prbs.contains(&prb))
    }

    /// The user's cells in (PRB, column) order
    pub fn coordinates_of(&self, user: UeId) -> Vec<GridCoordinate> {
        self.per_user_coordinates
            .get(&user)
            .map(|coordinates| coordinates.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The PMI shared by a PRB's occupied columns, if any column is occupied
    pub fn pmi(&self, prb: usize) -> Option<Pmi> {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        self.pmi[prb]
    }

    pub fn metric(&self, prb: usize, column: usize) -> f64 {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        debug_assert!(column < NUM_COLUMNS, "Invalid column {}", column);
        self.metric[[prb, column]]
    }

    pub fn sinr_offset(&self, user: UeId, prb: usize, column: usize) -> Ratio {
        debug_assert!(
            self.users[[prb, column]] == Some(user),
            "Different user scheduled on ({}, {})",
            prb,
            column
        );
        self.sinr_offsets[[prb, column]]
    }

    pub fn user(&self, prb: usize, column: usize) -> Option<UeId> {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        debug_assert!(column < NUM_COLUMNS, "Invalid column {}", column);
        self.users[[prb, column]]
    }

    pub fn num_allocated(&self, prb: usize) -> usize {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        self.occupancy[prb]
    }

    pub fn resource_free(&self, prb: usize, column: usize) -> bool {
        debug_assert!(prb < self.num_prbs, "Invalid PRB {}", prb);
        debug_assert!(column < NUM_COLUMNS, "Invalid column {}", column);
        self.users[[prb, column]].is_none()
    }

    /// Total number of occupied cells
    pub fn total_occupancy(&self) -> usize {
        self.occupancy.iter().sum()
    }

    fn unlink(&mut self, user: UeId, prb: usize, column: usize) {
        if let Some(prbs) = self.per_user_prbs.get_mut(&user) {
            prbs.remove(&prb);
        }
        if let Some(coordinates) = self.per_user_coordinates.get_mut(&user) {
            coordinates.remove(&GridCoordinate { prb, column });
        }
    }
}

impl fmt::Display for ResourceGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PRB\tPMI\tCol0\tCol1\tCol2\tCol3\tMetric")?;
        for prb in 0..self.num_prbs {
            let pmi = self.pmi[prb]
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".into());
            write!(f, "{}\t{}", prb, pmi)?;
            for column in 0..NUM_COLUMNS {
                match self.users[[prb, column]] {
                    Some(user) => write!(f, "\t{}", user)?,
                    None => write!(f, "\tfree")?,
                }
            }
            writeln!(f, "\t{:.3}", self.sum_metric[prb])?;
        }
        Ok(())
    }
}
