//! 4-TX Householder Codebook
//!
//! Builds the 16-entry rank-1 precoding codebook from its seed vectors
//! (W_n = I - 2 u_n u_n^H / u_n^H u_n) and precomputes the canonical index
//! table that collapses (PMI, column) pairs whose beamforming vectors
//! coincide. Two pairs sharing a canonical index are interchangeable when
//! checking a user's preferred precoder.

use common::types::Pmi;
use num_complex::Complex32;

/// Number of transmit antenna ports the codebook is defined for
pub const NUM_TX_ANTENNAS: usize = 4;

/// Number of precoding matrices in the codebook
pub const NUM_PMIS: usize = 16;

const SQRT2_INV: f32 = std::f32::consts::FRAC_1_SQRT_2;

/// One concrete beamforming vector choice: a codebook matrix and one of its columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodebookColumn {
    pub pmi: Pmi,
    pub column: usize,
}

/// The precomputed codebook: column vectors plus the canonical index table
pub struct Codebook {
    /// Column vectors indexed by pmi * 4 + column, each normalized to 1/4 power
    columns: Vec<[Complex32; NUM_TX_ANTENNAS]>,
    /// Canonical index per (pmi, column) pair
    canonical: Vec<usize>,
    /// First (pmi, column) pair carrying each canonical index
    representatives: Vec<CodebookColumn>,
}

impl Codebook {
    pub fn new() -> Self {
        let mut columns = Vec::with_capacity(NUM_PMIS * NUM_TX_ANTENNAS);

        for seed in seed_vectors() {
            // W = I - 2 u u^H / (u^H u); every seed entry has unit modulus so
            // u^H u = 4 and W = I - u u^H / 2. Columns of the unitary W are
            // scaled by 1/2 so each carries 1/4 of the transmit power.
            for column in 0..NUM_TX_ANTENNAS {
                let mut vector = [Complex32::new(0.0, 0.0); NUM_TX_ANTENNAS];
                for row in 0..NUM_TX_ANTENNAS {
                    let identity = if row == column {
                        Complex32::new(1.0, 0.0)
                    } else {
                        Complex32::new(0.0, 0.0)
                    };
                    let householder = identity - seed[row] * seed[column].conj() * 0.5;
                    vector[row] = householder * 0.5;
                }
                columns.push(vector);
            }
        }

        // Collapse pairs whose vectors describe the same beam (colinear up to
        // a unit phase factor) into one canonical index.
        let mut canonical = vec![0usize; NUM_PMIS * NUM_TX_ANTENNAS];
        let mut representatives: Vec<CodebookColumn> = Vec::new();
        for flat in 0..columns.len() {
            let mut index = representatives.len();
            for (existing, representative) in representatives.iter().enumerate() {
                let other = representative.pmi.0 as usize * NUM_TX_ANTENNAS + representative.column;
                if same_beam(&columns[flat], &columns[other]) {
                    index = existing;
                    break;
                }
            }
            if index == representatives.len() {
                representatives.push(CodebookColumn {
                    pmi: Pmi((flat / NUM_TX_ANTENNAS) as u8),
                    column: flat % NUM_TX_ANTENNAS,
                });
            }
            canonical[flat] = index;
        }

        Self {
            columns,
            canonical,
            representatives,
        }
    }

    /// All PMIs of the codebook
    pub fn pmis(&self) -> Vec<Pmi> {
        (0..NUM_PMIS as u8).map(Pmi).collect()
    }

    /// The beamforming vector for one (PMI, column) pair
    pub fn column(&self, pmi: Pmi, column: usize) -> &[Complex32; NUM_TX_ANTENNAS] {
        &self.columns[Self::flat(pmi, column)]
    }

    /// Canonical index of a (PMI, column) pair
    pub fn canonical_index(&self, pmi: Pmi, column: usize) -> usize {
        self.canonical[Self::flat(pmi, column)]
    }

    /// Number of distinct beams across the codebook
    pub fn num_canonical_indices(&self) -> usize {
        self.representatives.len()
    }

    /// The representative (PMI, column) pair for a canonical index
    pub fn representative(&self, index: usize) -> CodebookColumn {
        self.representatives[index]
    }

    /// |<v1, v2>| between the representative beams of two canonical indexes
    pub fn inner_product(&self, index1: usize, index2: usize) -> f64 {
        let a = self.representative(index1);
        let b = self.representative(index2);
        let v1 = self.column(a.pmi, a.column);
        let v2 = self.column(b.pmi, b.column);
        let mut sum = Complex32::new(0.0, 0.0);
        for row in 0..NUM_TX_ANTENNAS {
            sum += v1[row] * v2[row].conj();
        }
        sum.norm() as f64
    }

    fn flat(pmi: Pmi, column: usize) -> usize {
        debug_assert!((pmi.0 as usize) < NUM_PMIS, "Invalid PMI {}", pmi);
        debug_assert!(column < NUM_TX_ANTENNAS, "Invalid column {}", column);
        pmi.0 as usize * NUM_TX_ANTENNAS + column
    }
}

impl Default for Codebook {
    fn default() -> Self {
        Self::new()
    }
}

/// Two unit-power-scaled vectors describe the same beam when their inner
/// product magnitude equals the product of their norms.
fn same_beam(v1: &[Complex32; NUM_TX_ANTENNAS], v2: &[Complex32; NUM_TX_ANTENNAS]) -> bool {
    let mut sum = Complex32::new(0.0, 0.0);
    let mut norm1 = 0.0f32;
    let mut norm2 = 0.0f32;
    for row in 0..NUM_TX_ANTENNAS {
        sum += v1[row] * v2[row].conj();
        norm1 += v1[row].norm_sqr();
        norm2 += v2[row].norm_sqr();
    }
    (sum.norm() - (norm1 * norm2).sqrt()).abs() < 1e-5
}

/// Seed vectors u_0 .. u_15 of the 4-TX codebook
fn seed_vectors() -> [[Complex32; NUM_TX_ANTENNAS]; NUM_PMIS] {
    let re = |x: f32| Complex32::new(x, 0.0);
    let im = |y: f32| Complex32::new(0.0, y);
    let c = Complex32::new;
    [
        [re(1.0), re(-1.0), re(-1.0), re(-1.0)],
        [re(1.0), im(-1.0), re(1.0), im(1.0)],
        [re(1.0), re(1.0), re(-1.0), re(1.0)],
        [re(1.0), im(1.0), re(1.0), im(-1.0)],
        [
            re(1.0),
            c(-SQRT2_INV, -SQRT2_INV),
            im(-1.0),
            c(SQRT2_INV, -SQRT2_INV),
        ],
        [
            re(1.0),
            c(SQRT2_INV, -SQRT2_INV),
            im(1.0),
            c(-SQRT2_INV, -SQRT2_INV),
        ],
        [
            re(1.0),
            c(SQRT2_INV, SQRT2_INV),
            im(-1.0),
            c(-SQRT2_INV, SQRT2_INV),
        ],
        [
            re(1.0),
            c(-SQRT2_INV, SQRT2_INV),
            im(1.0),
            c(SQRT2_INV, SQRT2_INV),
        ],
        [re(1.0), re(-1.0), re(1.0), re(1.0)],
        [re(1.0), im(-1.0), re(-1.0), im(-1.0)],
        [re(1.0), re(1.0), re(1.0), re(-1.0)],
        [re(1.0), im(1.0), re(-1.0), im(1.0)],
        [re(1.0), re(-1.0), re(-1.0), re(1.0)],
        [re(1.0), re(-1.0), re(1.0), re(-1.0)],
        [re(1.0), re(1.0), re(-1.0), re(-1.0)],
        [re(1.0), re(1.0), re(1.0), re(1.0)],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_carry_quarter_power() {
        let codebook = Codebook::new();
        for pmi in codebook.pmis() {
            for column in 0..NUM_TX_ANTENNAS {
                let vector = codebook.column(pmi, column);
                let power: f32 = vector.iter().map(|v| v.norm_sqr()).sum();
                assert!(
                    (power - 0.25).abs() < 1e-5,
                    "PMI {} column {} has power {}",
                    pmi,
                    column,
                    power
                );
            }
        }
    }

    #[test]
    fn test_columns_within_pmi_are_orthogonal() {
        let codebook = Codebook::new();
        for pmi in codebook.pmis() {
            for c1 in 0..NUM_TX_ANTENNAS {
                for c2 in (c1 + 1)..NUM_TX_ANTENNAS {
                    let v1 = codebook.column(pmi, c1);
                    let v2 = codebook.column(pmi, c2);
                    let mut sum = Complex32::new(0.0, 0.0);
                    for row in 0..NUM_TX_ANTENNAS {
                        sum += v1[row] * v2[row].conj();
                    }
                    assert!(
                        sum.norm() < 1e-5,
                        "PMI {} columns {} and {} not orthogonal",
                        pmi,
                        c1,
                        c2
                    );
                }
            }
        }
    }

    #[test]
    fn test_canonical_index_is_consistent() {
        let codebook = Codebook::new();
        assert!(codebook.num_canonical_indices() <= NUM_PMIS * NUM_TX_ANTENNAS);
        for pmi in codebook.pmis() {
            for column in 0..NUM_TX_ANTENNAS {
                let index = codebook.canonical_index(pmi, column);
                let representative = codebook.representative(index);
                // the representative maps back to the same index
                assert_eq!(
                    codebook.canonical_index(representative.pmi, representative.column),
                    index
                );
            }
        }
    }

    #[test]
    fn test_inner_product_bounds() {
        let codebook = Codebook::new();
        let n = codebook.num_canonical_indices();
        for i in 0..n {
            for j in 0..n {
                let ip = codebook.inner_product(i, j);
                assert!((0.0..=0.25 + 1e-6).contains(&ip));
                if i == j {
                    assert!((ip - 0.25).abs() < 1e-5);
                }
            }
        }
    }
}
