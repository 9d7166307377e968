//! MU-MIMO Downlink MAC Scheduler
//!
//! This crate implements a per-TTI downlink resource scheduler for a
//! multi-user MIMO cell with four spatial layers per PRB. Up to four users
//! share each PRB under a common precoder drawn from the 4-TX codebook;
//! pending HARQ retransmissions are guaranteed to re-occupy exactly as many
//! PRBs as their original transmission or are withdrawn entirely.

pub mod codebook;
pub mod feedback;
pub mod filler;
pub mod grid;
pub mod harq;
pub mod la;
pub mod ranking;
pub mod scheduler;
pub mod sizing;

use thiserror::Error;

/// Errors raised while constructing or configuring the scheduler
#[derive(Error, Debug)]
pub enum MacError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Unsupported antenna configuration: {0} TX antennas")]
    UnsupportedAntennaCount(usize),

    #[error("Unknown SINR estimation mode: {0}")]
    UnknownEstimationMode(String),
}

pub use codebook::{Codebook, CodebookColumn, NUM_PMIS, NUM_TX_ANTENNAS};
pub use feedback::{FeedbackProvider, PrecoderFeedback};
pub use grid::{GridCoordinate, ResourceGrid, NUM_COLUMNS};
pub use harq::{HarqManager, HarqRegistry, RetransmissionGrant};
pub use la::LinkAdaptationConsumer;
pub use ranking::{CandidateEvaluator, GroupRanker, PmiGroup};
pub use scheduler::{
    DownlinkScheduler, EstimationMode, PrbAllocation, SchedulerConfig, SchedulerDiagnostics,
    TtiSchedule, UserAllocation,
};
