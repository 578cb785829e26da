//! Quality scoring over one completed evaluation round, and the blend of
//! quality with submission volume into a single reward distribution.

pub mod blend;
pub mod penalty;

pub use blend::{blend, to_percentages};
pub use penalty::{penalty, score_round, PenaltyParams};
