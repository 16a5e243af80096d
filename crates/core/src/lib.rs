pub mod config;
pub mod epoch;
pub mod error;
pub mod score;

pub use config::Config;
pub use epoch::{epoch_of, EpochClock};
pub use error::*;
pub use score::{compose, compose_detailed, rationale_curve, PillarMetrics, ScoreBreakdown, WeightSet};
