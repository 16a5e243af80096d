//! Composite DRep reputation score.
//!
//! Four pillar percentages are combined into one integer in `[0, 100]`:
//!
//! ```text
//! raw = participation * wP + curve(rationale) * wR + reliability * wRel + profile * wProf
//! ```
//!
//! Pillars are not clamped before weighting; only the final value is. Any
//! missing or non-finite pillar counts as 0 and still takes its share of
//! the weight.

use serde::{Deserialize, Serialize};

/// How strongly the rationale curve lifts partial effort. The curve is
/// `x + k·x·(100 − x)/100` on `(0, 100)`: ~1.65× near zero, 1.52× at 20,
/// 1.0× at 100. Must stay in `(0, 1]` for the curve to be non-decreasing.
const RATIONALE_LIFT: f64 = 0.65;

/// Raw pillar metrics as they arrive from upstream aggregation.
///
/// Every field is optional; `None`, JSON `null`, and `NaN`/`±inf` are all
/// treated as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PillarMetrics {
    #[serde(default)]
    pub participation: Option<f64>,
    #[serde(default)]
    pub rationale_rate: Option<f64>,
    #[serde(default)]
    pub reliability: Option<f64>,
    #[serde(default)]
    pub profile_completeness: Option<f64>,
}

impl PillarMetrics {
    pub fn new(participation: f64, rationale_rate: f64, reliability: f64, profile: f64) -> Self {
        Self {
            participation: Some(participation),
            rationale_rate: Some(rationale_rate),
            reliability: Some(reliability),
            profile_completeness: Some(profile),
        }
    }
}

/// Fractional weight per pillar. Non-negative by contract; custom sets are
/// not required to sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeightSet {
    pub participation: f64,
    pub rationale: f64,
    pub reliability: f64,
    pub profile: f64,
}

impl WeightSet {
    pub fn sum(&self) -> f64 {
        self.participation + self.rationale + self.reliability + self.profile
    }

    /// Whether the weights sum to 1.0 (within float tolerance).
    pub fn is_normalized(&self) -> bool {
        (self.sum() - 1.0).abs() < 1e-9
    }
}

impl Default for WeightSet {
    fn default() -> Self {
        Self {
            participation: 0.30,
            rationale: 0.35,
            reliability: 0.20,
            profile: 0.15,
        }
    }
}

/// Per-pillar view of one composition, for explaining a score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub participation: f64,
    pub rationale_raw: f64,
    pub rationale_curved: f64,
    pub reliability: f64,
    pub profile_completeness: f64,
    pub weights: WeightSet,
    /// Weighted sum before rounding and clamping.
    pub raw: f64,
    pub score: u8,
}

fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Concave lift applied to the rationale pillar.
///
/// `curve(0) = 0`, `curve(100) = 100`, non-decreasing, and `curve(x) > x`
/// on `(0, 100)`. Outside that interval the value passes through unchanged.
pub fn rationale_curve(x: f64) -> f64 {
    if x > 0.0 && x < 100.0 {
        x + RATIONALE_LIFT * x * (100.0 - x) / 100.0
    } else {
        x
    }
}

/// Round half-up and clamp into `[0, 100]`.
fn finalize(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    (raw + 0.5).floor().clamp(0.0, 100.0) as u8
}

/// Compose a score and return every intermediate value.
pub fn compose_detailed(pillars: &PillarMetrics, weights: Option<&WeightSet>) -> ScoreBreakdown {
    let weights = weights.copied().unwrap_or_default();

    let participation = finite_or_zero(pillars.participation);
    let rationale_raw = finite_or_zero(pillars.rationale_rate);
    let reliability = finite_or_zero(pillars.reliability);
    let profile_completeness = finite_or_zero(pillars.profile_completeness);
    let rationale_curved = rationale_curve(rationale_raw);

    let raw = participation * weights.participation
        + rationale_curved * weights.rationale
        + reliability * weights.reliability
        + profile_completeness * weights.profile;

    ScoreBreakdown {
        participation,
        rationale_raw,
        rationale_curved,
        reliability,
        profile_completeness,
        weights,
        raw,
        score: finalize(raw),
    }
}

/// Composite reputation score in `[0, 100]`. `None` weights means the
/// default 30/35/20/15 split.
pub fn compose(pillars: &PillarMetrics, weights: Option<&WeightSet>) -> u8 {
    compose_detailed(pillars, weights).score
}
