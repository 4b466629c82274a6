//! Score computation: hint malus and weighted totals.
//!
//! All scores are integers in `[0, 100]`. Intermediate arithmetic uses
//! `rust_decimal::Decimal` and rounds half away from zero.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How requested hints reduce a visit's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintMalusType {
    /// Scale the achieved points down by the cumulative malus percentage.
    CutActual,
    /// Lower the achievable maximum by the cumulative malus.
    CutMaximum,
}

impl fmt::Display for HintMalusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintMalusType::CutActual => f.write_str("cut_actual"),
            HintMalusType::CutMaximum => f.write_str("cut_maximum"),
        }
    }
}

impl FromStr for HintMalusType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "cut_actual" => Ok(HintMalusType::CutActual),
            "cut_maximum" => Ok(HintMalusType::CutMaximum),
            _ => Err(format!("unknown hint malus mode '{}'", s)),
        }
    }
}

/// Points of one visit as they enter the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectivePoints {
    Automatic(u32),
    Manual(u32),
}

impl EffectivePoints {
    pub fn points(&self) -> u32 {
        match self {
            EffectivePoints::Automatic(p) | EffectivePoints::Manual(p) => *p,
        }
    }
}

fn round_to_u32(value: Decimal) -> u32 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

/// Apply the hint malus to raw points, clamped to `[0, 100]`.
pub fn points_with_hint_malus(raw: u32, cumulative_malus: u32, mode: Option<HintMalusType>) -> u32 {
    let raw = raw.min(100);
    let (malus_actual, malus_maximum) = match mode {
        None => return raw,
        Some(HintMalusType::CutActual) => (cumulative_malus, 0),
        Some(HintMalusType::CutMaximum) => (0, cumulative_malus),
    };

    let maximum = 100u32.saturating_sub(malus_maximum);
    let factor = Decimal::from(100i64 - i64::from(malus_actual)) / Decimal::from(100);
    let scaled = Decimal::from(raw.min(maximum)) * factor;
    if scaled.is_sign_negative() {
        return 0;
    }
    round_to_u32(scaled).min(100)
}

/// One path entry as seen by the total computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoredVisit {
    pub weight: u32,
    pub points: EffectivePoints,
}

/// Weighted average of path visits.
///
/// `remaining_weight` estimates the weight of stages not yet reached; it is
/// zero for completed submissions. A zero combined weight scores 100.
pub fn compute_total(visits: &[ScoredVisit], remaining_weight: u32) -> u32 {
    let mut weighted_points: u64 = 0;
    let mut weights: u64 = 0;
    for visit in visits {
        weighted_points += u64::from(visit.points.points()) * u64::from(visit.weight);
        weights += u64::from(visit.weight);
    }

    let total_weight = weights + u64::from(remaining_weight);
    if total_weight == 0 {
        return 100;
    }
    round_to_u32(Decimal::from(weighted_points) / Decimal::from(total_weight)).min(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto(weight: u32, points: u32) -> ScoredVisit {
        ScoredVisit {
            weight,
            points: EffectivePoints::Automatic(points),
        }
    }

    #[test]
    fn two_equal_stages_average() {
        assert_eq!(compute_total(&[auto(10, 100), auto(10, 0)], 0), 50);
    }

    #[test]
    fn incomplete_uses_remaining_weight() {
        // weight 10 visited, suffix 40 => remaining 30
        assert_eq!(compute_total(&[auto(10, 100)], 30), 25);
    }

    #[test]
    fn zero_weight_scores_full() {
        assert_eq!(compute_total(&[], 0), 100);
        assert_eq!(compute_total(&[auto(0, 0), auto(0, 30)], 0), 100);
    }

    #[test]
    fn rounds_half_up() {
        // 2 * 100 / 3 = 66.67
        assert_eq!(compute_total(&[auto(1, 100), auto(1, 100), auto(1, 0)], 0), 67);
        // 1 * 50 / 4 = 12.5
        assert_eq!(compute_total(&[auto(1, 50)], 3), 13);
    }

    #[test]
    fn manual_points_count_like_automatic() {
        let manual = ScoredVisit {
            weight: 10,
            points: EffectivePoints::Manual(40),
        };
        assert_eq!(compute_total(&[manual, auto(10, 60)], 0), 50);
    }

    #[test]
    fn cut_actual_scales_points() {
        assert_eq!(points_with_hint_malus(100, 20, Some(HintMalusType::CutActual)), 80);
        assert_eq!(points_with_hint_malus(50, 25, Some(HintMalusType::CutActual)), 38);
        assert_eq!(points_with_hint_malus(100, 150, Some(HintMalusType::CutActual)), 0);
    }

    #[test]
    fn cut_maximum_caps_points() {
        assert_eq!(points_with_hint_malus(100, 30, Some(HintMalusType::CutMaximum)), 70);
        assert_eq!(points_with_hint_malus(60, 30, Some(HintMalusType::CutMaximum)), 60);
        assert_eq!(points_with_hint_malus(60, 130, Some(HintMalusType::CutMaximum)), 0);
    }

    #[test]
    fn no_mode_returns_clamped_raw() {
        assert_eq!(points_with_hint_malus(80, 50, None), 80);
        assert_eq!(points_with_hint_malus(140, 0, None), 100);
    }

    #[test]
    fn parse_malus_modes() {
        assert_eq!("cut_actual".parse(), Ok(HintMalusType::CutActual));
        assert_eq!("CUT_MAXIMUM".parse(), Ok(HintMalusType::CutMaximum));
        assert_eq!("cut-maximum".parse(), Ok(HintMalusType::CutMaximum));
        assert!("none".parse::<HintMalusType>().is_err());
        assert_eq!(HintMalusType::CutActual.to_string(), "cut_actual");
    }
}
