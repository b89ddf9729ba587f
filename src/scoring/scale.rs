// src/scoring/scale.rs

use serde::Serialize;

/// Aggregate over a student's per-subtest scaled scores.
#[derive(Debug, Clone, Serialize)]
pub struct OverallScore {
    pub total_score: i64,
    pub average_score: i64,
    pub percentile: i64,
}

/// Maps an ability estimate onto the 200-800 scale: 500 + 75 points per
/// logit, clamped. Total for any input, including infinities.
pub fn ability_to_scaled_score(theta: f64) -> i64 {
    if theta.is_nan() {
        return 200;
    }
    (500.0 + theta * 75.0).clamp(200.0, 800.0).round() as i64
}

/// Provisional raw score shown right after a subtest is submitted:
/// 1000 points split evenly across the gradable questions.
pub fn raw_subtest_score(correct_count: i64, total_questions: i64) -> i64 {
    if total_questions <= 0 {
        return 0;
    }
    (correct_count as f64 * (1000.0 / total_questions as f64)).round() as i64
}

/// Combines per-subtest scaled scores into the 0-1000 aggregate.
///
/// The scaling constant assumes the full battery of 7 subtests at a neutral
/// average of 500 maps to exactly 1000; a partial battery scales linearly
/// with the number of subtests taken, which grants partial credit for
/// partial completion.
pub fn overall_score(subtest_scores: &[i64]) -> OverallScore {
    if subtest_scores.is_empty() {
        return OverallScore {
            total_score: 200,
            average_score: 200,
            percentile: 1,
        };
    }

    let count = subtest_scores.len() as f64;
    let average: f64 = subtest_scores.iter().sum::<i64>() as f64 / count;

    let scaling_factor = 1000.0 / (7.0 * 500.0);
    let total = (average * count * scaling_factor).round() as i64;

    let average_ability = (average - 500.0) / 75.0;

    OverallScore {
        total_score: total.clamp(50, 1000),
        average_score: average.round() as i64,
        percentile: percentile_from_ability(average_ability),
    }
}

/// Percentile rank of an ability value under a standard normal population,
/// rounded and clamped to [1, 99].
pub fn percentile_from_ability(theta: f64) -> i64 {
    ((normal_cdf(theta) * 100.0).round() as i64).clamp(1, 99)
}

/// Standard normal CDF, Abramowitz-Stegun 7.1.26 rational approximation.
pub fn normal_cdf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / 2.0_f64.sqrt();

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    0.5 * (1.0 + sign * y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_score_is_bounded_for_any_input() {
        assert_eq!(ability_to_scaled_score(0.0), 500);
        assert_eq!(ability_to_scaled_score(4.0), 800);
        assert_eq!(ability_to_scaled_score(-4.0), 200);
        assert_eq!(ability_to_scaled_score(100.0), 800);
        assert_eq!(ability_to_scaled_score(f64::INFINITY), 800);
        assert_eq!(ability_to_scaled_score(f64::NEG_INFINITY), 200);
    }

    #[test]
    fn full_battery_at_neutral_average_totals_exactly_1000() {
        let scores = overall_score(&[500; 7]);
        assert_eq!(scores.total_score, 1000);
        assert_eq!(scores.average_score, 500);
        assert_eq!(scores.percentile, 50);
    }

    #[test]
    fn partial_battery_scales_linearly_with_count() {
        // One neutral subtest: round(500 * 1 * 1000/3500) = 143.
        assert_eq!(overall_score(&[500]).total_score, 143);
        // Two: round(500 * 2 * 1000/3500) = 286.
        assert_eq!(overall_score(&[500, 500]).total_score, 286);
    }

    #[test]
    fn overall_total_is_clamped() {
        assert_eq!(overall_score(&[800; 7]).total_score, 1000);
        assert_eq!(overall_score(&[200]).total_score, 57);
        assert_eq!(overall_score(&[]).total_score, 200);
    }

    #[test]
    fn raw_score_splits_1000_across_questions() {
        assert_eq!(raw_subtest_score(20, 20), 1000);
        assert_eq!(raw_subtest_score(18, 20), 900);
        assert_eq!(raw_subtest_score(1, 30), 33);
        assert_eq!(raw_subtest_score(0, 20), 0);
        assert_eq!(raw_subtest_score(0, 0), 0);
    }

    #[test]
    fn normal_cdf_behaves_like_a_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-7);
        assert!((normal_cdf(1.0) + normal_cdf(-1.0) - 1.0).abs() < 1e-7);
        assert!(normal_cdf(3.0) > 0.99);
        assert!(normal_cdf(-3.0) < 0.01);
    }

    #[test]
    fn percentile_is_clamped_to_1_99() {
        assert_eq!(percentile_from_ability(0.0), 50);
        assert_eq!(percentile_from_ability(10.0), 99);
        assert_eq!(percentile_from_ability(-10.0), 1);
    }
}
