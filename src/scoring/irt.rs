// src/scoring/irt.rs

use serde::Serialize;

use crate::scoring::scale;

const MAX_ITERATIONS: usize = 50;
const TOLERANCE: f64 = 0.001;
const THETA_MIN: f64 = -4.0;
const THETA_MAX: f64 = 4.0;

/// One graded response joined against its item parameters.
#[derive(Debug, Clone, Copy)]
pub struct ItemResponse {
    pub difficulty: f64,
    pub discrimination: f64,
    pub is_correct: bool,
}

/// Ability estimate for one (student, subtest) pair. Derived on demand,
/// never authoritative.
#[derive(Debug, Clone, Serialize)]
pub struct AbilityEstimate {
    pub theta: f64,
    pub standard_error: f64,
    pub scaled_score: i64,
    pub percentile: i64,
}

/// 2PL model: P(correct | theta) = 1 / (1 + exp(-a * (theta - b))).
fn probability_correct(theta: f64, difficulty: f64, discrimination: f64) -> f64 {
    1.0 / (1.0 + (-discrimination * (theta - difficulty)).exp())
}

/// Maximum-likelihood ability estimate via Newton-Raphson.
///
/// Starts at theta = 0 and iterates until the score function drops below
/// tolerance. The information term uses the Fisher form a^2 * P * (1 - P)
/// for every response regardless of correctness. Zero information means
/// there is nothing left to learn from this step, so the current theta is
/// taken as converged rather than dividing by zero.
pub fn estimate_theta(responses: &[ItemResponse]) -> f64 {
    let mut theta = 0.0;

    for _ in 0..MAX_ITERATIONS {
        let mut score = 0.0;
        let mut information = 0.0;

        for response in responses {
            let p = probability_correct(theta, response.difficulty, response.discrimination);
            let q = 1.0 - p;

            if response.is_correct {
                score += response.discrimination * q;
            } else {
                score -= response.discrimination * p;
            }
            information -= response.discrimination * response.discrimination * p * q;
        }

        if score.abs() < TOLERANCE {
            break;
        }
        if information == 0.0 {
            break;
        }

        theta -= score / information;
        theta = theta.clamp(THETA_MIN, THETA_MAX);
    }

    theta
}

/// Full estimate: theta, standard error, scaled score, percentile.
///
/// Zero responses is a valid state and returns the floor estimate instead
/// of failing; "no data yet" must render as a usable score.
pub fn estimate(responses: &[ItemResponse]) -> AbilityEstimate {
    if responses.is_empty() {
        return AbilityEstimate {
            theta: THETA_MIN,
            standard_error: 1.0,
            scaled_score: 200,
            percentile: 1,
        };
    }

    let theta = estimate_theta(responses);

    let information: f64 = responses
        .iter()
        .map(|response| {
            let p = probability_correct(theta, response.difficulty, response.discrimination);
            response.discrimination * response.discrimination * p * (1.0 - p)
        })
        .sum();

    let standard_error = if information > 0.0 {
        1.0 / information.sqrt()
    } else {
        1.0
    };

    AbilityEstimate {
        theta,
        standard_error,
        scaled_score: scale::ability_to_scaled_score(theta),
        percentile: scale::percentile_from_ability(theta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(is_correct: bool) -> ItemResponse {
        ItemResponse {
            difficulty: 0.0,
            discrimination: 1.0,
            is_correct,
        }
    }

    #[test]
    fn empty_responses_return_floor_estimate() {
        let estimate = estimate(&[]);
        assert_eq!(estimate.theta, -4.0);
        assert_eq!(estimate.scaled_score, 200);
        assert_eq!(estimate.standard_error, 1.0);
        assert_eq!(estimate.percentile, 1);
    }

    #[test]
    fn two_correct_average_items_give_positive_theta() {
        let theta = estimate_theta(&[response(true), response(true)]);
        assert!(theta > 0.0, "theta was {theta}");
    }

    #[test]
    fn more_correct_answers_never_lower_theta() {
        let mut previous = f64::NEG_INFINITY;
        for correct in 0..=5 {
            let responses: Vec<ItemResponse> =
                (0..5).map(|i| response(i < correct)).collect();
            let theta = estimate_theta(&responses);
            assert!(
                theta >= previous,
                "{correct} correct gave {theta}, below {previous}"
            );
            previous = theta;
        }
    }

    #[test]
    fn theta_stays_within_bounds() {
        let all_correct: Vec<ItemResponse> = (0..10).map(|_| response(true)).collect();
        let all_wrong: Vec<ItemResponse> = (0..10).map(|_| response(false)).collect();
        assert!(estimate_theta(&all_correct) <= 4.0);
        assert!(estimate_theta(&all_wrong) >= -4.0);
    }

    #[test]
    fn zero_information_is_treated_as_converged() {
        // An absurd difficulty drives P to exactly 0, so the information sum
        // vanishes. The estimate must stay finite instead of going NaN.
        let responses = [ItemResponse {
            difficulty: 1e9,
            discrimination: 1.0,
            is_correct: true,
        }];
        let estimate = estimate(&responses);
        assert!(estimate.theta.is_finite());
        assert_eq!(estimate.theta, 0.0);
        assert_eq!(estimate.standard_error, 1.0);
    }

    #[test]
    fn mixed_responses_stay_near_zero() {
        let responses = [response(true), response(false), response(true), response(false)];
        let theta = estimate_theta(&responses);
        assert!(theta.abs() < 0.5, "theta was {theta}");
    }

    #[test]
    fn standard_error_shrinks_with_more_items() {
        let few: Vec<ItemResponse> = [true, false].iter().map(|&c| response(c)).collect();
        let many: Vec<ItemResponse> = [true, false, true, false, true, false, true, false]
            .iter()
            .map(|&c| response(c))
            .collect();
        assert!(estimate(&many).standard_error < estimate(&few).standard_error);
    }
}
