//! Logistic (Elo) expected-score model and K-factor policies.

use serde::{Deserialize, Serialize};

use super::models::Outcome;
use crate::rating::models::ClubMember;

/// K-factor used when nothing else is configured
pub const DEFAULT_K_FACTOR: f64 = 32.0;

/// Largest K accepted from configuration
pub const MAX_K_FACTOR: f64 = 400.0;

/// Whether `k` is usable as a K-factor: finite, positive and at most `MAX_K_FACTOR`
pub fn is_valid_k_factor(k: f64) -> bool {
    k.is_finite() && k > 0.0 && k <= MAX_K_FACTOR
}

/// How much a single game may move a rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KFactorPolicy {
    /// Same K for every player
    Fixed { k: f64 },
    /// Higher K while a player is provisional, lower once established or
    /// strong
    Tiered {
        provisional_k: f64,
        provisional_games: u32,
        established_k: f64,
        master_k: f64,
        master_rating: i32,
    },
}

impl Default for KFactorPolicy {
    fn default() -> Self {
        KFactorPolicy::Fixed {
            k: DEFAULT_K_FACTOR,
        }
    }
}

impl KFactorPolicy {
    pub fn fixed(k: f64) -> Self {
        KFactorPolicy::Fixed { k }
    }

    /// FIDE-like tiers: 40 for the first 30 games, 20 afterwards, 10 from 2400
    pub fn tiered() -> Self {
        KFactorPolicy::Tiered {
            provisional_k: 40.0,
            provisional_games: 30,
            established_k: 20.0,
            master_k: 10.0,
            master_rating: 2400,
        }
    }

    pub fn k_for(&self, member: &ClubMember) -> f64 {
        match *self {
            KFactorPolicy::Fixed { k } => k,
            KFactorPolicy::Tiered {
                provisional_k,
                provisional_games,
                established_k,
                master_k,
                master_rating,
            } => {
                if member.games_played < provisional_games {
                    provisional_k
                } else if member.rating >= master_rating {
                    master_k
                } else {
                    established_k
                }
            }
        }
    }

    /// One K for both sides of a game. Averaging keeps the exchange zero-sum.
    pub fn k_for_pair(&self, a: &ClubMember, b: &ClubMember) -> f64 {
        (self.k_for(a) + self.k_for(b)) / 2.0
    }
}

/// Rating movement for both sides of one game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDelta {
    pub delta_a: i32,
    pub delta_b: i32,
}

/// Probability-like expected score of a player rated `rating` against `opponent`
pub fn expected_score(rating: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf(f64::from(opponent - rating) / 400.0))
}

/// Zero-sum rating deltas for a finished game.
/// `f64::round` rounds half away from zero.
pub fn rating_deltas(rating_a: i32, rating_b: i32, outcome: Outcome, k: f64) -> RatingDelta {
    let expected_a = expected_score(rating_a, rating_b);
    let delta_a = (k * (outcome.score_a() - expected_a)).round() as i32;

    RatingDelta {
        delta_a,
        delta_b: -delta_a,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn member(rating: i32, games_played: u32) -> ClubMember {
        let mut member = ClubMember::new("club", "p", rating);
        member.games_played = games_played;
        member
    }

    #[test]
    fn equal_ratings_expect_half() {
        assert!((expected_score(1500, 1500) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn expected_scores_are_complementary() {
        let a = expected_score(1720, 1480);
        let b = expected_score(1480, 1720);
        assert!((a + b - 1.0).abs() < 1e-12);
        assert!(a > 0.5);
    }

    #[rstest]
    #[case(1500, 1500, Outcome::AWin, 32.0, 16)]
    #[case(1500, 1500, Outcome::BWin, 32.0, -16)]
    #[case(1500, 1500, Outcome::Draw, 32.0, 0)]
    #[case(1400, 1600, Outcome::AWin, 32.0, 24)]
    #[case(1600, 1400, Outcome::AWin, 32.0, 8)]
    #[case(1600, 1400, Outcome::Draw, 32.0, -8)]
    #[case(2000, 1200, Outcome::AWin, 32.0, 0)]
    #[case(1500, 1500, Outcome::AWin, 5.0, 3)]
    #[case(1500, 1500, Outcome::BWin, 5.0, -3)]
    fn deltas_follow_logistic_model(
        #[case] rating_a: i32,
        #[case] rating_b: i32,
        #[case] outcome: Outcome,
        #[case] k: f64,
        #[case] expected_delta_a: i32,
    ) {
        let delta = rating_deltas(rating_a, rating_b, outcome, k);
        assert_eq!(delta.delta_a, expected_delta_a);
        assert_eq!(delta.delta_a + delta.delta_b, 0);
    }

    #[test]
    fn deltas_are_zero_sum_across_rating_grid() {
        for rating_a in (800..=2600).step_by(137) {
            for rating_b in (800..=2600).step_by(211) {
                for outcome in [Outcome::AWin, Outcome::BWin, Outcome::Draw] {
                    let delta = rating_deltas(rating_a, rating_b, outcome, 24.0);
                    assert_eq!(delta.delta_a + delta.delta_b, 0);
                }
            }
        }
    }

    #[rstest]
    #[case(5, 1500, 40.0)]
    #[case(30, 1500, 20.0)]
    #[case(30, 2450, 10.0)]
    #[case(2, 2450, 40.0)]
    fn tiered_policy_picks_k_by_experience(
        #[case] games_played: u32,
        #[case] rating: i32,
        #[case] expected_k: f64,
    ) {
        let policy = KFactorPolicy::tiered();
        assert_eq!(policy.k_for(&member(rating, games_played)), expected_k);
    }

    #[test]
    fn pair_k_is_the_mean() {
        let policy = KFactorPolicy::tiered();
        let k = policy.k_for_pair(&member(1500, 0), &member(1500, 100));
        assert_eq!(k, 30.0);
        assert_eq!(KFactorPolicy::fixed(16.0).k_for_pair(&member(1500, 0), &member(2500, 400)), 16.0);
    }
}
