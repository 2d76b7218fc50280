//! Test assertion helpers - fluent API for verifying rating invariants
#![allow(dead_code)] // Test utilities may not all be used in every test

use std::collections::HashSet;

use clubrank::tournament::models::Pairing;

use super::setup::TestSetup;

// ============================================================================
// Assertion Helpers
// ============================================================================

pub struct RatingAssertion<'a> {
    setup: &'a TestSetup,
}

impl<'a> RatingAssertion<'a> {
    pub fn for_club(setup: &'a TestSetup) -> Self {
        Self { setup }
    }

    /// Ratings in the club still sum to players * default
    pub async fn is_zero_sum(self) -> Self {
        let ranking = self
            .setup
            .state
            .ratings
            .ranking(&self.setup.club_id)
            .await
            .unwrap();
        let total: i32 = ranking.iter().map(|e| e.rating).sum();
        assert_eq!(
            total,
            1500 * ranking.len() as i32,
            "ratings drifted: {:?}",
            ranking
        );
        self
    }

    /// Every player's history chains old -> new ratings with ordered timestamps
    pub async fn histories_are_chained(self) -> Self {
        for player in &self.setup.players {
            let history = self
                .setup
                .state
                .ratings
                .history(&self.setup.club_id, player)
                .await
                .unwrap();

            let mut expected_old = 1500;
            for pair in history.windows(2) {
                assert!(pair[0].recorded_at <= pair[1].recorded_at);
                assert!(pair[0].sequence < pair[1].sequence);
            }
            for entry in &history {
                assert_eq!(entry.old_rating, expected_old, "broken chain for {}", player);
                expected_old = entry.new_rating;
            }

            let current = self
                .setup
                .state
                .ratings
                .get_rating(&self.setup.club_id, player)
                .await
                .unwrap();
            assert_eq!(current, expected_old);
        }
        self
    }
}

/// No two boards across all rounds put the same two players together
pub fn assert_no_rematches(pairings: &[Pairing]) {
    let mut seen = HashSet::new();
    for pairing in pairings {
        if let Some(player_b) = &pairing.player_b {
            let mut pair = [pairing.player_a.as_str(), player_b.as_str()];
            pair.sort();
            assert!(
                seen.insert(pair),
                "rematch {:?} in round {}",
                pair,
                pairing.round_number
            );
        }
    }
}
