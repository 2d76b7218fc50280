use clubrank::{tournament::models::Pairing, Outcome};

use super::setup::TestSetup;

// ============================================================================
// Action Helpers
// ============================================================================

#[allow(dead_code)]
impl TestSetup {
    /// Generates the next round and reports every game with `decide`
    pub async fn play_round<F>(&self, tournament_id: &str, decide: F) -> Vec<Pairing>
    where
        F: Fn(&Pairing) -> Outcome,
    {
        let pairings = self
            .state
            .tournaments
            .generate_next_round(tournament_id, false)
            .await
            .unwrap();

        for pairing in &pairings {
            if let Some(match_id) = &pairing.match_id {
                self.state
                    .matches
                    .submit_result(match_id, decide(pairing))
                    .await
                    .unwrap();
            }
        }
        pairings
    }

    /// Plays a casual game outside any tournament
    pub async fn report_game(&self, player_a: &str, player_b: &str, outcome: Outcome) {
        self.state
            .matches
            .report_game(&self.club_id, player_a, player_b, outcome)
            .await
            .unwrap();
    }
}

/// Board 1 goes to side A, board 2 is drawn, board 3 goes to side B, and so on
#[allow(dead_code)]
pub fn by_board(pairing: &Pairing) -> Outcome {
    match pairing.board % 3 {
        1 => Outcome::AWin,
        2 => Outcome::Draw,
        _ => Outcome::BWin,
    }
}
