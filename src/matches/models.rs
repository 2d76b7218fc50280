use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::rating::models::PlayerResult;
use crate::shared::AppError;

/// Final result of a game, from side A's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    AWin,
    BWin,
    Draw,
}

impl Outcome {
    /// Points scored by side A (1, 0.5 or 0)
    pub fn score_a(self) -> f64 {
        match self {
            Outcome::AWin => 1.0,
            Outcome::Draw => 0.5,
            Outcome::BWin => 0.0,
        }
    }

    pub fn score_b(self) -> f64 {
        1.0 - self.score_a()
    }

    pub fn result_a(self) -> PlayerResult {
        match self {
            Outcome::AWin => PlayerResult::Win,
            Outcome::Draw => PlayerResult::Draw,
            Outcome::BWin => PlayerResult::Loss,
        }
    }

    pub fn result_b(self) -> PlayerResult {
        match self {
            Outcome::AWin => PlayerResult::Loss,
            Outcome::Draw => PlayerResult::Draw,
            Outcome::BWin => PlayerResult::Win,
        }
    }
}

/// Tournament slot a match belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRef {
    pub tournament_id: String,
    pub round_number: u32,
}

/// A game between two club members, optionally part of a tournament round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchModel {
    pub id: String,
    pub club_id: String,
    pub tournament_id: Option<String>,
    pub round_number: Option<u32>,
    pub player_a: String,
    pub player_b: String,
    pub outcome: Option<Outcome>,
    pub created_at: DateTime<Utc>,
    pub reported_at: Option<DateTime<Utc>>,
}

impl MatchModel {
    /// Creates an unresolved match with a generated ID
    pub fn new(
        club_id: &str,
        player_a: &str,
        player_b: &str,
        round: Option<RoundRef>,
    ) -> Result<Self, AppError> {
        if player_a == player_b {
            return Err(AppError::invalid_pairing(player_a));
        }

        let (tournament_id, round_number) = match round {
            Some(r) => (Some(r.tournament_id), Some(r.round_number)),
            None => (None, None),
        };

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            club_id: club_id.to_string(),
            tournament_id,
            round_number,
            player_a: player_a.to_string(),
            player_b: player_b.to_string(),
            outcome: None,
            created_at: Utc::now(),
            reported_at: None,
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn self_pairing_is_rejected() {
        let result = MatchModel::new("club", "alice", "alice", None);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn tournament_match_carries_round() {
        let game = MatchModel::new(
            "club",
            "alice",
            "bob",
            Some(RoundRef {
                tournament_id: "t-1".into(),
                round_number: 3,
            }),
        )
        .unwrap();

        assert_eq!(game.tournament_id.as_deref(), Some("t-1"));
        assert_eq!(game.round_number, Some(3));
        assert!(!game.is_resolved());
    }

    #[test]
    fn outcome_scores_sum_to_one() {
        for outcome in [Outcome::AWin, Outcome::BWin, Outcome::Draw] {
            assert_eq!(outcome.score_a() + outcome.score_b(), 1.0);
        }
        assert_eq!(Outcome::BWin.result_b(), PlayerResult::Win);
        assert_eq!(Outcome::Draw.result_a(), PlayerResult::Draw);
    }

    #[test]
    fn outcome_wire_format() {
        assert_eq!(Outcome::AWin.to_string(), "A_WIN");
        assert_eq!(Outcome::from_str("B_WIN").unwrap(), Outcome::BWin);
        assert_eq!(serde_json::to_string(&Outcome::Draw).unwrap(), "\"DRAW\"");
        assert!(Outcome::from_str("WHITE_WINS").is_err());
    }
}
