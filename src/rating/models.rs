use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Rating given to a player when they join a club
pub const DEFAULT_RATING: i32 = 1500;

/// What happens when a rating change targets a player without a membership row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MembershipPolicy {
    /// Reject with `PlayerNotInClub`
    Strict,
    /// Create the membership at the default rating
    AutoEnroll,
}

/// A player's rating record within one club
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClubMember {
    pub club_id: String,
    pub player_id: String,
    pub rating: i32,
    pub games_played: u32,
    pub joined_at: DateTime<Utc>,
}

impl ClubMember {
    pub fn new(club_id: &str, player_id: &str, rating: i32) -> Self {
        Self {
            club_id: club_id.to_string(),
            player_id: player_id.to_string(),
            rating,
            games_played: 0,
            joined_at: Utc::now(),
        }
    }
}

/// Game result from one player's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlayerResult {
    Win,
    Loss,
    Draw,
}

/// A requested rating adjustment for one player
#[derive(Debug, Clone, PartialEq)]
pub struct RatingChange {
    pub player_id: String,
    pub delta: i32,
    pub opponent_id: Option<String>,
    pub result: Option<PlayerResult>,
    pub match_id: Option<String>,
    pub tournament_id: Option<String>,
}

impl RatingChange {
    pub fn new(player_id: &str, delta: i32) -> Self {
        Self {
            player_id: player_id.to_string(),
            delta,
            opponent_id: None,
            result: None,
            match_id: None,
            tournament_id: None,
        }
    }

    pub fn against(mut self, opponent_id: &str, result: PlayerResult) -> Self {
        self.opponent_id = Some(opponent_id.to_string());
        self.result = Some(result);
        self
    }

    pub fn for_match(mut self, match_id: &str, tournament_id: Option<&str>) -> Self {
        self.match_id = Some(match_id.to_string());
        self.tournament_id = tournament_id.map(str::to_string);
        self
    }

    /// Changes caused by a game also bump the games-played counter
    pub fn is_game(&self) -> bool {
        self.opponent_id.is_some()
    }
}

/// Append-only record of one applied rating change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingHistoryEntry {
    /// Store-assigned, strictly increasing per store
    pub sequence: i64,
    pub club_id: String,
    pub player_id: String,
    pub recorded_at: DateTime<Utc>,
    pub old_rating: i32,
    pub new_rating: i32,
    pub opponent_id: Option<String>,
    pub result: Option<PlayerResult>,
    pub match_id: Option<String>,
    pub tournament_id: Option<String>,
}

impl RatingHistoryEntry {
    pub fn delta(&self) -> i32 {
        self.new_rating - self.old_rating
    }
}

/// One row of the club-wide rating ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub position: u32,
    pub player_id: String,
    pub rating: i32,
    pub games_played: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn new_member_starts_without_games() {
        let member = ClubMember::new("club", "alice", DEFAULT_RATING);
        assert_eq!(member.rating, 1500);
        assert_eq!(member.games_played, 0);
    }

    #[test]
    fn plain_adjustments_are_not_games() {
        let manual = RatingChange::new("alice", 25);
        let game = RatingChange::new("alice", 16).against("bob", PlayerResult::Win);

        assert!(!manual.is_game());
        assert!(game.is_game());
    }

    #[test]
    fn player_result_round_trips_through_strings() {
        assert_eq!(PlayerResult::Draw.to_string(), "draw");
        assert_eq!(PlayerResult::from_str("loss").unwrap(), PlayerResult::Loss);
        assert_eq!(
            MembershipPolicy::from_str("auto_enroll").unwrap(),
            MembershipPolicy::AutoEnroll
        );
    }
}
