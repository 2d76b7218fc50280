use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

/// Lifecycle of a tournament. Only moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TournamentStatus {
    Upcoming,
    Ongoing,
    Completed,
}

impl TournamentStatus {
    pub fn can_transition_to(self, next: TournamentStatus) -> bool {
        matches!(
            (self, next),
            (TournamentStatus::Upcoming, TournamentStatus::Ongoing)
                | (TournamentStatus::Ongoing, TournamentStatus::Completed)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentModel {
    pub id: String,
    pub club_id: String,
    pub name: String,
    pub status: TournamentStatus,
    /// 0 until the first round is generated
    pub current_round: u32,
    pub round_count_target: Option<u32>,
    pub starts_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TournamentModel {
    pub fn new(
        club_id: &str,
        name: &str,
        round_count_target: Option<u32>,
        starts_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            club_id: club_id.to_string(),
            name: name.to_string(),
            status: TournamentStatus::Upcoming,
            current_round: 0,
            round_count_target,
            starts_at,
            created_at: Utc::now(),
        }
    }

    pub fn all_rounds_played(&self) -> bool {
        self.round_count_target
            .is_some_and(|target| self.current_round >= target)
    }
}

/// A player's registration in a tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentPlayer {
    pub tournament_id: String,
    pub player_id: String,
    /// Snapshot of the club rating, refreshed when the tournament starts
    pub starting_rating: i32,
    pub registered_at: DateTime<Utc>,
}

/// One board of a round. `player_b == None` is a bye.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    pub tournament_id: String,
    pub round_number: u32,
    pub board: u32,
    pub player_a: String,
    pub player_b: Option<String>,
    pub match_id: Option<String>,
}

impl Pairing {
    pub fn is_bye(&self) -> bool {
        self.player_b.is_none()
    }
}

/// A row of the published final ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalRankingEntry {
    pub tournament_id: String,
    pub rank: u32,
    pub player_id: String,
    pub score: f64,
    /// Sonneborn-Berger score
    pub tiebreak_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_only_moves_forward() {
        use TournamentStatus::*;

        assert!(Upcoming.can_transition_to(Ongoing));
        assert!(Ongoing.can_transition_to(Completed));
        assert!(!Upcoming.can_transition_to(Completed));
        assert!(!Ongoing.can_transition_to(Upcoming));
        assert!(!Completed.can_transition_to(Ongoing));
        assert!(!Completed.can_transition_to(Completed));
    }

    #[test]
    fn status_parses_from_query_strings() {
        assert_eq!(
            TournamentStatus::from_str("ongoing").unwrap(),
            TournamentStatus::Ongoing
        );
        assert_eq!(TournamentStatus::Upcoming.to_string(), "upcoming");
        assert!(TournamentStatus::from_str("cancelled").is_err());
    }

    #[test]
    fn new_tournament_is_upcoming_at_round_zero() {
        let tournament = TournamentModel::new("club", "Spring Open", Some(5), None);
        assert_eq!(tournament.status, TournamentStatus::Upcoming);
        assert_eq!(tournament.current_round, 0);
        assert!(!tournament.all_rounds_played());
    }

    #[test]
    fn open_ended_tournament_never_runs_out_of_rounds() {
        let mut tournament = TournamentModel::new("club", "Ladder", None, None);
        tournament.current_round = 40;
        assert!(!tournament.all_rounds_played());
    }
}
