use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::models::{FinalRankingEntry, Pairing, TournamentModel, TournamentStatus};
use crate::matches::models::Outcome;

#[derive(Debug, Deserialize)]
pub struct CreateTournamentRequest {
    pub name: String,
    pub round_count_target: Option<u32>,
    pub starts_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterPlayerRequest {
    pub player_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GenerateRoundQuery {
    #[serde(default)]
    pub force: bool,
}

/// `?status=upcoming,ongoing`
#[derive(Debug, Default, Deserialize)]
pub struct ListTournamentsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TournamentListResponse {
    pub club_id: String,
    pub tournaments: Vec<TournamentModel>,
}

/// A pairing together with the result reported so far
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairingView {
    pub round_number: u32,
    pub board: u32,
    pub player_a: String,
    pub player_b: Option<String>,
    pub match_id: Option<String>,
    pub outcome: Option<Outcome>,
}

impl PairingView {
    pub fn new(pairing: Pairing, outcome: Option<Outcome>) -> Self {
        Self {
            round_number: pairing.round_number,
            board: pairing.board,
            player_a: pairing.player_a,
            player_b: pairing.player_b,
            match_id: pairing.match_id,
            outcome,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PairingsResponse {
    pub tournament_id: String,
    pub pairings: Vec<PairingView>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinalRankingResponse {
    pub tournament_id: String,
    pub status: TournamentStatus,
    pub entries: Vec<FinalRankingEntry>,
}
