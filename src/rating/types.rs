use serde::{Deserialize, Serialize};

use super::models::{RankingEntry, RatingHistoryEntry};

/// Request payload for joining a club
#[derive(Debug, Deserialize)]
pub struct JoinClubRequest {
    pub player_id: String,
}

/// Response for the club ranking endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct RankingResponse {
    pub club_id: String,
    pub players: Vec<RankingEntry>,
}

/// Response for the rating history endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub club_id: String,
    pub player_id: String,
    pub entries: Vec<RatingHistoryEntry>,
}
