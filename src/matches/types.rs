use serde::{Deserialize, Serialize};

use super::models::Outcome;

/// Request payload for submitting a match result
#[derive(Debug, Deserialize)]
pub struct SubmitResultRequest {
    pub outcome: Outcome,
}

/// Request payload for reporting a casual game
#[derive(Debug, Deserialize)]
pub struct ReportGameRequest {
    pub player_a: String,
    pub player_b: String,
    pub outcome: Outcome,
}

/// Rating movement caused by one processed result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResultResponse {
    pub match_id: String,
    pub outcome: Outcome,
    pub delta_a: i32,
    pub delta_b: i32,
    pub rating_a: i32,
    pub rating_b: i32,
}
