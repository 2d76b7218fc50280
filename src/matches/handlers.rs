use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{info, instrument};

use super::types::{ReportGameRequest, SubmitResultRequest, SubmitResultResponse};
use crate::shared::{AppError, AppState};

/// HTTP handler for submitting the result of an existing match
///
/// POST /matches/:match_id/result
#[instrument(name = "submit_result", skip(state))]
pub async fn submit_result(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Json(request): Json<SubmitResultRequest>,
) -> Result<Json<SubmitResultResponse>, AppError> {
    info!(match_id = %match_id, outcome = %request.outcome, "Submitting match result");

    let response = state
        .matches
        .submit_result(&match_id, request.outcome)
        .await?;
    Ok(Json(response))
}

/// HTTP handler for reporting a casual game between two club members
///
/// POST /clubs/:club_id/games
#[instrument(name = "report_game", skip(state))]
pub async fn report_game(
    State(state): State<AppState>,
    Path(club_id): Path<String>,
    Json(request): Json<ReportGameRequest>,
) -> Result<Json<SubmitResultResponse>, AppError> {
    let response = state
        .matches
        .report_game(
            &club_id,
            &request.player_a,
            &request.player_b,
            request.outcome,
        )
        .await?;
    Ok(Json(response))
}
