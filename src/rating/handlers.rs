use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{info, instrument};

use super::{
    models::ClubMember,
    types::{HistoryResponse, JoinClubRequest, RankingResponse},
};
use crate::shared::{AppError, AppState};

/// HTTP handler for joining a club
///
/// POST /clubs/:club_id/members
#[instrument(name = "join_club", skip(state))]
pub async fn join_club(
    State(state): State<AppState>,
    Path(club_id): Path<String>,
    Json(request): Json<JoinClubRequest>,
) -> Result<(StatusCode, Json<ClubMember>), AppError> {
    let member = state.ratings.join_club(&club_id, &request.player_id).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// HTTP handler for the club-wide rating ranking
///
/// GET /clubs/:club_id/ranking
#[instrument(name = "club_ranking", skip(state))]
pub async fn club_ranking(
    State(state): State<AppState>,
    Path(club_id): Path<String>,
) -> Result<Json<RankingResponse>, AppError> {
    let players = state.ratings.ranking(&club_id).await?;
    info!(club_id = %club_id, player_count = players.len(), "Ranking served");

    Ok(Json(RankingResponse { club_id, players }))
}

/// HTTP handler for one player's rating history
///
/// GET /clubs/:club_id/members/:player_id/history
#[instrument(name = "player_history", skip(state))]
pub async fn player_history(
    State(state): State<AppState>,
    Path((club_id, player_id)): Path<(String, String)>,
) -> Result<Json<HistoryResponse>, AppError> {
    let entries = state.ratings.history(&club_id, &player_id).await?;

    Ok(Json(HistoryResponse {
        club_id,
        player_id,
        entries,
    }))
}
