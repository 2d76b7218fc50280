use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::str::FromStr;
use tracing::{info, instrument};

use super::{
    models::{FinalRankingEntry, TournamentModel, TournamentPlayer, TournamentStatus},
    types::{
        CreateTournamentRequest, FinalRankingResponse, GenerateRoundQuery, ListTournamentsQuery,
        PairingView, PairingsResponse, RegisterPlayerRequest, TournamentListResponse,
    },
};
use crate::shared::{AppError, AppState};

/// Parses a comma separated status filter such as `upcoming,ongoing`
fn parse_statuses(raw: Option<&str>) -> Result<Vec<TournamentStatus>, AppError> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            TournamentStatus::from_str(s)
                .map_err(|_| AppError::InvalidInput(format!("unknown tournament status {}", s)))
        })
        .collect()
}

/// POST /clubs/:club_id/tournaments
#[instrument(name = "create_tournament", skip(state))]
pub async fn create_tournament(
    State(state): State<AppState>,
    Path(club_id): Path<String>,
    Json(request): Json<CreateTournamentRequest>,
) -> Result<(StatusCode, Json<TournamentModel>), AppError> {
    let tournament = state
        .tournaments
        .create_tournament(
            &club_id,
            &request.name,
            request.round_count_target,
            request.starts_at,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(tournament)))
}

/// GET /clubs/:club_id/tournaments?status=a,b
#[instrument(name = "list_tournaments", skip(state))]
pub async fn list_tournaments(
    State(state): State<AppState>,
    Path(club_id): Path<String>,
    Query(query): Query<ListTournamentsQuery>,
) -> Result<Json<TournamentListResponse>, AppError> {
    let statuses = parse_statuses(query.status.as_deref())?;
    let tournaments = state
        .tournaments
        .list_tournaments(&club_id, &statuses)
        .await?;

    Ok(Json(TournamentListResponse {
        club_id,
        tournaments,
    }))
}

/// POST /tournaments/:tournament_id/players
#[instrument(name = "register_player", skip(state))]
pub async fn register_player(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
    Json(request): Json<RegisterPlayerRequest>,
) -> Result<(StatusCode, Json<TournamentPlayer>), AppError> {
    let player = state
        .tournaments
        .register_player(&tournament_id, &request.player_id)
        .await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// POST /tournaments/:tournament_id/start
#[instrument(name = "start_tournament", skip(state))]
pub async fn start_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> Result<Json<TournamentModel>, AppError> {
    let tournament = state.tournaments.start_tournament(&tournament_id).await?;
    Ok(Json(tournament))
}

/// HTTP handler for pairing the next Swiss round
///
/// POST /tournaments/:tournament_id/rounds?force=true
#[instrument(name = "generate_next_round", skip(state))]
pub async fn generate_next_round(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
    Query(query): Query<GenerateRoundQuery>,
) -> Result<(StatusCode, Json<PairingsResponse>), AppError> {
    info!(tournament_id = %tournament_id, force = query.force, "Generating next round");

    let pairings = state
        .tournaments
        .generate_next_round(&tournament_id, query.force)
        .await?
        .into_iter()
        .map(|pairing| PairingView::new(pairing, None))
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(PairingsResponse {
            tournament_id,
            pairings,
        }),
    ))
}

/// GET /tournaments/:tournament_id/pairings
#[instrument(name = "get_pairings", skip(state))]
pub async fn get_pairings(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> Result<Json<PairingsResponse>, AppError> {
    let pairings = state.tournaments.get_pairings(&tournament_id).await?;
    Ok(Json(PairingsResponse {
        tournament_id,
        pairings,
    }))
}

/// HTTP handler for closing a tournament and publishing its standings
///
/// POST /tournaments/:tournament_id/finalize
#[instrument(name = "finalize_tournament", skip(state))]
pub async fn finalize_tournament(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> Result<Json<Vec<FinalRankingEntry>>, AppError> {
    let ranking = state
        .tournaments
        .finalize_tournament(&tournament_id)
        .await?;
    Ok(Json(ranking))
}

/// GET /tournaments/:tournament_id/ranking
#[instrument(name = "final_ranking", skip(state))]
pub async fn final_ranking(
    State(state): State<AppState>,
    Path(tournament_id): Path<String>,
) -> Result<Json<FinalRankingResponse>, AppError> {
    let (tournament, entries) = state.tournaments.get_final_ranking(&tournament_id).await?;
    Ok(Json(FinalRankingResponse {
        tournament_id,
        status: tournament.status,
        entries,
    }))
}
