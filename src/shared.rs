use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::locks::KeyedLocks;
use crate::matches::{
    repository::{InMemoryMatchRepository, MatchRepository, PostgresMatchRepository},
    MatchService,
};
use crate::rating::{
    repository::{InMemoryRatingRepository, PostgresRatingRepository, RatingRepository},
    RatingStore,
};
use crate::tournament::{
    repository::{
        InMemoryTournamentRepository, PostgresTournamentRepository, TournamentRepository,
    },
    TournamentService,
};

/// Shared application state containing all services
#[derive(Clone)]
pub struct AppState {
    pub ratings: Arc<RatingStore>,
    pub matches: Arc<MatchService>,
    pub tournaments: Arc<TournamentService>,
}

impl AppState {
    /// Wires the services on top of the given repositories
    pub fn new(
        config: EngineConfig,
        rating_repository: Arc<dyn RatingRepository>,
        match_repository: Arc<dyn MatchRepository>,
        tournament_repository: Arc<dyn TournamentRepository>,
    ) -> Self {
        let config = Arc::new(config);
        let tournament_locks = KeyedLocks::new();
        let ratings = Arc::new(RatingStore::new(rating_repository, config.clone()));
        let matches = Arc::new(MatchService::new(
            match_repository.clone(),
            ratings.clone(),
            config.clone(),
            tournament_locks.clone(),
        ));
        let tournaments = Arc::new(TournamentService::new(
            tournament_repository,
            match_repository,
            ratings.clone(),
            config,
            tournament_locks,
        ));

        Self {
            ratings,
            matches,
            tournaments,
        }
    }

    /// State backed by in-memory repositories (development and tests)
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryRatingRepository::new()),
            Arc::new(InMemoryMatchRepository::new()),
            Arc::new(InMemoryTournamentRepository::new()),
        )
    }

    /// State backed by PostgreSQL
    pub fn postgres(config: EngineConfig, pool: PgPool) -> Self {
        Self::new(
            config,
            Arc::new(PostgresRatingRepository::new(pool.clone())),
            Arc::new(PostgresMatchRepository::new(pool.clone())),
            Arc::new(PostgresTournamentRepository::new(pool)),
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unresolvable: {0}")]
    Unresolvable(String),

    /// Transient persistence failure, eligible for one retry
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn player_not_in_club(club_id: &str, player_id: &str) -> Self {
        AppError::NotFound(format!(
            "player {} is not a member of club {}",
            player_id, club_id
        ))
    }

    pub fn duplicate_result(match_id: &str) -> Self {
        AppError::Conflict(format!("match {} already has a result", match_id))
    }

    pub fn invalid_pairing(player_id: &str) -> Self {
        AppError::InvalidInput(format!("player {} cannot be paired with themself", player_id))
    }

    pub fn no_pairing_possible(reason: impl Into<String>) -> Self {
        AppError::Unresolvable(format!("no pairing possible: {}", reason.into()))
    }

    /// Whether the store call that produced this error may be retried
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::DatabaseError(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unresolvable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::DatabaseError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::StoreUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}
