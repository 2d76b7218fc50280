use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{MatchModel, Outcome};
use crate::shared::AppError;
use crate::store::map_sqlx_error;

/// Persistence for matches and their outcomes
#[async_trait]
pub trait MatchRepository: Send + Sync {
    /// Inserts a batch of matches. `Conflict` when an id already exists or a
    /// player would appear twice in the same tournament round.
    async fn create_matches(&self, matches: &[MatchModel]) -> Result<(), AppError>;

    async fn get_match(&self, match_id: &str) -> Result<Option<MatchModel>, AppError>;

    async fn list_for_tournament(&self, tournament_id: &str) -> Result<Vec<MatchModel>, AppError>;

    /// Sets the outcome only if none is recorded yet
    async fn claim_outcome(
        &self,
        match_id: &str,
        outcome: Outcome,
        reported_at: DateTime<Utc>,
    ) -> Result<MatchModel, AppError>;

    /// Clears a claimed outcome again (used when rating application fails)
    async fn release_outcome(&self, match_id: &str) -> Result<(), AppError>;

    /// Deletes every match of one tournament round together with its round
    /// slots; returns how many matches were removed
    async fn discard_round(&self, tournament_id: &str, round_number: u32)
        -> Result<u64, AppError>;
}

/// In-memory implementation of MatchRepository for development and testing
#[derive(Default)]
pub struct InMemoryMatchRepository {
    matches: Mutex<HashMap<String, MatchModel>>,
}

impl InMemoryMatchRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MatchModel>>, AppError> {
        self.matches.lock().map_err(|_| AppError::Internal)
    }
}

/// (tournament, round, player) slots taken by a match
fn round_slots(game: &MatchModel) -> Vec<(String, u32, String)> {
    match (&game.tournament_id, game.round_number) {
        (Some(tournament_id), Some(round)) => vec![
            (tournament_id.clone(), round, game.player_a.clone()),
            (tournament_id.clone(), round, game.player_b.clone()),
        ],
        _ => Vec::new(),
    }
}

#[async_trait]
impl MatchRepository for InMemoryMatchRepository {
    #[instrument(skip(self, matches))]
    async fn create_matches(&self, matches: &[MatchModel]) -> Result<(), AppError> {
        let mut stored = self.matches()?;

        let mut taken: HashSet<(String, u32, String)> =
            stored.values().flat_map(round_slots).collect();
        for game in matches {
            if stored.contains_key(&game.id) {
                return Err(AppError::Conflict(format!("match {} already exists", game.id)));
            }
            for slot in round_slots(game) {
                if !taken.insert(slot.clone()) {
                    warn!(tournament_id = %slot.0, round = slot.1, player_id = %slot.2, "Player already paired this round");
                    return Err(AppError::Conflict(format!(
                        "player {} already has a match in round {}",
                        slot.2, slot.1
                    )));
                }
            }
        }

        for game in matches {
            stored.insert(game.id.clone(), game.clone());
        }
        debug!(created = matches.len(), "Matches created in memory");
        Ok(())
    }

    async fn get_match(&self, match_id: &str) -> Result<Option<MatchModel>, AppError> {
        Ok(self.matches()?.get(match_id).cloned())
    }

    async fn list_for_tournament(&self, tournament_id: &str) -> Result<Vec<MatchModel>, AppError> {
        let mut found: Vec<MatchModel> = self
            .matches()?
            .values()
            .filter(|m| m.tournament_id.as_deref() == Some(tournament_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.round_number
                .cmp(&b.round_number)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn claim_outcome(
        &self,
        match_id: &str,
        outcome: Outcome,
        reported_at: DateTime<Utc>,
    ) -> Result<MatchModel, AppError> {
        let mut stored = self.matches()?;
        let game = stored
            .get_mut(match_id)
            .ok_or_else(|| AppError::NotFound(format!("match {} not found", match_id)))?;

        if game.outcome.is_some() {
            return Err(AppError::duplicate_result(match_id));
        }
        game.outcome = Some(outcome);
        game.reported_at = Some(reported_at);
        Ok(game.clone())
    }

    #[instrument(skip(self))]
    async fn release_outcome(&self, match_id: &str) -> Result<(), AppError> {
        let mut stored = self.matches()?;
        if let Some(game) = stored.get_mut(match_id) {
            game.outcome = None;
            game.reported_at = None;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn discard_round(
        &self,
        tournament_id: &str,
        round_number: u32,
    ) -> Result<u64, AppError> {
        let mut stored = self.matches()?;
        let before = stored.len();
        stored.retain(|_, m| {
            !(m.tournament_id.as_deref() == Some(tournament_id)
                && m.round_number == Some(round_number))
        });
        Ok((before - stored.len()) as u64)
    }
}

/// PostgreSQL implementation of MatchRepository
pub struct PostgresMatchRepository {
    pool: PgPool,
}

impl PostgresMatchRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const MATCH_COLUMNS: &str =
    "id, club_id, tournament_id, round_number, player_a, player_b, outcome, created_at, reported_at";

fn match_from_row(row: &PgRow) -> MatchModel {
    let outcome: Option<String> = row.get("outcome");
    let round_number: Option<i32> = row.get("round_number");
    MatchModel {
        id: row.get("id"),
        club_id: row.get("club_id"),
        tournament_id: row.get("tournament_id"),
        round_number: round_number.map(|r| r.max(0) as u32),
        player_a: row.get("player_a"),
        player_b: row.get("player_b"),
        outcome: outcome.and_then(|o| Outcome::from_str(&o).ok()),
        created_at: row.get("created_at"),
        reported_at: row.get("reported_at"),
    }
}

#[async_trait]
impl MatchRepository for PostgresMatchRepository {
    #[instrument(skip(self, matches))]
    async fn create_matches(&self, matches: &[MatchModel]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        for game in matches {
            sqlx::query(
                "INSERT INTO matches (id, club_id, tournament_id, round_number, player_a, player_b, outcome, created_at, reported_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&game.id)
            .bind(&game.club_id)
            .bind(&game.tournament_id)
            .bind(game.round_number.map(|r| r as i32))
            .bind(&game.player_a)
            .bind(&game.player_b)
            .bind(game.outcome.map(|o| o.to_string()))
            .bind(game.created_at)
            .bind(game.reported_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            for (tournament_id, round_number, player_id) in round_slots(game) {
                sqlx::query(
                    "INSERT INTO match_round_slots (tournament_id, round_number, player_id, match_id) \
                     VALUES ($1, $2, $3, $4)",
                )
                .bind(tournament_id)
                .bind(round_number as i32)
                .bind(player_id)
                .bind(&game.id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_match(&self, match_id: &str) -> Result<Option<MatchModel>, AppError> {
        let row = sqlx::query(&format!("SELECT {} FROM matches WHERE id = $1", MATCH_COLUMNS))
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(match_from_row))
    }

    #[instrument(skip(self))]
    async fn list_for_tournament(&self, tournament_id: &str) -> Result<Vec<MatchModel>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM matches WHERE tournament_id = $1 ORDER BY round_number ASC, created_at ASC, id ASC",
            MATCH_COLUMNS
        ))
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(match_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn claim_outcome(
        &self,
        match_id: &str,
        outcome: Outcome,
        reported_at: DateTime<Utc>,
    ) -> Result<MatchModel, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE matches SET outcome = $2, reported_at = $3 WHERE id = $1 AND outcome IS NULL RETURNING {}",
            MATCH_COLUMNS
        ))
        .bind(match_id)
        .bind(outcome.to_string())
        .bind(reported_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(match_from_row(&row)),
            None => match self.get_match(match_id).await? {
                Some(_) => Err(AppError::duplicate_result(match_id)),
                None => Err(AppError::NotFound(format!("match {} not found", match_id))),
            },
        }
    }

    #[instrument(skip(self))]
    async fn release_outcome(&self, match_id: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE matches SET outcome = NULL, reported_at = NULL WHERE id = $1")
            .bind(match_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn discard_round(
        &self,
        tournament_id: &str,
        round_number: u32,
    ) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM match_round_slots WHERE tournament_id = $1 AND round_number = $2")
            .bind(tournament_id)
            .bind(round_number as i32)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let result =
            sqlx::query("DELETE FROM matches WHERE tournament_id = $1 AND round_number = $2")
                .bind(tournament_id)
                .bind(round_number as i32)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
