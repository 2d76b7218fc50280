use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, error, instrument, warn};

use super::models::{FinalRankingEntry, Pairing, TournamentModel, TournamentPlayer, TournamentStatus};
use crate::shared::AppError;
use crate::store::map_sqlx_error;

/// Persistence for tournaments, their registrations, rounds and results
#[async_trait]
pub trait TournamentRepository: Send + Sync {
    async fn create_tournament(&self, tournament: &TournamentModel) -> Result<(), AppError>;

    async fn get_tournament(&self, tournament_id: &str)
        -> Result<Option<TournamentModel>, AppError>;

    /// Tournaments of a club ordered by `starts_at` (unscheduled last), then
    /// `created_at`. An empty status filter returns every tournament.
    async fn list_for_club(
        &self,
        club_id: &str,
        statuses: &[TournamentStatus],
    ) -> Result<Vec<TournamentModel>, AppError>;

    /// Moves status and round counter only if the tournament is still in
    /// `expected_status` at `expected_round`; `Conflict` otherwise.
    async fn update_progress(
        &self,
        tournament_id: &str,
        expected_status: TournamentStatus,
        expected_round: u32,
        status: TournamentStatus,
        current_round: u32,
    ) -> Result<TournamentModel, AppError>;

    /// `Conflict` if the player is already registered
    async fn add_player(&self, player: &TournamentPlayer) -> Result<(), AppError>;

    /// Registered players in registration order
    async fn list_players(&self, tournament_id: &str) -> Result<Vec<TournamentPlayer>, AppError>;

    async fn set_starting_ratings(
        &self,
        tournament_id: &str,
        ratings: &[(String, i32)],
    ) -> Result<(), AppError>;

    /// Stores the pairings of one round; `Conflict` if the round already exists
    async fn insert_round(
        &self,
        tournament_id: &str,
        round_number: u32,
        pairings: &[Pairing],
    ) -> Result<(), AppError>;

    /// Every pairing ordered by round, then board
    async fn list_pairings(&self, tournament_id: &str) -> Result<Vec<Pairing>, AppError>;

    /// Deletes the pairings of one round; returns how many were removed
    async fn discard_round(&self, tournament_id: &str, round_number: u32)
        -> Result<u64, AppError>;

    /// Drops any previous final ranking and stores the given one
    async fn replace_final_ranking(
        &self,
        tournament_id: &str,
        entries: &[FinalRankingEntry],
    ) -> Result<(), AppError>;

    async fn final_ranking(&self, tournament_id: &str) -> Result<Vec<FinalRankingEntry>, AppError>;
}

fn schedule_order(a: &TournamentModel, b: &TournamentModel) -> Ordering {
    let starts = match (a.starts_at, b.starts_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    starts
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

fn not_found(tournament_id: &str) -> AppError {
    AppError::NotFound(format!("tournament {} not found", tournament_id))
}

#[derive(Default)]
struct TournamentTables {
    tournaments: HashMap<String, TournamentModel>,
    players: HashMap<String, Vec<TournamentPlayer>>,
    pairings: HashMap<String, Vec<Pairing>>,
    final_rankings: HashMap<String, Vec<FinalRankingEntry>>,
}

/// In-memory implementation of TournamentRepository for development and testing
#[derive(Default)]
pub struct InMemoryTournamentRepository {
    tables: Mutex<TournamentTables>,
}

impl InMemoryTournamentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, TournamentTables>, AppError> {
        self.tables.lock().map_err(|_| AppError::Internal)
    }
}

#[async_trait]
impl TournamentRepository for InMemoryTournamentRepository {
    #[instrument(skip(self, tournament))]
    async fn create_tournament(&self, tournament: &TournamentModel) -> Result<(), AppError> {
        let mut tables = self.tables()?;
        if tables.tournaments.contains_key(&tournament.id) {
            return Err(AppError::Conflict(format!(
                "tournament {} already exists",
                tournament.id
            )));
        }
        tables
            .tournaments
            .insert(tournament.id.clone(), tournament.clone());
        debug!(tournament_id = %tournament.id, "Tournament created in memory");
        Ok(())
    }

    async fn get_tournament(
        &self,
        tournament_id: &str,
    ) -> Result<Option<TournamentModel>, AppError> {
        Ok(self.tables()?.tournaments.get(tournament_id).cloned())
    }

    async fn list_for_club(
        &self,
        club_id: &str,
        statuses: &[TournamentStatus],
    ) -> Result<Vec<TournamentModel>, AppError> {
        let mut found: Vec<TournamentModel> = self
            .tables()?
            .tournaments
            .values()
            .filter(|t| t.club_id == club_id)
            .filter(|t| statuses.is_empty() || statuses.contains(&t.status))
            .cloned()
            .collect();
        found.sort_by(schedule_order);
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn update_progress(
        &self,
        tournament_id: &str,
        expected_status: TournamentStatus,
        expected_round: u32,
        status: TournamentStatus,
        current_round: u32,
    ) -> Result<TournamentModel, AppError> {
        let mut tables = self.tables()?;
        let tournament = tables
            .tournaments
            .get_mut(tournament_id)
            .ok_or_else(|| not_found(tournament_id))?;

        if tournament.status != expected_status || tournament.current_round != expected_round {
            warn!(
                tournament_id = %tournament_id,
                status = %tournament.status,
                current_round = tournament.current_round,
                "Tournament moved on concurrently"
            );
            return Err(AppError::Conflict(format!(
                "tournament {} is {} at round {}",
                tournament_id, tournament.status, tournament.current_round
            )));
        }
        tournament.status = status;
        tournament.current_round = current_round;
        Ok(tournament.clone())
    }

    #[instrument(skip(self, player))]
    async fn add_player(&self, player: &TournamentPlayer) -> Result<(), AppError> {
        let mut tables = self.tables()?;
        let players = tables
            .players
            .entry(player.tournament_id.clone())
            .or_default();
        if players.iter().any(|p| p.player_id == player.player_id) {
            return Err(AppError::Conflict(format!(
                "player {} is already registered",
                player.player_id
            )));
        }
        players.push(player.clone());
        Ok(())
    }

    async fn list_players(&self, tournament_id: &str) -> Result<Vec<TournamentPlayer>, AppError> {
        Ok(self
            .tables()?
            .players
            .get(tournament_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_starting_ratings(
        &self,
        tournament_id: &str,
        ratings: &[(String, i32)],
    ) -> Result<(), AppError> {
        let mut tables = self.tables()?;
        if let Some(players) = tables.players.get_mut(tournament_id) {
            for (player_id, rating) in ratings {
                if let Some(player) = players.iter_mut().find(|p| &p.player_id == player_id) {
                    player.starting_rating = *rating;
                }
            }
        }
        Ok(())
    }

    #[instrument(skip(self, pairings))]
    async fn insert_round(
        &self,
        tournament_id: &str,
        round_number: u32,
        pairings: &[Pairing],
    ) -> Result<(), AppError> {
        let mut tables = self.tables()?;
        let stored = tables.pairings.entry(tournament_id.to_string()).or_default();
        if stored.iter().any(|p| p.round_number == round_number) {
            return Err(AppError::Conflict(format!(
                "round {} of tournament {} already exists",
                round_number, tournament_id
            )));
        }
        stored.extend(pairings.iter().cloned());
        Ok(())
    }

    async fn list_pairings(&self, tournament_id: &str) -> Result<Vec<Pairing>, AppError> {
        let mut pairings = self
            .tables()?
            .pairings
            .get(tournament_id)
            .cloned()
            .unwrap_or_default();
        pairings.sort_by_key(|p| (p.round_number, p.board));
        Ok(pairings)
    }

    #[instrument(skip(self))]
    async fn discard_round(
        &self,
        tournament_id: &str,
        round_number: u32,
    ) -> Result<u64, AppError> {
        let mut tables = self.tables()?;
        let Some(stored) = tables.pairings.get_mut(tournament_id) else {
            return Ok(0);
        };
        let before = stored.len();
        stored.retain(|p| p.round_number != round_number);
        Ok((before - stored.len()) as u64)
    }

    async fn replace_final_ranking(
        &self,
        tournament_id: &str,
        entries: &[FinalRankingEntry],
    ) -> Result<(), AppError> {
        self.tables()?
            .final_rankings
            .insert(tournament_id.to_string(), entries.to_vec());
        Ok(())
    }

    async fn final_ranking(&self, tournament_id: &str) -> Result<Vec<FinalRankingEntry>, AppError> {
        let mut entries = self
            .tables()?
            .final_rankings
            .get(tournament_id)
            .cloned()
            .unwrap_or_default();
        entries.sort_by_key(|e| e.rank);
        Ok(entries)
    }
}

/// PostgreSQL implementation of TournamentRepository
pub struct PostgresTournamentRepository {
    pool: PgPool,
}

impl PostgresTournamentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TOURNAMENT_COLUMNS: &str =
    "id, club_id, name, status, current_round, round_count_target, starts_at, created_at";

fn tournament_from_row(row: &PgRow) -> Result<TournamentModel, AppError> {
    let status: String = row.get("status");
    let status = stored_status(&status)?;
    let current_round: i32 = row.get("current_round");
    let round_count_target: Option<i32> = row.get("round_count_target");

    Ok(TournamentModel {
        id: row.get("id"),
        club_id: row.get("club_id"),
        name: row.get("name"),
        status,
        current_round: current_round.max(0) as u32,
        round_count_target: round_count_target.map(|r| r.max(0) as u32),
        starts_at: row.get("starts_at"),
        created_at: row.get("created_at"),
    })
}

/// Corrupt rows are not worth a retry
fn stored_status(raw: &str) -> Result<TournamentStatus, AppError> {
    TournamentStatus::from_str(raw).map_err(|_| {
        error!(status = %raw, "Unknown tournament status in storage");
        AppError::Internal
    })
}

fn pairing_from_row(row: &PgRow) -> Pairing {
    let round_number: i32 = row.get("round_number");
    let board: i32 = row.get("board");
    Pairing {
        tournament_id: row.get("tournament_id"),
        round_number: round_number.max(0) as u32,
        board: board.max(0) as u32,
        player_a: row.get("player_a"),
        player_b: row.get("player_b"),
        match_id: row.get("match_id"),
    }
}

#[async_trait]
impl TournamentRepository for PostgresTournamentRepository {
    #[instrument(skip(self, tournament))]
    async fn create_tournament(&self, tournament: &TournamentModel) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO tournaments (id, club_id, name, status, current_round, round_count_target, starts_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&tournament.id)
        .bind(&tournament.club_id)
        .bind(&tournament.name)
        .bind(tournament.status.to_string())
        .bind(tournament.current_round as i32)
        .bind(tournament.round_count_target.map(|r| r as i32))
        .bind(tournament.starts_at)
        .bind(tournament.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_tournament(
        &self,
        tournament_id: &str,
    ) -> Result<Option<TournamentModel>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM tournaments WHERE id = $1",
            TOURNAMENT_COLUMNS
        ))
        .bind(tournament_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(tournament_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn list_for_club(
        &self,
        club_id: &str,
        statuses: &[TournamentStatus],
    ) -> Result<Vec<TournamentModel>, AppError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM tournaments \
             WHERE club_id = $1 AND (cardinality($2::text[]) = 0 OR status = ANY($2)) \
             ORDER BY starts_at ASC NULLS LAST, created_at ASC, id ASC",
            TOURNAMENT_COLUMNS
        ))
        .bind(club_id)
        .bind(&statuses)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(tournament_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn update_progress(
        &self,
        tournament_id: &str,
        expected_status: TournamentStatus,
        expected_round: u32,
        status: TournamentStatus,
        current_round: u32,
    ) -> Result<TournamentModel, AppError> {
        let row = sqlx::query(&format!(
            "UPDATE tournaments SET status = $4, current_round = $5 \
             WHERE id = $1 AND status = $2 AND current_round = $3 RETURNING {}",
            TOURNAMENT_COLUMNS
        ))
        .bind(tournament_id)
        .bind(expected_status.to_string())
        .bind(expected_round as i32)
        .bind(status.to_string())
        .bind(current_round as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => tournament_from_row(&row),
            None => match self.get_tournament(tournament_id).await? {
                Some(current) => {
                    warn!(tournament_id = %tournament_id, status = %current.status, "Tournament moved on concurrently");
                    Err(AppError::Conflict(format!(
                        "tournament {} is {} at round {}",
                        tournament_id, current.status, current.current_round
                    )))
                }
                None => Err(not_found(tournament_id)),
            },
        }
    }

    #[instrument(skip(self, player))]
    async fn add_player(&self, player: &TournamentPlayer) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO tournament_players (tournament_id, player_id, starting_rating, registered_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&player.tournament_id)
        .bind(&player.player_id)
        .bind(player.starting_rating)
        .bind(player.registered_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_players(&self, tournament_id: &str) -> Result<Vec<TournamentPlayer>, AppError> {
        let rows = sqlx::query(
            "SELECT tournament_id, player_id, starting_rating, registered_at FROM tournament_players \
             WHERE tournament_id = $1 ORDER BY registered_at ASC, player_id ASC",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .iter()
            .map(|row| TournamentPlayer {
                tournament_id: row.get("tournament_id"),
                player_id: row.get("player_id"),
                starting_rating: row.get("starting_rating"),
                registered_at: row.get("registered_at"),
            })
            .collect())
    }

    #[instrument(skip(self, ratings))]
    async fn set_starting_ratings(
        &self,
        tournament_id: &str,
        ratings: &[(String, i32)],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        for (player_id, rating) in ratings {
            sqlx::query(
                "UPDATE tournament_players SET starting_rating = $3 WHERE tournament_id = $1 AND player_id = $2",
            )
            .bind(tournament_id)
            .bind(player_id)
            .bind(rating)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self, pairings))]
    async fn insert_round(
        &self,
        tournament_id: &str,
        round_number: u32,
        pairings: &[Pairing],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Primary key (tournament_id, round_number, board) rejects a second copy of the round
        for pairing in pairings {
            sqlx::query(
                "INSERT INTO pairings (tournament_id, round_number, board, player_a, player_b, match_id) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(tournament_id)
            .bind(round_number as i32)
            .bind(pairing.board as i32)
            .bind(&pairing.player_a)
            .bind(&pairing.player_b)
            .bind(&pairing.match_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_pairings(&self, tournament_id: &str) -> Result<Vec<Pairing>, AppError> {
        let rows = sqlx::query(
            "SELECT tournament_id, round_number, board, player_a, player_b, match_id FROM pairings \
             WHERE tournament_id = $1 ORDER BY round_number ASC, board ASC",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(pairing_from_row).collect())
    }

    #[instrument(skip(self))]
    async fn discard_round(
        &self,
        tournament_id: &str,
        round_number: u32,
    ) -> Result<u64, AppError> {
        let result =
            sqlx::query("DELETE FROM pairings WHERE tournament_id = $1 AND round_number = $2")
                .bind(tournament_id)
                .bind(round_number as i32)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, entries))]
    async fn replace_final_ranking(
        &self,
        tournament_id: &str,
        entries: &[FinalRankingEntry],
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM final_rankings WHERE tournament_id = $1")
            .bind(tournament_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO final_rankings (tournament_id, rank, player_id, score, tiebreak_value) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(tournament_id)
            .bind(entry.rank as i32)
            .bind(&entry.player_id)
            .bind(entry.score)
            .bind(entry.tiebreak_value)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn final_ranking(&self, tournament_id: &str) -> Result<Vec<FinalRankingEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT tournament_id, rank, player_id, score, tiebreak_value FROM final_rankings \
             WHERE tournament_id = $1 ORDER BY rank ASC",
        )
        .bind(tournament_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows
            .iter()
            .map(|row| {
                let rank: i32 = row.get("rank");
                FinalRankingEntry {
                    tournament_id: row.get("tournament_id"),
                    rank: rank.max(0) as u32,
                    player_id: row.get("player_id"),
                    score: row.get("score"),
                    tiebreak_value: row.get("tiebreak_value"),
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn pairing(tournament_id: &str, round_number: u32, board: u32, a: &str, b: Option<&str>) -> Pairing {
        Pairing {
            tournament_id: tournament_id.to_string(),
            round_number,
            board,
            player_a: a.to_string(),
            player_b: b.map(str::to_string),
            match_id: None,
        }
    }

    #[tokio::test]
    async fn list_for_club_orders_by_schedule_and_filters_status() {
        let repo = InMemoryTournamentRepository::new();
        let now = Utc::now();

        let later = TournamentModel::new("club", "Later", None, Some(now + Duration::days(7)));
        let sooner = TournamentModel::new("club", "Sooner", None, Some(now + Duration::days(1)));
        let unscheduled = TournamentModel::new("club", "Someday", None, None);
        let mut finished = TournamentModel::new("club", "Done", None, Some(now));
        finished.status = TournamentStatus::Completed;
        let elsewhere = TournamentModel::new("other", "Elsewhere", None, None);

        for t in [&later, &sooner, &unscheduled, &finished, &elsewhere] {
            repo.create_tournament(t).await.unwrap();
        }

        let active = repo
            .list_for_club(
                "club",
                &[TournamentStatus::Upcoming, TournamentStatus::Ongoing],
            )
            .await
            .unwrap();
        let names: Vec<&str> = active.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Sooner", "Later", "Someday"]);

        let all = repo.list_for_club("club", &[]).await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].name, "Done");
    }

    #[tokio::test]
    async fn update_progress_is_compare_and_swap() {
        let repo = InMemoryTournamentRepository::new();
        let tournament = TournamentModel::new("club", "Open", None, None);
        repo.create_tournament(&tournament).await.unwrap();

        let started = repo
            .update_progress(
                &tournament.id,
                TournamentStatus::Upcoming,
                0,
                TournamentStatus::Ongoing,
                0,
            )
            .await
            .unwrap();
        assert_eq!(started.status, TournamentStatus::Ongoing);

        let stale = repo
            .update_progress(
                &tournament.id,
                TournamentStatus::Upcoming,
                0,
                TournamentStatus::Ongoing,
                0,
            )
            .await;
        assert!(matches!(stale, Err(AppError::Conflict(_))));

        let missing = repo
            .update_progress("nope", TournamentStatus::Upcoming, 0, TournamentStatus::Ongoing, 0)
            .await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict() {
        let repo = InMemoryTournamentRepository::new();
        let player = TournamentPlayer {
            tournament_id: "t".to_string(),
            player_id: "alice".to_string(),
            starting_rating: 1500,
            registered_at: Utc::now(),
        };

        repo.add_player(&player).await.unwrap();
        assert!(matches!(
            repo.add_player(&player).await,
            Err(AppError::Conflict(_))
        ));

        repo.set_starting_ratings("t", &[("alice".to_string(), 1620)])
            .await
            .unwrap();
        assert_eq!(repo.list_players("t").await.unwrap()[0].starting_rating, 1620);
    }

    #[tokio::test]
    async fn a_round_can_only_be_inserted_once() {
        let repo = InMemoryTournamentRepository::new();
        repo.insert_round("t", 1, &[pairing("t", 1, 1, "a", Some("b"))])
            .await
            .unwrap();

        let again = repo
            .insert_round("t", 1, &[pairing("t", 1, 1, "c", Some("d"))])
            .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        repo.insert_round(
            "t",
            2,
            &[pairing("t", 2, 2, "a", None), pairing("t", 2, 1, "b", Some("c"))],
        )
        .await
        .unwrap();

        let boards: Vec<(u32, u32)> = repo
            .list_pairings("t")
            .await
            .unwrap()
            .iter()
            .map(|p| (p.round_number, p.board))
            .collect();
        assert_eq!(boards, vec![(1, 1), (2, 1), (2, 2)]);
    }

    #[tokio::test]
    async fn discarded_round_can_be_inserted_again() {
        let repo = InMemoryTournamentRepository::new();
        repo.insert_round("t", 1, &[pairing("t", 1, 1, "a", Some("b"))])
            .await
            .unwrap();
        repo.insert_round("t", 2, &[pairing("t", 2, 1, "a", Some("c"))])
            .await
            .unwrap();

        assert_eq!(repo.discard_round("t", 2).await.unwrap(), 1);
        assert_eq!(repo.discard_round("t", 2).await.unwrap(), 0);
        assert_eq!(repo.discard_round("other", 1).await.unwrap(), 0);

        repo.insert_round("t", 2, &[pairing("t", 2, 1, "a", Some("d"))])
            .await
            .unwrap();
        let pairings = repo.list_pairings("t").await.unwrap();
        assert_eq!(pairings.len(), 2);
        assert_eq!(pairings[1].player_b.as_deref(), Some("d"));
    }

    #[tokio::test]
    async fn final_ranking_is_replaced_wholesale() {
        let repo = InMemoryTournamentRepository::new();
        let entry = |rank: u32, player_id: &str| FinalRankingEntry {
            tournament_id: "t".to_string(),
            rank,
            player_id: player_id.to_string(),
            score: 0.0,
            tiebreak_value: 0.0,
        };

        repo.replace_final_ranking("t", &[entry(1, "a"), entry(2, "b"), entry(3, "c")])
            .await
            .unwrap();
        repo.replace_final_ranking("t", &[entry(2, "a"), entry(1, "b")])
            .await
            .unwrap();

        let stored = repo.final_ranking("t").await.unwrap();
        let order: Vec<&str> = stored.iter().map(|e| e.player_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn unknown_stored_status_is_internal() {
        assert_eq!(stored_status("ongoing"), Ok(TournamentStatus::Ongoing));

        let corrupt = stored_status("paused");
        assert_eq!(corrupt, Err(AppError::Internal));
        assert!(!AppError::Internal.is_transient());
    }
}
