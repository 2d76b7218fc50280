use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::models::{ClubMember, PlayerResult, RatingChange, RatingHistoryEntry};
use crate::shared::AppError;
use crate::store::map_sqlx_error;

/// Persistence for club memberships and the rating history
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Inserts a membership; `Conflict` if the player already belongs to the club
    async fn add_member(&self, member: &ClubMember) -> Result<(), AppError>;

    async fn get_member(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<Option<ClubMember>, AppError>;

    async fn list_members(&self, club_id: &str) -> Result<Vec<ClubMember>, AppError>;

    /// Applies every change or none of them. Each change reads the current
    /// rating, writes `current + delta` and appends one history entry.
    async fn apply_changes(
        &self,
        club_id: &str,
        changes: &[RatingChange],
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<RatingHistoryEntry>, AppError>;

    /// History for one player, oldest first
    async fn history(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<Vec<RatingHistoryEntry>, AppError>;
}

#[derive(Default)]
struct RatingTables {
    members: HashMap<(String, String), ClubMember>,
    history: HashMap<(String, String), Vec<RatingHistoryEntry>>,
    next_sequence: i64,
}

/// In-memory implementation of RatingRepository for development and testing
#[derive(Default)]
pub struct InMemoryRatingRepository {
    tables: Mutex<RatingTables>,
}

impl InMemoryRatingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<std::sync::MutexGuard<'_, RatingTables>, AppError> {
        self.tables.lock().map_err(|_| AppError::Internal)
    }
}

fn member_key(club_id: &str, player_id: &str) -> (String, String) {
    (club_id.to_string(), player_id.to_string())
}

#[async_trait]
impl RatingRepository for InMemoryRatingRepository {
    #[instrument(skip(self, member))]
    async fn add_member(&self, member: &ClubMember) -> Result<(), AppError> {
        debug!(club_id = %member.club_id, player_id = %member.player_id, "Adding member in memory");

        let mut tables = self.tables()?;
        let key = member_key(&member.club_id, &member.player_id);
        if tables.members.contains_key(&key) {
            warn!(club_id = %member.club_id, player_id = %member.player_id, "Member already exists");
            return Err(AppError::Conflict(format!(
                "player {} already belongs to club {}",
                member.player_id, member.club_id
            )));
        }
        tables.members.insert(key, member.clone());
        Ok(())
    }

    async fn get_member(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<Option<ClubMember>, AppError> {
        let tables = self.tables()?;
        Ok(tables.members.get(&member_key(club_id, player_id)).cloned())
    }

    async fn list_members(&self, club_id: &str) -> Result<Vec<ClubMember>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .members
            .values()
            .filter(|m| m.club_id == club_id)
            .cloned()
            .collect())
    }

    #[instrument(skip(self, changes))]
    async fn apply_changes(
        &self,
        club_id: &str,
        changes: &[RatingChange],
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<RatingHistoryEntry>, AppError> {
        let mut tables = self.tables()?;

        // Validate everything before touching any row
        for change in changes {
            if !tables
                .members
                .contains_key(&member_key(club_id, &change.player_id))
            {
                return Err(AppError::player_not_in_club(club_id, &change.player_id));
            }
        }

        let mut entries = Vec::with_capacity(changes.len());
        for change in changes {
            let key = member_key(club_id, &change.player_id);

            // History timestamps never go backwards for a player
            let last_recorded = tables
                .history
                .get(&key)
                .and_then(|h| h.last())
                .map(|e| e.recorded_at);
            let stamp = last_recorded.map_or(recorded_at, |last| last.max(recorded_at));

            tables.next_sequence += 1;
            let sequence = tables.next_sequence;

            let member = tables
                .members
                .get_mut(&key)
                .ok_or_else(|| AppError::player_not_in_club(club_id, &change.player_id))?;
            let old_rating = member.rating;
            member.rating += change.delta;
            if change.is_game() {
                member.games_played += 1;
            }

            let entry = RatingHistoryEntry {
                sequence,
                club_id: club_id.to_string(),
                player_id: change.player_id.clone(),
                recorded_at: stamp,
                old_rating,
                new_rating: member.rating,
                opponent_id: change.opponent_id.clone(),
                result: change.result,
                match_id: change.match_id.clone(),
                tournament_id: change.tournament_id.clone(),
            };
            tables.history.entry(key).or_default().push(entry.clone());
            entries.push(entry);
        }

        debug!(club_id = %club_id, applied = entries.len(), "Rating changes applied in memory");
        Ok(entries)
    }

    async fn history(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<Vec<RatingHistoryEntry>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .history
            .get(&member_key(club_id, player_id))
            .cloned()
            .unwrap_or_default())
    }
}

/// PostgreSQL implementation of RatingRepository
pub struct PostgresRatingRepository {
    pool: PgPool,
}

impl PostgresRatingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn member_from_row(row: &PgRow) -> ClubMember {
    ClubMember {
        club_id: row.get("club_id"),
        player_id: row.get("player_id"),
        rating: row.get("rating"),
        games_played: row.get::<i32, _>("games_played").max(0) as u32,
        joined_at: row.get("joined_at"),
    }
}

fn history_from_row(row: &PgRow) -> RatingHistoryEntry {
    let result: Option<String> = row.get("result");
    RatingHistoryEntry {
        sequence: row.get("id"),
        club_id: row.get("club_id"),
        player_id: row.get("player_id"),
        recorded_at: row.get("recorded_at"),
        old_rating: row.get("old_rating"),
        new_rating: row.get("new_rating"),
        opponent_id: row.get("opponent_id"),
        result: result.and_then(|r| PlayerResult::from_str(&r).ok()),
        match_id: row.get("match_id"),
        tournament_id: row.get("tournament_id"),
    }
}

#[async_trait]
impl RatingRepository for PostgresRatingRepository {
    #[instrument(skip(self, member))]
    async fn add_member(&self, member: &ClubMember) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO club_members (club_id, player_id, rating, games_played, joined_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&member.club_id)
        .bind(&member.player_id)
        .bind(member.rating)
        .bind(member.games_played as i32)
        .bind(member.joined_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_member(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<Option<ClubMember>, AppError> {
        let row = sqlx::query(
            "SELECT club_id, player_id, rating, games_played, joined_at FROM club_members WHERE club_id = $1 AND player_id = $2",
        )
        .bind(club_id)
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.as_ref().map(member_from_row))
    }

    #[instrument(skip(self))]
    async fn list_members(&self, club_id: &str) -> Result<Vec<ClubMember>, AppError> {
        let rows = sqlx::query(
            "SELECT club_id, player_id, rating, games_played, joined_at FROM club_members WHERE club_id = $1",
        )
        .bind(club_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(member_from_row).collect())
    }

    #[instrument(skip(self, changes))]
    async fn apply_changes(
        &self,
        club_id: &str,
        changes: &[RatingChange],
        recorded_at: DateTime<Utc>,
    ) -> Result<Vec<RatingHistoryEntry>, AppError> {
        // Dropping the transaction without commit rolls everything back
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let mut entries = Vec::with_capacity(changes.len());

        for change in changes {
            let row = sqlx::query(
                "SELECT rating FROM club_members WHERE club_id = $1 AND player_id = $2 FOR UPDATE",
            )
            .bind(club_id)
            .bind(&change.player_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| AppError::player_not_in_club(club_id, &change.player_id))?;

            let old_rating: i32 = row.get("rating");
            let new_rating = old_rating + change.delta;

            sqlx::query(
                "UPDATE club_members SET rating = $3, games_played = games_played + $4 WHERE club_id = $1 AND player_id = $2",
            )
            .bind(club_id)
            .bind(&change.player_id)
            .bind(new_rating)
            .bind(if change.is_game() { 1_i32 } else { 0_i32 })
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            let inserted = sqlx::query(
                "INSERT INTO rating_history (club_id, player_id, recorded_at, old_rating, new_rating, opponent_id, result, match_id, tournament_id) \
                 VALUES ($1, $2, GREATEST($3, COALESCE((SELECT MAX(recorded_at) FROM rating_history WHERE club_id = $1 AND player_id = $2), $3)), $4, $5, $6, $7, $8, $9) \
                 RETURNING id, club_id, player_id, recorded_at, old_rating, new_rating, opponent_id, result, match_id, tournament_id",
            )
            .bind(club_id)
            .bind(&change.player_id)
            .bind(recorded_at)
            .bind(old_rating)
            .bind(new_rating)
            .bind(&change.opponent_id)
            .bind(change.result.map(|r| r.to_string()))
            .bind(&change.match_id)
            .bind(&change.tournament_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            entries.push(history_from_row(&inserted));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(club_id = %club_id, applied = entries.len(), "Rating changes committed");
        Ok(entries)
    }

    #[instrument(skip(self))]
    async fn history(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<Vec<RatingHistoryEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT id, club_id, player_id, recorded_at, old_rating, new_rating, opponent_id, result, match_id, tournament_id \
             FROM rating_history WHERE club_id = $1 AND player_id = $2 ORDER BY recorded_at ASC, id ASC",
        )
        .bind(club_id)
        .bind(player_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.iter().map(history_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo_with_members(players: &[(&str, i32)]) -> InMemoryRatingRepository {
        let repo = InMemoryRatingRepository::new();
        for (player, rating) in players {
            repo.add_member(&ClubMember::new("club", player, *rating))
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn duplicate_membership_is_a_conflict() {
        let repo = repo_with_members(&[("alice", 1500)]).await;

        let result = repo.add_member(&ClubMember::new("club", "alice", 1500)).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn apply_changes_updates_rating_and_history() {
        let repo = repo_with_members(&[("alice", 1500), ("bob", 1500)]).await;
        let changes = vec![
            RatingChange::new("alice", 16).against("bob", PlayerResult::Win),
            RatingChange::new("bob", -16).against("alice", PlayerResult::Loss),
        ];

        let entries = repo.apply_changes("club", &changes, Utc::now()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].old_rating, 1500);
        assert_eq!(entries[0].new_rating, 1516);
        assert_eq!(entries[1].new_rating, 1484);

        let alice = repo.get_member("club", "alice").await.unwrap().unwrap();
        assert_eq!(alice.rating, 1516);
        assert_eq!(alice.games_played, 1);

        let history = repo.history("club", "bob").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].result, Some(PlayerResult::Loss));
    }

    #[tokio::test]
    async fn apply_changes_is_all_or_nothing() {
        let repo = repo_with_members(&[("alice", 1500)]).await;
        let changes = vec![
            RatingChange::new("alice", 16).against("ghost", PlayerResult::Win),
            RatingChange::new("ghost", -16).against("alice", PlayerResult::Loss),
        ];

        let result = repo.apply_changes("club", &changes, Utc::now()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let alice = repo.get_member("club", "alice").await.unwrap().unwrap();
        assert_eq!(alice.rating, 1500);
        assert!(repo.history("club", "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn history_timestamps_never_decrease() {
        let repo = repo_with_members(&[("alice", 1500)]).await;
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(30);

        repo.apply_changes("club", &[RatingChange::new("alice", 10)], later)
            .await
            .unwrap();
        repo.apply_changes("club", &[RatingChange::new("alice", -4)], earlier)
            .await
            .unwrap();

        let history = repo.history("club", "alice").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].recorded_at <= history[1].recorded_at);
        assert_eq!(history[0].new_rating, history[1].old_rating);
        assert!(history[0].sequence < history[1].sequence);
    }

    #[tokio::test]
    async fn members_are_scoped_by_club() {
        let repo = InMemoryRatingRepository::new();
        repo.add_member(&ClubMember::new("club-a", "alice", 1500))
            .await
            .unwrap();
        repo.add_member(&ClubMember::new("club-b", "alice", 1700))
            .await
            .unwrap();

        let club_a = repo.list_members("club-a").await.unwrap();
        assert_eq!(club_a.len(), 1);
        assert_eq!(club_a[0].rating, 1500);
        assert!(repo.get_member("club-c", "alice").await.unwrap().is_none());
    }
}
