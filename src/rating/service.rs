use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::{
    models::{ClubMember, MembershipPolicy, RankingEntry, RatingChange, RatingHistoryEntry},
    repository::RatingRepository,
};
use crate::{
    config::EngineConfig,
    locks::KeyedLocks,
    shared::AppError,
    store::{with_retry, StoreConfig},
};

/// Keyed rating store: current rating per (club, player) plus the
/// append-only history. Mutations for one player are serialized through a
/// per-player lock; different players never wait on each other.
pub struct RatingStore {
    repository: Arc<dyn RatingRepository>,
    config: Arc<EngineConfig>,
    player_locks: KeyedLocks,
}

fn player_key(club_id: &str, player_id: &str) -> String {
    format!("{}/{}", club_id, player_id)
}

impl RatingStore {
    pub fn new(repository: Arc<dyn RatingRepository>, config: Arc<EngineConfig>) -> Self {
        Self {
            repository,
            config,
            player_locks: KeyedLocks::new(),
        }
    }

    fn store(&self) -> &StoreConfig {
        &self.config.store
    }

    /// Adds a player to a club at the default rating
    #[instrument(skip(self))]
    pub async fn join_club(&self, club_id: &str, player_id: &str) -> Result<ClubMember, AppError> {
        let member = ClubMember::new(club_id, player_id, self.config.default_rating);
        with_retry(self.store(), "add_member", || {
            self.repository.add_member(&member)
        })
        .await?;

        info!(club_id = %club_id, player_id = %player_id, rating = member.rating, "Player joined club");
        Ok(member)
    }

    /// Current rating, or the default rating when the player has no record yet
    #[instrument(skip(self))]
    pub async fn get_rating(&self, club_id: &str, player_id: &str) -> Result<i32, AppError> {
        let member = self.find_member(club_id, player_id).await?;
        Ok(member.map_or(self.config.default_rating, |m| m.rating))
    }

    pub async fn get_member(&self, club_id: &str, player_id: &str) -> Result<ClubMember, AppError> {
        self.find_member(club_id, player_id)
            .await?
            .ok_or_else(|| AppError::player_not_in_club(club_id, player_id))
    }

    async fn find_member(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<Option<ClubMember>, AppError> {
        with_retry(self.store(), "get_member", || {
            self.repository.get_member(club_id, player_id)
        })
        .await
    }

    /// Membership lookup honouring the configured membership policy
    pub async fn ensure_member(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<ClubMember, AppError> {
        if let Some(member) = self.find_member(club_id, player_id).await? {
            return Ok(member);
        }

        match self.config.membership {
            MembershipPolicy::Strict => Err(AppError::player_not_in_club(club_id, player_id)),
            MembershipPolicy::AutoEnroll => match self.join_club(club_id, player_id).await {
                Ok(member) => Ok(member),
                // Someone else enrolled them first
                Err(AppError::Conflict(_)) => self.get_member(club_id, player_id).await,
                Err(err) => Err(err),
            },
        }
    }

    /// Applies a single delta to one player
    #[instrument(skip(self))]
    pub async fn record_change(
        &self,
        club_id: &str,
        player_id: &str,
        delta: i32,
        opponent_id: Option<&str>,
        tournament_id: Option<&str>,
    ) -> Result<RatingHistoryEntry, AppError> {
        let mut entries = self
            .update_together(club_id, &[player_id], |_| {
                let mut change = RatingChange::new(player_id, delta);
                change.opponent_id = opponent_id.map(str::to_string);
                change.tournament_id = tournament_id.map(str::to_string);
                Ok(vec![change])
            })
            .await?;

        entries.pop().ok_or(AppError::Internal)
    }

    /// Locks every listed player, loads their current records and applies the
    /// changes derived from them in one store operation. `compute` receives
    /// the members in the order of `player_ids`.
    pub async fn update_together<F>(
        &self,
        club_id: &str,
        player_ids: &[&str],
        compute: F,
    ) -> Result<Vec<RatingHistoryEntry>, AppError>
    where
        F: FnOnce(&[ClubMember]) -> Result<Vec<RatingChange>, AppError>,
    {
        let keys: Vec<String> = player_ids.iter().map(|p| player_key(club_id, p)).collect();
        let guards = self.player_locks.acquire_all(keys.iter().cloned()).await;

        let result = self.apply_locked(club_id, player_ids, compute).await;

        drop(guards);
        for key in &keys {
            self.player_locks.clear(key).await;
        }
        result
    }

    async fn apply_locked<F>(
        &self,
        club_id: &str,
        player_ids: &[&str],
        compute: F,
    ) -> Result<Vec<RatingHistoryEntry>, AppError>
    where
        F: FnOnce(&[ClubMember]) -> Result<Vec<RatingChange>, AppError>,
    {
        let mut members = Vec::with_capacity(player_ids.len());
        for player_id in player_ids {
            members.push(self.ensure_member(club_id, player_id).await?);
        }

        let changes = compute(&members)?;
        if changes.is_empty() {
            return Ok(Vec::new());
        }

        let recorded_at = Utc::now();
        let entries = with_retry(self.store(), "apply_changes", || {
            self.repository.apply_changes(club_id, &changes, recorded_at)
        })
        .await
        .map_err(|err| {
            warn!(club_id = %club_id, error = %err, "Rating update rejected, nothing applied");
            err
        })?;

        for entry in &entries {
            debug!(
                club_id = %club_id,
                player_id = %entry.player_id,
                old_rating = entry.old_rating,
                new_rating = entry.new_rating,
                delta = entry.delta(),
                "Rating changed"
            );
        }

        Ok(entries)
    }

    /// Club members ordered by rating (highest first, ties by player id)
    #[instrument(skip(self))]
    pub async fn ranking(&self, club_id: &str) -> Result<Vec<RankingEntry>, AppError> {
        let mut members = with_retry(self.store(), "list_members", || {
            self.repository.list_members(club_id)
        })
        .await?;

        members.sort_by(|a, b| {
            b.rating
                .cmp(&a.rating)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });

        Ok(members
            .into_iter()
            .enumerate()
            .map(|(index, member)| RankingEntry {
                position: index as u32 + 1,
                player_id: member.player_id,
                rating: member.rating,
                games_played: member.games_played,
            })
            .collect())
    }

    /// Full rating history for one club member, oldest first
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        club_id: &str,
        player_id: &str,
    ) -> Result<Vec<RatingHistoryEntry>, AppError> {
        self.get_member(club_id, player_id).await?;
        with_retry(self.store(), "history", || {
            self.repository.history(club_id, player_id)
        })
        .await
    }
}
