use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::{
    elo::{rating_deltas, RatingDelta},
    models::{MatchModel, Outcome},
    repository::MatchRepository,
    types::SubmitResultResponse,
};
use crate::{
    config::EngineConfig,
    locks::KeyedLocks,
    rating::{models::RatingChange, RatingStore},
    shared::AppError,
    store::with_retry,
};

/// Turns reported game outcomes into rating changes for both players
pub struct MatchService {
    repository: Arc<dyn MatchRepository>,
    ratings: Arc<RatingStore>,
    config: Arc<EngineConfig>,
    /// Shared with `TournamentService`
    tournament_locks: KeyedLocks,
}

impl MatchService {
    pub fn new(
        repository: Arc<dyn MatchRepository>,
        ratings: Arc<RatingStore>,
        config: Arc<EngineConfig>,
        tournament_locks: KeyedLocks,
    ) -> Self {
        Self {
            repository,
            ratings,
            config,
            tournament_locks,
        }
    }

    pub async fn get_match(&self, match_id: &str) -> Result<MatchModel, AppError> {
        with_retry(&self.config.store, "get_match", || {
            self.repository.get_match(match_id)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("match {} not found", match_id)))
    }

    /// Records a casual (non-tournament) game and rates it immediately
    #[instrument(skip(self))]
    pub async fn report_game(
        &self,
        club_id: &str,
        player_a: &str,
        player_b: &str,
        outcome: Outcome,
    ) -> Result<SubmitResultResponse, AppError> {
        let game = MatchModel::new(club_id, player_a, player_b, None)?;

        // Both players must be rateable before anything is stored
        self.ratings.ensure_member(club_id, player_a).await?;
        self.ratings.ensure_member(club_id, player_b).await?;

        with_retry(&self.config.store, "create_matches", || {
            self.repository.create_matches(std::slice::from_ref(&game))
        })
        .await?;

        self.submit_result(&game.id, outcome).await
    }

    /// Applies the outcome of a match: claims the result slot, then moves both
    /// ratings in one store operation. A failed rating update releases the
    /// claim so the match stays unresolved. Tournament matches hold the
    /// tournament lock throughout, so finalization never sees a claim that
    /// is later released.
    #[instrument(skip(self))]
    pub async fn submit_result(
        &self,
        match_id: &str,
        outcome: Outcome,
    ) -> Result<SubmitResultResponse, AppError> {
        let game = self.get_match(match_id).await?;

        let Some(tournament_id) = game.tournament_id.clone() else {
            return self.resolve(game, outcome).await;
        };
        let guard = self.tournament_locks.acquire(&tournament_id).await;
        let result = self.resolve(game, outcome).await;
        drop(guard);

        self.tournament_locks.clear(&tournament_id).await;
        result
    }

    async fn resolve(
        &self,
        game: MatchModel,
        outcome: Outcome,
    ) -> Result<SubmitResultResponse, AppError> {
        let match_id = game.id.as_str();

        if game.player_a == game.player_b {
            return Err(AppError::invalid_pairing(&game.player_a));
        }
        if game.is_resolved() {
            warn!(match_id = %match_id, "Result already recorded");
            return Err(AppError::duplicate_result(match_id));
        }

        let reported_at = Utc::now();
        let game = with_retry(&self.config.store, "claim_outcome", || {
            self.repository.claim_outcome(match_id, outcome, reported_at)
        })
        .await?;

        match self.apply_ratings(&game, outcome).await {
            Ok(response) => {
                info!(
                    match_id = %match_id,
                    outcome = %outcome,
                    delta_a = response.delta_a,
                    delta_b = response.delta_b,
                    "Match result processed"
                );
                Ok(response)
            }
            Err(err) => {
                warn!(match_id = %match_id, error = %err, "Rating update failed, releasing result");
                if let Err(release_err) = with_retry(&self.config.store, "release_outcome", || {
                    self.repository.release_outcome(match_id)
                })
                .await
                {
                    error!(match_id = %match_id, error = %release_err, "Could not release match result");
                }
                Err(err)
            }
        }
    }

    async fn apply_ratings(
        &self,
        game: &MatchModel,
        outcome: Outcome,
    ) -> Result<SubmitResultResponse, AppError> {
        let k_policy = self.config.k_factor_for(&game.club_id);
        let mut delta = RatingDelta {
            delta_a: 0,
            delta_b: 0,
        };

        let entries = self
            .ratings
            .update_together(
                &game.club_id,
                &[game.player_a.as_str(), game.player_b.as_str()],
                |members| {
                    let (a, b) = match members {
                        [a, b] => (a, b),
                        _ => return Err(AppError::Internal),
                    };
                    let k = k_policy.k_for_pair(a, b);
                    delta = rating_deltas(a.rating, b.rating, outcome, k);

                    let tournament_id = game.tournament_id.as_deref();
                    Ok(vec![
                        RatingChange::new(&a.player_id, delta.delta_a)
                            .against(&b.player_id, outcome.result_a())
                            .for_match(&game.id, tournament_id),
                        RatingChange::new(&b.player_id, delta.delta_b)
                            .against(&a.player_id, outcome.result_b())
                            .for_match(&game.id, tournament_id),
                    ])
                },
            )
            .await?;

        let rating_of = |player_id: &str| {
            entries
                .iter()
                .find(|e| e.player_id == player_id)
                .map(|e| e.new_rating)
                .ok_or(AppError::Internal)
        };

        Ok(SubmitResultResponse {
            match_id: game.id.clone(),
            outcome,
            delta_a: delta.delta_a,
            delta_b: delta.delta_b,
            rating_a: rating_of(&game.player_a)?,
            rating_b: rating_of(&game.player_b)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matches::repository::InMemoryMatchRepository;
    use crate::rating::models::{ClubMember, PlayerResult, RatingHistoryEntry};
    use crate::rating::repository::{InMemoryRatingRepository, RatingRepository};
    use async_trait::async_trait;
    use chrono::DateTime;

    struct Setup {
        service: MatchService,
        ratings: Arc<RatingStore>,
        matches: Arc<InMemoryMatchRepository>,
    }

    fn setup_with(config: EngineConfig, rating_repo: Arc<dyn RatingRepository>) -> Setup {
        let config = Arc::new(config);
        let ratings = Arc::new(RatingStore::new(rating_repo, config.clone()));
        let matches = Arc::new(InMemoryMatchRepository::new());
        let service =
            MatchService::new(matches.clone(), ratings.clone(), config, KeyedLocks::new());
        Setup {
            service,
            ratings,
            matches,
        }
    }

    async fn setup() -> Setup {
        let setup = setup_with(
            EngineConfig::default(),
            Arc::new(InMemoryRatingRepository::new()),
        );
        setup.ratings.join_club("club", "alice").await.unwrap();
        setup.ratings.join_club("club", "bob").await.unwrap();
        setup
    }

    async fn pending_match(setup: &Setup) -> MatchModel {
        let game = MatchModel::new("club", "alice", "bob", None).unwrap();
        setup.matches.create_matches(&[game.clone()]).await.unwrap();
        game
    }

    #[tokio::test]
    async fn win_between_equals_moves_sixteen_points() {
        let setup = setup().await;
        let game = pending_match(&setup).await;

        let response = setup
            .service
            .submit_result(&game.id, Outcome::AWin)
            .await
            .unwrap();

        assert_eq!(response.delta_a, 16);
        assert_eq!(response.delta_b, -16);
        assert_eq!(response.rating_a, 1516);
        assert_eq!(response.rating_b, 1484);

        let alice_history = setup.ratings.history("club", "alice").await.unwrap();
        assert_eq!(alice_history.len(), 1);
        assert_eq!(alice_history[0].opponent_id.as_deref(), Some("bob"));
        assert_eq!(alice_history[0].result, Some(PlayerResult::Win));
        assert_eq!(alice_history[0].match_id.as_deref(), Some(game.id.as_str()));
    }

    #[tokio::test]
    async fn duplicate_result_is_rejected_and_ratings_untouched() {
        let setup = setup().await;
        let game = pending_match(&setup).await;

        setup
            .service
            .submit_result(&game.id, Outcome::Draw)
            .await
            .unwrap();
        let second = setup.service.submit_result(&game.id, Outcome::AWin).await;

        assert!(matches!(second, Err(AppError::Conflict(_))));
        assert_eq!(setup.ratings.get_rating("club", "alice").await.unwrap(), 1500);
        assert_eq!(setup.ratings.history("club", "alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_match_is_not_found() {
        let setup = setup().await;
        let result = setup.service.submit_result("nope", Outcome::AWin).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn report_game_rejects_self_pairing() {
        let setup = setup().await;
        let result = setup
            .service
            .report_game("club", "alice", "alice", Outcome::Draw)
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn report_game_requires_membership() {
        let setup = setup().await;
        let result = setup
            .service
            .report_game("club", "alice", "mallory", Outcome::AWin)
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(setup.ratings.history("club", "alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn club_k_override_is_used() {
        let setup = setup_with(
            EngineConfig::default()
                .with_club_k_factor("club", crate::matches::elo::KFactorPolicy::fixed(16.0)),
            Arc::new(InMemoryRatingRepository::new()),
        );
        setup.ratings.join_club("club", "alice").await.unwrap();
        setup.ratings.join_club("club", "bob").await.unwrap();

        let response = setup
            .service
            .report_game("club", "alice", "bob", Outcome::BWin)
            .await
            .unwrap();
        assert_eq!(response.delta_a, -8);
        assert_eq!(response.rating_b, 1508);
    }

    /// Rating repository whose writes always fail transiently
    struct BrokenWrites {
        inner: InMemoryRatingRepository,
    }

    #[async_trait]
    impl RatingRepository for BrokenWrites {
        async fn add_member(&self, member: &ClubMember) -> Result<(), AppError> {
            self.inner.add_member(member).await
        }
        async fn get_member(
            &self,
            club_id: &str,
            player_id: &str,
        ) -> Result<Option<ClubMember>, AppError> {
            self.inner.get_member(club_id, player_id).await
        }
        async fn list_members(&self, club_id: &str) -> Result<Vec<ClubMember>, AppError> {
            self.inner.list_members(club_id).await
        }
        async fn apply_changes(
            &self,
            _club_id: &str,
            _changes: &[RatingChange],
            _recorded_at: DateTime<Utc>,
        ) -> Result<Vec<RatingHistoryEntry>, AppError> {
            Err(AppError::DatabaseError("connection reset".into()))
        }
        async fn history(
            &self,
            club_id: &str,
            player_id: &str,
        ) -> Result<Vec<RatingHistoryEntry>, AppError> {
            self.inner.history(club_id, player_id).await
        }
    }

    #[tokio::test]
    async fn store_outage_leaves_match_unresolved() {
        let setup = setup_with(
            EngineConfig::default(),
            Arc::new(BrokenWrites {
                inner: InMemoryRatingRepository::new(),
            }),
        );
        setup.ratings.join_club("club", "alice").await.unwrap();
        setup.ratings.join_club("club", "bob").await.unwrap();
        let game = pending_match(&setup).await;

        let result = setup.service.submit_result(&game.id, Outcome::AWin).await;
        assert!(matches!(result, Err(AppError::StoreUnavailable(_))));

        let stored = setup.service.get_match(&game.id).await.unwrap();
        assert!(!stored.is_resolved());
        assert_eq!(setup.ratings.get_rating("club", "alice").await.unwrap(), 1500);
    }
}
