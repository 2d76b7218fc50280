use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::{
    models::{FinalRankingEntry, Pairing, TournamentModel, TournamentPlayer, TournamentStatus},
    ranking::{tally_scores, RoundResult, TournamentRankingAggregator},
    repository::TournamentRepository,
    scheduler::{PlayedPairs, PlayerStanding, RoundScheduler},
    types::PairingView,
};
use crate::{
    config::EngineConfig,
    locks::KeyedLocks,
    matches::{
        models::{MatchModel, Outcome, RoundRef},
        repository::MatchRepository,
    },
    rating::RatingStore,
    shared::AppError,
    store::{with_retry, StoreConfig},
};

/// Tournament lifecycle: registration, Swiss rounds and final standings.
/// Round generation, finalization and result submission for one tournament
/// never overlap; the lock map is shared with `MatchService`.
pub struct TournamentService {
    repository: Arc<dyn TournamentRepository>,
    matches: Arc<dyn MatchRepository>,
    ratings: Arc<RatingStore>,
    config: Arc<EngineConfig>,
    scheduler: RoundScheduler,
    tournament_locks: KeyedLocks,
}

/// Pairings of a tournament joined with the state of their matches
struct RoundsState {
    pairings: Vec<Pairing>,
    matches: HashMap<String, MatchModel>,
}

impl RoundsState {
    fn outcome_of(&self, pairing: &Pairing) -> Option<Outcome> {
        pairing
            .match_id
            .as_ref()
            .and_then(|id| self.matches.get(id))
            .and_then(|m| m.outcome)
    }

    fn unresolved(&self) -> Vec<&Pairing> {
        self.pairings
            .iter()
            .filter(|p| !p.is_bye() && self.outcome_of(p).is_none())
            .collect()
    }

    fn results(&self) -> Vec<RoundResult> {
        self.pairings
            .iter()
            .filter_map(|pairing| match &pairing.player_b {
                None => Some(RoundResult::Bye {
                    player: pairing.player_a.clone(),
                }),
                Some(player_b) => self.outcome_of(pairing).map(|outcome| RoundResult::Decided {
                    player_a: pairing.player_a.clone(),
                    player_b: player_b.clone(),
                    outcome,
                }),
            })
            .collect()
    }

    fn played_pairs(&self) -> PlayedPairs {
        let mut played = PlayedPairs::new();
        for pairing in &self.pairings {
            if let Some(player_b) = &pairing.player_b {
                played.insert(&pairing.player_a, player_b);
            }
        }
        played
    }

    fn byes(&self) -> HashMap<&str, u32> {
        let mut byes = HashMap::new();
        for pairing in self.pairings.iter().filter(|p| p.is_bye()) {
            *byes.entry(pairing.player_a.as_str()).or_default() += 1;
        }
        byes
    }
}

impl TournamentService {
    pub fn new(
        repository: Arc<dyn TournamentRepository>,
        matches: Arc<dyn MatchRepository>,
        ratings: Arc<RatingStore>,
        config: Arc<EngineConfig>,
        tournament_locks: KeyedLocks,
    ) -> Self {
        let scheduler = RoundScheduler::new(config.bye_policy, config.pairing_step_limit);
        Self {
            repository,
            matches,
            ratings,
            config,
            scheduler,
            tournament_locks,
        }
    }

    fn store(&self) -> &StoreConfig {
        &self.config.store
    }

    #[instrument(skip(self))]
    pub async fn create_tournament(
        &self,
        club_id: &str,
        name: &str,
        round_count_target: Option<u32>,
        starts_at: Option<DateTime<Utc>>,
    ) -> Result<TournamentModel, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput(
                "tournament name must not be empty".to_string(),
            ));
        }
        if round_count_target == Some(0) {
            return Err(AppError::InvalidInput(
                "round count target must be at least 1".to_string(),
            ));
        }

        let tournament = TournamentModel::new(club_id, name, round_count_target, starts_at);
        with_retry(self.store(), "create_tournament", || {
            self.repository.create_tournament(&tournament)
        })
        .await?;

        info!(club_id = %club_id, tournament_id = %tournament.id, name = %tournament.name, "Tournament created");
        Ok(tournament)
    }

    pub async fn get_tournament(&self, tournament_id: &str) -> Result<TournamentModel, AppError> {
        with_retry(self.store(), "get_tournament", || {
            self.repository.get_tournament(tournament_id)
        })
        .await?
        .ok_or_else(|| AppError::NotFound(format!("tournament {} not found", tournament_id)))
    }

    /// Club tournaments by schedule; an empty filter lists every status
    #[instrument(skip(self))]
    pub async fn list_tournaments(
        &self,
        club_id: &str,
        statuses: &[TournamentStatus],
    ) -> Result<Vec<TournamentModel>, AppError> {
        let tournaments = with_retry(self.store(), "list_tournaments", || {
            self.repository.list_for_club(club_id, statuses)
        })
        .await?;
        debug!(club_id = %club_id, count = tournaments.len(), "Listed tournaments");
        Ok(tournaments)
    }

    /// Registers a club member for an upcoming tournament
    #[instrument(skip(self))]
    pub async fn register_player(
        &self,
        tournament_id: &str,
        player_id: &str,
    ) -> Result<TournamentPlayer, AppError> {
        let _guard = self.tournament_locks.acquire(tournament_id).await;

        let tournament = self.get_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Upcoming {
            warn!(tournament_id = %tournament_id, status = %tournament.status, "Registration closed");
            return Err(AppError::Conflict(format!(
                "tournament {} is {}, registration is closed",
                tournament_id, tournament.status
            )));
        }

        let member = self
            .ratings
            .ensure_member(&tournament.club_id, player_id)
            .await?;
        let player = TournamentPlayer {
            tournament_id: tournament_id.to_string(),
            player_id: player_id.to_string(),
            starting_rating: member.rating,
            registered_at: Utc::now(),
        };
        with_retry(self.store(), "add_player", || {
            self.repository.add_player(&player)
        })
        .await?;

        info!(tournament_id = %tournament_id, player_id = %player_id, "Player registered");
        Ok(player)
    }

    /// Upcoming -> ongoing. Starting ratings are re-read at this point.
    #[instrument(skip(self))]
    pub async fn start_tournament(&self, tournament_id: &str) -> Result<TournamentModel, AppError> {
        let _guard = self.tournament_locks.acquire(tournament_id).await;

        let tournament = self.get_tournament(tournament_id).await?;
        if !tournament.status.can_transition_to(TournamentStatus::Ongoing) {
            return Err(AppError::Conflict(format!(
                "tournament {} is {} and cannot be started",
                tournament_id, tournament.status
            )));
        }

        let players = self.players(tournament_id).await?;
        if players.len() < 2 {
            return Err(AppError::Conflict(format!(
                "tournament {} needs at least two players",
                tournament_id
            )));
        }

        let club_id = tournament.club_id.as_str();
        let ratings = try_join_all(players.iter().map(|p| async move {
            let rating = self.ratings.get_rating(club_id, &p.player_id).await?;
            Ok::<_, AppError>((p.player_id.clone(), rating))
        }))
        .await?;

        with_retry(self.store(), "set_starting_ratings", || {
            self.repository.set_starting_ratings(tournament_id, &ratings)
        })
        .await?;

        let started = with_retry(self.store(), "update_progress", || {
            self.repository.update_progress(
                tournament_id,
                TournamentStatus::Upcoming,
                tournament.current_round,
                TournamentStatus::Ongoing,
                tournament.current_round,
            )
        })
        .await?;

        info!(tournament_id = %tournament_id, players = players.len(), "Tournament started");
        Ok(started)
    }

    /// Pairs and stores the next Swiss round. Refuses while the previous
    /// round has unreported games unless `force` is set.
    #[instrument(skip(self))]
    pub async fn generate_next_round(
        &self,
        tournament_id: &str,
        force: bool,
    ) -> Result<Vec<Pairing>, AppError> {
        let _guard = self.tournament_locks.acquire(tournament_id).await;

        let tournament = self.get_tournament(tournament_id).await?;
        if tournament.status != TournamentStatus::Ongoing {
            return Err(AppError::Conflict(format!(
                "tournament {} is {}, rounds can only be generated while ongoing",
                tournament_id, tournament.status
            )));
        }
        if tournament.all_rounds_played() {
            return Err(AppError::Conflict(format!(
                "tournament {} has already played all {} rounds",
                tournament_id, tournament.current_round
            )));
        }

        let round_number = tournament.current_round + 1;
        self.discard_round(tournament_id, round_number).await?;

        let state = self.rounds_state(&tournament).await?;
        let unresolved = state.unresolved();
        if !unresolved.is_empty() {
            if !force {
                warn!(tournament_id = %tournament_id, unresolved = unresolved.len(), "Previous round not finished");
                return Err(AppError::Conflict(format!(
                    "tournament {} has {} unreported games",
                    tournament_id,
                    unresolved.len()
                )));
            }
            warn!(tournament_id = %tournament_id, unresolved = unresolved.len(), "Forcing next round over unreported games");
        }

        let players = self.players(tournament_id).await?;
        let scores = tally_scores(&state.results());
        let byes = state.byes();
        let ratings = try_join_all(
            players
                .iter()
                .map(|p| self.ratings.get_rating(&tournament.club_id, &p.player_id)),
        )
        .await?;

        let standings: Vec<PlayerStanding> = players
            .iter()
            .zip(ratings)
            .map(|(player, rating)| PlayerStanding {
                player_id: player.player_id.clone(),
                score: scores.get(&player.player_id).copied().unwrap_or(0.0),
                rating,
                byes: byes.get(player.player_id.as_str()).copied().unwrap_or(0),
            })
            .collect();

        let proposed = self.scheduler.pair(&standings, &state.played_pairs())?;

        let mut games = Vec::new();
        let mut pairings = Vec::with_capacity(proposed.len());
        for (index, proposal) in proposed.into_iter().enumerate() {
            let match_id = match &proposal.player_b {
                Some(player_b) => {
                    let game = MatchModel::new(
                        &tournament.club_id,
                        &proposal.player_a,
                        player_b,
                        Some(RoundRef {
                            tournament_id: tournament_id.to_string(),
                            round_number,
                        }),
                    )?;
                    let id = game.id.clone();
                    games.push(game);
                    Some(id)
                }
                None => None,
            };
            pairings.push(Pairing {
                tournament_id: tournament_id.to_string(),
                round_number,
                board: index as u32 + 1,
                player_a: proposal.player_a,
                player_b: proposal.player_b,
                match_id,
            });
        }

        if let Err(err) = self.write_round(&tournament, &games, &pairings).await {
            return self.recover_round_write(tournament_id, round_number, pairings, err).await;
        }

        info!(
            tournament_id = %tournament_id,
            round = round_number,
            boards = pairings.len(),
            "Round generated"
        );
        Ok(pairings)
    }

    /// Stores matches, then pairings, then moves the round counter. Until the
    /// counter moves the round is invisible to readers.
    async fn write_round(
        &self,
        tournament: &TournamentModel,
        games: &[MatchModel],
        pairings: &[Pairing],
    ) -> Result<(), AppError> {
        let round_number = tournament.current_round + 1;
        with_retry(self.store(), "create_matches", || {
            self.matches.create_matches(games)
        })
        .await?;
        with_retry(self.store(), "insert_round", || {
            self.repository
                .insert_round(&tournament.id, round_number, pairings)
        })
        .await?;
        with_retry(self.store(), "update_progress", || {
            self.repository.update_progress(
                &tournament.id,
                TournamentStatus::Ongoing,
                tournament.current_round,
                TournamentStatus::Ongoing,
                round_number,
            )
        })
        .await?;
        Ok(())
    }

    /// Keeps the round if the counter moved despite the error, otherwise
    /// deletes whatever part of it reached the store
    async fn recover_round_write(
        &self,
        tournament_id: &str,
        round_number: u32,
        pairings: Vec<Pairing>,
        err: AppError,
    ) -> Result<Vec<Pairing>, AppError> {
        match self.get_tournament(tournament_id).await {
            Ok(current) if current.current_round >= round_number => {
                warn!(tournament_id = %tournament_id, round = round_number, error = %err, "Round stored despite store error");
                return Ok(pairings);
            }
            Ok(_) => {
                if let Err(cleanup_err) = self.discard_round(tournament_id, round_number).await {
                    // Left for the next generation attempt to clean up
                    error!(tournament_id = %tournament_id, round = round_number, error = %cleanup_err, "Could not discard partial round");
                }
            }
            Err(read_err) => {
                error!(tournament_id = %tournament_id, round = round_number, error = %read_err, "Could not check round after failed write");
            }
        }
        Err(err)
    }

    /// Deletes pairings and matches stored for a round the counter never reached
    async fn discard_round(&self, tournament_id: &str, round_number: u32) -> Result<(), AppError> {
        let pairings = with_retry(self.store(), "discard_round", || {
            self.repository.discard_round(tournament_id, round_number)
        })
        .await?;
        let matches = with_retry(self.store(), "discard_round_matches", || {
            self.matches.discard_round(tournament_id, round_number)
        })
        .await?;

        if pairings > 0 || matches > 0 {
            warn!(tournament_id = %tournament_id, round = round_number, pairings, matches, "Discarded unfinished round");
        }
        Ok(())
    }

    /// Every pairing so far with its reported outcome
    pub async fn get_pairings(&self, tournament_id: &str) -> Result<Vec<PairingView>, AppError> {
        let tournament = self.get_tournament(tournament_id).await?;
        let state = self.rounds_state(&tournament).await?;

        Ok(state
            .pairings
            .iter()
            .map(|pairing| PairingView::new(pairing.clone(), state.outcome_of(pairing)))
            .collect())
    }

    /// Computes and stores the final ranking and completes the tournament.
    /// Running it again on a completed tournament recomputes the same set.
    #[instrument(skip(self))]
    pub async fn finalize_tournament(
        &self,
        tournament_id: &str,
    ) -> Result<Vec<FinalRankingEntry>, AppError> {
        let guard = self.tournament_locks.acquire(tournament_id).await;
        let ranking = self.finalize_locked(tournament_id).await;
        drop(guard);

        if ranking.is_ok() {
            self.tournament_locks.clear(tournament_id).await;
        }
        ranking
    }

    async fn finalize_locked(
        &self,
        tournament_id: &str,
    ) -> Result<Vec<FinalRankingEntry>, AppError> {
        let tournament = self.get_tournament(tournament_id).await?;
        if tournament.status == TournamentStatus::Upcoming {
            return Err(AppError::Conflict(format!(
                "tournament {} has not started",
                tournament_id
            )));
        }
        if tournament.current_round == 0 {
            return Err(AppError::Conflict(format!(
                "tournament {} has no rounds to rank",
                tournament_id
            )));
        }

        let state = self.rounds_state(&tournament).await?;
        let unresolved = state.unresolved();
        if !unresolved.is_empty() {
            warn!(tournament_id = %tournament_id, unresolved = unresolved.len(), "Cannot finalize with unreported games");
            return Err(AppError::Conflict(format!(
                "tournament {} has {} unreported games",
                tournament_id,
                unresolved.len()
            )));
        }

        let players = self.players(tournament_id).await?;
        let ranking = TournamentRankingAggregator::rank(tournament_id, &players, &state.results());

        with_retry(self.store(), "replace_final_ranking", || {
            self.repository.replace_final_ranking(tournament_id, &ranking)
        })
        .await?;

        if tournament.status == TournamentStatus::Ongoing {
            with_retry(self.store(), "update_progress", || {
                self.repository.update_progress(
                    tournament_id,
                    TournamentStatus::Ongoing,
                    tournament.current_round,
                    TournamentStatus::Completed,
                    tournament.current_round,
                )
            })
            .await?;
        }

        info!(tournament_id = %tournament_id, players = ranking.len(), "Tournament finalized");
        Ok(ranking)
    }

    /// Stored final ranking ordered by rank; empty until finalized
    pub async fn get_final_ranking(
        &self,
        tournament_id: &str,
    ) -> Result<(TournamentModel, Vec<FinalRankingEntry>), AppError> {
        let tournament = self.get_tournament(tournament_id).await?;
        let entries = with_retry(self.store(), "final_ranking", || {
            self.repository.final_ranking(tournament_id)
        })
        .await?;
        Ok((tournament, entries))
    }

    async fn players(&self, tournament_id: &str) -> Result<Vec<TournamentPlayer>, AppError> {
        with_retry(self.store(), "list_players", || {
            self.repository.list_players(tournament_id)
        })
        .await
    }

    /// Pairings and matches of the rounds the counter has reached
    async fn rounds_state(&self, tournament: &TournamentModel) -> Result<RoundsState, AppError> {
        let tournament_id = tournament.id.as_str();
        let mut pairings = with_retry(self.store(), "list_pairings", || {
            self.repository.list_pairings(tournament_id)
        })
        .await?;
        pairings.retain(|p| p.round_number <= tournament.current_round);
        let matches = with_retry(self.store(), "list_for_tournament", || {
            self.matches.list_for_tournament(tournament_id)
        })
        .await?;

        Ok(RoundsState {
            pairings,
            matches: matches
                .into_iter()
                .filter(|m| m.round_number.is_some_and(|r| r <= tournament.current_round))
                .map(|m| (m.id.clone(), m))
                .collect(),
        })
    }
}
