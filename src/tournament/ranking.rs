//! Final standings of a tournament.
//!
//! Players are ordered by score, then Sonneborn-Berger, then head-to-head
//! points among the tied players (only when every tied pair has met), then
//! starting rating and finally player id. Ranks are always 1..n.

use std::collections::{HashMap, HashSet};

use crate::matches::models::Outcome;

use super::models::{FinalRankingEntry, TournamentPlayer};

/// A resolved board of some round
#[derive(Debug, Clone, PartialEq)]
pub enum RoundResult {
    Decided {
        player_a: String,
        player_b: String,
        outcome: Outcome,
    },
    Bye {
        player: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub player_id: String,
    pub score: f64,
    pub sonneborn_berger: f64,
    pub starting_rating: i32,
}

/// Points per player: 1 / 0.5 / 0 per game, 1 per bye
pub fn tally_scores(results: &[RoundResult]) -> HashMap<String, f64> {
    let mut scores: HashMap<String, f64> = HashMap::new();
    for result in results {
        match result {
            RoundResult::Decided {
                player_a,
                player_b,
                outcome,
            } => {
                *scores.entry(player_a.clone()).or_default() += outcome.score_a();
                *scores.entry(player_b.clone()).or_default() += outcome.score_b();
            }
            RoundResult::Bye { player } => {
                *scores.entry(player.clone()).or_default() += 1.0;
            }
        }
    }
    scores
}

pub struct TournamentRankingAggregator;

impl TournamentRankingAggregator {
    /// Scores and Sonneborn-Berger values for every registered player
    pub fn standings(players: &[TournamentPlayer], results: &[RoundResult]) -> Vec<Standing> {
        let scores = tally_scores(results);
        let score_of = |player_id: &str| scores.get(player_id).copied().unwrap_or(0.0);

        let mut sonneborn_berger: HashMap<&str, f64> = HashMap::new();
        for result in results {
            if let RoundResult::Decided {
                player_a,
                player_b,
                outcome,
            } = result
            {
                *sonneborn_berger.entry(player_a.as_str()).or_default() +=
                    outcome.score_a() * score_of(player_b);
                *sonneborn_berger.entry(player_b.as_str()).or_default() +=
                    outcome.score_b() * score_of(player_a);
            }
        }

        players
            .iter()
            .map(|player| Standing {
                player_id: player.player_id.clone(),
                score: score_of(&player.player_id),
                sonneborn_berger: sonneborn_berger
                    .get(player.player_id.as_str())
                    .copied()
                    .unwrap_or(0.0),
                starting_rating: player.starting_rating,
            })
            .collect()
    }

    pub fn rank(
        tournament_id: &str,
        players: &[TournamentPlayer],
        results: &[RoundResult],
    ) -> Vec<FinalRankingEntry> {
        Self::rank_standings(tournament_id, Self::standings(players, results), results)
    }

    /// Orders precomputed standings. `results` is only consulted for
    /// head-to-head.
    pub fn rank_standings(
        tournament_id: &str,
        mut standings: Vec<Standing>,
        results: &[RoundResult],
    ) -> Vec<FinalRankingEntry> {
        standings.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.sonneborn_berger.total_cmp(&a.sonneborn_berger))
        });

        let mut ordered: Vec<Standing> = Vec::with_capacity(standings.len());
        let mut rest = standings.as_slice();
        while let Some(first) = rest.first() {
            let tied = rest
                .iter()
                .take_while(|s| {
                    s.score == first.score && s.sonneborn_berger == first.sonneborn_berger
                })
                .count();
            ordered.extend(break_tie(&rest[..tied], results));
            rest = &rest[tied..];
        }

        ordered
            .into_iter()
            .enumerate()
            .map(|(index, standing)| FinalRankingEntry {
                tournament_id: tournament_id.to_string(),
                rank: index as u32 + 1,
                player_id: standing.player_id,
                score: standing.score,
                tiebreak_value: standing.sonneborn_berger,
            })
            .collect()
    }
}

/// Orders players tied on score and Sonneborn-Berger
fn break_tie(tied: &[Standing], results: &[RoundResult]) -> Vec<Standing> {
    let head_to_head = if tied.len() > 1 {
        head_to_head_points(tied, results)
    } else {
        None
    };
    let points_of = |player_id: &str| {
        head_to_head
            .as_ref()
            .and_then(|points| points.get(player_id).copied())
            .unwrap_or(0.0)
    };

    let mut group = tied.to_vec();
    group.sort_by(|a, b| {
        points_of(&b.player_id)
            .total_cmp(&points_of(&a.player_id))
            .then_with(|| b.starting_rating.cmp(&a.starting_rating))
            .then_with(|| a.player_id.cmp(&b.player_id))
    });
    group
}

/// Points scored within the group, or `None` if some tied pair never met
fn head_to_head_points(tied: &[Standing], results: &[RoundResult]) -> Option<HashMap<String, f64>> {
    let members: HashSet<&str> = tied.iter().map(|s| s.player_id.as_str()).collect();
    let mut met: HashSet<(&str, &str)> = HashSet::new();
    let mut points: HashMap<String, f64> = HashMap::new();

    for result in results {
        if let RoundResult::Decided {
            player_a,
            player_b,
            outcome,
        } = result
        {
            if members.contains(player_a.as_str()) && members.contains(player_b.as_str()) {
                let pair = if player_a <= player_b {
                    (player_a.as_str(), player_b.as_str())
                } else {
                    (player_b.as_str(), player_a.as_str())
                };
                met.insert(pair);
                *points.entry(player_a.clone()).or_default() += outcome.score_a();
                *points.entry(player_b.clone()).or_default() += outcome.score_b();
            }
        }
    }

    let pairs_needed = tied.len() * (tied.len() - 1) / 2;
    (met.len() == pairs_needed).then_some(points)
}
