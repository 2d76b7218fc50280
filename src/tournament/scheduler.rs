//! Swiss-system round pairing.
//!
//! Players are ordered by (score desc, rating desc, player id asc), which
//! lays the score groups out top to bottom. Pairing walks that order: the
//! highest unpaired player takes the next eligible opponent, so an odd player
//! out of a score group drops into the group below. When a choice leads to a
//! dead end the matcher backtracks using an explicit stack of decisions.

use std::cmp::Ordering;
use std::collections::HashSet;

use strum_macros::{Display, EnumString};
use tracing::{debug, instrument, warn};

use crate::shared::AppError;

/// Default upper bound on matcher steps for one round
pub const DEFAULT_STEP_LIMIT: usize = 200_000;

/// Who may receive a bye when the field is odd
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ByePolicy {
    /// Odd fields cannot be paired
    Disabled,
    /// Each player receives at most one bye per tournament
    OncePerPlayer,
    /// Byes may repeat; players with fewer byes go first
    Repeatable,
}

/// Scheduler input for one player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStanding {
    pub player_id: String,
    pub score: f64,
    pub rating: i32,
    pub byes: u32,
}

/// Unordered set of player pairs that already met
#[derive(Debug, Clone, Default)]
pub struct PlayedPairs {
    pairs: HashSet<(String, String)>,
}

impl PlayedPairs {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: &str, b: &str) -> (String, String) {
        if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        }
    }

    pub fn insert(&mut self, a: &str, b: &str) {
        self.pairs.insert(Self::key(a, b));
    }

    pub fn contains(&self, a: &str, b: &str) -> bool {
        self.pairs.contains(&Self::key(a, b))
    }
}

/// A pairing produced for the next round; `player_b == None` is a bye
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedPairing {
    pub player_a: String,
    pub player_b: Option<String>,
}

fn standing_order(a: &PlayerStanding, b: &PlayerStanding) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.rating.cmp(&a.rating))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

/// Players split into score groups, best group first
pub fn score_groups(standings: &[PlayerStanding]) -> Vec<Vec<&PlayerStanding>> {
    let mut ordered: Vec<&PlayerStanding> = standings.iter().collect();
    ordered.sort_by(|a, b| standing_order(a, b));

    let mut groups: Vec<Vec<&PlayerStanding>> = Vec::new();
    for standing in ordered {
        match groups.last_mut() {
            Some(group) if group[0].score == standing.score => group.push(standing),
            _ => groups.push(vec![standing]),
        }
    }
    groups
}

/// A taken decision: `top` was paired with `partner`
struct Decision {
    top: usize,
    partner: usize,
}

pub struct RoundScheduler {
    bye_policy: ByePolicy,
    step_limit: usize,
}

impl RoundScheduler {
    pub fn new(bye_policy: ByePolicy, step_limit: usize) -> Self {
        Self {
            bye_policy,
            step_limit,
        }
    }

    /// Pairs the next round. Deterministic for identical input.
    #[instrument(skip(self, standings, played), fields(players = standings.len()))]
    pub fn pair(
        &self,
        standings: &[PlayerStanding],
        played: &PlayedPairs,
    ) -> Result<Vec<ProposedPairing>, AppError> {
        let mut seen = HashSet::new();
        for standing in standings {
            if !seen.insert(standing.player_id.as_str()) {
                return Err(AppError::InvalidInput(format!(
                    "player {} listed twice",
                    standing.player_id
                )));
            }
        }

        let groups = score_groups(standings);
        debug!(score_groups = groups.len(), "Pairing round");
        let ordered: Vec<&PlayerStanding> = groups.into_iter().flatten().collect();

        let mut steps = 0;
        if ordered.len() % 2 == 0 {
            return match self.match_sequential(&ordered, played, &mut steps)? {
                Some(pairs) => Ok(pairs),
                None => Err(AppError::no_pairing_possible(
                    "every remaining player has already met every possible opponent",
                )),
            };
        }

        for bye_index in self.bye_candidates(&ordered)? {
            let rest: Vec<&PlayerStanding> = ordered
                .iter()
                .enumerate()
                .filter(|(index, _)| *index != bye_index)
                .map(|(_, standing)| *standing)
                .collect();

            if let Some(mut pairs) = self.match_sequential(&rest, played, &mut steps)? {
                debug!(player_id = %ordered[bye_index].player_id, "Bye assigned");
                pairs.push(ProposedPairing {
                    player_a: ordered[bye_index].player_id.clone(),
                    player_b: None,
                });
                return Ok(pairs);
            }
        }

        Err(AppError::no_pairing_possible(
            "no bye assignment leaves a valid pairing",
        ))
    }

    /// Bye candidates, most preferred first: lowest-ranked eligible player
    fn bye_candidates(&self, ordered: &[&PlayerStanding]) -> Result<Vec<usize>, AppError> {
        let from_bottom = (0..ordered.len()).rev();
        let candidates: Vec<usize> = match self.bye_policy {
            ByePolicy::Disabled => Vec::new(),
            ByePolicy::OncePerPlayer => from_bottom.filter(|&i| ordered[i].byes == 0).collect(),
            ByePolicy::Repeatable => {
                let mut all: Vec<usize> = from_bottom.collect();
                // Stable sort keeps lowest-ranked first within equal bye counts
                all.sort_by_key(|&i| ordered[i].byes);
                all
            }
        };

        if candidates.is_empty() {
            warn!(bye_policy = %self.bye_policy, "Odd field without an eligible bye");
            return Err(AppError::no_pairing_possible(format!(
                "odd number of players and no bye allowed under policy {}",
                self.bye_policy
            )));
        }
        Ok(candidates)
    }

    /// Pairs an even list top-down, backtracking on dead ends.
    /// `Ok(None)` when no complete pairing exists.
    fn match_sequential(
        &self,
        ordered: &[&PlayerStanding],
        played: &PlayedPairs,
        steps: &mut usize,
    ) -> Result<Option<Vec<ProposedPairing>>, AppError> {
        let n = ordered.len();
        let mut paired = vec![false; n];
        let mut decisions: Vec<Decision> = Vec::with_capacity(n / 2);
        // Decision being revisited after a backtrack
        let mut resume: Option<Decision> = None;

        loop {
            *steps += 1;
            if *steps > self.step_limit {
                warn!(step_limit = self.step_limit, "Pairing search budget exhausted");
                return Err(AppError::no_pairing_possible(format!(
                    "search exceeded {} steps",
                    self.step_limit
                )));
            }

            let (top, search_from) = match resume.take() {
                Some(decision) => (decision.top, decision.partner + 1),
                None => match paired.iter().position(|p| !p) {
                    Some(top) => (top, top + 1),
                    None => {
                        return Ok(Some(
                            decisions
                                .iter()
                                .map(|d| ProposedPairing {
                                    player_a: ordered[d.top].player_id.clone(),
                                    player_b: Some(ordered[d.partner].player_id.clone()),
                                })
                                .collect(),
                        ))
                    }
                },
            };

            let partner = (search_from..n).find(|&j| {
                !paired[j] && !played.contains(&ordered[top].player_id, &ordered[j].player_id)
            });

            match partner {
                Some(partner) => {
                    paired[top] = true;
                    paired[partner] = true;
                    decisions.push(Decision { top, partner });
                }
                None => match decisions.pop() {
                    Some(previous) => {
                        paired[previous.top] = false;
                        paired[previous.partner] = false;
                        resume = Some(previous);
                    }
                    None => return Ok(None),
                },
            }
        }
    }
}
