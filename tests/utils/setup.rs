use clubrank::{
    config::EngineConfig, matches::elo::KFactorPolicy, tournament::models::TournamentModel,
    AppState,
};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub state: AppState,
    pub club_id: String,
    pub players: Vec<String>,
}

pub struct TestSetupBuilder {
    players: Vec<String>,
    club_id: String,
    config: EngineConfig,
}

#[allow(dead_code)] // Not every test file uses every option
impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            players: vec![],
            club_id: "club-1".to_string(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_players(mut self, players: Vec<&str>) -> Self {
        self.players = players.into_iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_four_players(self) -> Self {
        self.with_players(vec!["alice", "bob", "charlie", "david"])
    }

    pub fn with_five_players(self) -> Self {
        self.with_players(vec!["alice", "bob", "charlie", "david", "erin"])
    }

    pub fn with_k_factor(mut self, policy: KFactorPolicy) -> Self {
        self.config.k_factor = policy;
        self
    }

    pub async fn build(self) -> TestSetup {
        let state = AppState::in_memory(self.config);

        for player in &self.players {
            state.ratings.join_club(&self.club_id, player).await.unwrap();
        }

        TestSetup {
            state,
            club_id: self.club_id,
            players: self.players,
        }
    }
}

impl TestSetup {
    /// Creates a tournament, registers every player and starts it
    pub async fn started_tournament(&self, rounds: Option<u32>) -> TournamentModel {
        let tournament = self
            .state
            .tournaments
            .create_tournament(&self.club_id, "Club Championship", rounds, None)
            .await
            .unwrap();

        for player in &self.players {
            self.state
                .tournaments
                .register_player(&tournament.id, player)
                .await
                .unwrap();
        }

        self.state
            .tournaments
            .start_tournament(&tournament.id)
            .await
            .unwrap()
    }
}
