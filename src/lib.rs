// Library crate for the club rating and tournament engine
// This file exposes the public API for the server binary and integration tests

pub mod config;
pub mod locks;
pub mod matches;
pub mod rating;
pub mod shared;
pub mod store;
pub mod tournament;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

// Re-export commonly used types for easier access in tests
pub use config::EngineConfig;
pub use matches::{models::Outcome, MatchService};
pub use rating::RatingStore;
pub use shared::{AppError, AppState};
pub use tournament::TournamentService;

/// Every HTTP route of the engine
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/clubs/:club_id/members", post(rating::join_club))
        .route("/clubs/:club_id/ranking", get(rating::club_ranking))
        .route(
            "/clubs/:club_id/members/:player_id/history",
            get(rating::player_history),
        )
        .route("/clubs/:club_id/games", post(matches::report_game))
        .route(
            "/clubs/:club_id/tournaments",
            post(tournament::create_tournament).get(tournament::list_tournaments),
        )
        .route("/matches/:match_id/result", post(matches::submit_result))
        .route(
            "/tournaments/:tournament_id/players",
            post(tournament::register_player),
        )
        .route(
            "/tournaments/:tournament_id/start",
            post(tournament::start_tournament),
        )
        .route(
            "/tournaments/:tournament_id/rounds",
            post(tournament::generate_next_round),
        )
        .route(
            "/tournaments/:tournament_id/pairings",
            get(tournament::get_pairings),
        )
        .route(
            "/tournaments/:tournament_id/finalize",
            post(tournament::finalize_tournament),
        )
        .route(
            "/tournaments/:tournament_id/ranking",
            get(tournament::final_ranking),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
