// Public API - what other modules can use
pub use handlers::{
    create_tournament, final_ranking, finalize_tournament, generate_next_round, get_pairings,
    list_tournaments, register_player, start_tournament,
};
pub use service::TournamentService;

// Internal modules
mod handlers;
pub mod models;
pub mod ranking;
pub mod repository;
pub mod scheduler;
mod service;
pub mod types;
