// Public API - what other modules can use
pub use handlers::{club_ranking, join_club, player_history};
pub use service::RatingStore;

// Internal modules
mod handlers;
pub mod models;
pub mod repository;
mod service;
pub mod types;
