// Public API - what other modules can use
pub use handlers::{report_game, submit_result};
pub use service::MatchService;

// Internal modules
pub mod elo;
mod handlers;
pub mod models;
pub mod repository;
mod service;
pub mod types;
