pub mod catchup;
pub mod config;
pub mod errors;
pub mod events;
pub mod handle_race;
pub mod race;
pub mod racer;
pub mod spacing;
