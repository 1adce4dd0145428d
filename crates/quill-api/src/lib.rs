pub mod account;
pub mod auth;
pub mod delivery;
pub mod following;
pub mod mentions;
pub mod middleware;
pub mod mutes;
pub mod notes;
pub mod reactions;
pub mod state;
