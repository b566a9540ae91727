pub mod analyze;
pub mod auth;
pub mod deviations;
pub mod health;
