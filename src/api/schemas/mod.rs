pub mod auth;
pub mod forum;
pub mod health;
pub mod messaging;
