pub mod auth;
pub mod forum;
pub mod message;
pub mod notification;
pub mod upload;
pub mod user;
