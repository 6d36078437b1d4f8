pub mod account_service;
pub mod forum_service;
pub mod health_service;
pub mod image_service;
pub mod message_service;
pub mod notification_service;
pub mod rate_limit_service;
