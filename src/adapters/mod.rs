pub mod database;
pub mod image_host;
pub mod local_store;
