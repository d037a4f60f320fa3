pub mod config;
pub mod error;
pub mod image;
pub mod image_server;
pub mod reply;
pub mod store;
pub mod upload;
