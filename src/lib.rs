// Audio relay and music catalog service.

pub mod catalog;
pub mod config;
pub mod error;
pub mod logging;
pub mod media;
pub mod relay;
pub mod server;
