//! HTTP API handlers for mediacat-server

pub mod health;
pub mod media;

pub use health::health_routes;
pub use media::media_routes;
