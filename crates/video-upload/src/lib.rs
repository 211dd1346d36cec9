//! HTTP service that accepts mp4 uploads for existing video records, remuxes
//! them for fast start and publishes them to object storage.

pub mod auth;
pub mod config;
pub mod error;
pub mod media;
pub mod server;
pub mod storage;
